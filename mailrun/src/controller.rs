use std::{
    fmt,
    sync::{Arc, LazyLock},
};

use anyhow::Context;
use mailrun_common::{
    Recipient, RecipientList, Signal, address,
    config::SmtpSettings,
    internal, source,
    template::{self, Fields},
    tracing,
};
use mailrun_dispatch::{Campaign, DispatchEngine, RunSummary};
use mailrun_progress::{FileProgressStore, ProgressStore, RunLock};
use mailrun_smtp::{SessionTransport, SmtpTransport, client::BodyKind};
use tokio::sync::broadcast;

use crate::config::Config;

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

/// Wait for SIGINT or SIGTERM and broadcast [`Signal::Shutdown`]. A second
/// CTRL+C exits immediately.
///
/// # Errors
///
/// Returns an error if the signal handlers cannot be installed.
pub async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!(level = WARN, "CTRL+C entered -- finishing the current recipient, enter it again to force shutdown");
        }
        _ = terminate.recv() => {
            internal!(level = WARN, "Terminate Signal received, finishing the current recipient");
        }
    };

    if let Err(e) = SHUTDOWN_BROADCAST.send(Signal::Shutdown) {
        tracing::debug!("Nothing is listening for shutdown: {e}");
    }

    tokio::signal::ctrl_c().await?;
    internal!(level = WARN, "Forced shutdown");
    std::process::exit(130);
}

/// Checkpoint and list size, as reported by `mailrun status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub checkpoint: usize,
    pub total: usize,
}

impl Status {
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.total.saturating_sub(self.checkpoint)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "progress {}/{} ({} remaining)",
            self.checkpoint.min(self.total),
            self.total,
            self.remaining()
        )
    }
}

/// Wires the configuration document to the dispatch engine.
pub struct Controller {
    config: Config,
    settings: Option<SmtpSettings>,
}

impl Controller {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self {
            config,
            settings: None,
        }
    }

    /// Use these relay settings instead of reading the environment.
    #[must_use]
    pub fn with_settings(mut self, settings: SmtpSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    fn settings(&self) -> anyhow::Result<SmtpSettings> {
        match &self.settings {
            Some(settings) => Ok(settings.clone()),
            None => Ok(SmtpSettings::from_env()?),
        }
    }

    fn transport(&self, settings: SmtpSettings) -> SmtpTransport {
        SmtpTransport::new(settings, self.config.timeouts.clone())
            .hello_name(self.config.hello_name.as_str())
            .accept_invalid_certs(self.config.accept_invalid_certs)
            .body_kind(BodyKind::for_template(&self.config.template))
    }

    fn store(&self) -> FileProgressStore {
        FileProgressStore::new(&self.config.progress)
    }

    fn recipients(&self) -> anyhow::Result<RecipientList> {
        Ok(source::load(&self.config.recipients)?)
    }

    fn template(&self) -> anyhow::Result<String> {
        std::fs::read_to_string(&self.config.template).with_context(|| {
            format!(
                "Template {} is unreadable",
                self.config.template.display()
            )
        })
    }

    /// Dispatch to every recipient from the stored checkpoint on.
    ///
    /// # Errors
    ///
    /// Fails before sending anything if the configuration or credentials are
    /// incomplete, the recipient source or template cannot be read, or
    /// another run holds the lock. Fails after sending if the run aborts; the
    /// error then carries the partial summary.
    pub async fn send(&self) -> anyhow::Result<RunSummary> {
        self.dispatch(None).await
    }

    /// Process only the recipient at the checkpoint, moving it on by one.
    ///
    /// # Errors
    ///
    /// As for [`Controller::send`].
    pub async fn send_next(&self) -> anyhow::Result<RunSummary> {
        self.dispatch(Some(1)).await
    }

    async fn dispatch(&self, limit: Option<usize>) -> anyhow::Result<RunSummary> {
        self.config.validate()?;
        let settings = self.settings()?;
        let _lock = RunLock::acquire(&self.config.lock)?;

        let campaign = Campaign::new(self.recipients()?, self.template()?, &self.config.subject)
            .with_fallback_name(self.config.fallback_name.as_str());

        internal!(
            level = INFO,
            "Dispatching to {} recipients through {}",
            campaign.recipients.len(),
            settings.address()
        );

        let mut engine = DispatchEngine::new(
            self.config.dispatch.clone(),
            self.transport(settings),
            Arc::new(self.store()),
        )
        .with_shutdown(SHUTDOWN_BROADCAST.subscribe());
        if let Some(limit) = limit {
            engine = engine.with_limit(limit);
        }

        Ok(engine.run(&campaign).await?)
    }

    /// Start the next run from the first recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if a run holds the lock or the checkpoint cannot be
    /// written.
    pub async fn reset_progress(&self) -> anyhow::Result<()> {
        let _lock = RunLock::acquire(&self.config.lock)?;
        self.store().reset().await?;
        internal!(level = INFO, "Progress reset");
        Ok(())
    }

    /// Send the template to one address over a fresh session. The checkpoint
    /// is neither read nor written.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid, the settings are
    /// incomplete, or the relay does not accept the message.
    pub async fn send_one(&self, to: &str) -> anyhow::Result<()> {
        address::validate(to).with_context(|| format!("{to} is not a valid address"))?;
        if self.config.subject.trim().is_empty() {
            anyhow::bail!("The configuration has no subject");
        }
        let settings = self.settings()?;

        let body = template::render(
            &self.template()?,
            &Fields::for_recipient(&Recipient::new(0, to), &self.config.fallback_name),
        );

        let mut transport = self.transport(settings);
        transport.connect().await?;
        let result = transport.send_one(to, &self.config.subject, &body).await;
        transport.disconnect().await;
        result?;

        internal!(level = INFO, "Test message sent to {to}");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the recipient source cannot be read.
    pub async fn status(&self) -> anyhow::Result<Status> {
        let total = self.recipients()?.len();
        let checkpoint = self.store().read().await;
        Ok(Status { checkpoint, total })
    }
}
