//! Sequential dispatch over a recipient list.
//!
//! One recipient is handled at a time: validate, render, send, persist the
//! checkpoint, pause. A session is replaced once it has carried
//! `session_limit` messages, and a session that drops mid-send is reopened
//! once before the recipient is given up on.
//!
//! The checkpoint is advanced after every attempt, including failed sends, so
//! a restart never sends to a recipient whose outcome was already recorded.

use std::sync::Arc;

use mailrun_common::{
    Recipient, RecipientList, Signal, address, internal,
    template::{self, DEFAULT_FALLBACK_NAME, Fields},
};
use mailrun_progress::ProgressStore;
use mailrun_smtp::SessionTransport;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};

use crate::{
    config::DispatchConfig,
    error::{DispatchError, DispatchErrorKind},
    events::{DispatchEvent, EventSink, TracingSink},
    outcome::{DispatchOutcome, RunEnd, RunSummary},
};

/// What to send, and to whom.
#[derive(Debug, Clone)]
pub struct Campaign {
    pub recipients: RecipientList,
    pub template: String,
    pub subject: String,
    /// Stands in for `{{names}}` when a recipient has no display name.
    pub fallback_name: String,
}

impl Campaign {
    #[must_use]
    pub fn new(
        recipients: RecipientList,
        template: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            recipients,
            template: template.into(),
            subject: subject.into(),
            fallback_name: DEFAULT_FALLBACK_NAME.to_string(),
        }
    }

    #[must_use]
    pub fn with_fallback_name(mut self, name: impl Into<String>) -> Self {
        self.fallback_name = name.into();
        self
    }

    /// Body for one recipient.
    #[must_use]
    pub fn render(&self, recipient: &Recipient) -> String {
        template::render(
            &self.template,
            &Fields::for_recipient(recipient, &self.fallback_name),
        )
    }
}

pub struct DispatchEngine<T> {
    config: DispatchConfig,
    transport: T,
    store: Arc<dyn ProgressStore>,
    sink: Arc<dyn EventSink>,
    shutdown: Option<broadcast::Receiver<Signal>>,
    cancelled: bool,
    /// Most recipients one run may process.
    limit: Option<usize>,
}

impl<T: SessionTransport> DispatchEngine<T> {
    #[must_use]
    pub fn new(config: DispatchConfig, transport: T, store: Arc<dyn ProgressStore>) -> Self {
        Self {
            config,
            transport,
            store,
            sink: Arc::new(TracingSink),
            shutdown: None,
            cancelled: false,
            limit: None,
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Stop between recipients once `Signal::Shutdown` arrives.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: broadcast::Receiver<Signal>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Process at most `limit` recipients from the checkpoint, skips
    /// included, then end the run as completed.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Process every recipient from the stored checkpoint to the end.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] carrying the partial summary when the
    /// first session cannot be opened, a rotated session cannot be reopened,
    /// or the checkpoint cannot be saved. Per-recipient failures do not end
    /// the run.
    pub async fn run(&mut self, campaign: &Campaign) -> Result<RunSummary, DispatchError> {
        let total = campaign.recipients.len();
        let start = self.store.read().await;
        let mut summary = RunSummary::new(start, total);

        if start >= total {
            internal!(
                level = INFO,
                "Checkpoint {start} is at the end of {total} recipients, nothing to send"
            );
            summary.end = RunEnd::NothingToSend;
            self.sink.emit(&DispatchEvent::Finished(summary.clone()));
            return Ok(summary);
        }

        self.sink.emit(&DispatchEvent::Started {
            start_index: start,
            total,
        });

        let result = match self.transport.connect().await {
            Ok(()) => {
                self.sink
                    .emit(&DispatchEvent::SessionOpened { rotated: false });
                self.dispatch(campaign, &mut summary).await
            }
            Err(e) => Err(DispatchErrorKind::Connect(e)),
        };

        self.transport.disconnect().await;

        match result {
            Ok(end) => {
                summary.end = end;
                self.sink.emit(&DispatchEvent::Finished(summary.clone()));
                Ok(summary)
            }
            Err(kind) => {
                summary.end = RunEnd::Aborted(kind.reason());
                self.sink.emit(&DispatchEvent::Finished(summary.clone()));
                Err(DispatchError::new(kind, summary))
            }
        }
    }

    async fn dispatch(
        &mut self,
        campaign: &Campaign,
        summary: &mut RunSummary,
    ) -> Result<RunEnd, DispatchErrorKind> {
        let start = summary.start_index;
        let mut session_count = 0;

        let pending = campaign.recipients.slice_from(start);
        let limit = self.limit.unwrap_or(usize::MAX);

        for (offset, recipient) in pending.iter().take(limit).enumerate() {
            let index = start + offset;

            if self.shutdown_requested() {
                self.sink.emit(&DispatchEvent::Cancelled { index });
                return Ok(RunEnd::Cancelled);
            }

            if session_count >= self.config.session_limit {
                self.rotate().await?;
                session_count = 0;
            }

            let address = match checked_address(recipient) {
                Ok(address) => address,
                Err(reason) => {
                    let outcome = DispatchOutcome::SkippedInvalid;
                    self.advance(index, recipient, outcome, Some(reason), summary)
                        .await?;
                    continue;
                }
            };

            let body = campaign.render(recipient);
            let (outcome, detail) = self
                .deliver(index, address, &campaign.subject, &body, &mut session_count)
                .await;
            self.advance(index, recipient, outcome, detail, summary).await?;

            self.pause().await;
        }

        Ok(RunEnd::Completed)
    }

    /// Send once, reopening the session and retrying once if it dropped.
    async fn deliver(
        &mut self,
        index: usize,
        address: &str,
        subject: &str,
        body: &str,
        session_count: &mut usize,
    ) -> (DispatchOutcome, Option<String>) {
        let dropped = match self.transport.send_one(address, subject, body).await {
            Ok(()) => {
                *session_count += 1;
                return (DispatchOutcome::Sent, None);
            }
            Err(e) if e.is_session_dropped() => e,
            Err(e) => return (DispatchOutcome::FailedAbandoned, Some(e.to_string())),
        };

        internal!(
            level = WARN,
            "Session dropped while sending to #{index} ({dropped}), reconnecting"
        );

        if let Err(e) = self.transport.connect().await {
            return (
                DispatchOutcome::FailedAbandoned,
                Some(format!("{dropped}; reconnect failed: {e}")),
            );
        }

        *session_count = 0;
        self.sink.emit(&DispatchEvent::Reconnected { index });

        match self.transport.send_one(address, subject, body).await {
            Ok(()) => {
                *session_count += 1;
                (DispatchOutcome::Sent, None)
            }
            Err(e) => (DispatchOutcome::FailedAbandoned, Some(e.to_string())),
        }
    }

    /// Persist `index + 1`, then record `outcome`.
    ///
    /// If the write fails the recipient is recorded as `FailedFatal` instead
    /// and the checkpoint stays where it was.
    async fn advance(
        &self,
        index: usize,
        recipient: &Recipient,
        outcome: DispatchOutcome,
        detail: Option<String>,
        summary: &mut RunSummary,
    ) -> Result<(), DispatchErrorKind> {
        let (outcome, detail, result) = match self.store.write(index + 1).await {
            Ok(()) => {
                summary.checkpoint = index + 1;
                (outcome, detail, Ok(()))
            }
            Err(e) => (
                DispatchOutcome::FailedFatal,
                Some(e.to_string()),
                Err(DispatchErrorKind::Persistence(e)),
            ),
        };

        summary.record(outcome);
        self.sink.emit(&DispatchEvent::Recipient {
            index,
            address: recipient.address.clone(),
            outcome,
            detail,
        });

        result
    }

    async fn rotate(&mut self) -> Result<(), DispatchErrorKind> {
        internal!(
            level = INFO,
            "Session limit of {} reached, rotating after {:?}",
            self.config.session_limit,
            self.config.rotation_cooldown()
        );

        self.transport.disconnect().await;
        tokio::time::sleep(self.config.rotation_cooldown()).await;
        self.transport
            .connect()
            .await
            .map_err(DispatchErrorKind::ReconnectExhausted)?;

        self.sink.emit(&DispatchEvent::SessionOpened { rotated: true });
        Ok(())
    }

    /// Sleep for the configured delay. A shutdown signal ends the sleep early
    /// and is remembered for the next boundary check.
    async fn pause(&mut self) {
        let delay = self.config.delay();
        if delay.is_zero() {
            return;
        }

        let Some(shutdown) = self.shutdown.as_mut() else {
            tokio::time::sleep(delay).await;
            return;
        };

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        tokio::select! {
            () = &mut sleep => {}
            signal = shutdown.recv() => match signal {
                Ok(Signal::Shutdown) | Err(RecvError::Lagged(_)) => self.cancelled = true,
                Err(RecvError::Closed) => sleep.await,
            }
        }
    }

    fn shutdown_requested(&mut self) -> bool {
        if self.cancelled {
            return true;
        }

        if let Some(shutdown) = self.shutdown.as_mut() {
            match shutdown.try_recv() {
                Ok(Signal::Shutdown) | Err(TryRecvError::Lagged(_)) => self.cancelled = true,
                Err(TryRecvError::Empty | TryRecvError::Closed) => {}
            }
        }

        self.cancelled
    }
}

/// The recipient's address if it is deliverable, or why it is not.
fn checked_address(recipient: &Recipient) -> Result<&str, String> {
    let address = recipient
        .address
        .as_deref()
        .ok_or_else(|| "empty address".to_string())?;
    address::validate(address).map_err(|e| e.to_string())?;
    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_address() {
        assert_eq!(
            checked_address(&Recipient::new(0, "a@b.co")),
            Ok("a@b.co")
        );
        let empty = Recipient {
            index: 1,
            address: None,
            display_name: None,
        };
        assert!(checked_address(&empty).is_err());
        assert!(checked_address(&Recipient::new(2, "not-an-email")).is_err());
    }

    #[test]
    fn test_campaign_render_uses_fallback() {
        let campaign = Campaign::new(
            RecipientList::from_iter(["ana@example.com"]),
            "Hi {{names}} <{{email}}>",
            "Hello",
        )
        .with_fallback_name("friend");

        let recipient = &campaign.recipients[0];
        assert_eq!(campaign.render(recipient), "Hi friend <ana@example.com>");
    }
}
