//! [`SessionTransport`] over a real SMTP relay.

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use mailrun_common::{
    config::{ClientTimeouts, SmtpSettings, TlsMode},
    tracing,
};

use crate::{
    client::{self, BodyKind, ClientError, MessageBuilder, SmtpClient, authenticate},
    transport::{SessionTransport, TransportError},
};

/// Run one client step under `limit`.
async fn bounded<T>(
    limit: Duration,
    step: &'static str,
    operation: impl Future<Output = client::Result<T>>,
) -> client::Result<T> {
    tokio::time::timeout(limit, operation)
        .await
        .map_err(|_| ClientError::Timeout(step, limit))?
}

/// Authenticated relay session built from [`SmtpSettings`].
pub struct SmtpTransport {
    settings: SmtpSettings,
    timeouts: ClientTimeouts,
    hello_name: String,
    accept_invalid_certs: bool,
    body_kind: BodyKind,
    client: Option<SmtpClient>,
    /// The last session ended without a `disconnect` call.
    lost: bool,
}

impl SmtpTransport {
    #[must_use]
    pub fn new(settings: SmtpSettings, timeouts: ClientTimeouts) -> Self {
        Self {
            settings,
            timeouts,
            hello_name: "localhost".to_string(),
            accept_invalid_certs: false,
            body_kind: BodyKind::default(),
            client: None,
            lost: false,
        }
    }

    /// Name announced in EHLO.
    #[must_use]
    pub fn hello_name(mut self, name: impl Into<String>) -> Self {
        self.hello_name = name.into();
        self
    }

    #[must_use]
    pub const fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Content type of every message body. Defaults to HTML.
    #[must_use]
    pub const fn body_kind(mut self, kind: BodyKind) -> Self {
        self.body_kind = kind;
        self
    }

    async fn open(&self) -> Result<SmtpClient, TransportError> {
        let address = self.settings.address();
        let host = self.settings.host.as_str();

        let connecting = async {
            let mut client = match self.settings.tls {
                TlsMode::Implicit => {
                    SmtpClient::connect_tls(&address, host, self.accept_invalid_certs).await?
                }
                TlsMode::StartTls | TlsMode::None => SmtpClient::connect(&address, host)
                    .await?
                    .accept_invalid_certs(self.accept_invalid_certs),
            };
            client.read_greeting().await?;
            Ok::<_, ClientError>(client)
        };

        let mut client = bounded(self.timeouts.connect(), "connect", connecting)
            .await
            .map_err(|e| TransportError::network(&e))?;

        let command = self.timeouts.command();
        bounded(command, "EHLO", client.ehlo(&self.hello_name))
            .await
            .map_err(|e| TransportError::network(&e))?;

        if self.settings.tls == TlsMode::StartTls {
            bounded(command, "STARTTLS", client.starttls())
                .await
                .map_err(|e| TransportError::network(&e))?;
            bounded(command, "EHLO", client.ehlo(&self.hello_name))
                .await
                .map_err(|e| TransportError::network(&e))?;
        }

        bounded(
            command,
            "AUTH",
            authenticate(&mut client, &self.settings.user, &self.settings.password),
        )
        .await
        .map_err(|e| match e {
            ClientError::SmtpError { code, message } if code != 421 => {
                TransportError::AuthFailure(format!("{code} {message}"))
            }
            other => TransportError::network(&other),
        })?;

        Ok(client)
    }

    async fn transact(
        client: &mut SmtpClient,
        timeouts: &ClientTimeouts,
        from: &str,
        to: &str,
        message: &str,
    ) -> client::Result<()> {
        bounded(timeouts.envelope(), "MAIL FROM", client.mail_from(from)).await?;
        bounded(timeouts.envelope(), "RCPT TO", client.rcpt_to(to)).await?;
        bounded(timeouts.data(), "DATA", client.data()).await?;
        bounded(timeouts.data(), "message transfer", client.send_data(message)).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionTransport for SmtpTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.client.is_some() {
            self.disconnect().await;
        }

        if self.accept_invalid_certs {
            tracing::warn!(
                server = %self.settings.address(),
                "SECURITY WARNING: TLS certificate validation is disabled for this connection"
            );
        }

        let client = self.open().await?;
        tracing::info!(
            server = %self.settings.address(),
            tls = client.is_tls(),
            "Session established"
        );
        self.client = Some(client);
        self.lost = false;
        Ok(())
    }

    async fn send_one(
        &mut self,
        address: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), TransportError> {
        let Some(client) = self.client.as_mut() else {
            return Err(if self.lost {
                TransportError::SessionDropped("the previous session was lost".to_string())
            } else {
                TransportError::SendFailure("no open session".to_string())
            });
        };

        let message = MessageBuilder::new()
            .from(self.settings.from.as_str())
            .to(address)
            .subject(subject)
            .kind(self.body_kind)
            .body(body)
            .build()
            .map_err(|e| TransportError::SendFailure(e.to_string()))?;

        let Err(error) =
            Self::transact(client, &self.timeouts, &self.settings.from, address, &message).await
        else {
            return Ok(());
        };

        let classified = TransportError::sending(&error);

        // After a timeout the stream may still carry the late reply, so the
        // session is not reused.
        if classified.is_session_dropped()
            || matches!(error, ClientError::Timeout(..))
            || !client.is_open()
        {
            self.client = None;
            self.lost = true;
            return Err(classified);
        }

        if let Err(e) = bounded(self.timeouts.command(), "RSET", client.rset()).await {
            tracing::warn!(error = %e, "RSET after a rejected message failed");
            self.client = None;
            self.lost = true;
        }

        Err(classified)
    }

    async fn disconnect(&mut self) {
        self.lost = false;
        let Some(mut client) = self.client.take() else {
            return;
        };

        match tokio::time::timeout(self.timeouts.quit(), client.quit()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "QUIT failed"),
            Err(_) => tracing::warn!(
                timeout = ?self.timeouts.quit(),
                "QUIT timed out"
            ),
        }
    }

    fn is_connected(&self) -> bool {
        self.client.as_ref().is_some_and(SmtpClient::is_open)
    }
}
