//! The session seam between the dispatch engine and the relay.

use async_trait::async_trait;
use thiserror::Error;

use crate::client::ClientError;

/// Classified failures of a relay session.
///
/// The engine decides what each class means for the run; the transport
/// itself never retries.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The relay refused the credentials.
    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    /// The session could not be established.
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// One message was not accepted; the session is still usable.
    #[error("Send failed: {0}")]
    SendFailure(String),

    /// The session was lost while sending.
    #[error("Session dropped: {0}")]
    SessionDropped(String),
}

impl TransportError {
    /// Classify a client error raised while opening a session.
    #[must_use]
    pub fn network(error: &ClientError) -> Self {
        Self::NetworkFailure(error.to_string())
    }

    /// Classify a client error raised during a message transaction.
    #[must_use]
    pub fn sending(error: &ClientError) -> Self {
        if error.is_connection_lost() {
            Self::SessionDropped(error.to_string())
        } else {
            Self::SendFailure(error.to_string())
        }
    }

    #[must_use]
    pub const fn is_session_dropped(&self) -> bool {
        matches!(self, Self::SessionDropped(_))
    }
}

/// An authenticated relay session that is opened, used for a bounded number
/// of messages, and closed again.
///
/// The state is either connected or disconnected. `send_one` is only valid
/// while connected.
#[async_trait]
pub trait SessionTransport: Send {
    /// Open and authenticate a new session.
    ///
    /// # Errors
    ///
    /// [`TransportError::NetworkFailure`] if the relay cannot be reached or
    /// greets badly, [`TransportError::AuthFailure`] if it rejects the
    /// credentials. The transport stays disconnected on failure.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Submit one message.
    ///
    /// # Errors
    ///
    /// [`TransportError::SessionDropped`] if the session was lost, after
    /// which the transport is disconnected, and
    /// [`TransportError::SendFailure`] for any other rejection.
    async fn send_one(
        &mut self,
        address: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), TransportError>;

    /// Close the session. Idempotent and never fails.
    async fn disconnect(&mut self);

    fn is_connected(&self) -> bool;
}
