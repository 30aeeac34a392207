//! Errors raised by [`SmtpClient`](super::SmtpClient).

use std::io;

use thiserror::Error;

/// Failures below the transport: socket, TLS, reply parsing and rejected
/// commands.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Socket failure: {0}")]
    Io(#[from] io::Error),

    /// The relay sent something that is not an SMTP reply.
    #[error("Malformed reply: {0}")]
    ParseError(String),

    /// A 4xx or 5xx reply.
    #[error("Relay replied {code} {message}")]
    SmtpError { code: u16, message: String },

    #[error("TLS failure: {0}")]
    TlsError(String),

    /// The message could not be assembled from its parts.
    #[error("Cannot build message: {0}")]
    BuilderError(String),

    #[error("Relay closed the connection")]
    ConnectionClosed,

    /// A step of the session ran past its limit.
    #[error("{0} timed out after {1:?}")]
    Timeout(&'static str, std::time::Duration),

    #[error("Reply is not UTF-8: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),
}

impl ClientError {
    /// Returns `true` if the session can no longer be used.
    ///
    /// A 421 reply is the relay announcing that it is closing the channel.
    #[must_use]
    pub const fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::ConnectionClosed | Self::SmtpError { code: 421, .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
