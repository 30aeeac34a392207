//! AUTH PLAIN and AUTH LOGIN.

use base64::Engine;
use mailrun_common::tracing;

use super::{
    client::SmtpClient,
    error::Result,
    response::{Capabilities, Response},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mechanism {
    Plain,
    Login,
}

impl Mechanism {
    /// PLAIN is preferred when the relay offers both. A relay that
    /// advertises neither still gets PLAIN.
    #[must_use]
    pub fn select(capabilities: &Capabilities) -> Self {
        if !capabilities.supports_auth("PLAIN") && capabilities.supports_auth("LOGIN") {
            Self::Login
        } else {
            Self::Plain
        }
    }
}

impl std::fmt::Display for Mechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
        })
    }
}

fn encode(value: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(value.as_bytes())
}

/// Authenticate with the mechanism picked from the last EHLO.
///
/// # Errors
///
/// Returns `ClientError::SmtpError` with the relay's reply if a step is
/// rejected, or any transport error raised while talking to it.
pub async fn authenticate(client: &mut SmtpClient, user: &str, password: &str) -> Result<Response> {
    let mechanism = Mechanism::select(client.capabilities());
    tracing::debug!(%mechanism, "Authenticating");

    match mechanism {
        Mechanism::Plain => {
            let payload = encode(&format!("\0{user}\0{password}"));
            client
                .command_logged(&format!("AUTH PLAIN {payload}"), "AUTH PLAIN <redacted>")
                .await?
                .expect(Response::is_success)
        }
        Mechanism::Login => {
            client
                .command("AUTH LOGIN")
                .await?
                .expect(Response::is_intermediate)?;
            client
                .command_logged(&encode(user), "<redacted user>")
                .await?
                .expect(Response::is_intermediate)?;
            client
                .command_logged(&encode(password), "<redacted password>")
                .await?
                .expect(Response::is_success)
        }
    }
}
