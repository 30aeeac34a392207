//! Relay connection settings.
//!
//! Credentials are never kept in the configuration document; they are read
//! from the process environment:
//!
//! | Variable        | Meaning                                   |
//! |-----------------|-------------------------------------------|
//! | `SMTP_HOST`     | Relay host name                           |
//! | `SMTP_PORT`     | Relay port                                |
//! | `SMTP_USER`     | AUTH user name                            |
//! | `SMTP_PASSWORD` | AUTH secret                               |
//! | `SMTP_FROM`     | Envelope and header sender address        |
//! | `SMTP_TLS`      | `starttls` (default), `implicit` or `none` |

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const HOST_VAR: &str = "SMTP_HOST";
pub const PORT_VAR: &str = "SMTP_PORT";
pub const USER_VAR: &str = "SMTP_USER";
pub const PASSWORD_VAR: &str = "SMTP_PASSWORD";
pub const FROM_VAR: &str = "SMTP_FROM";
pub const TLS_VAR: &str = "SMTP_TLS";

/// How the session is secured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    /// Plain TCP upgraded with STARTTLS before authenticating.
    #[default]
    StartTls,
    /// TLS from the first byte (SMTPS, usually port 465).
    Implicit,
    /// No TLS. Only meant for local relays and tests.
    None,
}

impl std::str::FromStr for TlsMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "starttls" => Ok(Self::StartTls),
            "implicit" | "smtps" | "tls" => Ok(Self::Implicit),
            "none" | "plain" => Ok(Self::None),
            other => Err(ConfigError::Invalid {
                field: TLS_VAR,
                reason: format!("unknown TLS mode '{other}'"),
            }),
        }
    }
}

/// Everything needed to open an authenticated relay session.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from: String,
    pub tls: TlsMode,
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .field("tls", &self.tls)
            .finish()
    }
}

impl SmtpSettings {
    /// Read the settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Incomplete`] naming the first variable that is
    /// missing or empty, or [`ConfigError::Invalid`] if the port or TLS mode
    /// cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the settings from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`SmtpSettings::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::Incomplete(name))
        };

        let host = required(HOST_VAR)?;
        let port = required(PORT_VAR)?;
        let user = required(USER_VAR)?;
        let password = lookup(PASSWORD_VAR)
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::Incomplete(PASSWORD_VAR))?;
        let from = required(FROM_VAR)?;

        let port = port.parse::<u16>().map_err(|e| ConfigError::Invalid {
            field: PORT_VAR,
            reason: e.to_string(),
        })?;

        let tls = lookup(TLS_VAR)
            .filter(|value| !value.trim().is_empty())
            .map_or(Ok(TlsMode::default()), |value| value.parse())?;

        Ok(Self {
            host,
            port,
            user,
            password,
            from,
            tls,
        })
    }

    /// `host:port`, as handed to the TCP connector.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
