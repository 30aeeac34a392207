//! The `mailrun.config.ron` document.
//!
//! ```ron
//! (
//!     recipients: "data/recipients.csv",
//!     template: "data/template.html",
//!     subject: "Our autumn newsletter",
//!     dispatch: (delay_secs: 2, session_limit: 4900),
//! )
//! ```
//!
//! Relay credentials never live here; see
//! [`mailrun_common::config::SmtpSettings`].

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Context;
use mailrun_common::{
    ConfigError,
    config::ClientTimeouts,
    template::DEFAULT_FALLBACK_NAME,
};
use mailrun_dispatch::DispatchConfig;
use serde::{Deserialize, Serialize};

/// Environment variable naming the configuration document.
pub const CONFIG_VAR: &str = "MAILRUN_CONFIG";

pub const DEFAULT_CONFIG_FILE: &str = "mailrun.config.ron";

fn default_fallback_name() -> String {
    DEFAULT_FALLBACK_NAME.to_string()
}

fn default_progress() -> PathBuf {
    PathBuf::from("progress/progress.txt")
}

fn default_lock() -> PathBuf {
    PathBuf::from("progress/mailrun.lock")
}

fn default_hello_name() -> String {
    "localhost".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// CSV file with an `email` column and an optional `names` column.
    #[serde(default)]
    pub recipients: PathBuf,

    /// Message body; `{{names}}` and `{{email}}` are filled per recipient.
    #[serde(default)]
    pub template: PathBuf,

    #[serde(default)]
    pub subject: String,

    /// Used for `{{names}}` when a recipient has none.
    ///
    /// Default: `Amigo(a)`
    #[serde(default = "default_fallback_name")]
    pub fallback_name: String,

    /// Checkpoint file.
    ///
    /// Default: `progress/progress.txt`
    #[serde(default = "default_progress")]
    pub progress: PathBuf,

    /// Run lock file.
    ///
    /// Default: `progress/mailrun.lock`
    #[serde(default = "default_lock")]
    pub lock: PathBuf,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub timeouts: ClientTimeouts,

    /// Name announced in EHLO.
    ///
    /// Default: `localhost`
    #[serde(default = "default_hello_name")]
    pub hello_name: String,

    /// Accept any TLS certificate from the relay (for testing only)
    ///
    /// **SECURITY WARNING**: This makes the session vulnerable to
    /// Man-in-the-Middle attacks, including theft of the relay credentials.
    ///
    /// Default: `false`
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recipients: PathBuf::new(),
            template: PathBuf::new(),
            subject: String::new(),
            fallback_name: default_fallback_name(),
            progress: default_progress(),
            lock: default_lock(),
            dispatch: DispatchConfig::default(),
            timeouts: ClientTimeouts::default(),
            hello_name: default_hello_name(),
            accept_invalid_certs: false,
        }
    }
}

/// Fields `mailrun configure` can change. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub recipients: Option<PathBuf>,
    pub template: Option<PathBuf>,
    pub subject: Option<String>,
    pub delay_secs: Option<u64>,
    pub session_limit: Option<usize>,
}

impl Config {
    /// Read and parse the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid document.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        ron::from_str(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display()))
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match std::fs::metadata(path) {
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            _ => Self::load(path),
        }
    }

    /// Write the document to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or the write fails.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    pub fn apply(&mut self, update: ConfigUpdate) {
        if let Some(recipients) = update.recipients {
            self.recipients = recipients;
        }
        if let Some(template) = update.template {
            self.template = template;
        }
        if let Some(subject) = update.subject {
            self.subject = subject;
        }
        if let Some(delay) = update.delay_secs {
            self.dispatch.delay_secs = delay;
        }
        if let Some(limit) = update.session_limit {
            self.dispatch.session_limit = limit;
        }
    }

    /// Check that a run can be started from this document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Incomplete`] naming the first missing field, or
    /// [`ConfigError::Invalid`] for an unusable dispatch setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recipients.as_os_str().is_empty() {
            return Err(ConfigError::Incomplete("recipients"));
        }
        if self.template.as_os_str().is_empty() {
            return Err(ConfigError::Incomplete("template"));
        }
        if self.subject.trim().is_empty() {
            return Err(ConfigError::Incomplete("subject"));
        }
        self.dispatch.validate()
    }
}

/// Choose the configuration document: `--config`, then `MAILRUN_CONFIG`,
/// then `./mailrun.config.ron`.
#[must_use]
pub fn locate(explicit: Option<PathBuf>) -> PathBuf {
    locate_with(explicit, std::env::var(CONFIG_VAR).ok())
}

fn locate_with(explicit: Option<PathBuf>, from_env: Option<String>) -> PathBuf {
    explicit
        .or_else(|| {
            from_env
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| PathBuf::from(".").join(DEFAULT_CONFIG_FILE))
}
