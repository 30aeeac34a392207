//! Error types for the mailrun-common crate.
//!
//! These cover the input adapters: the recipient source and the
//! environment-provided relay settings.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading the recipient source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source could not be opened or read.
    #[error("Recipient source {} is unreadable: {reason}", path.display())]
    Unreadable { path: PathBuf, reason: String },

    /// The source was readable but is missing a required column.
    #[error("Recipient source is malformed: {0}")]
    Malformed(String),
}

impl SourceError {
    pub(crate) fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Unreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised while assembling relay settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting is empty or absent.
    #[error("Configuration incomplete: {0} is missing or empty")]
    Incomplete(&'static str),

    /// A setting is present but cannot be used.
    #[error("Invalid configuration for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
