//! Error types for checkpoint persistence.

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProgressError {
    /// The checkpoint could not be written. Fatal to a run, since continuing
    /// would lose the position on restart.
    #[error("Failed to persist progress: {0}")]
    Persistence(String),

    /// Another run holds the lock.
    #[error("{} is held by another run (pid {holder})", path.display())]
    Locked { path: PathBuf, holder: String },

    /// The lock file could not be created or inspected.
    #[error("Lock I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ProgressError>;
