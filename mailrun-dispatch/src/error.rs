//! Errors that end a dispatch run.

use mailrun_progress::ProgressError;
use mailrun_smtp::TransportError;
use thiserror::Error;

use crate::outcome::{AbortReason, RunSummary};

#[derive(Debug, Error)]
pub enum DispatchErrorKind {
    #[error("Could not open the relay session: {0}")]
    Connect(#[source] TransportError),

    #[error("Could not reopen the relay session after rotation: {0}")]
    ReconnectExhausted(#[source] TransportError),

    #[error("Progress could not be saved: {0}")]
    Persistence(#[from] ProgressError),
}

impl DispatchErrorKind {
    #[must_use]
    pub const fn reason(&self) -> AbortReason {
        match self {
            Self::Connect(_) => AbortReason::Connect,
            Self::ReconnectExhausted(_) => AbortReason::ReconnectExhausted,
            Self::Persistence(_) => AbortReason::Persistence,
        }
    }
}

/// An aborted run, together with what it got done.
#[derive(Debug, Error)]
#[error("{kind} ({summary})")]
pub struct DispatchError {
    #[source]
    pub kind: DispatchErrorKind,
    pub summary: RunSummary,
}

impl DispatchError {
    #[must_use]
    pub const fn new(kind: DispatchErrorKind, summary: RunSummary) -> Self {
        Self { kind, summary }
    }
}
