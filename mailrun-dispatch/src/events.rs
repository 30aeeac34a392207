//! Observable progress of a run.

use mailrun_common::tracing;

use crate::outcome::{DispatchOutcome, RunSummary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    Started {
        start_index: usize,
        total: usize,
    },
    /// A session was opened. `rotated` is set when it replaced a full one.
    SessionOpened {
        rotated: bool,
    },
    /// A dropped session was replaced while retrying `index`.
    Reconnected {
        index: usize,
    },
    Recipient {
        index: usize,
        address: Option<String>,
        outcome: DispatchOutcome,
        detail: Option<String>,
    },
    /// Shutdown was observed before processing `index`.
    Cancelled {
        index: usize,
    },
    Finished(RunSummary),
}

/// Receives every event of a run, in order.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &DispatchEvent);
}

/// Writes events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &DispatchEvent) {
        match event {
            DispatchEvent::Started { start_index, total } => {
                tracing::info!(start_index, total, "Dispatch starting");
            }
            DispatchEvent::SessionOpened { rotated: true } => {
                tracing::info!("Session rotated");
            }
            DispatchEvent::SessionOpened { rotated: false } => {
                tracing::debug!("Session opened");
            }
            DispatchEvent::Reconnected { index } => {
                tracing::warn!(index, "Session dropped, reconnected");
            }
            DispatchEvent::Recipient {
                index,
                address,
                outcome,
                detail,
            } => {
                let address = address.as_deref().unwrap_or("<empty>");
                let detail = detail.as_deref().unwrap_or_default();
                match outcome {
                    DispatchOutcome::Sent => tracing::info!(index, address, "Sent"),
                    DispatchOutcome::SkippedInvalid => {
                        tracing::warn!(index, address, reason = detail, "Skipped invalid address");
                    }
                    DispatchOutcome::FailedAbandoned => {
                        tracing::error!(index, address, error = detail, "Send failed");
                    }
                    DispatchOutcome::FailedFatal => {
                        tracing::error!(index, address, error = detail, "Progress could not be saved");
                    }
                }
            }
            DispatchEvent::Cancelled { index } => {
                tracing::warn!(index, "Shutdown requested, stopping");
            }
            DispatchEvent::Finished(summary) if summary.is_success() => {
                tracing::info!("{summary}");
            }
            DispatchEvent::Finished(summary) => {
                tracing::error!("{summary}");
            }
        }
    }
}
