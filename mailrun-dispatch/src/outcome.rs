use std::fmt;

/// What happened to one recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    /// The address failed validation; nothing was sent.
    SkippedInvalid,
    /// The relay did not take the message. The run moves on.
    FailedAbandoned,
    /// The checkpoint could not be saved. The run stops here.
    FailedFatal,
}

/// Why a run stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The first session could not be opened.
    Connect,
    /// A replacement session could not be opened after rotation.
    ReconnectExhausted,
    Persistence,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunEnd {
    #[default]
    Completed,
    /// The checkpoint was already at the end of the list.
    NothingToSend,
    Aborted(AbortReason),
    /// A shutdown signal was observed between recipients.
    Cancelled,
}

/// Counters and position at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub sent: usize,
    pub skipped: usize,
    /// Abandoned and fatal failures together.
    pub failed: usize,
    /// Checkpoint when the run started.
    pub start_index: usize,
    /// Checkpoint when the run ended.
    pub checkpoint: usize,
    /// Recipients in the list.
    pub total: usize,
    pub end: RunEnd,
}

impl RunSummary {
    #[must_use]
    pub fn new(start_index: usize, total: usize) -> Self {
        Self {
            start_index,
            checkpoint: start_index,
            total,
            ..Self::default()
        }
    }

    pub const fn record(&mut self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Sent => self.sent += 1,
            DispatchOutcome::SkippedInvalid => self.skipped += 1,
            DispatchOutcome::FailedAbandoned | DispatchOutcome::FailedFatal => self.failed += 1,
        }
    }

    /// Index of the last recipient whose outcome was persisted this run.
    #[must_use]
    pub const fn last_index_processed(&self) -> Option<usize> {
        if self.checkpoint > self.start_index {
            Some(self.checkpoint - 1)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.total.saturating_sub(self.checkpoint)
    }

    /// True when the run ended without an abort.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self.end, RunEnd::Aborted(_))
    }
}

impl fmt::Display for RunEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::NothingToSend => f.write_str("nothing to send"),
            Self::Aborted(AbortReason::Connect) => f.write_str("aborted: could not connect"),
            Self::Aborted(AbortReason::ReconnectExhausted) => {
                f.write_str("aborted: could not reconnect after rotation")
            }
            Self::Aborted(AbortReason::Persistence) => {
                f.write_str("aborted: progress could not be saved")
            }
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: sent {}, skipped {}, failed {}; progress {}/{}",
            self.end, self.sent, self.skipped, self.failed, self.checkpoint, self.total
        )?;
        if let Some(last) = self.last_index_processed() {
            write!(f, ", last processed #{last}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record() {
        let mut summary = RunSummary::new(2, 10);
        summary.record(DispatchOutcome::Sent);
        summary.record(DispatchOutcome::SkippedInvalid);
        summary.record(DispatchOutcome::FailedAbandoned);
        summary.record(DispatchOutcome::FailedFatal);

        assert_eq!(summary.sent, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 2);
    }

    #[test]
    fn test_last_index_processed() {
        let mut summary = RunSummary::new(4, 10);
        assert_eq!(summary.last_index_processed(), None);
        assert_eq!(summary.remaining(), 6);

        summary.checkpoint = 7;
        assert_eq!(summary.last_index_processed(), Some(6));
        assert_eq!(summary.remaining(), 3);
    }

    #[test]
    fn test_display() {
        let summary = RunSummary {
            sent: 3,
            skipped: 1,
            failed: 0,
            start_index: 0,
            checkpoint: 4,
            total: 4,
            end: RunEnd::Completed,
        };
        assert_eq!(
            summary.to_string(),
            "completed: sent 3, skipped 1, failed 0; progress 4/4, last processed #3"
        );
        assert!(summary.is_success());

        let aborted = RunSummary {
            end: RunEnd::Aborted(AbortReason::Persistence),
            ..summary
        };
        assert!(!aborted.is_success());
    }
}
