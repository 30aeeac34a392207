pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod outcome;

pub use config::DispatchConfig;
pub use engine::{Campaign, DispatchEngine};
pub use error::{DispatchError, DispatchErrorKind};
pub use events::{DispatchEvent, EventSink, TracingSink};
pub use outcome::{AbortReason, DispatchOutcome, RunEnd, RunSummary};
