pub mod address;
pub mod config;
pub mod error;
pub mod logging;
pub mod recipient;
pub mod source;
pub mod template;

pub use tracing;

pub use error::{ConfigError, SourceError};
pub use recipient::{Recipient, RecipientList};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
}
