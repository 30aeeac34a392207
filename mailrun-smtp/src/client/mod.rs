pub mod auth;
#[allow(clippy::module_inception)]
pub mod client;
pub mod error;
pub mod message;
pub mod response;
mod tls;

pub use auth::{Mechanism, authenticate};
pub use client::SmtpClient;
pub use error::{ClientError, Result};
pub use message::{BodyKind, MessageBuilder, dot_stuff};
pub use response::{Capabilities, Response};
