pub mod client;
pub mod smtp_transport;
pub mod transport;

pub use smtp_transport::SmtpTransport;
pub use transport::{SessionTransport, TransportError};
