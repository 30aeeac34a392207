pub mod settings;
pub mod timeouts;

pub use settings::{SmtpSettings, TlsMode};
pub use timeouts::ClientTimeouts;
