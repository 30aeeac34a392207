pub mod mock_server;

use mailrun_common::config::{ClientTimeouts, SmtpSettings, TlsMode};
use mailrun_smtp::SmtpTransport;

pub use mock_server::{MockSmtpServer, SmtpCommand};

/// Plain-TCP settings pointing at a local mock relay.
#[must_use]
pub fn settings(port: u16) -> SmtpSettings {
    SmtpSettings {
        host: "127.0.0.1".to_string(),
        port,
        user: "mailer".to_string(),
        password: "s3cret".to_string(),
        from: "news@example.com".to_string(),
        tls: TlsMode::None,
    }
}

#[must_use]
pub fn transport(server: &MockSmtpServer) -> SmtpTransport {
    SmtpTransport::new(settings(server.port()), ClientTimeouts::default()).hello_name("mailrun.test")
}
