#![allow(dead_code)]

#[path = "../../../mailrun-smtp/tests/support/mock_server.rs"]
pub mod mock_server;

use std::path::Path;

use mailrun::{Config, Controller};
use mailrun_common::config::{SmtpSettings, TlsMode};
use tempfile::TempDir;

pub use mock_server::{MockSmtpServer, SmtpCommand};

pub const RECIPIENTS: &str = "\
email,names
ana@example.com,Ana
not-an-address,Bruno
carl@example.com,
dana@example.com,Dana
";

pub const TEMPLATE: &str = "Hello {{names}}, this went to {{email}}.";

/// A working directory holding a recipient list, a template and the
/// checkpoint and lock paths.
pub struct Workspace {
    pub dir: TempDir,
    pub config: Config,
}

impl Workspace {
    pub fn new() -> Self {
        Self::with_recipients(RECIPIENTS)
    }

    pub fn with_recipients(csv: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let recipients = dir.path().join("recipients.csv");
        let template = dir.path().join("template.html");
        std::fs::write(&recipients, csv).unwrap();
        std::fs::write(&template, TEMPLATE).unwrap();

        let mut config = Config {
            recipients,
            template,
            subject: "Autumn news".to_string(),
            progress: dir.path().join("progress").join("progress.txt"),
            lock: dir.path().join("progress").join("mailrun.lock"),
            ..Config::default()
        };
        config.dispatch.delay_secs = 0;

        Self { dir, config }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn progress(&self) -> Option<String> {
        std::fs::read_to_string(&self.config.progress).ok()
    }

    pub fn controller(&self, server: &MockSmtpServer) -> Controller {
        Controller::new(self.config.clone()).with_settings(settings(server.port()))
    }
}

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
