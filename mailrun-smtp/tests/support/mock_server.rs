//! Scriptable SMTP relay for transport tests.
#![allow(dead_code)] // Not every test uses every knob.
//!
//! The relay accepts any number of sessions, records every command it
//! receives, and can be told to reject authentication or a recipient, or to
//! drop the session on a given message.

use std::{
    fmt::Write,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::RwLock,
    time::timeout,
};

/// A command as the relay saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    Ehlo(String),
    /// Everything after `AUTH`.
    Auth(String),
    /// A continuation line during AUTH LOGIN.
    AuthLine(String),
    MailFrom(String),
    RcptTo(String),
    Data,
    MessageContent(String),
    Rset,
    Quit,
    StartTls,
    Other(String),
}

#[derive(Debug, Clone)]
pub struct SmtpResponse {
    pub code: u16,
    pub message: String,
}

impl SmtpResponse {
    fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        format!("{} {}\r\n", self.code, self.message).into_bytes()
    }
}

#[derive(Clone)]
struct MockServerConfig {
    greeting: SmtpResponse,
    capabilities: Vec<String>,
    auth_response: SmtpResponse,
    mail_from_response: SmtpResponse,
    rcpt_to_response: SmtpResponse,
    rejected_recipient: Option<(String, SmtpResponse)>,
    data_end_response: SmtpResponse,
    quit_response: SmtpResponse,

    /// Close the socket instead of answering the Nth DATA (1-based, counted
    /// across all sessions).
    drop_on_message: Option<usize>,
    /// Answer the Nth DATA with 421 and close.
    shutdown_on_message: Option<usize>,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            greeting: SmtpResponse::new(220, "Mock SMTP Relay"),
            capabilities: vec![
                "localhost".to_string(),
                "SIZE 10000".to_string(),
                "AUTH PLAIN LOGIN".to_string(),
            ],
            auth_response: SmtpResponse::new(235, "Authentication successful"),
            mail_from_response: SmtpResponse::new(250, "OK"),
            rcpt_to_response: SmtpResponse::new(250, "OK"),
            rejected_recipient: None,
            data_end_response: SmtpResponse::new(250, "OK: Message accepted"),
            quit_response: SmtpResponse::new(221, "Bye"),
            drop_on_message: None,
            shutdown_on_message: None,
        }
    }
}

fn ehlo_bytes(capabilities: &[String]) -> Vec<u8> {
    let mut response = String::new();
    let last = capabilities.len().saturating_sub(1);

    for (i, cap) in capabilities.iter().enumerate() {
        let separator = if i < last { '-' } else { ' ' };
        let _ = write!(&mut response, "250{separator}{cap}\r\n");
    }

    response.into_bytes()
}

#[derive(Default)]
struct Counters {
    commands: RwLock<Vec<SmtpCommand>>,
    sessions: AtomicUsize,
    messages: AtomicUsize,
}

pub struct MockSmtpServer {
    addr: SocketAddr,
    counters: Arc<Counters>,
    shutdown: Arc<AtomicBool>,
}

impl MockSmtpServer {
    #[must_use]
    pub fn builder() -> MockSmtpServerBuilder {
        MockSmtpServerBuilder::new()
    }

    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub async fn commands(&self) -> Vec<SmtpCommand> {
        self.counters.commands.read().await.clone()
    }

    /// Bodies of every message that was accepted or rejected after DATA.
    pub async fn messages(&self) -> Vec<String> {
        self.commands()
            .await
            .into_iter()
            .filter_map(|command| match command {
                SmtpCommand::MessageContent(content) => Some(content),
                _ => None,
            })
            .collect()
    }

    /// Number of sessions accepted so far.
    #[must_use]
    pub fn sessions(&self) -> usize {
        self.counters.sessions.load(Ordering::Relaxed)
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    async fn handle_client(
        mut stream: TcpStream,
        config: Arc<MockServerConfig>,
        counters: Arc<Counters>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (reader, mut writer) = stream.split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        writer.write_all(&config.greeting.to_bytes()).await?;
        writer.flush().await?;

        loop {
            line.clear();

            let Ok(read) = timeout(Duration::from_secs(10), reader.read_line(&mut line)).await
            else {
                return Ok(());
            };
            if read? == 0 {
                return Ok(());
            }

            let cmd_line = line.trim_end().to_string();
            let (verb, rest) = cmd_line
                .split_once(' ')
                .map_or((cmd_line.as_str(), ""), |(verb, rest)| (verb, rest));
            let verb = verb.to_ascii_uppercase();

            let (response, command) = match verb.as_str() {
                "EHLO" => (
                    ehlo_bytes(&config.capabilities),
                    SmtpCommand::Ehlo(rest.to_string()),
                ),
                "AUTH" if rest.eq_ignore_ascii_case("LOGIN") => {
                    counters
                        .commands
                        .write()
                        .await
                        .push(SmtpCommand::Auth(rest.to_string()));

                    for prompt in ["VXNlcm5hbWU6", "UGFzc3dvcmQ6"] {
                        writer
                            .write_all(&SmtpResponse::new(334, prompt).to_bytes())
                            .await?;
                        writer.flush().await?;

                        line.clear();
                        if reader.read_line(&mut line).await? == 0 {
                            return Ok(());
                        }
                        counters
                            .commands
                            .write()
                            .await
                            .push(SmtpCommand::AuthLine(line.trim_end().to_string()));
                    }

                    writer.write_all(&config.auth_response.to_bytes()).await?;
                    writer.flush().await?;
                    continue;
                }
                "AUTH" => (
                    config.auth_response.to_bytes(),
                    SmtpCommand::Auth(rest.to_string()),
                ),
                "MAIL" => (
                    config.mail_from_response.to_bytes(),
                    SmtpCommand::MailFrom(rest.to_string()),
                ),
                "RCPT" => {
                    let response = match &config.rejected_recipient {
                        Some((address, response)) if rest.contains(address.as_str()) => {
                            response.to_bytes()
                        }
                        _ => config.rcpt_to_response.to_bytes(),
                    };
                    (response, SmtpCommand::RcptTo(rest.to_string()))
                }
                "DATA" => {
                    counters.commands.write().await.push(SmtpCommand::Data);
                    let n = counters.messages.fetch_add(1, Ordering::Relaxed) + 1;

                    if config.drop_on_message == Some(n) {
                        return Ok(());
                    }
                    if config.shutdown_on_message == Some(n) {
                        writer
                            .write_all(
                                &SmtpResponse::new(421, "Service closing transmission channel")
                                    .to_bytes(),
                            )
                            .await?;
                        writer.flush().await?;
                        return Ok(());
                    }

                    writer
                        .write_all(
                            &SmtpResponse::new(354, "Start mail input; end with <CRLF>.<CRLF>")
                                .to_bytes(),
                        )
                        .await?;
                    writer.flush().await?;

                    let mut content = String::new();
                    loop {
                        line.clear();
                        if reader.read_line(&mut line).await? == 0 {
                            return Ok(());
                        }
                        if line.trim_end() == "." {
                            break;
                        }
                        content.push_str(&line);
                    }

                    counters
                        .commands
                        .write()
                        .await
                        .push(SmtpCommand::MessageContent(content));
                    writer.write_all(&config.data_end_response.to_bytes()).await?;
                    writer.flush().await?;
                    continue;
                }
                "RSET" => (SmtpResponse::new(250, "OK").to_bytes(), SmtpCommand::Rset),
                "QUIT" => {
                    counters.commands.write().await.push(SmtpCommand::Quit);
                    writer.write_all(&config.quit_response.to_bytes()).await?;
                    writer.flush().await?;
                    return Ok(());
                }
                "STARTTLS" => (
                    SmtpResponse::new(502, "Command not implemented").to_bytes(),
                    SmtpCommand::StartTls,
                ),
                _ => (
                    SmtpResponse::new(500, "Unknown command").to_bytes(),
                    SmtpCommand::Other(cmd_line.clone()),
                ),
            };

            counters.commands.write().await.push(command);
            writer.write_all(&response).await?;
            writer.flush().await?;
        }
    }
}

pub struct MockSmtpServerBuilder {
    config: MockServerConfig,
}

impl MockSmtpServerBuilder {
    fn new() -> Self {
        Self {
            config: MockServerConfig::default(),
        }
    }

    #[must_use]
    pub fn with_greeting(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.greeting = SmtpResponse::new(code, message);
        self
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: &[&str]) -> Self {
        self.config.capabilities = std::iter::once("localhost")
            .chain(capabilities.iter().copied())
            .map(ToString::to_string)
            .collect();
        self
    }

    #[must_use]
    pub fn with_auth_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.auth_response = SmtpResponse::new(code, message);
        self
    }

    #[must_use]
    pub fn with_mail_from_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.mail_from_response = SmtpResponse::new(code, message);
        self
    }

    /// Reject RCPT TO for one address only.
    #[must_use]
    pub fn rejecting_recipient(
        mut self,
        address: impl Into<String>,
        code: u16,
        message: impl Into<String>,
    ) -> Self {
        self.config.rejected_recipient = Some((address.into(), SmtpResponse::new(code, message)));
        self
    }

    #[must_use]
    pub fn with_data_end_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.data_end_response = SmtpResponse::new(code, message);
        self
    }

    #[must_use]
    pub const fn dropping_on_message(mut self, n: usize) -> Self {
        self.config.drop_on_message = Some(n);
        self
    }

    #[must_use]
    pub const fn closing_with_421_on_message(mut self, n: usize) -> Self {
        self.config.shutdown_on_message = Some(n);
        self
    }

    /// Bind to an ephemeral port and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot bind.
    pub async fn build(self) -> Result<MockSmtpServer, std::io::Error> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let config = Arc::new(self.config);
        let counters = Arc::new(Counters::default());
        let shutdown = Arc::new(AtomicBool::new(false));

        let task_counters = Arc::clone(&counters);
        let task_shutdown = Arc::clone(&shutdown);

        tokio::spawn(async move {
            while !task_shutdown.load(Ordering::Relaxed) {
                let accepted = timeout(Duration::from_millis(100), listener.accept()).await;

                if let Ok(Ok((stream, _peer))) = accepted {
                    task_counters.sessions.fetch_add(1, Ordering::Relaxed);
                    let config = Arc::clone(&config);
                    let counters = Arc::clone(&task_counters);

                    tokio::spawn(async move {
                        if let Err(e) = MockSmtpServer::handle_client(stream, config, counters).await
                        {
                            tracing::debug!("Mock relay client error: {e}");
                        }
                    });
                }
            }
        });

        Ok(MockSmtpServer {
            addr,
            counters,
            shutdown,
        })
    }
}
