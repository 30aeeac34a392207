//! SMTP client connection with STARTTLS and implicit TLS support.

use mailrun_common::{incoming, outgoing};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use tokio_rustls::client::TlsStream;

use super::{
    error::{ClientError, Result},
    message::dot_stuff,
    response::{Capabilities, Response},
    tls,
};

/// Bytes requested from the socket per read.
const READ_CHUNK: usize = 4096;

/// Replies longer than this are treated as garbage.
const MAX_REPLY_BYTES: usize = 64 * 1024;

enum Channel {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Channel {
    async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        match self {
            Self::Plain(stream) => stream.write_all(bytes).await?,
            Self::Tls(stream) => stream.write_all(bytes).await?,
        }
        Ok(())
    }

    /// Read at least one byte; EOF is reported as a closed connection.
    async fn read_some(&mut self, chunk: &mut [u8]) -> Result<usize> {
        let read = match self {
            Self::Plain(stream) => stream.read(chunk).await?,
            Self::Tls(stream) => stream.read(chunk).await?,
        };
        if read == 0 {
            Err(ClientError::ConnectionClosed)
        } else {
            Ok(read)
        }
    }
}

/// A single connection to the relay.
///
/// The client does no timing or retrying of its own; callers bound each
/// call with `tokio::time::timeout`.
pub struct SmtpClient {
    channel: Option<Channel>,
    pending: Vec<u8>,
    server_domain: String,
    accept_invalid_certs: bool,
    capabilities: Capabilities,
}

impl SmtpClient {
    /// Open a plain TCP connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(addr: &str, server_domain: impl Into<String>) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::over(Channel::Plain(stream), server_domain.into(), false))
    }

    /// Open a connection that is TLS from the first byte (SMTPS).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or the TLS handshake fails.
    pub async fn connect_tls(
        addr: &str,
        server_domain: impl Into<String>,
        accept_invalid_certs: bool,
    ) -> Result<Self> {
        let server_domain = server_domain.into();
        let stream = TcpStream::connect(addr).await?;
        let stream = tls::handshake(stream, &server_domain, accept_invalid_certs).await?;
        Ok(Self::over(
            Channel::Tls(Box::new(stream)),
            server_domain,
            accept_invalid_certs,
        ))
    }

    fn over(channel: Channel, server_domain: String, accept_invalid_certs: bool) -> Self {
        Self {
            channel: Some(channel),
            pending: Vec::new(),
            server_domain,
            accept_invalid_certs,
            capabilities: Capabilities::default(),
        }
    }

    /// Skip certificate verification when upgrading with STARTTLS.
    #[must_use]
    pub const fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// `false` once the relay has closed the channel or a read or write
    /// has failed.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.channel.is_some()
    }

    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self.channel, Some(Channel::Tls(_)))
    }

    /// Extensions from the most recent EHLO.
    #[must_use]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Wait for the 220 banner.
    ///
    /// # Errors
    ///
    /// Fails if the read fails or the banner is not a 2xx reply.
    pub async fn read_greeting(&mut self) -> Result<Response> {
        self.read_response().await?.expect(Response::is_success)
    }

    /// Write one command line and wait for its reply. The reply code is not
    /// checked.
    ///
    /// # Errors
    ///
    /// Fails if the write or the read fails.
    pub async fn command(&mut self, command: &str) -> Result<Response> {
        self.command_logged(command, command).await
    }

    /// Like [`SmtpClient::command`], but logs `shown` in place of the
    /// command so credentials never reach the log.
    pub(crate) async fn command_logged(&mut self, command: &str, shown: &str) -> Result<Response> {
        outgoing!("{shown}");
        self.write(format!("{command}\r\n").as_bytes()).await?;
        self.read_response().await
    }

    /// Sends EHLO and records the advertised capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or is rejected.
    pub async fn ehlo(&mut self, domain: &str) -> Result<Response> {
        let response = self
            .command(&format!("EHLO {domain}"))
            .await?
            .expect(Response::is_success)?;
        self.capabilities = Capabilities::from_ehlo(&response);
        Ok(response)
    }

    /// Sends STARTTLS and upgrades the connection.
    ///
    /// Capabilities are cleared; the caller must send EHLO again.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay rejects STARTTLS or the handshake fails.
    pub async fn starttls(&mut self) -> Result<Response> {
        let response = self
            .command("STARTTLS")
            .await?
            .expect(Response::is_success)?;

        let stream = match self.channel.take() {
            Some(Channel::Plain(stream)) => stream,
            Some(tls @ Channel::Tls(_)) => {
                self.channel = Some(tls);
                return Err(ClientError::TlsError(
                    "STARTTLS on a channel that is already encrypted".to_string(),
                ));
            }
            None => return Err(ClientError::ConnectionClosed),
        };

        let upgraded = tls::handshake(stream, &self.server_domain, self.accept_invalid_certs).await?;
        self.channel = Some(Channel::Tls(Box::new(upgraded)));
        self.pending.clear();
        self.capabilities = Capabilities::default();

        Ok(response)
    }

    /// Sends MAIL FROM.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or is rejected.
    pub async fn mail_from(&mut self, from: &str) -> Result<Response> {
        self.command(&format!("MAIL FROM:<{from}>"))
            .await?
            .expect(Response::is_success)
    }

    /// Sends RCPT TO.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or is rejected.
    pub async fn rcpt_to(&mut self, to: &str) -> Result<Response> {
        self.command(&format!("RCPT TO:<{to}>"))
            .await?
            .expect(Response::is_success)
    }

    /// Sends DATA, expecting the 354 go-ahead.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or is rejected.
    pub async fn data(&mut self) -> Result<Response> {
        self.command("DATA").await?.expect(Response::is_intermediate)
    }

    /// Sends the dot-stuffed message followed by the end-of-data marker.
    ///
    /// # Errors
    ///
    /// Returns an error if sending fails or the relay rejects the message.
    pub async fn send_data(&mut self, message: &str) -> Result<Response> {
        outgoing!("<{} bytes of message data>", message.len());

        let mut payload = dot_stuff(message);
        if !payload.ends_with("\r\n") {
            payload.push_str("\r\n");
        }
        payload.push_str(".\r\n");

        self.write(payload.as_bytes()).await?;
        self.read_response().await?.expect(Response::is_success)
    }

    /// Sends RSET to abandon the current transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or is rejected.
    pub async fn rset(&mut self) -> Result<Response> {
        self.command("RSET").await?.expect(Response::is_success)
    }

    /// Sends QUIT and drops the connection regardless of the reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the command could not be sent or read.
    pub async fn quit(&mut self) -> Result<Response> {
        let response = self.command("QUIT").await;
        self.channel = None;
        response
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let channel = self.channel.as_mut().ok_or(ClientError::ConnectionClosed)?;

        let written = channel.write_all(bytes).await;
        if written.is_err() {
            self.channel = None;
        }
        written
    }

    /// Read until `pending` holds a complete reply, which may span several
    /// lines. Any bytes after it are kept for the next call.
    async fn read_response(&mut self) -> Result<Response> {
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if let Some((response, used)) = Response::parse(&self.pending)? {
                self.pending.drain(..used);
                incoming!("{} {}", response.code, response.message());

                // 421: the relay is shutting the channel down.
                if response.code == 421 {
                    self.channel = None;
                }
                return Ok(response);
            }

            if self.pending.len() > MAX_REPLY_BYTES {
                return Err(ClientError::ParseError(format!(
                    "Reply exceeds {MAX_REPLY_BYTES} bytes without terminating"
                )));
            }

            let channel = self.channel.as_mut().ok_or(ClientError::ConnectionClosed)?;
            match channel.read_some(&mut chunk).await {
                Ok(read) => self.pending.extend_from_slice(&chunk[..read]),
                Err(e) => {
                    self.channel = None;
                    return Err(e);
                }
            }
        }
    }
}
