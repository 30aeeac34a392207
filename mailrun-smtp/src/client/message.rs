//! Message construction for a single dispatch.

use std::{fmt::Write, path::Path};

use super::error::{ClientError, Result};

/// Body content type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BodyKind {
    #[default]
    Html,
    Plain,
}

impl BodyKind {
    /// Plain text for `.txt` templates, HTML for anything else.
    #[must_use]
    pub fn for_template(path: &Path) -> Self {
        match path.extension() {
            Some(ext) if ext.eq_ignore_ascii_case("txt") => Self::Plain,
            _ => Self::Html,
        }
    }

    const fn content_type(self) -> &'static str {
        match self {
            Self::Html => "text/html; charset=utf-8",
            Self::Plain => "text/plain; charset=utf-8",
        }
    }
}

/// Builds an RFC 5322 message ready to be sent after `DATA`.
///
/// # Examples
///
/// ```
/// use mailrun_smtp::client::MessageBuilder;
///
/// let message = MessageBuilder::new()
///     .from("news@example.com")
///     .to("ana@example.com")
///     .subject("Hello")
///     .body("<p>Hi Ana</p>")
///     .build()
///     .unwrap();
///
/// assert!(message.contains("Subject: Hello\r\n"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: Option<String>,
    to: Option<String>,
    subject: Option<String>,
    body: Option<String>,
    kind: BodyKind,
}

impl MessageBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from(mut self, email: impl Into<String>) -> Self {
        self.from = Some(email.into());
        self
    }

    #[must_use]
    pub fn to(mut self, email: impl Into<String>) -> Self {
        self.to = Some(email.into());
        self
    }

    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    #[must_use]
    pub fn body(mut self, content: impl Into<String>) -> Self {
        self.body = Some(content.into());
        self
    }

    #[must_use]
    pub const fn kind(mut self, kind: BodyKind) -> Self {
        self.kind = kind;
        self
    }

    /// Render headers and body with CRLF line endings.
    ///
    /// The result is not dot-stuffed; see [`dot_stuff`].
    ///
    /// # Errors
    ///
    /// Returns an error if the sender or recipient is missing, or a header
    /// value contains a line break.
    pub fn build(self) -> Result<String> {
        let from = self
            .from
            .ok_or_else(|| ClientError::BuilderError("Missing From address".to_string()))?;
        let to = self
            .to
            .ok_or_else(|| ClientError::BuilderError("Missing To address".to_string()))?;
        let subject = self.subject.unwrap_or_default();

        for (name, value) in [("From", &from), ("To", &to), ("Subject", &subject)] {
            if value.contains(['\r', '\n']) {
                return Err(ClientError::BuilderError(format!(
                    "{name} header contains a line break"
                )));
            }
        }

        let domain = from.rsplit_once('@').map_or("localhost", |(_, d)| d);
        let body = self.body.unwrap_or_default();
        let mut message = String::with_capacity(body.len() + 512);

        // Writing to a String cannot fail.
        let _ = write!(message, "From: {from}\r\n");
        let _ = write!(message, "To: {to}\r\n");
        let _ = write!(message, "Subject: {subject}\r\n");
        let _ = write!(message, "Date: {}\r\n", chrono::Utc::now().to_rfc2822());
        let _ = write!(message, "Message-ID: <{}@{domain}>\r\n", ulid::Ulid::new());
        let _ = write!(message, "MIME-Version: 1.0\r\n");
        let _ = write!(message, "Content-Type: {}\r\n", self.kind.content_type());
        let _ = write!(message, "Content-Transfer-Encoding: 8bit\r\n");
        message.push_str("\r\n");

        for line in body.lines() {
            message.push_str(line);
            message.push_str("\r\n");
        }

        Ok(message)
    }
}

/// Escape lines starting with `.` so the body cannot end the DATA phase early
/// (RFC 5321 section 4.5.2).
#[must_use]
pub fn dot_stuff(message: &str) -> String {
    let mut stuffed = String::with_capacity(message.len() + 16);
    for (i, line) in message.split("\r\n").enumerate() {
        if i > 0 {
            stuffed.push_str("\r\n");
        }
        if line.starts_with('.') {
            stuffed.push('.');
        }
        stuffed.push_str(line);
    }
    stuffed
}
