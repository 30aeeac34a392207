//! SMTP reply parsing.

use super::error::{ClientError, Result};

/// A complete SMTP reply, which may span several lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The SMTP status code.
    pub code: u16,
    /// Text of each line, without the code and separator.
    pub lines: Vec<String>,
}

/// One parsed reply line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Line<'a> {
    code: u16,
    is_last: bool,
    text: &'a str,
}

impl Response {
    #[must_use]
    pub const fn new(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// All lines joined by newlines.
    #[must_use]
    pub fn message(&self) -> String {
        self.lines.join("\n")
    }

    /// 2xx
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code >= 200 && self.code < 300
    }

    /// 3xx, e.g. `334` during AUTH or `354` after DATA.
    #[must_use]
    pub const fn is_intermediate(&self) -> bool {
        self.code >= 300 && self.code < 400
    }

    /// 4xx
    #[must_use]
    pub const fn is_temporary_error(&self) -> bool {
        self.code >= 400 && self.code < 500
    }

    /// 5xx
    #[must_use]
    pub const fn is_permanent_error(&self) -> bool {
        self.code >= 500 && self.code < 600
    }

    /// Turn a reply into an error unless `accept` holds.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SmtpError`] carrying the reply code and text.
    pub fn expect(self, accept: impl FnOnce(&Self) -> bool) -> Result<Self> {
        if accept(&self) {
            Ok(self)
        } else {
            Err(ClientError::SmtpError {
                code: self.code,
                message: self.message(),
            })
        }
    }

    /// Parse a complete reply from the front of `buffer`.
    ///
    /// Returns the reply and the number of bytes consumed, or `None` if the
    /// buffer does not yet hold a final line.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::ParseError` if the data is not an SMTP reply.
    pub fn parse(buffer: &[u8]) -> Result<Option<(Self, usize)>> {
        let mut consumed = 0;
        let mut code = None;
        let mut lines = Vec::new();

        while let Some(newline) = buffer[consumed..].iter().position(|&b| b == b'\n') {
            let raw = &buffer[consumed..consumed + newline];
            consumed += newline + 1;

            let raw = std::str::from_utf8(raw)?;
            let raw = raw.strip_suffix('\r').unwrap_or(raw);
            if raw.is_empty() {
                continue;
            }

            let line = parse_line(raw)?;
            match code {
                Some(expected) if expected != line.code => {
                    return Err(ClientError::ParseError(format!(
                        "Status code mismatch in multi-line response: expected {expected}, got {}",
                        line.code
                    )));
                }
                Some(_) => {}
                None => code = Some(line.code),
            }

            lines.push(line.text.to_string());

            if line.is_last {
                return Ok(code.map(|code| (Self::new(code, lines), consumed)));
            }
        }

        Ok(None)
    }
}

fn parse_line(line: &str) -> Result<Line<'_>> {
    let code_str = line
        .get(..3)
        .ok_or_else(|| ClientError::ParseError(format!("Response line too short: '{line}'")))?;

    let code = code_str
        .parse::<u16>()
        .map_err(|_| ClientError::ParseError(format!("Invalid status code: '{code_str}'")))?;

    let is_last = match line.as_bytes().get(3) {
        None | Some(b' ') => true,
        Some(b'-') => false,
        Some(&other) => {
            return Err(ClientError::ParseError(format!(
                "Invalid separator character: '{}'",
                char::from(other)
            )));
        }
    };

    Ok(Line {
        code,
        is_last,
        text: line.get(4..).unwrap_or_default(),
    })
}

/// Extensions advertised in an EHLO reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    keywords: Vec<String>,
    auth: Vec<String>,
}

impl Capabilities {
    /// Read capabilities from an EHLO reply. The first line is the greeting.
    #[must_use]
    pub fn from_ehlo(response: &Response) -> Self {
        let mut capabilities = Self::default();

        for line in response.lines.iter().skip(1) {
            let mut words = line.split_whitespace();
            let Some(keyword) = words.next() else {
                continue;
            };
            let keyword = keyword.to_ascii_uppercase();

            if keyword == "AUTH" || keyword.starts_with("AUTH=") {
                capabilities.auth.extend(
                    keyword
                        .strip_prefix("AUTH=")
                        .into_iter()
                        .map(ToString::to_string)
                        .chain(words.map(str::to_ascii_uppercase)),
                );
            }

            capabilities.keywords.push(keyword);
        }

        capabilities
    }

    #[must_use]
    pub fn supports(&self, keyword: &str) -> bool {
        self.keywords
            .iter()
            .any(|k| k.eq_ignore_ascii_case(keyword))
    }

    #[must_use]
    pub fn supports_auth(&self, mechanism: &str) -> bool {
        self.auth.iter().any(|m| m.eq_ignore_ascii_case(mechanism))
    }
}
