//! Tabular recipient source.
//!
//! Reads a CSV file with a header row. The `email` column is required and
//! `names` is optional; any other columns are ignored. Rows keep file order,
//! and each row's data position becomes its [`Recipient::index`].
//!
//! Files that are not valid UTF-8 are read as Windows-1252, the encoding
//! spreadsheet exports usually fall back to.

use std::{borrow::Cow, fs::File, io::Read, path::Path};

use encoding_rs::WINDOWS_1252;

use crate::{
    error::SourceError,
    internal,
    recipient::{Recipient, RecipientList},
};

/// Column holding the recipient address.
pub const EMAIL_COLUMN: &str = "email";

/// Column holding the recipient display name.
pub const NAMES_COLUMN: &str = "names";

/// Load recipients from a CSV file.
///
/// # Errors
///
/// Returns [`SourceError::Unreadable`] if the file cannot be opened or a row
/// cannot be decoded, and [`SourceError::Malformed`] if the header has no
/// `email` column.
pub fn load(path: impl AsRef<Path>) -> Result<RecipientList, SourceError> {
    let path = path.as_ref();

    let mut content = Vec::new();
    File::open(path)
        .and_then(|mut file| file.read_to_end(&mut content))
        .map_err(|e| SourceError::unreadable(path, e))?;

    parse(content.as_slice()).map_err(|err| match err {
        SourceError::Unreadable { reason, .. } => SourceError::unreadable(path, reason),
        other => other,
    })
}

/// Parse recipients from any CSV reader.
///
/// The delimiter is `,` unless the header line uses `;` exclusively.
///
/// # Errors
///
/// See [`load`].
pub fn parse(mut reader: impl Read) -> Result<RecipientList, SourceError> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| SourceError::unreadable("<input>", e))?;

    let content = decode(&bytes);
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);

    let delimiter = match content.lines().next() {
        Some(header) if header.contains(';') && !header.contains(',') => b';',
        _ => b',',
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| SourceError::unreadable("<input>", format!("Failed to read headers: {e}")))?
        .clone();

    let column = |name: &str| {
        headers
            .iter()
            .position(|header| header.trim().eq_ignore_ascii_case(name))
    };

    let email_column = column(EMAIL_COLUMN).ok_or_else(|| {
        SourceError::Malformed(format!("missing required '{EMAIL_COLUMN}' column"))
    })?;
    let names_column = column(NAMES_COLUMN);

    let mut recipients = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| SourceError::unreadable("<input>", e))?;

        let cell = |column: usize| {
            record
                .get(column)
                .filter(|value| !value.is_empty())
                .map(ToString::to_string)
        };

        recipients.push(Recipient {
            index,
            address: cell(email_column),
            display_name: names_column.and_then(&cell),
        });
    }

    Ok(recipients.into())
}

/// UTF-8 when the bytes allow it, Windows-1252 otherwise.
fn decode(bytes: &[u8]) -> Cow<'_, str> {
    if let Ok(content) = std::str::from_utf8(bytes) {
        return Cow::Borrowed(content);
    }

    internal!(
        level = WARN,
        "Recipient list is not UTF-8, reading it as {}",
        WINDOWS_1252.name()
    );
    let (content, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
    content
}
