//! Syntactic recipient address filter.
//!
//! This is not RFC 5321 parsing. It accepts the conventional
//! `local-part@domain.tld` shape and rejects anything a relay would obviously
//! refuse, so that bad rows are skipped before they cost a session slot.
//!
//! ```text
//! address     = local-part "@" domain
//! local-part  = atom *("." atom)
//! domain      = label 1*("." label)
//! label       = let-dig [*(let-dig / "-") let-dig]
//! ```
//!
//! No existence check or network lookup is made.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AddressError>;

const MAX_LOCAL_PART: usize = 64;
const MAX_DOMAIN: usize = 255;

/// Why an address was refused. Logged when a recipient is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,
    #[error("address has non-ASCII characters")]
    NonAscii,
    #[error("address has whitespace or control characters")]
    Whitespace,
    #[error("address needs exactly one '@'")]
    AtSign,
    #[error("local part is longer than {MAX_LOCAL_PART} octets")]
    LocalPartTooLong,
    #[error("domain is longer than {MAX_DOMAIN} octets")]
    DomainTooLong,
    #[error("bad local part: {0}")]
    InvalidLocalPart(String),
    #[error("bad domain: {0}")]
    InvalidDomain(String),
}

/// Returns `true` if `address` is present and well-formed.
pub fn is_valid(address: Option<&str>) -> bool {
    address.is_some_and(|address| validate(address).is_ok())
}

/// Check an address, returning the reason it was rejected.
///
/// # Errors
///
/// Returns `AddressError` describing the first problem found.
pub fn validate(address: &str) -> Result<()> {
    if address.is_empty() {
        return Err(AddressError::Empty);
    }

    if !address.is_ascii() {
        return Err(AddressError::NonAscii);
    }

    if address
        .chars()
        .any(|ch| ch.is_ascii_whitespace() || ch.is_ascii_control())
    {
        return Err(AddressError::Whitespace);
    }

    let Some((local_part, domain)) = address.split_once('@') else {
        return Err(AddressError::AtSign);
    };

    if domain.contains('@') {
        return Err(AddressError::AtSign);
    }

    if local_part.len() > MAX_LOCAL_PART {
        return Err(AddressError::LocalPartTooLong);
    }
    if domain.len() > MAX_DOMAIN {
        return Err(AddressError::DomainTooLong);
    }

    validate_local_part(local_part)?;
    validate_domain(domain)
}

fn validate_local_part(input: &str) -> Result<()> {
    if input.is_empty() {
        return Err(AddressError::InvalidLocalPart(
            "Empty local-part".to_string(),
        ));
    }

    if input.starts_with('.') || input.ends_with('.') {
        return Err(AddressError::InvalidLocalPart(
            "Local-part cannot start or end with '.'".to_string(),
        ));
    }

    if input.contains("..") {
        return Err(AddressError::InvalidLocalPart(
            "Local-part cannot contain consecutive dots".to_string(),
        ));
    }

    if let Some(ch) = input.chars().find(|&ch| ch != '.' && !is_atext(ch)) {
        return Err(AddressError::InvalidLocalPart(format!(
            "Invalid character '{ch}' in local-part"
        )));
    }

    Ok(())
}

fn validate_domain(input: &str) -> Result<()> {
    if input.is_empty() {
        return Err(AddressError::InvalidDomain("Empty domain".to_string()));
    }

    if !input.contains('.') {
        return Err(AddressError::InvalidDomain(format!(
            "'{input}' has no top-level domain"
        )));
    }

    let labels: Vec<&str> = input.split('.').collect();
    for label in &labels {
        if label.is_empty() {
            return Err(AddressError::InvalidDomain(format!(
                "'{input}' contains an empty label"
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(AddressError::InvalidDomain(format!(
                "Label '{label}' cannot start or end with '-'"
            )));
        }

        if let Some(ch) = label
            .chars()
            .find(|&ch| !ch.is_ascii_alphanumeric() && ch != '-')
        {
            return Err(AddressError::InvalidDomain(format!(
                "Invalid character '{ch}' in domain"
            )));
        }
    }

    if labels.last().is_some_and(|tld| tld.len() < 2) {
        return Err(AddressError::InvalidDomain(format!(
            "'{input}' has a single-character top-level domain"
        )));
    }

    Ok(())
}

/// atext per RFC 5322
const fn is_atext(ch: char) -> bool {
    matches!(ch,
        'a'..='z' | 'A'..='Z' | '0'..='9' |
        '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '-' | '/' |
        '=' | '?' | '^' | '_' | '`' | '{' | '|' | '}' | '~'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_conventional_addresses() {
        assert!(is_valid(Some("a@b.co")));
        assert!(is_valid(Some("first.last@example.com")));
        assert!(is_valid(Some("user+tag@mail.example.org")));
        assert!(is_valid(Some("o'brien@sub-domain.example.ie")));
    }

    #[test]
    fn test_rejects_missing_or_empty() {
        assert!(!is_valid(None));
        assert!(!is_valid(Some("")));
        assert_eq!(validate(""), Err(AddressError::Empty));
    }

    #[test]
    fn test_rejects_without_at_sign() {
        assert!(!is_valid(Some("not-an-email")));
        assert_eq!(validate("not-an-email"), Err(AddressError::AtSign));
        assert_eq!(validate("a@b@c.com"), Err(AddressError::AtSign));
    }

    #[test]
    fn test_rejects_whitespace() {
        assert_eq!(validate("ana maria@example.com"), Err(AddressError::Whitespace));
        assert_eq!(validate(" ana@example.com"), Err(AddressError::Whitespace));
        assert_eq!(validate("ana@example.com\n"), Err(AddressError::Whitespace));
    }

    #[test]
    fn test_rejects_non_ascii() {
        assert_eq!(validate("josé@example.com"), Err(AddressError::NonAscii));
    }

    #[test]
    fn test_domain_requires_dot() {
        assert!(matches!(
            validate("user@localhost"),
            Err(AddressError::InvalidDomain(_))
        ));
        assert!(matches!(
            validate("user@example."),
            Err(AddressError::InvalidDomain(_))
        ));
        assert!(matches!(
            validate("user@.example.com"),
            Err(AddressError::InvalidDomain(_))
        ));
        assert!(matches!(
            validate("user@example.c"),
            Err(AddressError::InvalidDomain(_))
        ));
    }

    #[test]
    fn test_domain_hyphen_rules() {
        assert!(validate("user@my-host.example.com").is_ok());
        assert!(matches!(
            validate("user@-host.example.com"),
            Err(AddressError::InvalidDomain(_))
        ));
    }

    #[test]
    fn test_local_part_dots() {
        assert!(matches!(
            validate(".user@example.com"),
            Err(AddressError::InvalidLocalPart(_))
        ));
        assert!(matches!(
            validate("us..er@example.com"),
            Err(AddressError::InvalidLocalPart(_))
        ));
        assert!(matches!(
            validate("@example.com"),
            Err(AddressError::InvalidLocalPart(_))
        ));
    }

    #[test]
    fn test_length_limits() {
        let local = "a".repeat(65);
        assert_eq!(
            validate(&format!("{local}@example.com")),
            Err(AddressError::LocalPartTooLong)
        );
    }
}
