//! `{{placeholder}}` substitution for message bodies.

use crate::recipient::Recipient;

/// Placeholder filled from the recipient's display name.
pub const NAMES: &str = "names";

/// Placeholder filled from the recipient's address.
pub const EMAIL: &str = "email";

/// Display name used when a recipient has none.
pub const DEFAULT_FALLBACK_NAME: &str = "Amigo(a)";

/// Values available to a template, keyed by placeholder name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(Vec<(String, String)>);

impl Fields {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Set `key`, replacing any earlier value.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();

        match self.0.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((key, value)),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    /// Fields for one recipient. `names` falls back to `fallback_name` when
    /// the recipient has no display name.
    #[must_use]
    pub fn for_recipient(recipient: &Recipient, fallback_name: &str) -> Self {
        let mut fields = Self::new().with(
            NAMES,
            recipient.display_name.as_deref().unwrap_or(fallback_name),
        );

        if let Some(address) = &recipient.address {
            fields.insert(EMAIL, address.as_str());
        }

        fields
    }
}

/// Replace every `{{key}}` whose key is present in `fields`.
///
/// Unknown or unterminated placeholders are copied through untouched.
#[must_use]
pub fn render(template: &str, fields: &Fields) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            break;
        };

        let key = &after_open[..end];
        if !is_token(key) {
            // Not a placeholder; a later `{{` may still open one.
            output.push_str(&rest[..=start]);
            rest = &rest[start + 1..];
            continue;
        }

        output.push_str(&rest[..start]);
        match fields.get(key) {
            Some(value) => output.push_str(value),
            None => output.push_str(&rest[start..start + 2 + end + 2]),
        }

        rest = &after_open[end + 2..];
    }

    output.push_str(rest);
    output
}

fn is_token(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
}
