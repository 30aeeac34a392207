use std::{ops::Index, sync::Arc};

/// A single row of the recipient source.
///
/// `index` is the 0-based position in the source and is what the progress
/// checkpoint counts against, so it must stay stable across reads of the same
/// unmodified source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub index: usize,
    pub address: Option<String>,
    pub display_name: Option<String>,
}

impl Recipient {
    #[must_use]
    pub fn new(index: usize, address: impl Into<String>) -> Self {
        Self {
            index,
            address: Some(address.into()),
            display_name: None,
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// The address as written in the source, or an empty string.
    #[must_use]
    pub fn address_or_empty(&self) -> &str {
        self.address.as_deref().unwrap_or_default()
    }
}

/// Ordered, read-only view over the loaded recipients.
#[derive(Debug, Clone, Default)]
pub struct RecipientList {
    inner: Arc<[Recipient]>,
}

impl RecipientList {
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Recipient> {
        self.inner.get(index)
    }

    /// Recipients from `offset` to the end; empty if `offset` is past the end.
    #[must_use]
    pub fn slice_from(&self, offset: usize) -> &[Recipient] {
        self.inner.get(offset..).unwrap_or_default()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Recipient> {
        self.inner.iter()
    }
}

impl Index<usize> for RecipientList {
    type Output = Recipient;

    fn index(&self, index: usize) -> &Self::Output {
        &self.inner[index]
    }
}

/// Builds a list from addresses, numbering them in order.
impl<S: Into<String>> FromIterator<S> for RecipientList {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        iter.into_iter()
            .enumerate()
            .map(|(index, address)| Recipient::new(index, address))
            .collect::<Vec<_>>()
            .into()
    }
}

impl From<Vec<Recipient>> for RecipientList {
    fn from(recipients: Vec<Recipient>) -> Self {
        Self {
            inner: recipients.into(),
        }
    }
}

impl<'a> IntoIterator for &'a RecipientList {
    type Item = &'a Recipient;
    type IntoIter = std::slice::Iter<'a, Recipient>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
