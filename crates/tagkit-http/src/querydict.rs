//! Query string dictionary for request parameters.
//!
//! [`QueryDict`] keeps every value given for a key and remembers the order
//! in which keys first appeared, so re-encoding a parsed query string keeps
//! the author's parameter order.

use indexmap::IndexMap;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use tagkit_core::{TagkitError, TagkitResult};

/// Characters left unescaped in encoded query components.
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// An immutable-by-default, insertion-ordered multi-value dictionary.
///
/// [`copy`](QueryDict::copy) returns a mutable clone.
///
/// ```
/// use tagkit_http::QueryDict;
///
/// let qd = QueryDict::parse("color=red&color=blue&size=large");
/// assert_eq!(qd.get("color"), Some("blue"));
/// assert_eq!(qd.get_list("color"), Some(&["red".to_string(), "blue".to_string()][..]));
///
/// let mut mutable = qd.copy();
/// mutable.set("color", "green").unwrap();
/// assert_eq!(mutable.urlencode(), "color=green&size=large");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryDict {
    data: IndexMap<String, Vec<String>>,
    mutable: bool,
}

impl QueryDict {
    /// Creates a new, empty, immutable `QueryDict`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new, empty, mutable `QueryDict`.
    pub fn new_mutable() -> Self {
        Self {
            data: IndexMap::new(),
            mutable: true,
        }
    }

    /// Parses a URL query string (without the leading `?`) into an
    /// immutable `QueryDict`. `+` decodes to a space.
    pub fn parse(query_string: &str) -> Self {
        let mut data: IndexMap<String, Vec<String>> = IndexMap::new();
        for pair in query_string.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            data.entry(percent_decode(key))
                .or_default()
                .push(percent_decode(value));
        }
        Self {
            data,
            mutable: false,
        }
    }

    /// Returns the last value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data
            .get(key)
            .and_then(|values| values.last())
            .map(String::as_str)
    }

    /// Returns every value for `key`, in the order they were added.
    pub fn get_list(&self, key: &str) -> Option<&[String]> {
        self.data.get(key).map(Vec::as_slice)
    }

    /// Replaces all values for `key` with `value`.
    ///
    /// An existing key keeps its position; a new key goes last.
    pub fn set(&mut self, key: &str, value: &str) -> TagkitResult<()> {
        self.ensure_mutable()?;
        self.data.insert(key.to_string(), vec![value.to_string()]);
        Ok(())
    }

    /// Appends `value` to the values for `key`.
    pub fn append(&mut self, key: &str, value: &str) -> TagkitResult<()> {
        self.ensure_mutable()?;
        self.data
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
        Ok(())
    }

    /// Removes `key` and returns its values.
    pub fn remove(&mut self, key: &str) -> TagkitResult<Option<Vec<String>>> {
        self.ensure_mutable()?;
        Ok(self.data.shift_remove(key))
    }

    /// Returns a mutable copy of this `QueryDict`.
    #[must_use]
    pub fn copy(&self) -> Self {
        Self {
            data: self.data.clone(),
            mutable: true,
        }
    }

    /// Encodes every key/value pair in insertion order.
    pub fn urlencode(&self) -> String {
        self.data
            .iter()
            .flat_map(|(key, values)| {
                values
                    .iter()
                    .map(move |value| format!("{}={}", encode_component(key), encode_component(value)))
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Iterates over keys and their last value, in insertion order.
    pub fn items(&self) -> impl Iterator<Item = (&str, &str)> {
        self.data.iter().filter_map(|(key, values)| {
            values.last().map(|value| (key.as_str(), value.as_str()))
        })
    }

    /// Returns the keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// Returns `true` if this `QueryDict` is mutable.
    pub const fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// Returns the number of distinct keys.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if there are no keys.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    fn ensure_mutable(&self) -> TagkitResult<()> {
        if self.mutable {
            Ok(())
        } else {
            Err(TagkitError::SuspiciousOperation(
                "This QueryDict instance is immutable".to_string(),
            ))
        }
    }
}

/// Percent-encodes one query key or value.
pub fn encode_component(input: &str) -> String {
    percent_encoding::utf8_percent_encode(input, QUERY_COMPONENT).to_string()
}

fn percent_decode(input: &str) -> String {
    let plus_decoded = input.replace('+', " ");
    percent_encoding::percent_decode_str(&plus_decoded)
        .decode_utf8_lossy()
        .into_owned()
}
