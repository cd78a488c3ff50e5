//! Cache key construction
//!
//! Builds the canonical string that addresses one external request in the
//! cache store. Parameter order never affects the key.

use std::collections::BTreeMap;
use std::fmt::Display;

/// Separator placed between the base address and each `key_value` pair
///
/// Not escaped: a key or value containing `_` can produce the same key as a
/// different split of the same characters.
pub const KEY_SEPARATOR: &str = "_";

/// Builds a deterministic cache key from a base address and its parameters
///
/// Each parameter is formatted as `key_value`, the formatted pairs are sorted
/// lexicographically and joined with [`KEY_SEPARATOR`], and the result is
/// prefixed with `base` and the separator.
///
/// # Example
///
/// ```
/// use cafescout::cache::construct_key;
///
/// let a = construct_key("https://api.example.com/search", [("term", "coffee"), ("location", "Ann Arbor")]);
/// let b = construct_key("https://api.example.com/search", [("location", "Ann Arbor"), ("term", "coffee")]);
/// assert_eq!(a, b);
/// assert_eq!(a, "https://api.example.com/search_location_Ann Arbor_term_coffee");
/// ```
pub fn construct_key<I, K, V>(base: &str, params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: Display,
    V: Display,
{
    let mut pairs: Vec<String> = params
        .into_iter()
        .map(|(key, value)| format!("{}{}{}", key, KEY_SEPARATOR, value))
        .collect();
    pairs.sort();

    format!("{}{}{}", base, KEY_SEPARATOR, pairs.join(KEY_SEPARATOR))
}

/// One external call: a base address plus its query parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// Endpoint address without a query string
    pub base: String,
    /// Query parameters sent with the request
    pub params: BTreeMap<String, String>,
}

impl RequestDescriptor {
    /// Creates a descriptor with no parameters
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            params: BTreeMap::new(),
        }
    }

    /// Adds a query parameter, replacing any previous value for `key`
    pub fn param(mut self, key: impl Into<String>, value: impl Display) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    /// Returns the cache key addressing this request
    pub fn cache_key(&self) -> String {
        construct_key(&self.base, &self.params)
    }
}
