//! Cache Key Module
//!
//! Builds canonical keys of the form `namespace:identifier[:k1=v1&k2=v2]`.
//! Parameters are sorted by name so equivalent filter sets map to one key.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

/// Separates namespace, identifier and parameter suffix.
pub const KEY_SEPARATOR: char = ':';

// == Cache Key ==
/// A deterministic cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Returns the key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the namespace segment (text before the first separator).
    pub fn namespace(&self) -> &str {
        namespace_of(&self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CacheKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

/// Returns the namespace segment of a raw key.
pub fn namespace_of(key: &str) -> &str {
    key.split(KEY_SEPARATOR).next().unwrap_or(key)
}

// == Key Builder ==
/// Stateless builder for [`CacheKey`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyBuilder;

impl KeyBuilder {
    /// Builds `namespace:identifier` with no parameter suffix.
    pub fn plain(namespace: &str, identifier: &str) -> CacheKey {
        CacheKey(format!("{namespace}{KEY_SEPARATOR}{identifier}"))
    }

    /// Builds a key from a namespace, an identifier and a flat parameter set.
    ///
    /// Parameters are ordered by name before they are joined, so insertion
    /// order never changes the key. An empty parameter set omits the suffix.
    /// If a name repeats, the last value wins.
    pub fn build<I, K, V>(namespace: &str, identifier: &str, params: I) -> CacheKey
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: fmt::Display,
    {
        let sorted: BTreeMap<String, String> = params
            .into_iter()
            .map(|(name, value)| (name.into(), value.to_string()))
            .collect();

        let mut key = Self::plain(namespace, identifier);
        if sorted.is_empty() {
            return key;
        }

        let suffix = sorted
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        key.0.push(KEY_SEPARATOR);
        key.0.push_str(&suffix);
        key
    }

    /// Builds a key from a JSON filter object.
    ///
    /// String values are used verbatim, every other value uses its JSON text.
    /// Anything other than an object contributes no parameters.
    pub fn build_json(namespace: &str, identifier: &str, filters: &Value) -> CacheKey {
        match filters {
            Value::Object(map) => Self::build(
                namespace,
                identifier,
                map.iter().map(|(name, value)| (name.as_str(), JsonParam(value))),
            ),
            _ => Self::plain(namespace, identifier),
        }
    }
}

/// Display adapter that prints JSON strings without quotes.
struct JsonParam<'a>(&'a Value);

impl fmt::Display for JsonParam<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_key() {
        let key = KeyBuilder::plain("progress", "child-1");
        assert_eq!(key.as_str(), "progress:child-1");
        assert_eq!(key.namespace(), "progress");
    }

    #[test]
    fn test_params_are_sorted() {
        let a = KeyBuilder::build("activities", "list", [("a", 1), ("b", 2)]);
        let b = KeyBuilder::build("activities", "list", [("b", 2), ("a", 1)]);

        assert_eq!(a, b);
        assert_eq!(a.as_str(), "activities:list:a=1&b=2");
    }

    #[test]
    fn test_empty_params_omit_suffix() {
        let key = KeyBuilder::build("activities", "list", Vec::<(String, String)>::new());
        assert_eq!(key.as_str(), "activities:list");
    }

    #[test]
    fn test_duplicate_param_last_wins() {
        let key = KeyBuilder::build("activities", "list", [("limit", 10), ("limit", 20)]);
        assert_eq!(key.as_str(), "activities:list:limit=20");
    }

    #[test]
    fn test_build_json_object() {
        let filters = json!({"limit": 20, "childId": "c1", "active": true});
        let key = KeyBuilder::build_json("activities", "list", &filters);
        assert_eq!(key.as_str(), "activities:list:active=true&childId=c1&limit=20");
    }

    #[test]
    fn test_build_json_insertion_order_irrelevant() {
        let a = KeyBuilder::build_json("activities", "list", &json!({"childId": "c1", "limit": 20}));
        let b = KeyBuilder::build_json("activities", "list", &json!({"limit": 20, "childId": "c1"}));
        assert_eq!(a, b);
    }

    #[test]
    fn test_build_json_non_object() {
        let key = KeyBuilder::build_json("activities", "list", &Value::Null);
        assert_eq!(key.as_str(), "activities:list");

        let key = KeyBuilder::build_json("activities", "list", &json!({}));
        assert_eq!(key.as_str(), "activities:list");
    }

    #[test]
    fn test_namespace_of_raw_key() {
        assert_eq!(namespace_of("completions:c1:a1"), "completions");
        assert_eq!(namespace_of("bare"), "bare");
        assert_eq!(namespace_of(""), "");
    }
}
