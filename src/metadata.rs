//! Ordered string metadata attached to a capture.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered key/value metadata for exactly one capture.
///
/// Keys are unique and keep the position of their first insertion; values
/// may be absent. Absent values are kept (serialized as `null`) so the
/// metadata lines up with the fields of the captured payload.
///
/// # Examples
///
/// ```
/// use payload_capture::Metadata;
///
/// let mut meta = Metadata::new();
/// meta.add("name", Some("Alice"));
/// meta.add("trace", None::<String>);
/// meta.add("name", Some("Bob")); // replaces the value, keeps the position
///
/// let keys: Vec<&str> = meta.keys().collect();
/// assert_eq!(keys, vec!["name", "trace"]);
/// assert_eq!(meta.get("name"), Some(Some("Bob")));
/// assert_eq!(meta.get("trace"), Some(None));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata {
    entries: IndexMap<String, Option<String>>,
}

impl Metadata {
    /// Creates empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, replacing the value of an existing key in place.
    pub fn add<K, V>(&mut self, key: K, value: Option<V>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.entries.insert(key.into(), value.map(Into::into));
    }

    /// Builds metadata from pairs that all carry a value.
    ///
    /// Accepts any `(key, value)` source, such as a `Vec<(String, String)>`
    /// or a map. Order follows the iterator.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        pairs.into_iter().map(|(k, v)| (k, Some(v))).collect()
    }

    /// Returns the value for `key`: `None` if the key is missing,
    /// `Some(None)` if it is present without a value.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.entries.get(key).map(|v| v.as_deref())
    }

    /// Returns `true` if `key` is present, with or without a value.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterates keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, Option<V>)> for Metadata
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        let mut meta = Metadata::new();
        for (key, value) in iter {
            meta.add(key, value);
        }
        meta
    }
}

impl<K, V> Extend<(K, Option<V>)> for Metadata
where
    K: Into<String>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (K, Option<V>)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.add(key, value);
        }
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Metadata
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(entries: [(K, V); N]) -> Self {
        Metadata::from_pairs(entries)
    }
}

impl<K, V> From<Vec<(K, V)>> for Metadata
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(entries: Vec<(K, V)>) -> Self {
        Metadata::from_pairs(entries)
    }
}

impl<K, V, S> From<IndexMap<K, V, S>> for Metadata
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(entries: IndexMap<K, V, S>) -> Self {
        Metadata::from_pairs(entries)
    }
}

/// Iteration order of a `HashMap` is unspecified, and so is the resulting
/// metadata order.
impl<K, V, S> From<HashMap<K, V, S>> for Metadata
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(entries: HashMap<K, V, S>) -> Self {
        Metadata::from_pairs(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_insertion_order() {
        let meta: Metadata = [("z", "1"), ("a", "2"), ("m", "3")].into();
        let keys: Vec<&str> = meta.keys().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn duplicate_key_keeps_first_position() {
        let mut meta = Metadata::new();
        meta.add("a", Some("1"));
        meta.add("b", Some("2"));
        meta.add("a", Some("3"));

        let entries: Vec<_> = meta.iter().collect();
        assert_eq!(entries, vec![("a", Some("3")), ("b", Some("2"))]);
    }

    #[test]
    fn absent_values_are_recorded() {
        let meta: Metadata = vec![("name", None::<String>)].into_iter().collect();

        assert_eq!(meta.len(), 1);
        assert!(meta.contains_key("name"));
        assert_eq!(meta.get("name"), Some(None));
        assert_eq!(meta.get("missing"), None);
    }

    #[test]
    fn converts_from_plain_string_pairs() {
        let pairs = vec![("name".to_string(), "Alice".to_string())];
        let from_vec: Metadata = pairs.into();
        assert_eq!(from_vec.get("name"), Some(Some("Alice")));

        let mut ordered = IndexMap::new();
        ordered.insert("b", "2");
        ordered.insert("a", "1");
        let from_index: Metadata = ordered.into();
        assert_eq!(from_index.keys().collect::<Vec<_>>(), vec!["b", "a"]);

        let mut map = HashMap::new();
        map.insert("server_name".to_string(), "sample-server".to_string());
        let from_hash = Metadata::from(map);
        assert_eq!(from_hash.get("server_name"), Some(Some("sample-server")));
        assert_eq!(from_hash.len(), 1);
    }

    #[test]
    fn serializes_as_ordered_object_with_nulls() {
        let mut meta = Metadata::new();
        meta.add("name", Some("Alice"));
        meta.add("nick", None::<&str>);

        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"name":"Alice","nick":null}"#);
    }
}
