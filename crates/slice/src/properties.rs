//! Flat property namespace.
//!
//! A [`Properties`] value is an ordered map from dotted keys to string values,
//! the single source every slice configuration is derived from. Keys are kept
//! sorted so iteration, logging and serialization are deterministic.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An ordered, flat key-value namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, String>);

impl Properties {
    /// Creates an empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses property-file text.
    ///
    /// Each non-blank line is `key=value` or `key: value`; lines starting with
    /// `#` or `!` are comments. Keys and values are trimmed, a line without a
    /// separator defines the key with an empty value, and later definitions
    /// replace earlier ones.
    ///
    /// # Examples
    ///
    /// ```
    /// use helios_slice::Properties;
    ///
    /// let props = Properties::parse("# slices\nhelios.slice.Names = east, west\nhelios.Driver: sqlite\n");
    /// assert_eq!(props.get("helios.slice.Names"), Some("east, west"));
    /// assert_eq!(props.get("helios.Driver"), Some("sqlite"));
    /// ```
    pub fn parse(text: &str) -> Self {
        let mut props = Self::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let split = line.find(['=', ':']);
            let (key, value) = match split {
                Some(idx) => (&line[..idx], &line[idx + 1..]),
                None => (line, ""),
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            props.insert(key, value.trim());
        }
        props
    }

    /// Sets a property, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Adds a property, returning `self` for chaining.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns the value of a property.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns true if the property is defined.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Removes a property.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Iterates over all properties in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterates over all keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no properties.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copies every property of `other` into `self`, overwriting duplicates.
    pub fn extend(&mut self, other: &Properties) {
        for (key, value) in other.iter() {
            self.insert(key, value);
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Display for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_separators_and_comments() {
        let props = Properties::parse(
            "# comment\n\
             ! also a comment\n\
             \n\
             a.b = 1\n\
             c.d:2\n\
             flag\n\
             url = jdbc:x://host\n",
        );

        assert_eq!(props.len(), 4);
        assert_eq!(props.get("a.b"), Some("1"));
        assert_eq!(props.get("c.d"), Some("2"));
        assert_eq!(props.get("flag"), Some(""));
        // Only the first separator splits
        assert_eq!(props.get("url"), Some("jdbc:x://host"));
    }

    #[test]
    fn test_parse_later_definition_wins() {
        let props = Properties::parse("k=1\nk=2\n");
        assert_eq!(props.get("k"), Some("2"));
    }

    #[test]
    fn test_display_is_sorted() {
        let props: Properties = [("b", "2"), ("a", "1")].into_iter().collect();
        assert_eq!(props.to_string(), "{a=1, b=2}");
    }

    #[test]
    fn test_serde_transparent() {
        let props = Properties::new().with("helios.Driver", "sqlite");
        let json = serde_json::to_string(&props).unwrap();
        assert_eq!(json, r#"{"helios.Driver":"sqlite"}"#);
    }
}
