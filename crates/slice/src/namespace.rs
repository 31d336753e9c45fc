//! Namespace partitioning and slice discovery.
//!
//! A single flat [`Properties`] map configures every slice. Keys follow three
//! shapes under a configurable root (`helios` by default):
//!
//! | Shape | Example | Meaning |
//! |-------|---------|---------|
//! | `<root>.slice.<Control>` | `helios.slice.Names` | Slice-wide control |
//! | `<root>.slice.<name>.<key>` | `helios.slice.east.ConnectionURL` | Override for one slice |
//! | `<root>.<key>` | `helios.ConnectionURL` | Default for every slice |
//!
//! Anything else passes through untouched to every slice.
//!
//! [`Namespace::partition`] derives one slice's private namespace and
//! [`Namespace::discover`] finds the slice names.

use regex::Regex;
use tracing::{info, warn};

use crate::error::{SliceError, SliceResult};
use crate::properties::Properties;

/// Default namespace root.
pub const DEFAULT_ROOT: &str = "helios";

/// Segment naming the slice sub-namespace.
pub const SLICE_SEGMENT: &str = "slice";

/// Control names recognised under the slice prefix.
pub mod control {
    /// Comma-separated, ordered list of slice names.
    pub const NAMES: &str = "Names";
    /// Name of the master slice.
    pub const MASTER: &str = "Master";
    /// Whether unreachable slices are tolerated.
    pub const LENIENT: &str = "Lenient";
    /// Name of the distribution policy.
    pub const DISTRIBUTION_POLICY: &str = "DistributionPolicy";
    /// Verification executor (`sequential` or `parallel`).
    pub const EXECUTOR_SERVICE: &str = "ExecutorService";
}

/// Classification of a namespace key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SliceKey<'a> {
    /// `<root>.slice.<Control>`: a slice-wide setting.
    Control(&'a str),
    /// `<root>.slice.<slice>.<property>`: a property of one slice.
    Data {
        /// Slice name.
        slice: &'a str,
        /// Backend property, possibly dotted.
        property: &'a str,
    },
    /// `<root>.slice.` followed by something that is neither a control nor
    /// slice data, e.g. an empty slice name.
    Malformed,
    /// `<root>.<property>`: a default for every slice.
    Global(&'a str),
    /// Any other key.
    Foreign,
}

/// Key grammar and partitioning rules for one namespace root.
#[derive(Debug, Clone)]
pub struct Namespace {
    root: String,
    global_prefix: String,
    slice_prefix: String,
    control_pattern: Regex,
    data_pattern: Regex,
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}

impl Namespace {
    /// Creates the grammar for the given root.
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        let global_prefix = format!("{}.", root);
        let slice_prefix = format!("{}{}.", global_prefix, SLICE_SEGMENT);
        let escaped = regex::escape(&slice_prefix);
        let control_pattern = Regex::new(&format!(r"^{}([^.]+)$", escaped))
            .expect("escaped prefix is a valid pattern");
        let data_pattern = Regex::new(&format!(r"^{}([^.]+)\.(.+)$", escaped))
            .expect("escaped prefix is a valid pattern");

        Self {
            root,
            global_prefix,
            slice_prefix,
            control_pattern,
            data_pattern,
        }
    }

    /// The namespace root, e.g. `helios`.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// The global prefix, e.g. `helios.`.
    pub fn global_prefix(&self) -> &str {
        &self.global_prefix
    }

    /// The slice prefix, e.g. `helios.slice.`.
    pub fn slice_prefix(&self) -> &str {
        &self.slice_prefix
    }

    /// Full key of a slice-wide control, e.g. `helios.slice.Names`.
    pub fn control_key(&self, control: &str) -> String {
        format!("{}{}", self.slice_prefix, control)
    }

    /// Full key of a global property, e.g. `helios.ConnectionURL`.
    pub fn global_key(&self, property: &str) -> String {
        format!("{}{}", self.global_prefix, property)
    }

    /// Full key of a slice override, e.g. `helios.slice.east.ConnectionURL`.
    pub fn slice_key(&self, slice: &str, property: &str) -> String {
        format!("{}{}.{}", self.slice_prefix, slice, property)
    }

    /// Classifies a key.
    ///
    /// A control key has exactly one segment after the slice prefix; slice
    /// data has at least two, the first naming the slice.
    pub fn classify<'a>(&self, key: &'a str) -> SliceKey<'a> {
        if key.starts_with(&self.slice_prefix) {
            if let Some(caps) = self.control_pattern.captures(key) {
                if let Some(name) = caps.get(1) {
                    return SliceKey::Control(name.as_str());
                }
            }
            if let Some(caps) = self.data_pattern.captures(key) {
                if let (Some(slice), Some(property)) = (caps.get(1), caps.get(2)) {
                    return SliceKey::Data {
                        slice: slice.as_str(),
                        property: property.as_str(),
                    };
                }
            }
            return SliceKey::Malformed;
        }
        match key.strip_prefix(&self.global_prefix) {
            Some(property) => SliceKey::Global(property),
            None => SliceKey::Foreign,
        }
    }

    /// Derives the private namespace of one slice.
    ///
    /// Rules, in priority order:
    ///
    /// 1. `<root>.slice.<slice>.<key>` becomes `<root>.<key>`.
    /// 2. Any other key under `<root>.slice.` is dropped.
    /// 3. `<root>.<key>` is kept unless `<root>.slice.<slice>.<key>` exists.
    /// 4. Any other key is kept verbatim.
    ///
    /// # Examples
    ///
    /// ```
    /// use helios_slice::{Namespace, Properties};
    ///
    /// let ns = Namespace::default();
    /// let all = Properties::new()
    ///     .with("helios.slice.east.ConnectionURL", "u1")
    ///     .with("helios.ConnectionURL", "u0")
    ///     .with("helios.ConnectionDriverName", "sqlite");
    ///
    /// let east = ns.partition(&all, "east");
    /// assert_eq!(east.get("helios.ConnectionURL"), Some("u1"));
    /// assert_eq!(east.get("helios.ConnectionDriverName"), Some("sqlite"));
    /// ```
    pub fn partition(&self, original: &Properties, slice: &str) -> Properties {
        let own_prefix = format!("{}{}.", self.slice_prefix, slice);
        let mut result = Properties::new();
        for (key, value) in original.iter() {
            if let Some(property) = key.strip_prefix(&own_prefix) {
                result.insert(self.global_key(property), value);
            } else if key.starts_with(&self.slice_prefix) {
                // another slice, or a slice-wide control
            } else if let Some(property) = key.strip_prefix(&self.global_prefix) {
                let overridden = format!("{}{}", own_prefix, property);
                if !original.contains_key(&overridden) {
                    result.insert(key, value);
                }
            } else {
                result.insert(key, value);
            }
        }
        result
    }

    /// Returns the properties that are not under the slice prefix.
    ///
    /// These configure the distributed configuration as a whole.
    pub fn global_properties(&self, original: &Properties) -> Properties {
        original
            .iter()
            .filter(|(key, _)| !key.starts_with(&self.slice_prefix))
            .collect()
    }

    /// Finds the slice names.
    ///
    /// When `<root>.slice.Names` is set, its comma-separated entries are used
    /// in the listed order with duplicates removed. Otherwise every key of the
    /// form `<root>.slice.<name>.<property>` contributes `<name>`, and the
    /// names are sorted.
    pub fn discover(&self, original: &Properties) -> SliceResult<Vec<String>> {
        let names_key = self.control_key(control::NAMES);
        let names = match original.get(&names_key) {
            Some(list) => self.parse_names(&names_key, list)?,
            None => {
                warn!(
                    key = %names_key,
                    "No explicit slice names configured, scanning for slice properties"
                );
                self.scan_names(original)
            }
        };

        if names.is_empty() {
            return Err(SliceError::Discovery {
                names_key,
                slice_prefix: self.slice_prefix.clone(),
            });
        }
        info!(slices = ?names, "Available slices");
        Ok(names)
    }

    fn parse_names(&self, key: &str, list: &str) -> SliceResult<Vec<String>> {
        let mut names: Vec<String> = Vec::new();
        for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            if name.contains('.') {
                return Err(SliceError::InvalidValue {
                    key: key.to_string(),
                    value: list.to_string(),
                    expected: "comma-separated slice names without dots",
                });
            }
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn scan_names(&self, original: &Properties) -> Vec<String> {
        let mut names: Vec<String> = original
            .keys()
            .filter_map(|key| match self.classify(key) {
                SliceKey::Data { slice, .. } => Some(slice.to_string()),
                _ => None,
            })
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns() -> Namespace {
        Namespace::default()
    }

    #[test]
    fn test_classify_key_shapes() {
        let ns = ns();
        assert_eq!(ns.classify("helios.slice.Names"), SliceKey::Control("Names"));
        assert_eq!(
            ns.classify("helios.slice.east.ConnectionURL"),
            SliceKey::Data {
                slice: "east",
                property: "ConnectionURL"
            }
        );
        assert_eq!(
            ns.classify("helios.slice.east.jdbc.Pool.Size"),
            SliceKey::Data {
                slice: "east",
                property: "jdbc.Pool.Size"
            }
        );
        assert_eq!(ns.classify("helios.slice..x"), SliceKey::Malformed);
        assert_eq!(ns.classify("helios.slice.east."), SliceKey::Malformed);
        assert_eq!(
            ns.classify("helios.ConnectionURL"),
            SliceKey::Global("ConnectionURL")
        );
        assert_eq!(ns.classify("javax.persistence.x"), SliceKey::Foreign);
    }

    #[test]
    fn test_classify_escapes_root() {
        let ns = Namespace::new("a+b");
        assert_eq!(ns.classify("a+b.slice.Master"), SliceKey::Control("Master"));
        assert_eq!(ns.classify("aab.slice.Master"), SliceKey::Foreign);
    }

    #[test]
    fn test_partition_rules() {
        let ns = ns();
        let all = Properties::new()
            .with("helios.slice.east.ConnectionURL", "u1")
            .with("helios.slice.west.ConnectionURL", "u2")
            .with("helios.slice.Master", "east")
            .with("helios.ConnectionURL", "u0")
            .with("helios.ConnectionDriverName", "D")
            .with("javax.persistence.lock.timeout", "100");

        let east = ns.partition(&all, "east");
        assert_eq!(east.len(), 3);
        assert_eq!(east.get("helios.ConnectionURL"), Some("u1"));
        assert_eq!(east.get("helios.ConnectionDriverName"), Some("D"));
        assert_eq!(east.get("javax.persistence.lock.timeout"), Some("100"));
        assert!(!east.contains_key("helios.slice.Master"));
    }

    #[test]
    fn test_partition_does_not_alias_input() {
        let ns = ns();
        let all = Properties::new().with("helios.Driver", "D");
        let mut part = ns.partition(&all, "east");
        part.insert("helios.Driver", "changed");
        assert_eq!(all.get("helios.Driver"), Some("D"));
    }

    #[test]
    fn test_explicit_names_dedup_preserve_order() {
        let ns = ns();
        let all = Properties::new()
            .with("helios.slice.Names", " west, east ,west,, north")
            .with("helios.slice.zeta.ConnectionURL", "u");

        assert_eq!(ns.discover(&all).unwrap(), vec!["west", "east", "north"]);
    }

    #[test]
    fn test_explicit_names_reject_dots() {
        let ns = ns();
        let all = Properties::new().with("helios.slice.Names", "a.b");
        assert!(matches!(
            ns.discover(&all),
            Err(SliceError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_scan_names_sorted_and_ignores_controls() {
        let ns = ns();
        let all = Properties::new()
            .with("helios.slice.west.ConnectionURL", "u2")
            .with("helios.slice.east.ConnectionURL", "u1")
            .with("helios.slice.east.ConnectionUserName", "sa")
            .with("helios.slice.Master", "west")
            .with("helios.slice.Lenient", "true")
            .with("helios.ConnectionDriverName", "D");

        assert_eq!(ns.discover(&all).unwrap(), vec!["east", "west"]);
    }

    #[test]
    fn test_scan_uses_first_segment_for_deep_keys() {
        let ns = ns();
        let all = Properties::new().with("helios.slice.east.jdbc.Pool.Size", "4");
        assert_eq!(ns.discover(&all).unwrap(), vec!["east"]);
    }

    #[test]
    fn test_discovery_fails_without_slices() {
        let ns = ns();
        let all = Properties::new()
            .with("helios.slice.Master", "east")
            .with("helios.ConnectionURL", "u0");
        assert!(matches!(
            ns.discover(&all),
            Err(SliceError::Discovery { .. })
        ));

        let blank = Properties::new().with("helios.slice.Names", " , ");
        assert!(matches!(
            ns.discover(&blank),
            Err(SliceError::Discovery { .. })
        ));
    }

    #[test]
    fn test_global_properties_excludes_slice_namespace() {
        let ns = ns();
        let all = Properties::new()
            .with("helios.slice.east.ConnectionURL", "u1")
            .with("helios.slice.Lenient", "true")
            .with("helios.ConnectionDriverName", "D")
            .with("other", "x");

        let global = ns.global_properties(&all);
        assert_eq!(global.len(), 2);
        assert_eq!(global.get("helios.ConnectionDriverName"), Some("D"));
        assert_eq!(global.get("other"), Some("x"));
    }
}
