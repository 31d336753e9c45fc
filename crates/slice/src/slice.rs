//! Slice identity and status.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use crate::backend::BackendConfig;

/// Connectivity status of a slice.
///
/// Every slice starts `Uninitialized` and moves once, to `Active` or
/// `Inactive`, when it is verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SliceStatus {
    /// Not verified yet.
    Uninitialized,
    /// A connection could be obtained.
    Active,
    /// No connection could be obtained.
    Inactive,
}

impl SliceStatus {
    fn as_u8(self) -> u8 {
        match self {
            SliceStatus::Uninitialized => 0,
            SliceStatus::Active => 1,
            SliceStatus::Inactive => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => SliceStatus::Active,
            2 => SliceStatus::Inactive,
            _ => SliceStatus::Uninitialized,
        }
    }
}

impl fmt::Display for SliceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SliceStatus::Uninitialized => write!(f, "uninitialized"),
            SliceStatus::Active => write!(f, "active"),
            SliceStatus::Inactive => write!(f, "inactive"),
        }
    }
}

/// One independently addressable backend and its configuration.
///
/// The registry hands out shared references to a single instance per name, so
/// the status observed through any of them is the same.
#[derive(Debug)]
pub struct Slice {
    name: String,
    config: BackendConfig,
    status: AtomicU8,
}

impl Slice {
    /// Creates an unverified slice.
    pub fn new(name: impl Into<String>, config: BackendConfig) -> Self {
        Self {
            name: name.into(),
            config,
            status: AtomicU8::new(SliceStatus::Uninitialized.as_u8()),
        }
    }

    /// Slice name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The slice's backend configuration.
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Current status.
    pub fn status(&self) -> SliceStatus {
        SliceStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Returns true if the slice has been verified as reachable.
    pub fn is_active(&self) -> bool {
        self.status() == SliceStatus::Active
    }

    /// Records the verification outcome.
    ///
    /// Only the first transition out of `Uninitialized` takes effect; returns
    /// false if the slice was already verified.
    pub(crate) fn settle(&self, reachable: bool) -> bool {
        let target = if reachable {
            SliceStatus::Active
        } else {
            SliceStatus::Inactive
        };
        self.status
            .compare_exchange(
                SliceStatus::Uninitialized.as_u8(),
                target.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::Namespace;

    #[test]
    fn test_status_transitions_once() {
        let slice = Slice::new("east", BackendConfig::new(&Namespace::default()));
        assert_eq!(slice.status(), SliceStatus::Uninitialized);

        assert!(slice.settle(true));
        assert!(slice.is_active());

        assert!(!slice.settle(false));
        assert_eq!(slice.status(), SliceStatus::Active);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&SliceStatus::Inactive).unwrap();
        assert_eq!(json, "\"inactive\"");
    }
}
