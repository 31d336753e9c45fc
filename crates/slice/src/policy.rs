//! Distribution policies.
//!
//! A [`DistributionPolicy`] decides which slice stores a new record. Policies
//! are registered by name in a [`PolicyRegistry`] as constructor closures;
//! the configuration resolves the configured name once and caches the
//! instance.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{SliceError, SliceResult};

/// Name of the policy that stores everything on the master slice.
pub const MASTER_POLICY: &str = "master";

/// Name of the policy that cycles through the slices.
pub const ROUND_ROBIN_POLICY: &str = "round-robin";

/// Chooses the slice that stores a record.
pub trait DistributionPolicy: Send + Sync {
    /// Returns the name of the target slice, or `None` to leave the choice to
    /// the caller.
    ///
    /// `slices` holds the candidate slice names in discovery order.
    fn distribute(&self, record: &dyn Any, slices: &[String], master: &str) -> Option<String>;
}

/// Stores every record on the master slice.
#[derive(Debug, Default)]
pub struct MasterPolicy;

impl DistributionPolicy for MasterPolicy {
    fn distribute(&self, _record: &dyn Any, _slices: &[String], master: &str) -> Option<String> {
        Some(master.to_string())
    }
}

/// Cycles through the candidate slices.
#[derive(Debug, Default)]
pub struct RoundRobinPolicy {
    next: AtomicUsize,
}

impl DistributionPolicy for RoundRobinPolicy {
    fn distribute(&self, _record: &dyn Any, slices: &[String], _master: &str) -> Option<String> {
        if slices.is_empty() {
            return None;
        }
        let i = self.next.fetch_add(1, Ordering::Relaxed) % slices.len();
        Some(slices[i].clone())
    }
}

/// Constructs a policy instance.
pub type PolicyConstructor = Arc<dyn Fn() -> Arc<dyn DistributionPolicy> + Send + Sync>;

/// Named policy constructors.
#[derive(Clone)]
pub struct PolicyRegistry {
    constructors: BTreeMap<String, PolicyConstructor>,
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyRegistry")
            .field("policies", &self.names())
            .finish()
    }
}

impl PolicyRegistry {
    /// A registry with no policies.
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// A registry with the `master` and `round-robin` policies.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(MASTER_POLICY, || Arc::new(MasterPolicy));
        registry.register(ROUND_ROBIN_POLICY, || Arc::new(RoundRobinPolicy::default()));
        registry
    }

    /// Registers a constructor, replacing any previous one with that name.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Arc<dyn DistributionPolicy> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Arc::new(constructor));
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }

    /// Instantiates the named policy.
    pub fn create(&self, name: &str) -> SliceResult<Arc<dyn DistributionPolicy>> {
        match self.constructors.get(name) {
            Some(constructor) => Ok(constructor()),
            None => Err(SliceError::UnknownPolicy {
                name: name.to_string(),
                available: self.names(),
            }),
        }
    }
}
