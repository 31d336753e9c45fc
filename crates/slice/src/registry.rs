//! Ordered registry of slices and master election.

use std::sync::Arc;

use tracing::{trace, warn};

use crate::backend::BackendConfig;
use crate::error::{SliceError, SliceResult};
use crate::namespace::Namespace;
use crate::properties::Properties;
use crate::slice::{Slice, SliceStatus};

/// The configured slices, in discovery order.
///
/// Never empty: construction fails with [`SliceError::Discovery`] when no
/// names are given.
#[derive(Debug)]
pub struct SliceRegistry {
    slices: Vec<Arc<Slice>>,
}

impl SliceRegistry {
    /// Builds one slice per name from the full namespace.
    ///
    /// Each slice gets the partitioned namespace for its name, and the
    /// identity `<unit>.<name>`.
    pub fn build(
        namespace: &Namespace,
        original: &Properties,
        unit: &str,
        names: &[String],
    ) -> SliceResult<Self> {
        if names.is_empty() {
            return Err(SliceError::Discovery {
                names_key: namespace.control_key(crate::namespace::control::NAMES),
                slice_prefix: namespace.slice_prefix().to_string(),
            });
        }

        let mut slices = Vec::with_capacity(names.len());
        for name in names {
            let props = namespace.partition(original, name);
            let mut config = BackendConfig::from_properties(namespace, &props)?;
            config.set_id(format!("{}.{}", unit, name));
            trace!(
                slice = %name,
                config = %config.to_properties(false),
                "Slice configuration"
            );
            slices.push(Arc::new(Slice::new(name.as_str(), config)));
        }
        Ok(Self { slices })
    }

    /// All slices in discovery order.
    pub fn slices(&self) -> &[Arc<Slice>] {
        &self.slices
    }

    /// Slice names in discovery order.
    pub fn names(&self) -> Vec<String> {
        self.slices.iter().map(|s| s.name().to_string()).collect()
    }

    /// Looks up a slice by name.
    pub fn get(&self, name: &str) -> Option<Arc<Slice>> {
        self.slices.iter().find(|s| s.name() == name).cloned()
    }

    /// Slices whose status is one of `statuses`, in discovery order.
    pub fn with_status(&self, statuses: &[SliceStatus]) -> Vec<Arc<Slice>> {
        self.slices
            .iter()
            .filter(|s| statuses.contains(&s.status()))
            .cloned()
            .collect()
    }

    /// The first slice in discovery order.
    pub fn first(&self) -> Arc<Slice> {
        Arc::clone(&self.slices[0])
    }

    /// Number of slices.
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    /// Returns true if there are no slices.
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Chooses the master slice.
    ///
    /// Without a configured name, the first slice is chosen and a warning is
    /// logged. With a name, the first matching slice among the active ones
    /// (or among all slices while none is active) is chosen; if nothing
    /// matches, the first slice is chosen and a warning is logged.
    pub fn elect_master(&self, configured: Option<&str>, key: &str) -> Arc<Slice> {
        let Some(wanted) = configured.map(str::trim) else {
            let master = self.first();
            warn!(
                key = %key,
                master = %master,
                "No master slice configured, using the first slice"
            );
            return master;
        };

        let active = self.with_status(&[SliceStatus::Active]);
        let candidates: &[Arc<Slice>] = if active.is_empty() {
            &self.slices
        } else {
            &active
        };

        match candidates.iter().find(|s| s.name() == wanted) {
            Some(master) => Arc::clone(master),
            None => {
                let master = self.first();
                warn!(
                    key = %key,
                    configured = %wanted,
                    master = %master,
                    "Configured master slice is not available, using the first slice"
                );
                master
            }
        }
    }
}
