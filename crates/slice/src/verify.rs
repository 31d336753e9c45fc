//! Connectivity verification.
//!
//! Each slice is probed by building its connection factory and opening one
//! connection, which is closed straight away. The outcome of a probe is a
//! [`ConnectResult`]; the [`Verifier`] then applies the lenient or strict
//! policy uniformly to every outcome, in discovery order.

use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::{BackendProvider, Connection, ConnectionFactory};
use crate::error::{BackendError, SharedCause, SliceError, SliceResult};
use crate::slice::Slice;

/// How slices are probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutorMode {
    /// One slice after another; a strict failure stops the remaining probes.
    #[default]
    Sequential,
    /// Every slice on its own thread; outcomes are applied in discovery order.
    Parallel,
}

impl FromStr for ExecutorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(ExecutorMode::Sequential),
            "parallel" => Ok(ExecutorMode::Parallel),
            other => Err(format!("unknown executor mode: {}", other)),
        }
    }
}

impl std::fmt::Display for ExecutorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutorMode::Sequential => write!(f, "sequential"),
            ExecutorMode::Parallel => write!(f, "parallel"),
        }
    }
}

/// Outcome of probing one slice.
#[derive(Debug)]
pub enum ConnectResult {
    /// A connection was obtained.
    Active(Arc<dyn ConnectionFactory>),
    /// No connection could be obtained.
    Inactive(SharedCause),
}

/// A slice that passed verification.
#[derive(Debug, Clone)]
pub struct VerifiedSlice {
    /// The verified slice.
    pub slice: Arc<Slice>,
    /// Its decorated connection factory.
    pub factory: Arc<dyn ConnectionFactory>,
    /// Whether the factory takes part in distributed transactions.
    pub distributed_transactions: bool,
}

/// Closes the wrapped connection when dropped.
struct ScopedConnection(Option<Box<dyn Connection>>);

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.0.take() {
            if let Err(e) = conn.close() {
                debug!(error = %e, "Ignoring failure to close verification connection");
            }
        }
    }
}

/// Probes one slice.
pub fn probe(provider: &dyn BackendProvider, slice: &Slice) -> ConnectResult {
    let config = slice.config();
    let target = config.connection_info();
    info!(slice = %slice, target = %target, "Connecting to slice");

    let factory = match provider.connection_factory(config) {
        Ok(raw) => provider.decorate(config, raw),
        Err(e) => return ConnectResult::Inactive(Arc::new(e)),
    };

    match factory.connection() {
        Ok(Some(conn)) => {
            drop(ScopedConnection(Some(conn)));
            ConnectResult::Active(factory)
        }
        Ok(None) => ConnectResult::Inactive(Arc::new(BackendError::NoConnection { target })),
        Err(e) => ConnectResult::Inactive(Arc::new(e)),
    }
}

/// Applies the failure policy to slice probes.
pub struct Verifier<'a> {
    provider: &'a dyn BackendProvider,
    lenient: bool,
    mode: ExecutorMode,
}

impl<'a> Verifier<'a> {
    /// Creates a verifier.
    pub fn new(provider: &'a dyn BackendProvider, lenient: bool, mode: ExecutorMode) -> Self {
        Self {
            provider,
            lenient,
            mode,
        }
    }

    /// Verifies every slice, returning the reachable ones in the given order.
    ///
    /// Unreachable slices are marked inactive. When lenient they are skipped
    /// with a warning; otherwise the first one, in order, aborts verification
    /// with [`SliceError::Connectivity`].
    pub fn verify(&self, slices: &[Arc<Slice>]) -> SliceResult<Vec<VerifiedSlice>> {
        let mut verified = Vec::with_capacity(slices.len());
        match self.mode {
            ExecutorMode::Sequential => {
                for slice in slices {
                    let outcome = probe(self.provider, slice);
                    verified.extend(self.settle(slice, outcome)?);
                }
            }
            ExecutorMode::Parallel => {
                // every probed slice gets its status before the first failure is reported
                let outcomes = self.probe_all(slices);
                let mut first_error = None;
                for (slice, outcome) in slices.iter().zip(outcomes) {
                    match self.settle(slice, outcome) {
                        Ok(settled) => verified.extend(settled),
                        Err(e) => {
                            first_error.get_or_insert(e);
                        }
                    }
                }
                if let Some(e) = first_error {
                    return Err(e);
                }
            }
        }
        Ok(verified)
    }

    fn probe_all(&self, slices: &[Arc<Slice>]) -> Vec<ConnectResult> {
        std::thread::scope(|scope| {
            let handles: Vec<_> = slices
                .iter()
                .map(|slice| scope.spawn(move || probe(self.provider, slice)))
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        ConnectResult::Inactive(Arc::new(BackendError::Internal {
                            backend_name: "verifier".to_string(),
                            message: "verification thread panicked".to_string(),
                            source: None,
                        }))
                    })
                })
                .collect()
        })
    }

    fn settle(
        &self,
        slice: &Arc<Slice>,
        outcome: ConnectResult,
    ) -> SliceResult<Option<VerifiedSlice>> {
        match outcome {
            ConnectResult::Active(factory) => {
                slice.settle(true);
                let distributed_transactions = factory.supports_distributed_transactions();
                Ok(Some(VerifiedSlice {
                    slice: Arc::clone(slice),
                    factory,
                    distributed_transactions,
                }))
            }
            ConnectResult::Inactive(cause) => {
                slice.settle(false);
                let target = slice.config().connection_info();
                if self.lenient {
                    warn!(
                        slice = %slice,
                        target = %target,
                        error = %cause,
                        "Slice is not reachable and will be excluded"
                    );
                    Ok(None)
                } else {
                    Err(SliceError::Connectivity {
                        slice: slice.name().to_string(),
                        target,
                        source: cause,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::{MemoryProvider, MemoryTarget};
    use crate::namespace::Namespace;
    use crate::properties::Properties;
    use crate::registry::SliceRegistry;
    use crate::slice::SliceStatus;

    fn registry(urls: &[(&str, &str)]) -> SliceRegistry {
        let ns = Namespace::default();
        let mut props = Properties::new();
        for (name, url) in urls {
            props.insert(ns.slice_key(name, "ConnectionURL"), *url);
        }
        let names: Vec<String> = urls.iter().map(|(n, _)| n.to_string()).collect();
        SliceRegistry::build(&ns, &props, "unit", &names).unwrap()
    }

    fn names(verified: &[VerifiedSlice]) -> Vec<String> {
        verified.iter().map(|v| v.slice.name().to_string()).collect()
    }

    #[test]
    fn test_executor_mode_parse() {
        assert_eq!("Parallel".parse::<ExecutorMode>(), Ok(ExecutorMode::Parallel));
        assert_eq!(
            " sequential ".parse::<ExecutorMode>(),
            Ok(ExecutorMode::Sequential)
        );
        assert!("pooled".parse::<ExecutorMode>().is_err());
        assert_eq!(ExecutorMode::Parallel.to_string(), "parallel");
    }

    #[test]
    fn test_probe_closes_connection() {
        let provider = MemoryProvider::new().with_target("mem:a", MemoryTarget::reachable());
        let reg = registry(&[("a", "mem:a")]);

        let outcome = probe(&provider, &reg.first());
        assert!(matches!(outcome, ConnectResult::Active(_)));
        assert_eq!(provider.opened(), 1);
        assert_eq!(provider.closed(), 1);
    }

    #[test]
    fn test_probe_classifies_failures() {
        let provider = MemoryProvider::new()
            .with_target("mem:refuse", MemoryTarget::refusing())
            .with_target("mem:none", MemoryTarget::returning_none());
        let reg = registry(&[("r", "mem:refuse"), ("n", "mem:none"), ("u", "mem:unknown")]);

        for slice in reg.slices() {
            assert!(matches!(
                probe(&provider, slice),
                ConnectResult::Inactive(_)
            ));
        }
    }

    #[test]
    fn test_lenient_skips_bad_slice() {
        let provider = MemoryProvider::new()
            .with_target("mem:a", MemoryTarget::reachable())
            .with_target("mem:c", MemoryTarget::reachable());
        let reg = registry(&[("a", "mem:a"), ("b", "mem:b"), ("c", "mem:c")]);

        let verified = Verifier::new(&provider, true, ExecutorMode::Sequential)
            .verify(reg.slices())
            .unwrap();

        assert_eq!(names(&verified), vec!["a", "c"]);
        assert_eq!(reg.get("b").unwrap().status(), SliceStatus::Inactive);
    }

    #[test]
    fn test_strict_stops_at_first_failure() {
        let provider = MemoryProvider::new()
            .with_target("mem:a", MemoryTarget::reachable())
            .with_target("mem:c", MemoryTarget::reachable());
        let reg = registry(&[("a", "mem:a"), ("b", "mem:b"), ("c", "mem:c")]);

        let err = Verifier::new(&provider, false, ExecutorMode::Sequential)
            .verify(reg.slices())
            .unwrap_err();

        match err {
            SliceError::Connectivity { slice, target, .. } => {
                assert_eq!(slice, "b");
                assert_eq!(target, "mem:b");
            }
            other => panic!("unexpected error: {other}"),
        }
        // c was never probed
        assert_eq!(reg.get("c").unwrap().status(), SliceStatus::Uninitialized);
        assert_eq!(provider.probes("mem:c"), 0);
    }

    #[test]
    fn test_parallel_preserves_discovery_order() {
        use std::time::Duration;

        let provider = MemoryProvider::new()
            .with_target(
                "mem:a",
                MemoryTarget::reachable().with_delay(Duration::from_millis(60)),
            )
            .with_target(
                "mem:b",
                MemoryTarget::reachable().with_delay(Duration::from_millis(30)),
            )
            .with_target("mem:c", MemoryTarget::reachable());
        let reg = registry(&[("a", "mem:a"), ("b", "mem:b"), ("c", "mem:c")]);

        let verified = Verifier::new(&provider, false, ExecutorMode::Parallel)
            .verify(reg.slices())
            .unwrap();

        assert_eq!(names(&verified), vec!["a", "b", "c"]);
        assert_eq!(provider.opened(), provider.closed());
    }

    #[test]
    fn test_parallel_strict_reports_first_failure_in_order() {
        let provider = MemoryProvider::new().with_target("mem:a", MemoryTarget::reachable());
        let reg = registry(&[("a", "mem:a"), ("b", "mem:b"), ("c", "mem:c")]);

        let err = Verifier::new(&provider, false, ExecutorMode::Parallel)
            .verify(reg.slices())
            .unwrap_err();

        assert!(matches!(err, SliceError::Connectivity { ref slice, .. } if slice == "b"));
        assert_eq!(reg.get("c").unwrap().status(), SliceStatus::Inactive);
        assert_eq!(reg.get("a").unwrap().status(), SliceStatus::Active);
    }

    #[test]
    fn test_distributed_transaction_flag_recorded() {
        let provider = MemoryProvider::new()
            .with_target("mem:a", MemoryTarget::reachable().with_distributed_transactions())
            .with_target("mem:b", MemoryTarget::reachable());
        let reg = registry(&[("a", "mem:a"), ("b", "mem:b")]);

        let verified = Verifier::new(&provider, false, ExecutorMode::Sequential)
            .verify(reg.slices())
            .unwrap();

        assert!(verified[0].distributed_transactions);
        assert!(!verified[1].distributed_transactions);
    }
}
