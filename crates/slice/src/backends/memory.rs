//! In-process backend provider.
//!
//! [`MemoryProvider`] simulates backends keyed by connection target (see
//! [`BackendConfig::connection_info`]). Each target is reachable, refusing or
//! returning no connection, optionally after a delay. Counters record every
//! connection opened and closed, which makes the provider suitable for
//! exercising slice verification without real databases.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::RwLock;

use crate::backend::{BackendConfig, BackendProvider, Connection, ConnectionFactory};
use crate::error::{BackendError, BackendResult};

/// How a simulated target answers connection requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryBehavior {
    /// Hands out connections.
    Connect,
    /// Fails every connection attempt.
    Refuse,
    /// Returns no connection and no error.
    ReturnNone,
}

/// A simulated backend.
#[derive(Debug, Clone)]
pub struct MemoryTarget {
    /// Answer to connection requests.
    pub behavior: MemoryBehavior,
    /// Whether the target takes part in distributed transactions.
    pub distributed_transactions: bool,
    /// Delay before answering.
    pub delay: Option<Duration>,
}

impl MemoryTarget {
    /// A target that hands out connections.
    pub fn reachable() -> Self {
        Self {
            behavior: MemoryBehavior::Connect,
            distributed_transactions: false,
            delay: None,
        }
    }

    /// A target that refuses connections.
    pub fn refusing() -> Self {
        Self {
            behavior: MemoryBehavior::Refuse,
            ..Self::reachable()
        }
    }

    /// A target that returns no connection.
    pub fn returning_none() -> Self {
        Self {
            behavior: MemoryBehavior::ReturnNone,
            ..Self::reachable()
        }
    }

    /// Marks the target as distributed-transaction capable.
    pub fn with_distributed_transactions(mut self) -> Self {
        self.distributed_transactions = true;
        self
    }

    /// Delays every answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Debug, Default)]
struct Counters {
    opened: AtomicUsize,
    closed: AtomicUsize,
    probes: RwLock<HashMap<String, usize>>,
}

/// Backend provider over simulated targets.
///
/// Unknown targets refuse connections.
#[derive(Debug, Default, Clone)]
pub struct MemoryProvider {
    targets: Arc<RwLock<HashMap<String, MemoryTarget>>>,
    counters: Arc<Counters>,
}

impl MemoryProvider {
    /// Creates a provider with no targets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a target, returning `self` for chaining.
    pub fn with_target(self, target: impl Into<String>, behavior: MemoryTarget) -> Self {
        self.set_target(target, behavior);
        self
    }

    /// Registers or replaces a target.
    pub fn set_target(&self, target: impl Into<String>, behavior: MemoryTarget) {
        self.targets.write().insert(target.into(), behavior);
    }

    /// Connections opened so far.
    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    /// Connections closed so far.
    pub fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// Connection attempts made against one target.
    pub fn probes(&self, target: &str) -> usize {
        self.counters
            .probes
            .read()
            .get(target)
            .copied()
            .unwrap_or(0)
    }
}

impl BackendProvider for MemoryProvider {
    fn connection_factory(
        &self,
        config: &BackendConfig,
    ) -> BackendResult<Arc<dyn ConnectionFactory>> {
        let target = config.connection_info();
        let behavior = self
            .targets
            .read()
            .get(&target)
            .cloned()
            .unwrap_or_else(MemoryTarget::refusing);
        Ok(Arc::new(MemoryConnectionFactory {
            target,
            behavior,
            counters: Arc::clone(&self.counters),
        }))
    }
}

/// Connection factory for one simulated target.
#[derive(Debug)]
pub struct MemoryConnectionFactory {
    target: String,
    behavior: MemoryTarget,
    counters: Arc<Counters>,
}

impl ConnectionFactory for MemoryConnectionFactory {
    fn connection(&self) -> BackendResult<Option<Box<dyn Connection>>> {
        *self
            .counters
            .probes
            .write()
            .entry(self.target.clone())
            .or_insert(0) += 1;

        if let Some(delay) = self.behavior.delay {
            std::thread::sleep(delay);
        }

        match self.behavior.behavior {
            MemoryBehavior::Connect => {
                self.counters.opened.fetch_add(1, Ordering::SeqCst);
                Ok(Some(Box::new(MemoryConnection {
                    counters: Arc::clone(&self.counters),
                })))
            }
            MemoryBehavior::Refuse => Err(BackendError::ConnectionFailed {
                target: self.target.clone(),
                message: "connection refused".to_string(),
            }),
            MemoryBehavior::ReturnNone => Ok(None),
        }
    }

    fn supports_distributed_transactions(&self) -> bool {
        self.behavior.distributed_transactions
    }
}

struct MemoryConnection {
    counters: Arc<Counters>,
}

impl Connection for MemoryConnection {
    fn close(self: Box<Self>) -> BackendResult<()> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
