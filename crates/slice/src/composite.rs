//! Composite connection factory over the verified slices.
//!
//! A [`DistributedConnectionFactory`] presents every reachable slice as one
//! virtual backend. Opening a connection on it opens one connection per
//! member slice, in discovery order.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::backend::{Connection, ConnectionFactory};
use crate::error::{BackendError, BackendResult, SliceError, SliceResult};
use crate::verify::VerifiedSlice;

/// One member of the composite.
#[derive(Debug, Clone)]
pub struct CompositeMember {
    /// Slice name.
    pub slice: String,
    /// Connection factory of the slice.
    pub factory: Arc<dyn ConnectionFactory>,
    /// Whether the member takes part in distributed transactions.
    pub distributed_transactions: bool,
}

impl From<VerifiedSlice> for CompositeMember {
    fn from(verified: VerifiedSlice) -> Self {
        Self {
            slice: verified.slice.name().to_string(),
            factory: verified.factory,
            distributed_transactions: verified.distributed_transactions,
        }
    }
}

/// The virtual multi-backend connection factory.
#[derive(Debug)]
pub struct DistributedConnectionFactory {
    members: Vec<CompositeMember>,
    distributed_transactions: bool,
}

impl DistributedConnectionFactory {
    /// Composes the given members, in order.
    ///
    /// Fails with [`SliceError::EmptyComposite`] when there are none. The
    /// composite supports distributed transactions only if every member does.
    pub fn new(members: Vec<CompositeMember>) -> SliceResult<Self> {
        if members.is_empty() {
            return Err(SliceError::EmptyComposite);
        }
        let distributed_transactions = members.iter().all(|m| m.distributed_transactions);
        Ok(Self {
            members,
            distributed_transactions,
        })
    }

    /// Member slice names, in order.
    pub fn slice_names(&self) -> Vec<String> {
        self.members.iter().map(|m| m.slice.clone()).collect()
    }

    /// All members, in order.
    pub fn members(&self) -> &[CompositeMember] {
        &self.members
    }

    /// The connection factory of one member.
    pub fn factory(&self, slice: &str) -> Option<Arc<dyn ConnectionFactory>> {
        self.members
            .iter()
            .find(|m| m.slice == slice)
            .map(|m| Arc::clone(&m.factory))
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false for a constructed composite.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl ConnectionFactory for DistributedConnectionFactory {
    /// Opens one connection per member.
    ///
    /// If any member fails, the connections already opened are closed and
    /// the failure is returned.
    fn connection(&self) -> BackendResult<Option<Box<dyn Connection>>> {
        // dropping `opened` on an early return closes what it holds
        let mut opened = DistributedConnection {
            connections: Vec::with_capacity(self.members.len()),
        };
        for member in &self.members {
            match member.factory.connection()? {
                Some(conn) => opened.connections.push((member.slice.clone(), conn)),
                None => {
                    return Err(BackendError::NoConnection {
                        target: member.slice.clone(),
                    });
                }
            }
        }
        Ok(Some(Box::new(opened)))
    }

    fn supports_distributed_transactions(&self) -> bool {
        self.distributed_transactions
    }
}

/// One open connection per member slice.
pub struct DistributedConnection {
    connections: Vec<(String, Box<dyn Connection>)>,
}

impl DistributedConnection {
    /// Slice names of the open connections, in order.
    pub fn slice_names(&self) -> Vec<&str> {
        self.connections.iter().map(|(s, _)| s.as_str()).collect()
    }

    fn close_all(&mut self) -> BackendResult<()> {
        let mut first_error = None;
        for (slice, conn) in self.connections.drain(..) {
            if let Err(e) = conn.close() {
                debug!(slice = %slice, error = %e, "Failed to close slice connection");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl fmt::Debug for DistributedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributedConnection")
            .field("slices", &self.slice_names())
            .finish()
    }
}

impl Connection for DistributedConnection {
    fn close(mut self: Box<Self>) -> BackendResult<()> {
        self.close_all()
    }
}

impl Drop for DistributedConnection {
    fn drop(&mut self) {
        let _ = self.close_all();
    }
}
