//! Backend provider implementations.
//!
//! - [`memory`] - simulated in-process targets
//! - [`sqlite`] - pooled SQLite connections (feature `sqlite`)

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::{MemoryBehavior, MemoryProvider, MemoryTarget};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteProvider;
