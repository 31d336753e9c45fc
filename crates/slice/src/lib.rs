//! Helios Slice Configuration
//!
//! This crate turns one flat namespace of `key=value` properties into a set of
//! named *slices*, each an independent backend, and composes the reachable
//! slices into a single virtual connection factory.
//!
//! # Features
//!
//! - **Namespace partitioning**: every slice sees a private namespace where its
//!   own `<root>.slice.<name>.<prop>` keys override the global `<root>.<prop>`
//! - **Discovery**: explicit `<root>.slice.Names` list, or a scan of slice keys
//! - **Verification**: each slice is probed once, sequentially or in parallel,
//!   under a lenient or strict policy
//! - **Composition**: one [`DistributedConnectionFactory`] over the active
//!   slices, built exactly once and shared between callers
//! - **Master election**: a designated slice for data that is not distributed
//!
//! # Backend Features
//!
//! - `sqlite` (default) - pooled SQLite backends addressed as `sqlite:<path>`
//!
//! An in-memory provider is always available in [`backends::memory`].
//!
//! # Property Grammar
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `helios.slice.Names` | Comma-separated slice names, in order |
//! | `helios.slice.Master` | Name of the master slice |
//! | `helios.slice.Lenient` | Exclude unreachable slices instead of failing |
//! | `helios.slice.ExecutorService` | `sequential` or `parallel` verification |
//! | `helios.slice.DistributionPolicy` | Registered distribution policy name |
//! | `helios.slice.<name>.<prop>` | `<prop>` for slice `<name>` only |
//! | `helios.<prop>` | `<prop>` for every slice that does not override it |
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use helios_slice::backends::{MemoryProvider, MemoryTarget};
//! use helios_slice::{DistributedConfiguration, Properties, SliceStatus};
//!
//! let provider = MemoryProvider::new()
//!     .with_target("mem:east", MemoryTarget::reachable())
//!     .with_target("mem:west", MemoryTarget::refusing());
//!
//! let props = Properties::parse(
//!     "helios.slice.Names = east, west\n\
//!      helios.slice.Lenient = true\n\
//!      helios.slice.east.ConnectionURL = mem:east\n\
//!      helios.slice.west.ConnectionURL = mem:west\n",
//! );
//!
//! let config = DistributedConfiguration::new(props, Arc::new(provider))?;
//! let composite = config.connection_factory()?;
//!
//! assert_eq!(composite.slice_names(), vec!["east"]);
//! assert_eq!(config.slice("west")?.status(), SliceStatus::Inactive);
//! # Ok::<(), helios_slice::SliceError>(())
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backend;
pub mod backends;
pub mod composite;
pub mod config;
pub mod error;
pub mod namespace;
pub mod policy;
pub mod properties;
pub mod registry;
pub mod slice;
pub mod verify;

// Re-export commonly used types at crate root
pub use backend::{BackendConfig, BackendProvider, Connection, ConnectionFactory};
pub use composite::{CompositeMember, DistributedConnection, DistributedConnectionFactory};
pub use config::{DistributedConfiguration, DistributedConfigurationBuilder};
pub use error::{BackendError, BackendResult, SliceError, SliceResult};
pub use namespace::{Namespace, SliceKey};
pub use policy::{DistributionPolicy, PolicyRegistry};
pub use properties::Properties;
pub use registry::SliceRegistry;
pub use slice::{Slice, SliceStatus};
pub use verify::{ConnectResult, ExecutorMode, Verifier};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
