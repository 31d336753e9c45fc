//! Error types for slice configuration.
//!
//! [`SliceError`] covers every failure of the discovery, verification,
//! composition and lookup pipeline. [`BackendError`] is the error reported by
//! backend collaborators (connection factories and providers).

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use std::sync::Arc;

use thiserror::Error;

/// Shared, cloneable cause of a connection failure.
pub type SharedCause = Arc<dyn std::error::Error + Send + Sync>;

/// The primary error type for slice configuration.
///
/// Errors are cloneable so a memoized outcome can be handed to every caller
/// of [`DistributedConfiguration::connection_factory`](crate::DistributedConfiguration::connection_factory).
#[derive(Error, Debug, Clone)]
pub enum SliceError {
    /// No slice names were found in the namespace.
    #[error("no slice configured: set {names_key} or provide keys of the form {slice_prefix}<name>.<property>")]
    Discovery {
        names_key: String,
        slice_prefix: String,
    },

    /// A slice could not be connected while the configuration is strict.
    #[error("slice \"{slice}\" can not connect to \"{target}\": {source}")]
    Connectivity {
        slice: String,
        target: String,
        #[source]
        source: SharedCause,
    },

    /// Every slice failed verification.
    #[error("no usable slice: every configured slice failed to connect")]
    EmptyComposite,

    /// Lookup of an unknown slice name.
    #[error("slice \"{name}\" not found, active slices are {active:?}")]
    SliceNotFound { name: String, active: Vec<String> },

    /// A control property holds a value that can not be interpreted.
    #[error("invalid value \"{value}\" for {key}: expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    /// The configured distribution policy is not registered.
    #[error("unknown distribution policy \"{name}\", registered policies are {available:?}")]
    UnknownPolicy {
        name: String,
        available: Vec<String>,
    },
}

/// Errors reported by backend collaborators.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Connection to the backend failed.
    #[error("connection failed to {target}: {message}")]
    ConnectionFailed { target: String, message: String },

    /// The backend returned no connection.
    #[error("no connection returned by {target}")]
    NoConnection { target: String },

    /// No provider knows how to reach this backend.
    #[error("unsupported driver \"{driver}\"")]
    UnsupportedDriver { driver: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Result type alias for slice configuration.
pub type SliceResult<T> = Result<T, SliceError>;

/// Result type alias for backend collaborators.
pub type BackendResult<T> = Result<T, BackendError>;
