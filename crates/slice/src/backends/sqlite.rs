//! SQLite backend provider.
//!
//! Targets are addressed as `sqlite:<path>` or `sqlite::memory:`, or by a
//! plain path when the driver name is `sqlite`. Files are opened read-write
//! and must already exist unless the connection properties contain
//! `create=true`, so a misconfigured path makes the slice inactive instead of
//! silently creating an empty database.

use std::fmt::Debug;
use std::sync::Arc;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;

use crate::backend::{BackendConfig, BackendProvider, Connection, ConnectionFactory};
use crate::error::{BackendError, BackendResult};

/// URL scheme handled by this provider.
pub const SCHEME: &str = "sqlite:";

/// Driver name handled by this provider.
pub const DRIVER_NAME: &str = "sqlite";

/// In-memory database location.
pub const MEMORY: &str = ":memory:";

fn default_max_connections() -> u32 {
    4
}

/// Provider of pooled SQLite connection factories.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteProvider;

impl SqliteProvider {
    /// Creates the provider.
    pub fn new() -> Self {
        Self
    }

    /// Resolves the database location of a configuration.
    pub fn location(config: &BackendConfig) -> BackendResult<String> {
        let driver_is_sqlite = config
            .connection_driver_name
            .as_deref()
            .is_some_and(|d| d.eq_ignore_ascii_case(DRIVER_NAME));

        match config.connection_url.as_deref() {
            Some(url) if url.starts_with(SCHEME) => Ok(url[SCHEME.len()..].to_string()),
            Some(url) if driver_is_sqlite => Ok(url.to_string()),
            _ => Err(BackendError::UnsupportedDriver {
                driver: config.connection_info(),
            }),
        }
    }
}

impl BackendProvider for SqliteProvider {
    fn connection_factory(
        &self,
        config: &BackendConfig,
    ) -> BackendResult<Arc<dyn ConnectionFactory>> {
        let location = Self::location(config)?;
        let options = config.connection_property_map();
        let create = options
            .get("create")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        let max_connections = match options.get("max_connections") {
            Some(v) => v.parse::<u32>().map_err(|e| BackendError::Internal {
                backend_name: "sqlite".to_string(),
                message: format!("invalid max_connections \"{}\"", v),
                source: Some(Box::new(e)),
            })?,
            None => default_max_connections(),
        };

        let manager = if location == MEMORY {
            SqliteConnectionManager::memory()
        } else {
            let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX;
            if create {
                flags |= OpenFlags::SQLITE_OPEN_CREATE;
            }
            SqliteConnectionManager::file(&location).with_flags(flags)
        };

        // Connections are established on demand, bounded by the timeout.
        let pool = Pool::builder()
            .max_size(max_connections.max(1))
            .min_idle(Some(0))
            .connection_timeout(config.connect_timeout)
            .build_unchecked(manager);

        Ok(Arc::new(SqliteConnectionFactory {
            target: config.connection_info(),
            pool,
        }))
    }
}

/// Pooled SQLite connection factory.
pub struct SqliteConnectionFactory {
    target: String,
    pool: Pool<SqliteConnectionManager>,
}

impl Debug for SqliteConnectionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnectionFactory")
            .field("target", &self.target)
            .field("max_size", &self.pool.max_size())
            .finish_non_exhaustive()
    }
}

impl SqliteConnectionFactory {
    /// Checks out a pooled connection.
    pub fn get(&self) -> BackendResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| BackendError::ConnectionFailed {
            target: self.target.clone(),
            message: e.to_string(),
        })
    }
}

impl ConnectionFactory for SqliteConnectionFactory {
    fn connection(&self) -> BackendResult<Option<Box<dyn Connection>>> {
        let conn = self.get()?;
        Ok(Some(Box::new(SqliteConnection(conn))))
    }
}

struct SqliteConnection(PooledConnection<SqliteConnectionManager>);

impl Connection for SqliteConnection {
    fn close(self: Box<Self>) -> BackendResult<()> {
        // returning the connection to the pool
        drop(self.0);
        Ok(())
    }
}
