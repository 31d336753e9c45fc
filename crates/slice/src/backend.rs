//! Single-backend configuration and connection abstractions.
//!
//! Every slice owns one [`BackendConfig`], built from its partitioned
//! namespace. A [`BackendProvider`] turns that configuration into a
//! [`ConnectionFactory`], which the verifier probes and the composite handle
//! aggregates.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{BackendResult, SliceError, SliceResult};
use crate::namespace::Namespace;
use crate::properties::Properties;

/// Backend property keys, relative to the namespace root.
pub mod keys {
    /// Configuration identity (the persistence unit name at the global level).
    pub const ID: &str = "Id";
    /// Connection URL.
    pub const CONNECTION_URL: &str = "ConnectionURL";
    /// Driver name, used when no URL is given.
    pub const CONNECTION_DRIVER_NAME: &str = "ConnectionDriverName";
    /// Driver-specific `key=value` list, comma separated.
    pub const CONNECTION_PROPERTIES: &str = "ConnectionProperties";
    /// User name.
    pub const CONNECTION_USER_NAME: &str = "ConnectionUserName";
    /// Password. Never written by [`BackendConfig::to_properties`] unless asked.
    pub const CONNECTION_PASSWORD: &str = "ConnectionPassword";
    /// Bound on a single connection attempt, in milliseconds.
    pub const CONNECT_TIMEOUT: &str = "ConnectTimeout";
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

/// Configuration for one backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    root: String,
    id: String,
    /// Connection URL.
    pub connection_url: Option<String>,
    /// Driver name.
    pub connection_driver_name: Option<String>,
    /// Driver-specific connection properties.
    pub connection_properties: Option<String>,
    /// User name.
    pub connection_user_name: Option<String>,
    /// Password.
    pub connection_password: Option<String>,
    /// Bound on a single connection attempt.
    pub connect_timeout: Duration,
    /// Every other property, kept verbatim.
    pub extra: Properties,
}

impl BackendConfig {
    /// Creates an empty configuration under the given namespace.
    pub fn new(namespace: &Namespace) -> Self {
        Self {
            root: namespace.root().to_string(),
            id: String::new(),
            connection_url: None,
            connection_driver_name: None,
            connection_properties: None,
            connection_user_name: None,
            connection_password: None,
            connect_timeout: Duration::from_millis(default_connect_timeout_ms()),
            extra: Properties::new(),
        }
    }

    /// Builds a configuration from a flat namespace.
    ///
    /// Recognised `<root>.<key>` properties populate the typed fields;
    /// everything else lands in [`extra`](Self::extra).
    pub fn from_properties(namespace: &Namespace, props: &Properties) -> SliceResult<Self> {
        let mut config = Self::new(namespace);
        for (key, value) in props.iter() {
            let Some(property) = key.strip_prefix(namespace.global_prefix()) else {
                config.extra.insert(key, value);
                continue;
            };
            match property {
                keys::ID => config.id = value.to_string(),
                keys::CONNECTION_URL => config.connection_url = Some(value.to_string()),
                keys::CONNECTION_DRIVER_NAME => {
                    config.connection_driver_name = Some(value.to_string())
                }
                keys::CONNECTION_PROPERTIES => {
                    config.connection_properties = Some(value.to_string())
                }
                keys::CONNECTION_USER_NAME => {
                    config.connection_user_name = Some(value.to_string())
                }
                keys::CONNECTION_PASSWORD => config.connection_password = Some(value.to_string()),
                keys::CONNECT_TIMEOUT => {
                    let millis = value.trim().parse::<u64>().map_err(|_| {
                        SliceError::InvalidValue {
                            key: key.to_string(),
                            value: value.to_string(),
                            expected: "a timeout in milliseconds",
                        }
                    })?;
                    config.connect_timeout = Duration::from_millis(millis);
                }
                _ => {
                    config.extra.insert(key, value);
                }
            }
        }
        Ok(config)
    }

    /// Serializes the configuration back to a flat namespace.
    ///
    /// The password is only included when `include_secrets` is set.
    pub fn to_properties(&self, include_secrets: bool) -> Properties {
        let key = |property: &str| format!("{}.{}", self.root, property);
        let mut props = self.extra.clone();
        if !self.id.is_empty() {
            props.insert(key(keys::ID), self.id.as_str());
        }
        let typed = [
            (keys::CONNECTION_URL, &self.connection_url),
            (keys::CONNECTION_DRIVER_NAME, &self.connection_driver_name),
            (keys::CONNECTION_PROPERTIES, &self.connection_properties),
            (keys::CONNECTION_USER_NAME, &self.connection_user_name),
        ];
        for (property, value) in typed {
            if let Some(value) = value {
                props.insert(key(property), value.as_str());
            }
        }
        if include_secrets {
            if let Some(password) = &self.connection_password {
                props.insert(key(keys::CONNECTION_PASSWORD), password.as_str());
            }
        }
        props.insert(
            key(keys::CONNECT_TIMEOUT),
            self.connect_timeout.as_millis().to_string(),
        );
        props
    }

    /// Configuration identity.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sets the configuration identity.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Human-readable connection target used in logs and errors.
    ///
    /// The URL when present, otherwise the driver name followed by the
    /// connection properties in parentheses.
    pub fn connection_info(&self) -> String {
        if let Some(url) = &self.connection_url {
            return url.clone();
        }
        match (&self.connection_driver_name, &self.connection_properties) {
            (Some(driver), Some(props)) => format!("{}({})", driver, props),
            (Some(driver), None) => driver.clone(),
            (None, _) => "<unknown>".to_string(),
        }
    }

    /// Parses [`connection_properties`](Self::connection_properties) as a
    /// comma-separated `key=value` list.
    pub fn connection_property_map(&self) -> BTreeMap<String, String> {
        self.connection_properties
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter_map(|pair| {
                let (k, v) = pair.split_once('=')?;
                let k = k.trim();
                (!k.is_empty()).then(|| (k.to_string(), v.trim().to_string()))
            })
            .collect()
    }
}

/// A live connection to one backend.
pub trait Connection: Send {
    /// Closes the connection.
    fn close(self: Box<Self>) -> BackendResult<()>;
}

/// Produces connections to one backend.
pub trait ConnectionFactory: Send + Sync + Debug {
    /// Opens a connection. `Ok(None)` means the backend handed back nothing.
    fn connection(&self) -> BackendResult<Option<Box<dyn Connection>>>;

    /// Whether the innermost resource takes part in distributed transactions.
    fn supports_distributed_transactions(&self) -> bool {
        false
    }
}

/// Builds connection factories for backend configurations.
pub trait BackendProvider: Send + Sync {
    /// Builds a raw connection factory.
    fn connection_factory(&self, config: &BackendConfig)
    -> BackendResult<Arc<dyn ConnectionFactory>>;

    /// Wraps a raw factory with dialect-aware behavior.
    ///
    /// A decorator must report the capability of the factory it wraps.
    fn decorate(
        &self,
        _config: &BackendConfig,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Arc<dyn ConnectionFactory> {
        factory
    }
}
