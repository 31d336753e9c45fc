//! Distributed configuration over a set of slices.
//!
//! [`DistributedConfiguration`] is built once from a flat [`Properties`]
//! namespace. Construction discovers the slices, builds one backend
//! configuration per slice and elects the master. The composite connection
//! factory is built lazily on first request, exactly once.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use helios_slice::backends::{MemoryProvider, MemoryTarget};
//! use helios_slice::{DistributedConfiguration, Properties, SliceStatus};
//!
//! let provider = MemoryProvider::new()
//!     .with_target("u1", MemoryTarget::reachable())
//!     .with_target("u2", MemoryTarget::reachable());
//!
//! let props = Properties::new()
//!     .with("helios.slice.Names", "east,west")
//!     .with("helios.slice.east.ConnectionURL", "u1")
//!     .with("helios.slice.west.ConnectionURL", "u2")
//!     .with("helios.ConnectionDriverName", "D");
//!
//! let config = DistributedConfiguration::new(props, Arc::new(provider))?;
//! assert_eq!(config.master().name(), "east");
//!
//! let composite = config.connection_factory()?;
//! assert_eq!(composite.slice_names(), vec!["east", "west"]);
//! assert_eq!(config.slice("west")?.status(), SliceStatus::Active);
//! # Ok::<(), helios_slice::SliceError>(())
//! ```

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, info_span};

use crate::backend::{BackendConfig, BackendProvider, ConnectionFactory};
use crate::composite::{CompositeMember, DistributedConnectionFactory};
use crate::error::{SliceError, SliceResult};
use crate::namespace::{Namespace, control};
use crate::policy::{DistributionPolicy, MASTER_POLICY, PolicyRegistry};
use crate::properties::Properties;
use crate::registry::SliceRegistry;
use crate::slice::{Slice, SliceStatus};
use crate::verify::{ExecutorMode, Verifier};

/// Persistence unit name used when `<root>.Id` is not set.
pub const UNKNOWN_UNIT: &str = "?";

fn parse_flag(key: &str, value: &str) -> SliceResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(SliceError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected: "true or false",
        }),
    }
}

/// Builder for [`DistributedConfiguration`].
pub struct DistributedConfigurationBuilder {
    properties: Properties,
    namespace: Namespace,
    provider: Option<Arc<dyn BackendProvider>>,
    policies: PolicyRegistry,
}

impl DistributedConfigurationBuilder {
    /// Starts a builder over the given namespace.
    pub fn new(properties: Properties) -> Self {
        Self {
            properties,
            namespace: Namespace::default(),
            provider: None,
            policies: PolicyRegistry::with_builtins(),
        }
    }

    /// Uses a namespace root other than `helios`.
    pub fn root(mut self, root: impl Into<String>) -> Self {
        self.namespace = Namespace::new(root);
        self
    }

    /// Sets the backend provider.
    pub fn provider(mut self, provider: Arc<dyn BackendProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Replaces the distribution policy registry.
    pub fn policies(mut self, policies: PolicyRegistry) -> Self {
        self.policies = policies;
        self
    }

    /// Builds the configuration.
    ///
    /// Without an explicit provider, the SQLite provider is used when the
    /// `sqlite` feature is enabled, and the in-memory provider otherwise.
    pub fn build(self) -> SliceResult<DistributedConfiguration> {
        let provider = self.provider.unwrap_or_else(default_provider);
        DistributedConfiguration::assemble(self.properties, self.namespace, provider, self.policies)
    }
}

#[cfg(feature = "sqlite")]
fn default_provider() -> Arc<dyn BackendProvider> {
    Arc::new(crate::backends::SqliteProvider::new())
}

#[cfg(not(feature = "sqlite"))]
fn default_provider() -> Arc<dyn BackendProvider> {
    Arc::new(crate::backends::MemoryProvider::new())
}

/// A configuration of several slices composed into one virtual backend.
///
/// Immutable after construction apart from slice status, which only the
/// verifier writes, and the memoized composite, policy and active names.
pub struct DistributedConfiguration {
    namespace: Namespace,
    unit: String,
    global: BackendConfig,
    registry: SliceRegistry,
    master: Arc<Slice>,
    lenient: bool,
    executor: ExecutorMode,
    policy_name: String,
    provider: Arc<dyn BackendProvider>,
    policies: PolicyRegistry,
    policy: Mutex<Option<Arc<dyn DistributionPolicy>>>,
    composite: Mutex<Option<SliceResult<Arc<DistributedConnectionFactory>>>>,
    active_names: RwLock<Vec<String>>,
}

impl std::fmt::Debug for DistributedConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedConfiguration")
            .field("unit", &self.unit)
            .field("slices", &self.registry.names())
            .field("master", &self.master.name())
            .field("lenient", &self.lenient)
            .field("executor", &self.executor)
            .field("policy", &self.policy_name)
            .finish_non_exhaustive()
    }
}

impl DistributedConfiguration {
    /// Builds a configuration under the default `helios` root.
    pub fn new(properties: Properties, provider: Arc<dyn BackendProvider>) -> SliceResult<Self> {
        Self::builder(properties).provider(provider).build()
    }

    /// Starts a builder.
    pub fn builder(properties: Properties) -> DistributedConfigurationBuilder {
        DistributedConfigurationBuilder::new(properties)
    }

    fn assemble(
        properties: Properties,
        namespace: Namespace,
        provider: Arc<dyn BackendProvider>,
        policies: PolicyRegistry,
    ) -> SliceResult<Self> {
        let unit = properties
            .get(&namespace.global_key(crate::backend::keys::ID))
            .unwrap_or(UNKNOWN_UNIT)
            .to_string();
        let span = info_span!("slice_config", unit = %unit);
        let _enter = span.enter();

        let control_value = |name: &str| {
            let key = namespace.control_key(name);
            let value = properties.get(&key).map(str::to_string);
            (key, value)
        };

        let lenient = match control_value(control::LENIENT) {
            (key, Some(value)) => parse_flag(&key, &value)?,
            (_, None) => false,
        };
        let executor = match control_value(control::EXECUTOR_SERVICE) {
            (key, Some(value)) => {
                value
                    .parse::<ExecutorMode>()
                    .map_err(|_| SliceError::InvalidValue {
                        key,
                        value,
                        expected: "sequential or parallel",
                    })?
            }
            (_, None) => ExecutorMode::default(),
        };
        let policy_name = match control_value(control::DISTRIBUTION_POLICY) {
            (_, Some(value)) => value.trim().to_string(),
            (_, None) => MASTER_POLICY.to_string(),
        };

        let global =
            BackendConfig::from_properties(&namespace, &namespace.global_properties(&properties))?;

        let names = namespace.discover(&properties)?;
        let registry = SliceRegistry::build(&namespace, &properties, &unit, &names)?;

        let (master_key, master_value) = control_value(control::MASTER);
        let master = registry.elect_master(master_value.as_deref(), &master_key);
        info!(
            slices = ?registry.names(),
            master = %master,
            lenient,
            executor = ?executor,
            "Slice configuration ready"
        );

        drop(_enter);
        Ok(Self {
            namespace,
            unit,
            global,
            registry,
            master,
            lenient,
            executor,
            policy_name,
            provider,
            policies,
            policy: Mutex::new(None),
            composite: Mutex::new(None),
            active_names: RwLock::new(Vec::new()),
        })
    }

    /// The key grammar in use.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Persistence unit name (`<root>.Id`, or `?`).
    pub fn persistence_unit(&self) -> &str {
        &self.unit
    }

    /// Backend configuration built from the non-slice properties.
    pub fn global_config(&self) -> &BackendConfig {
        &self.global
    }

    /// Whether unreachable slices are tolerated.
    pub fn is_lenient(&self) -> bool {
        self.lenient
    }

    /// How slices are verified.
    pub fn executor(&self) -> ExecutorMode {
        self.executor
    }

    /// Slice names in discovery order.
    pub fn available_slice_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Names of the active slices, in discovery order.
    ///
    /// The list is memoized once it is non-empty.
    pub fn active_slice_names(&self) -> Vec<String> {
        {
            let cached = self.active_names.read();
            if !cached.is_empty() {
                return cached.clone();
            }
        }
        let mut cached = self.active_names.write();
        if cached.is_empty() {
            *cached = self
                .registry
                .with_status(&[SliceStatus::Active])
                .iter()
                .map(|s| s.name().to_string())
                .collect();
        }
        cached.clone()
    }

    /// Looks up a slice by name.
    pub fn slice(&self, name: &str) -> SliceResult<Arc<Slice>> {
        self.registry
            .get(name)
            .ok_or_else(|| SliceError::SliceNotFound {
                name: name.to_string(),
                active: self.active_slice_names(),
            })
    }

    /// Slices with one of the given statuses, or all slices for `None`, in
    /// discovery order.
    pub fn slices(&self, statuses: Option<&[SliceStatus]>) -> Vec<Arc<Slice>> {
        match statuses {
            Some(statuses) => self.registry.with_status(statuses),
            None => self.registry.slices().to_vec(),
        }
    }

    /// The master slice.
    pub fn master(&self) -> Arc<Slice> {
        Arc::clone(&self.master)
    }

    /// The composite connection factory over the reachable slices.
    ///
    /// The first call verifies every slice and composes the reachable ones.
    /// The outcome, success or failure, is cached; concurrent first callers
    /// wait for the single build and observe the same result.
    pub fn connection_factory(&self) -> SliceResult<Arc<DistributedConnectionFactory>> {
        let mut cell = self.composite.lock();
        if let Some(outcome) = cell.as_ref() {
            return outcome.clone();
        }
        let outcome = self.build_composite();
        *cell = Some(outcome.clone());
        outcome
    }

    fn build_composite(&self) -> SliceResult<Arc<DistributedConnectionFactory>> {
        let span = info_span!("slice_config", unit = %self.unit);
        let _enter = span.enter();

        let verified = Verifier::new(self.provider.as_ref(), self.lenient, self.executor)
            .verify(self.registry.slices())?;
        let members: Vec<CompositeMember> = verified.into_iter().map(Into::into).collect();
        let composite = DistributedConnectionFactory::new(members)?;
        info!(
            slices = ?composite.slice_names(),
            distributed_transactions = composite.supports_distributed_transactions(),
            "Composite connection factory ready"
        );
        Ok(Arc::new(composite))
    }

    /// The configured distribution policy, instantiated on first use.
    pub fn distribution_policy(&self) -> SliceResult<Arc<dyn DistributionPolicy>> {
        let mut cell = self.policy.lock();
        if let Some(policy) = cell.as_ref() {
            return Ok(Arc::clone(policy));
        }
        let policy = self.policies.create(&self.policy_name)?;
        debug!(policy = %self.policy_name, "Distribution policy instantiated");
        *cell = Some(Arc::clone(&policy));
        Ok(policy)
    }

    /// Name of the configured distribution policy.
    pub fn distribution_policy_name(&self) -> &str {
        &self.policy_name
    }
}
