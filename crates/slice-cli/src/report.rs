//! Slice configuration report.

use std::fmt::Write;

use helios_slice::{ConnectionFactory, DistributedConfiguration, SliceStatus};
use serde::Serialize;

/// State of one slice.
#[derive(Debug, Clone, Serialize)]
pub struct SliceReport {
    pub name: String,
    pub id: String,
    pub target: String,
    pub status: SliceStatus,
    pub master: bool,
}

/// The composite connection factory, once built.
#[derive(Debug, Clone, Serialize)]
pub struct CompositeReport {
    pub slices: Vec<String>,
    pub distributed_transactions: bool,
}

/// Everything `hsc` reports about a configuration.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub unit: String,
    pub root: String,
    pub master: String,
    pub lenient: bool,
    pub executor: String,
    pub policy: String,
    pub slices: Vec<SliceReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composite: Option<CompositeReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Report {
    /// Collects the report, building the composite first when `verify` is set.
    pub fn collect(config: &DistributedConfiguration, verify: bool) -> Self {
        let (composite, error) = if verify {
            match config.connection_factory() {
                Ok(composite) => (
                    Some(CompositeReport {
                        slices: composite.slice_names(),
                        distributed_transactions: composite.supports_distributed_transactions(),
                    }),
                    None,
                ),
                Err(e) => (None, Some(e.to_string())),
            }
        } else {
            (None, None)
        };

        let master = config.master();
        let slices = config
            .slices(None)
            .iter()
            .map(|slice| SliceReport {
                name: slice.name().to_string(),
                id: slice.config().id().to_string(),
                target: slice.config().connection_info(),
                status: slice.status(),
                master: slice.name() == master.name(),
            })
            .collect();

        Self {
            unit: config.persistence_unit().to_string(),
            root: config.namespace().root().to_string(),
            master: master.name().to_string(),
            lenient: config.is_lenient(),
            executor: config.executor().to_string(),
            policy: config.distribution_policy_name().to_string(),
            slices,
            composite,
            error,
        }
    }

    /// Whether verification failed.
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    /// Renders the report as JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Renders the report as text.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "unit:     {}", self.unit);
        let _ = writeln!(out, "root:     {}", self.root);
        let _ = writeln!(
            out,
            "policy:   {} (lenient: {}, executor: {})",
            self.policy, self.lenient, self.executor
        );
        let _ = writeln!(out, "slices:");
        for slice in &self.slices {
            let marker = if slice.master { "*" } else { " " };
            let _ = writeln!(
                out,
                "  {} {:<16} {:<14} {}",
                marker, slice.name, slice.status, slice.target
            );
        }
        match (&self.composite, &self.error) {
            (Some(composite), _) => {
                let _ = writeln!(
                    out,
                    "composite: {} (distributed transactions: {})",
                    composite.slices.join(", "),
                    if composite.distributed_transactions {
                        "yes"
                    } else {
                        "no"
                    }
                );
            }
            (None, Some(error)) => {
                let _ = writeln!(out, "error:    {}", error);
            }
            (None, None) => {
                let _ = writeln!(out, "composite: not verified");
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use helios_slice::Properties;
    use helios_slice::backends::{MemoryProvider, MemoryTarget};

    use super::*;

    fn config(lenient: bool) -> DistributedConfiguration {
        let provider = MemoryProvider::new().with_target("u1", MemoryTarget::reachable());
        let props = Properties::new()
            .with("helios.slice.Names", "east,west")
            .with("helios.slice.Master", "west")
            .with("helios.slice.Lenient", lenient.to_string())
            .with("helios.slice.east.ConnectionURL", "u1")
            .with("helios.slice.west.ConnectionURL", "u2")
            .with("helios.Id", "orders");
        DistributedConfiguration::new(props, Arc::new(provider)).unwrap()
    }

    #[test]
    fn test_report_without_verification() {
        let report = Report::collect(&config(true), false);

        assert_eq!(report.unit, "orders");
        assert_eq!(report.master, "west");
        assert!(report.composite.is_none());
        assert!(!report.is_failure());
        assert!(
            report
                .slices
                .iter()
                .all(|s| s.status == SliceStatus::Uninitialized)
        );
        assert!(report.to_text().contains("not verified"));
    }

    #[test]
    fn test_report_lenient_verification() {
        let report = Report::collect(&config(true), true);

        let composite = report.composite.as_ref().unwrap();
        assert_eq!(composite.slices, vec!["east"]);
        assert_eq!(report.slices[1].status, SliceStatus::Inactive);
        assert!(report.slices[1].master);

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["slices"][0]["status"], "active");
        assert_eq!(json["slices"][0]["id"], "orders.east");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_report_strict_failure() {
        let report = Report::collect(&config(false), true);

        assert!(report.is_failure());
        assert!(report.error.as_deref().unwrap().contains("\"west\""));
        assert!(report.to_text().contains("error:"));
    }
}
