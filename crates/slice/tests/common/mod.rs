//! Shared fixtures for the slice configuration integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use helios_slice::backends::{MemoryProvider, MemoryTarget};
use helios_slice::{DistributedConfiguration, Properties, SliceResult};

/// Connection URL used for a slice in the fixtures.
pub fn url(slice: &str) -> String {
    format!("mem:{}", slice)
}

/// Properties declaring the given slices explicitly, each with its own URL.
pub fn slice_properties(names: &[&str]) -> Properties {
    let mut props = Properties::new().with("helios.slice.Names", names.join(","));
    for name in names {
        props.insert(format!("helios.slice.{}.ConnectionURL", name), url(name));
    }
    props
}

/// A provider where the listed slices are reachable and everything else refuses.
pub fn provider_with(reachable: &[&str]) -> MemoryProvider {
    reachable.iter().fold(MemoryProvider::new(), |provider, name| {
        provider.with_target(url(name), MemoryTarget::reachable())
    })
}

/// Builds a configuration over a memory provider.
pub fn configure(
    props: Properties,
    provider: &MemoryProvider,
) -> SliceResult<DistributedConfiguration> {
    DistributedConfiguration::new(props, Arc::new(provider.clone()))
}
