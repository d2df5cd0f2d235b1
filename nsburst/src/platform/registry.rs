//! Product name lookup over the static topology tables.

use log::debug;

use super::topology::{COUNTER_COMMANDS, CounterCommand, TOPOLOGIES, Topology};
use crate::error::{PlatformError, Result};

/// A recognized product: its topology and how to query its counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    /// Product name as reported by the device.
    pub product: &'static str,

    /// ASIC and QMU ids to walk.
    pub topology: Topology,

    /// Packet-count command form.
    pub command: CounterCommand,
}

/// Read-only view over the built-in platform tables.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlatformRegistry;

impl PlatformRegistry {
    /// Get the built-in registry.
    pub fn global() -> &'static PlatformRegistry {
        static REGISTRY: PlatformRegistry = PlatformRegistry;
        &REGISTRY
    }

    /// Resolve a product name (exact match).
    pub fn resolve(&self, product: &str) -> Result<Platform> {
        self.get(product).ok_or_else(|| {
            debug!("no topology for product {:?}", product);
            PlatformError::UnknownPlatform {
                product: product.to_string(),
            }
            .into()
        })
    }

    /// Look up a product name, `None` if it is not supported.
    pub fn get(&self, product: &str) -> Option<Platform> {
        let (name, topology) = TOPOLOGIES.iter().find(|(name, _)| *name == product)?;
        let (_, command) = COUNTER_COMMANDS.iter().find(|(name, _)| *name == product)?;
        Some(Platform {
            product: *name,
            topology: *topology,
            command: *command,
        })
    }

    /// Check if a product is supported.
    pub fn contains(&self, product: &str) -> bool {
        self.get(product).is_some()
    }

    /// List all supported product names.
    pub fn products(&self) -> impl Iterator<Item = &'static str> {
        TOPOLOGIES.iter().map(|(name, _)| *name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_multi_asic() {
        let platform = PlatformRegistry::global().resolve("NetScreen-5400-III").unwrap();
        assert_eq!(platform.topology.asic_ids, &[1, 2, 3, 4, 5, 6]);
        assert_eq!(platform.topology.qmu_ids, &[1, 2, 4, 6, 7, 9]);
        assert_eq!(platform.command, CounterCommand::Ns5400III);
    }

    #[test]
    fn test_resolve_single_asic() {
        let platform = PlatformRegistry::global().resolve("NetScreen-2000").unwrap();
        assert_eq!(platform.topology.asic_ids, &[0]);
        assert_eq!(platform.command, CounterCommand::SingleAsic);
    }

    #[test]
    fn test_resolve_is_exact() {
        let registry = PlatformRegistry::global();
        assert!(!registry.contains("netscreen-2000"));
        assert!(!registry.contains("NetScreen-2000 "));
        let err = registry.resolve("SSG-550M").unwrap_err();
        assert!(err.to_string().contains("SSG-550M"));
    }

    #[test]
    fn test_products() {
        let products: Vec<_> = PlatformRegistry::global().products().collect();
        assert_eq!(products.len(), 4);
        assert!(products.contains(&"NetScreen-1000"));
    }
}
