use std::sync::Arc;

use contour_store::StoreHandle;
use contour_types::{ContentAddress, QName, RoutingCriteria};

use super::{build_registry, ReservedRoutes, RouteTable, RoutingPolicy};
use crate::config::{MigrationSettings, StoreCatalog, TenantPolicyConfig};
use crate::error::ConfigError;
use crate::registry::StoreRegistry;

pub const TENANT_TAG: &str = "tenant";

/// Routes content by tenant domain.
///
/// Writes in the default (unnamed) tenant domain are not routable. Tenants
/// never move between domains, so this policy never migrates content.
#[derive(Debug)]
pub struct TenantPolicy {
    tenants: RouteTable,
    reserved: ReservedRoutes,
    registry: Arc<StoreRegistry>,
    migration: MigrationSettings,
}

impl TenantPolicy {
    pub fn from_config(config: &TenantPolicyConfig, catalog: &StoreCatalog) -> Result<Self, ConfigError> {
        if config.tenant_stores.is_empty() {
            return Err(ConfigError::EmptyMapping(TENANT_TAG.to_string()));
        }
        let fallback_store = catalog.fallback(&config.fallback_store)?;
        let tenants = RouteTable::build(TENANT_TAG, &config.tenant_stores, catalog)?;
        let reserved = ReservedRoutes::build(TENANT_TAG, &fallback_store)?;
        let registry = build_registry(tenants.stores(), &fallback_store);
        Ok(Self {
            tenants,
            reserved,
            registry,
            migration: MigrationSettings::default(),
        })
    }

    fn tenant(criteria: &RoutingCriteria) -> Option<&str> {
        criteria.tenant.as_deref().filter(|tenant| !tenant.is_empty())
    }
}

impl RoutingPolicy for TenantPolicy {
    fn name(&self) -> &str {
        TENANT_TAG
    }

    fn is_routable(&self, criteria: &RoutingCriteria, _property: Option<&QName>) -> bool {
        Self::tenant(criteria).is_some()
    }

    fn lookup(&self, criteria: &RoutingCriteria) -> Option<StoreHandle> {
        Self::tenant(criteria).and_then(|tenant| self.tenants.get(tenant).cloned())
    }

    fn reserved_routes(&self) -> &ReservedRoutes {
        &self.reserved
    }

    fn registry(&self) -> &Arc<StoreRegistry> {
        &self.registry
    }

    fn migration_settings(&self) -> &MigrationSettings {
        &self.migration
    }

    fn candidate_stores(&self, address: &ContentAddress) -> Vec<StoreHandle> {
        self.tenants
            .narrow(address, self.registry.fallback())
            .unwrap_or_else(|| self.registry.all_stores().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contour_store::{same_store, InMemoryBackingStore};

    fn policy() -> TenantPolicy {
        let catalog = StoreCatalog::new()
            .with("acme", Arc::new(InMemoryBackingStore::new("acme", "acme")))
            .unwrap()
            .with("shared", Arc::new(InMemoryBackingStore::new("shared", "shared")))
            .unwrap();
        let config = TenantPolicyConfig {
            tenant_stores: [("acme.com".to_string(), "acme".to_string())].into(),
            fallback_store: "shared".to_string(),
        };
        TenantPolicy::from_config(&config, &catalog).unwrap()
    }

    #[test]
    fn default_domain_is_not_routable() {
        let policy = policy();
        assert!(!policy.is_routable(&RoutingCriteria::new(), None));
        assert!(!policy.is_routable(&RoutingCriteria::new().with_tenant(""), None));
        assert!(policy.is_routable(&RoutingCriteria::new().with_tenant("other.org"), None));
    }

    #[test]
    fn lookup_by_tenant() {
        let policy = policy();
        let store = policy
            .lookup(&RoutingCriteria::new().with_tenant("acme.com"))
            .unwrap();
        assert_eq!(store.name(), "acme[tenant/acme.com]");
        assert!(policy
            .lookup(&RoutingCriteria::new().with_tenant("other.org"))
            .is_none());
    }

    #[test]
    fn narrowing_is_tenant_store_plus_fallback() {
        let policy = policy();
        let address = ContentAddress::parse("acme://_rp2/tenant/acme.com/x").unwrap();
        let candidates = policy.candidate_stores(&address);
        assert_eq!(candidates.len(), 2);
        assert!(same_store(&candidates[1], policy.registry().fallback()));

        let plain = ContentAddress::parse("acme://x").unwrap();
        assert_eq!(policy.candidate_stores(&plain).len(), policy.registry().len());
    }

    #[test]
    fn empty_mapping_is_rejected() {
        let catalog = StoreCatalog::new()
            .with("shared", Arc::new(InMemoryBackingStore::new("shared", "shared")))
            .unwrap();
        let config = TenantPolicyConfig {
            tenant_stores: Default::default(),
            fallback_store: "shared".to_string(),
        };
        assert!(matches!(
            TenantPolicy::from_config(&config, &catalog),
            Err(ConfigError::EmptyMapping(_))
        ));
    }
}
