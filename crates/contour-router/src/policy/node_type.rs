use std::fmt;
use std::sync::Arc;

use contour_store::StoreHandle;
use contour_types::{ContentAddress, QName, RoutingCriteria};

use super::{build_registry, ReservedRoutes, RouteProperties, RouteTable, RoutingPolicy};
use crate::config::{MigrationSettings, StoreCatalog, TypePolicyConfig};
use crate::error::ConfigError;
use crate::hierarchy::TypeHierarchy;
use crate::registry::StoreRegistry;

pub const TYPE_TAG: &str = "type";

/// Routes content by node type, using the nearest mapped ancestor type.
pub struct TypePolicy {
    types: RouteTable,
    hierarchy: Arc<dyn TypeHierarchy>,
    reserved: ReservedRoutes,
    registry: Arc<StoreRegistry>,
    route_properties: RouteProperties,
    migration: MigrationSettings,
}

impl TypePolicy {
    pub fn from_config(
        config: &TypePolicyConfig,
        catalog: &StoreCatalog,
        hierarchy: Arc<dyn TypeHierarchy>,
    ) -> Result<Self, ConfigError> {
        if config.type_stores.is_empty() {
            return Err(ConfigError::EmptyMapping(TYPE_TAG.to_string()));
        }
        let fallback_store = catalog.fallback(&config.fallback_store)?;
        let types = RouteTable::build(TYPE_TAG, &config.type_stores, catalog)?;
        let reserved = ReservedRoutes::build(TYPE_TAG, &fallback_store)?;
        let registry = build_registry(types.stores(), &fallback_store);
        Ok(Self {
            types,
            hierarchy,
            reserved,
            registry,
            route_properties: RouteProperties::new(config.route_properties.clone()),
            migration: config.migration.clone(),
        })
    }

    /// Nearest type in the ancestry of `node_type` that has a mapping.
    pub fn mapped_type(&self, node_type: &QName) -> Option<QName> {
        self.hierarchy
            .ancestry(node_type)
            .into_iter()
            .find(|candidate| self.types.get(candidate.as_str()).is_some())
    }

    /// Store for `node_type`: the nearest mapped route, else the fallback
    /// route.
    pub fn route_for_type(&self, node_type: &QName) -> StoreHandle {
        self.mapped_type(node_type)
            .and_then(|mapped| self.types.get(mapped.as_str()).cloned())
            .unwrap_or_else(|| self.reserved.fallback_route().clone())
    }

    pub fn route_properties(&self) -> &RouteProperties {
        &self.route_properties
    }
}

impl RoutingPolicy for TypePolicy {
    fn name(&self) -> &str {
        TYPE_TAG
    }

    fn is_routable(&self, criteria: &RoutingCriteria, property: Option<&QName>) -> bool {
        self.route_properties.admits(property) && criteria.node_type.is_some()
    }

    fn lookup(&self, criteria: &RoutingCriteria) -> Option<StoreHandle> {
        let mapped = self.mapped_type(criteria.node_type.as_ref()?)?;
        self.types.get(mapped.as_str()).cloned()
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
        self.types
            .narrow(address, self.registry.fallback())
            .unwrap_or_else(|| self.registry.all_stores().to_vec())
    }
}

impl fmt::Debug for TypePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypePolicy")
            .field("types", &self.types)
            .field("route_properties", &self.route_properties)
            .field("migration", &self.migration)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::InMemoryTypeHierarchy;
    use contour_store::{same_store, InMemoryBackingStore};

    fn policy() -> TypePolicy {
        let catalog = StoreCatalog::new()
            .with("records", Arc::new(InMemoryBackingStore::new("records", "rec")))
            .unwrap()
            .with("default", Arc::new(InMemoryBackingStore::new("default", "def")))
            .unwrap();
        let hierarchy = InMemoryTypeHierarchy::new()
            .with_type("cm:content", "cm:cmobject")
            .with_type("acme:record", "cm:content")
            .with_type("acme:invoice", "acme:record");
        let config = TypePolicyConfig {
            type_stores: [(QName::new("acme:record"), "records".to_string())].into(),
            fallback_store: "default".to_string(),
            ..Default::default()
        };
        TypePolicy::from_config(&config, &catalog, Arc::new(hierarchy)).unwrap()
    }

    #[test]
    fn subtypes_inherit_the_mapping() {
        let policy = policy();
        assert_eq!(
            policy.mapped_type(&QName::new("acme:invoice")),
            Some(QName::new("acme:record"))
        );
        let criteria = RoutingCriteria::new().with_node_type(QName::new("acme:invoice"));
        assert_eq!(policy.lookup(&criteria).unwrap().name(), "records[type/acme:record]");
    }

    #[test]
    fn unmapped_types_use_the_fallback_route() {
        let policy = policy();
        assert!(policy.mapped_type(&QName::new("cm:content")).is_none());
        assert!(same_store(
            &policy.route_for_type(&QName::new("cm:content")),
            policy.reserved_routes().fallback_route()
        ));
        assert!(same_store(
            &policy.route_for_type(&QName::new("acme:record")),
            &policy.route_for_type(&QName::new("acme:invoice"))
        ));
    }

    #[test]
    fn routable_only_with_a_type() {
        let policy = policy();
        assert!(!policy.is_routable(&RoutingCriteria::new(), None));
        assert!(policy.is_routable(
            &RoutingCriteria::new().with_node_type(QName::new("cm:content")),
            None
        ));
    }
}
