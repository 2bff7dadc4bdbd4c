use std::sync::Arc;

use contour_store::StoreHandle;
use contour_types::{ContentAddress, QName, RoutingCriteria};

use super::{build_registry, ReservedRoutes, RouteProperties, RouteTable, RoutingPolicy};
use crate::config::{MigrationSettings, SelectorPolicyConfig, StoreCatalog};
use crate::error::ConfigError;
use crate::registry::StoreRegistry;

pub const SELECTOR_TAG: &str = "selector";

/// Routes content by the value of one text property on the node.
#[derive(Debug)]
pub struct SelectorPolicy {
    property: QName,
    values: RouteTable,
    reserved: ReservedRoutes,
    registry: Arc<StoreRegistry>,
    route_properties: RouteProperties,
    migration: MigrationSettings,
}

impl SelectorPolicy {
    pub fn from_config(config: &SelectorPolicyConfig, catalog: &StoreCatalog) -> Result<Self, ConfigError> {
        if config.value_stores.is_empty() {
            return Err(ConfigError::EmptyMapping(SELECTOR_TAG.to_string()));
        }
        let fallback_store = catalog.fallback(&config.fallback_store)?;
        let values = RouteTable::build(SELECTOR_TAG, &config.value_stores, catalog)?;
        let reserved = ReservedRoutes::build(SELECTOR_TAG, &fallback_store)?;
        let registry = build_registry(values.stores(), &fallback_store);
        Ok(Self {
            property: config.selector_property.clone(),
            values,
            reserved,
            registry,
            route_properties: RouteProperties::new(config.route_properties.clone()),
            migration: config.migration.clone(),
        })
    }

    /// The node property whose value selects the store.
    pub fn selector_property(&self) -> &QName {
        &self.property
    }

    /// Store for a selector value: the mapped route, else the fallback
    /// route. Used when content migrates after the value changed.
    pub fn route_for_value(&self, value: Option<&str>) -> StoreHandle {
        value
            .and_then(|value| self.values.get(value))
            .unwrap_or_else(|| self.reserved.fallback_route())
            .clone()
    }

    pub fn route_properties(&self) -> &RouteProperties {
        &self.route_properties
    }
}

impl RoutingPolicy for SelectorPolicy {
    fn name(&self) -> &str {
        SELECTOR_TAG
    }

    fn is_routable(&self, criteria: &RoutingCriteria, property: Option<&QName>) -> bool {
        self.route_properties.admits(property) && criteria.selector(&self.property).is_some()
    }

    fn lookup(&self, criteria: &RoutingCriteria) -> Option<StoreHandle> {
        criteria
            .selector(&self.property)
            .and_then(|value| self.values.get(value))
            .cloned()
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
        self.values
            .narrow(address, self.registry.fallback())
            .unwrap_or_else(|| self.registry.all_stores().to_vec())
    }
}
