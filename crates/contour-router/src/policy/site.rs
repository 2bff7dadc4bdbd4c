use std::sync::Arc;

use contour_store::StoreHandle;
use contour_types::{ContentAddress, QName, RoutingCriteria};

use super::{build_registry, ReservedRoutes, RouteProperties, RouteTable, RoutingPolicy};
use crate::config::{MigrationSettings, SitePolicyConfig, StoreCatalog};
use crate::error::ConfigError;
use crate::registry::StoreRegistry;

pub const SITE_TAG: &str = "site";
pub const SITE_PRESET_TAG: &str = "site-preset";

/// Routes content by the site a node lives in.
///
/// An exact site mapping wins over a mapping of the site's preset.
#[derive(Debug)]
pub struct SitePolicy {
    sites: RouteTable,
    presets: RouteTable,
    reserved: ReservedRoutes,
    registry: Arc<StoreRegistry>,
    route_properties: RouteProperties,
    migration: MigrationSettings,
}

impl SitePolicy {
    pub fn from_config(config: &SitePolicyConfig, catalog: &StoreCatalog) -> Result<Self, ConfigError> {
        if config.site_stores.is_empty() && config.site_preset_stores.is_empty() {
            return Err(ConfigError::EmptyMapping(SITE_TAG.to_string()));
        }
        let fallback_store = catalog.fallback(&config.fallback_store)?;
        let sites = RouteTable::build(SITE_TAG, &config.site_stores, catalog)?;
        let presets = RouteTable::build(SITE_PRESET_TAG, &config.site_preset_stores, catalog)?;
        let reserved = ReservedRoutes::build(SITE_TAG, &fallback_store)?;
        let registry = build_registry(sites.stores().chain(presets.stores()), &fallback_store);
        Ok(Self {
            sites,
            presets,
            reserved,
            registry,
            route_properties: RouteProperties::new(config.route_properties.clone()),
            migration: config.migration.clone(),
        })
    }

    /// Route for an explicit site / preset pair.
    pub fn route_for(&self, site: Option<&str>, preset: Option<&str>) -> Option<StoreHandle> {
        site.and_then(|site| self.sites.get(site))
            .or_else(|| preset.and_then(|preset| self.presets.get(preset)))
            .cloned()
    }

    pub fn route_properties(&self) -> &RouteProperties {
        &self.route_properties
    }
}

impl RoutingPolicy for SitePolicy {
    fn name(&self) -> &str {
        SITE_TAG
    }

    fn is_routable(&self, criteria: &RoutingCriteria, property: Option<&QName>) -> bool {
        self.route_properties.admits(property)
            && (criteria.site.is_some() || criteria.site_preset.is_some())
    }

    fn lookup(&self, criteria: &RoutingCriteria) -> Option<StoreHandle> {
        self.route_for(criteria.site.as_deref(), criteria.site_preset.as_deref())
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
        let fallback = self.registry.fallback();
        self.sites
            .narrow(address, fallback)
            .or_else(|| self.presets.narrow(address, fallback))
            .unwrap_or_else(|| self.registry.all_stores().to_vec())
    }
}
