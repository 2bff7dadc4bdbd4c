//! Routing policies: which store a new write goes to.
//!
//! Every policy reads one kind of criterion (tenant, site, a selector
//! property, node type) and maps its value to a store. Each mapped store is
//! wrapped once, at construction, in a [`RoutingPrefixStore`] recording the
//! `tag/value` route, so the handles a policy returns have stable identity.
//!
//! Two reserved route values exist for every policy:
//!
//! - [`DEFAULT_ROUTE`] -- the write carried no routable criteria
//! - [`FALLBACK_ROUTE`] -- criteria were present but unmapped; also the
//!   target when content migrates away from a mapped store

pub mod node_type;
pub mod selector;
pub mod site;
pub mod tenant;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use contour_store::{RoutingPrefixStore, StoreHandle};
use contour_types::{validate_route_value, ContentAddress, QName, RoutingCriteria};

use crate::config::{MigrationSettings, StoreCatalog};
use crate::error::ConfigError;
use crate::registry::StoreRegistry;

pub use node_type::TypePolicy;
pub use selector::SelectorPolicy;
pub use site::SitePolicy;
pub use tenant::TenantPolicy;

/// Route value used when a write has no routable criteria.
pub const DEFAULT_ROUTE: &str = "_default";

/// Route value used for routable but unmapped criteria.
pub const FALLBACK_ROUTE: &str = "_fallback";

/// Decides where new content goes, given the criteria of the write.
pub trait RoutingPolicy: Send + Sync + fmt::Debug {
    /// Short policy name for diagnostics.
    fn name(&self) -> &str;

    /// Does this policy act on a write of `property` under `criteria`?
    ///
    /// Non-routable writes go to the default route.
    fn is_routable(&self, criteria: &RoutingCriteria, property: Option<&QName>) -> bool;

    /// Store explicitly mapped for `criteria`, if any.
    fn lookup(&self, criteria: &RoutingCriteria) -> Option<StoreHandle>;

    fn reserved_routes(&self) -> &ReservedRoutes;

    fn registry(&self) -> &Arc<StoreRegistry>;

    fn migration_settings(&self) -> &MigrationSettings;

    /// Stores worth scanning first for `address`.
    ///
    /// Purely an optimisation: the resolver falls back to the full registry
    /// whenever this list misses.
    fn candidate_stores(&self, _address: &ContentAddress) -> Vec<StoreHandle> {
        self.registry().all_stores().to_vec()
    }
}

// ---------------------------------------------------------------------------
// Shared building blocks
// ---------------------------------------------------------------------------

/// Mapping of route values to prefix-wrapped stores under one tag.
#[derive(Clone, Debug)]
pub struct RouteTable {
    tag: String,
    routes: BTreeMap<String, StoreHandle>,
}

impl RouteTable {
    /// Build a table from `value -> store name`, wrapping each store in a
    /// `tag/value` prefix facade.
    pub fn build<K: AsRef<str>>(
        tag: &str,
        mapping: &BTreeMap<K, String>,
        catalog: &StoreCatalog,
    ) -> Result<Self, ConfigError> {
        let mut routes = BTreeMap::new();
        for (value, store_name) in mapping {
            let value = value.as_ref();
            validate_route_value(value)?;
            let store = catalog.get(store_name)?;
            let facade: StoreHandle = Arc::new(RoutingPrefixStore::new(tag, value, store)?);
            routes.insert(value.to_string(), facade);
        }
        Ok(Self {
            tag: tag.to_string(),
            routes,
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn get(&self, value: &str) -> Option<&StoreHandle> {
        self.routes.get(value)
    }

    pub fn stores(&self) -> impl Iterator<Item = &StoreHandle> {
        self.routes.values()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Narrow candidates using the route prefix embedded in `address`.
    ///
    /// Returns `None` if the address does not carry this table's tag.
    pub fn narrow(&self, address: &ContentAddress, fallback: &StoreHandle) -> Option<Vec<StoreHandle>> {
        let prefixes = address.prefixes().ok()?;
        let [tag, value, ..] = prefixes.as_slice() else {
            return None;
        };
        if tag != &self.tag {
            return None;
        }
        if value == DEFAULT_ROUTE || value == FALLBACK_ROUTE {
            return Some(vec![fallback.clone()]);
        }
        self.routes
            .get(value)
            .map(|route| vec![route.clone(), fallback.clone()])
    }
}

/// The `_default` and `_fallback` routes over a policy's fallback store.
#[derive(Clone, Debug)]
pub struct ReservedRoutes {
    default: StoreHandle,
    fallback: StoreHandle,
}

impl ReservedRoutes {
    pub fn build(tag: &str, fallback_store: &StoreHandle) -> Result<Self, ConfigError> {
        Ok(Self {
            default: Arc::new(RoutingPrefixStore::new(
                tag,
                DEFAULT_ROUTE,
                fallback_store.clone(),
            )?),
            fallback: Arc::new(RoutingPrefixStore::new(
                tag,
                FALLBACK_ROUTE,
                fallback_store.clone(),
            )?),
        })
    }

    pub fn default_route(&self) -> &StoreHandle {
        &self.default
    }

    pub fn fallback_route(&self) -> &StoreHandle {
        &self.fallback
    }
}

/// Optional restriction of a policy to a set of content properties.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteProperties(Option<BTreeSet<QName>>);

impl RouteProperties {
    pub fn new(properties: Option<BTreeSet<QName>>) -> Self {
        Self(properties)
    }

    /// Unrestricted: every property is admitted.
    pub fn all() -> Self {
        Self(None)
    }

    /// A restricted policy only admits writes that name an admitted
    /// property.
    pub fn admits(&self, property: Option<&QName>) -> bool {
        match (&self.0, property) {
            (None, _) => true,
            (Some(allowed), Some(property)) => allowed.contains(property),
            (Some(_), None) => false,
        }
    }
}

/// Registry of a policy: every mapped route plus the raw fallback store.
fn build_registry<'a>(
    routes: impl IntoIterator<Item = &'a StoreHandle>,
    fallback_store: &StoreHandle,
) -> Arc<StoreRegistry> {
    Arc::new(StoreRegistry::new(
        routes.into_iter().cloned().collect(),
        fallback_store.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use contour_store::{same_store, BackingStore, InMemoryBackingStore};

    fn catalog() -> StoreCatalog {
        StoreCatalog::new()
            .with("a", Arc::new(InMemoryBackingStore::new("a", "store-a")))
            .unwrap()
            .with("f", Arc::new(InMemoryBackingStore::new("f", "store-f")))
            .unwrap()
    }

    fn mapping(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn route_table_rejects_reserved_and_unknown() {
        let catalog = catalog();
        assert!(matches!(
            RouteTable::build("selector", &mapping(&[("_x", "a")]), &catalog),
            Err(ConfigError::InvalidRoute(_))
        ));
        assert!(matches!(
            RouteTable::build("selector", &mapping(&[("x", "nope")]), &catalog),
            Err(ConfigError::UnknownStore(_))
        ));
    }

    #[test]
    fn route_table_narrows_by_prefix() {
        let catalog = catalog();
        let table = RouteTable::build("selector", &mapping(&[("a", "a")]), &catalog).unwrap();
        let fallback = catalog.get("f").unwrap();
        let route = table.get("a").unwrap().clone();

        let addr = |s: &str| ContentAddress::parse(s).unwrap();
        let narrowed = table
            .narrow(&addr("store-a://_rp2/selector/a/x"), &fallback)
            .unwrap();
        assert_eq!(narrowed.len(), 2);
        assert!(same_store(&narrowed[0], &route));

        let reserved = table
            .narrow(&addr("store-f://_rp2/selector/_fallback/x"), &fallback)
            .unwrap();
        assert!(same_store(&reserved[0], &fallback));

        assert!(table.narrow(&addr("store-a://x"), &fallback).is_none());
        assert!(table.narrow(&addr("store-a://_rp2/site/a/x"), &fallback).is_none());
        assert!(table.narrow(&addr("store-a://_rp2/selector/b/x"), &fallback).is_none());
    }

    #[test]
    fn route_properties_admission() {
        let any = RouteProperties::all();
        assert!(any.admits(None));
        assert!(any.admits(Some(&QName::new("cm:content"))));

        let restricted = RouteProperties::new(Some(BTreeSet::from([QName::new("cm:content")])));
        assert!(restricted.admits(Some(&QName::new("cm:content"))));
        assert!(!restricted.admits(Some(&QName::new("cm:preview"))));
        assert!(!restricted.admits(None));
    }

    #[test]
    fn reserved_routes_are_distinct_facades() {
        let fallback = catalog().get("f").unwrap();
        let routes = ReservedRoutes::build("site", &fallback).unwrap();
        assert!(!same_store(routes.default_route(), routes.fallback_route()));
        assert!(routes.default_route().name().contains("_default"));
        assert!(routes.fallback_route().name().contains("_fallback"));
    }
}
