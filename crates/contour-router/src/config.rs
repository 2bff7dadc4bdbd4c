use std::collections::{BTreeMap, BTreeSet};

use contour_store::StoreHandle;
use contour_types::QName;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Router-wide settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Upper bound on resolution cache entries. `None` means unbounded.
    pub cache_capacity: Option<usize>,
}

/// Whether content follows its node when routing criteria change.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationSettings {
    /// Global default: migrate content when criteria change.
    pub migrate_on_change: bool,
    /// Optional boolean node property overriding `migrate_on_change` per
    /// node. An explicit value on the node always wins.
    pub override_property: Option<QName>,
}

impl MigrationSettings {
    /// Migration enabled, no per-node override.
    pub fn enabled() -> Self {
        Self {
            migrate_on_change: true,
            override_property: None,
        }
    }

    pub fn with_override_property(mut self, property: QName) -> Self {
        self.override_property = Some(property);
        self
    }
}

/// Route by tenant domain.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantPolicyConfig {
    /// Tenant domain -> store name.
    pub tenant_stores: BTreeMap<String, String>,
    pub fallback_store: String,
}

/// Route by site, with the site preset as a coarser fallback.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitePolicyConfig {
    #[serde(default)]
    pub site_stores: BTreeMap<String, String>,
    #[serde(default)]
    pub site_preset_stores: BTreeMap<String, String>,
    pub fallback_store: String,
    /// Content properties the policy acts on. `None` means all.
    #[serde(default)]
    pub route_properties: Option<BTreeSet<QName>>,
    #[serde(default)]
    pub migration: MigrationSettings,
}

/// Route by the value of a single text property on the node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorPolicyConfig {
    pub selector_property: QName,
    /// Selector value -> store name.
    pub value_stores: BTreeMap<String, String>,
    pub fallback_store: String,
    #[serde(default)]
    pub route_properties: Option<BTreeSet<QName>>,
    #[serde(default)]
    pub migration: MigrationSettings,
}

/// Route by node type, matching the nearest mapped ancestor type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypePolicyConfig {
    /// Node type -> store name.
    pub type_stores: BTreeMap<QName, String>,
    pub fallback_store: String,
    #[serde(default)]
    pub route_properties: Option<BTreeSet<QName>>,
    #[serde(default)]
    pub migration: MigrationSettings,
}

/// Named backing stores that policy configurations refer to.
#[derive(Clone, Debug, Default)]
pub struct StoreCatalog {
    stores: BTreeMap<String, StoreHandle>,
}

impl StoreCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, store: StoreHandle) -> Result<(), ConfigError> {
        let name = name.into();
        if self.stores.contains_key(&name) {
            return Err(ConfigError::DuplicateStore(name));
        }
        self.stores.insert(name, store);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, name: impl Into<String>, store: StoreHandle) -> Result<Self, ConfigError> {
        self.register(name, store)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Result<StoreHandle, ConfigError> {
        self.stores
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownStore(name.to_string()))
    }

    /// Look up the fallback store, which must accept writes.
    pub fn fallback(&self, name: &str) -> Result<StoreHandle, ConfigError> {
        let store = self.get(name)?;
        if !store.is_write_supported() {
            return Err(ConfigError::ReadOnlyFallback(name.to_string()));
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}
