use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::node::QName;

/// Immutable snapshot of the ambient values a routing policy may read.
///
/// Criteria are captured when a write or migration decision is made and
/// passed explicitly to policies; nothing here is persisted unless a
/// policy encodes it into a routing prefix.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingCriteria {
    /// Tenant domain. `None` is the default (single-tenant) domain.
    pub tenant: Option<String>,
    /// Short name of the site the node lives in.
    pub site: Option<String>,
    /// Preset the site was created from; coarser fallback for `site`.
    pub site_preset: Option<String>,
    /// Type of the node whose content is being written.
    pub node_type: Option<QName>,
    /// Selector property values, keyed by property name.
    pub selectors: BTreeMap<QName, String>,
}

impl RoutingCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    pub fn with_site_preset(mut self, preset: impl Into<String>) -> Self {
        self.site_preset = Some(preset.into());
        self
    }

    pub fn with_node_type(mut self, node_type: QName) -> Self {
        self.node_type = Some(node_type);
        self
    }

    pub fn with_selector(mut self, property: QName, value: impl Into<String>) -> Self {
        self.selectors.insert(property, value.into());
        self
    }

    pub fn selector(&self, property: &QName) -> Option<&str> {
        self.selectors.get(property).map(String::as_str)
    }

    /// Returns `true` if no ambient value is set at all.
    pub fn is_empty(&self) -> bool {
        self.tenant.is_none()
            && self.site.is_none()
            && self.site_preset.is_none()
            && self.node_type.is_none()
            && self.selectors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_values() {
        let prop = QName::new("my:selector");
        let c = RoutingCriteria::new()
            .with_tenant("acme")
            .with_site("finance")
            .with_site_preset("collab")
            .with_node_type(QName::new("cm:content"))
            .with_selector(prop.clone(), "a");
        assert_eq!(c.tenant.as_deref(), Some("acme"));
        assert_eq!(c.site.as_deref(), Some("finance"));
        assert_eq!(c.site_preset.as_deref(), Some("collab"));
        assert_eq!(c.selector(&prop), Some("a"));
        assert!(!c.is_empty());
    }

    #[test]
    fn default_is_empty() {
        assert!(RoutingCriteria::default().is_empty());
        assert!(RoutingCriteria::new().selector(&QName::new("x")).is_none());
    }
}
