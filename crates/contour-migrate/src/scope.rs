use contour_types::{NodeRef, QName};
use serde::{Deserialize, Serialize};

use crate::error::HostResult;
use crate::host::NodeService;

/// Where sites live in the host's content model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteModel {
    /// Type marking a site root node.
    pub site_type: QName,
    /// Text property holding the site's short name.
    pub name_property: QName,
    /// Text property holding the preset the site was created from.
    pub preset_property: QName,
}

impl Default for SiteModel {
    fn default() -> Self {
        Self {
            site_type: QName::new("st:site"),
            name_property: QName::new("cm:name"),
            preset_property: QName::new("st:sitePreset"),
        }
    }
}

/// The site a node belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SiteScope {
    pub site: NodeRef,
    pub name: String,
    pub preset: Option<String>,
}

/// Walk from `start` (inclusive) up the primary parent chain to the nearest
/// site node. `None` if `start` is outside every site.
pub fn site_scope(
    nodes: &dyn NodeService,
    start: &NodeRef,
    model: &SiteModel,
) -> HostResult<Option<SiteScope>> {
    let mut current = Some(start.clone());
    let mut visited = Vec::new();
    while let Some(node) = current {
        if visited.contains(&node) {
            break;
        }
        if nodes.node_type(&node)? == model.site_type {
            let properties = nodes.properties(&node)?;
            let text = |name: &QName| {
                properties
                    .get(name)
                    .and_then(|value| value.as_text())
                    .map(str::to_string)
            };
            let name = text(&model.name_property).unwrap_or_else(|| node.to_string());
            return Ok(Some(SiteScope {
                preset: text(&model.preset_property),
                site: node,
                name,
            }));
        }
        current = nodes.primary_parent(&node)?;
        visited.push(node);
    }
    Ok(None)
}

/// Returns `true` if both locations resolve to the same site, or both are
/// outside any site.
pub fn same_site_scope(old: &Option<SiteScope>, new: &Option<SiteScope>) -> bool {
    match (old, new) {
        (None, None) => true,
        (Some(old), Some(new)) => old.site == new.site,
        _ => false,
    }
}
