//! Population of routing criteria from a node's metadata.

use contour_types::{NodeRef, QName, RoutingCriteria};

use crate::error::HostResult;
use crate::host::NodeService;
use crate::scope::{site_scope, SiteModel};

/// Fills in the criteria a policy needs to place content of one node.
pub trait ContextInitializer: Send + Sync {
    fn initialize(
        &self,
        nodes: &dyn NodeService,
        node: &NodeRef,
        criteria: &mut RoutingCriteria,
    ) -> HostResult<()>;
}

/// Site and site preset from the node's ancestry.
#[derive(Clone, Debug, Default)]
pub struct SiteInitializer {
    model: SiteModel,
}

impl SiteInitializer {
    pub fn new(model: SiteModel) -> Self {
        Self { model }
    }
}

impl ContextInitializer for SiteInitializer {
    fn initialize(
        &self,
        nodes: &dyn NodeService,
        node: &NodeRef,
        criteria: &mut RoutingCriteria,
    ) -> HostResult<()> {
        if let Some(scope) = site_scope(nodes, node, &self.model)? {
            criteria.site = Some(scope.name);
            criteria.site_preset = scope.preset;
        }
        Ok(())
    }
}

/// The node's own type.
#[derive(Clone, Copy, Debug, Default)]
pub struct NodeTypeInitializer;

impl ContextInitializer for NodeTypeInitializer {
    fn initialize(
        &self,
        nodes: &dyn NodeService,
        node: &NodeRef,
        criteria: &mut RoutingCriteria,
    ) -> HostResult<()> {
        criteria.node_type = Some(nodes.node_type(node)?);
        Ok(())
    }
}

/// Text values of selector properties.
#[derive(Clone, Debug)]
pub struct SelectorInitializer {
    properties: Vec<QName>,
}

impl SelectorInitializer {
    pub fn new(properties: impl IntoIterator<Item = QName>) -> Self {
        Self {
            properties: properties.into_iter().collect(),
        }
    }
}

impl ContextInitializer for SelectorInitializer {
    fn initialize(
        &self,
        nodes: &dyn NodeService,
        node: &NodeRef,
        criteria: &mut RoutingCriteria,
    ) -> HostResult<()> {
        let properties = nodes.properties(node)?;
        for name in &self.properties {
            match properties.get(name).and_then(|value| value.as_text()) {
                Some(value) => {
                    criteria.selectors.insert(name.clone(), value.to_string());
                }
                None => {
                    criteria.selectors.remove(name);
                }
            }
        }
        Ok(())
    }
}
