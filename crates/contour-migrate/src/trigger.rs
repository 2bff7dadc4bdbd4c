//! Per-policy decisions on which lifecycle events require migration.

use contour_router::{
    RouteProperties, RoutingPolicy, SelectorPolicy, SitePolicy, TenantPolicy, TypePolicy,
};
use contour_store::same_store;
use contour_types::{NodeRef, PropertyMap, QName, RoutingCriteria};

use crate::error::HostResult;
use crate::event::LifecycleEvent;
use crate::host::NodeService;
use crate::initializer::{ContextInitializer, NodeTypeInitializer, SelectorInitializer, SiteInitializer};
use crate::scope::{same_site_scope, site_scope, SiteModel};

/// A node whose content must be re-evaluated, plus any criteria the node's
/// current metadata does not yet reflect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigrationCandidate {
    pub node: NodeRef,
    selector_override: Option<(QName, Option<String>)>,
}

impl MigrationCandidate {
    pub fn new(node: NodeRef) -> Self {
        Self {
            node,
            selector_override: None,
        }
    }

    /// Force the value of a selector property, `None` meaning absent.
    pub fn with_selector(mut self, property: QName, value: Option<String>) -> Self {
        self.selector_override = Some((property, value));
        self
    }

    /// Apply the overrides on top of criteria built from node metadata.
    pub fn apply(&self, criteria: &mut RoutingCriteria) {
        if let Some((property, value)) = &self.selector_override {
            match value {
                Some(value) => {
                    criteria.selectors.insert(property.clone(), value.clone());
                }
                None => {
                    criteria.selectors.remove(property);
                }
            }
        }
    }
}

/// Host-side data a trigger may consult.
#[derive(Clone, Copy)]
pub struct TriggerContext<'a> {
    pub nodes: &'a dyn NodeService,
    pub site_model: &'a SiteModel,
}

/// Migration behaviour of a routing policy.
pub trait MigrationTrigger: RoutingPolicy {
    /// Nodes whose content `event` may have displaced.
    fn candidates(
        &self,
        event: &LifecycleEvent,
        ctx: TriggerContext<'_>,
    ) -> HostResult<Vec<MigrationCandidate>>;

    /// Content properties this policy migrates.
    fn migrated_properties(&self) -> RouteProperties {
        RouteProperties::all()
    }

    /// Initializers populating the criteria this policy reads.
    fn initializers(&self, site_model: &SiteModel) -> Vec<Box<dyn ContextInitializer>>;
}

// ---------------------------------------------------------------------------
// Tenant
// ---------------------------------------------------------------------------

impl MigrationTrigger for TenantPolicy {
    fn candidates(
        &self,
        _event: &LifecycleEvent,
        _ctx: TriggerContext<'_>,
    ) -> HostResult<Vec<MigrationCandidate>> {
        Ok(Vec::new())
    }

    fn initializers(&self, _site_model: &SiteModel) -> Vec<Box<dyn ContextInitializer>> {
        Vec::new()
    }
}

// ---------------------------------------------------------------------------
// Site
// ---------------------------------------------------------------------------

impl MigrationTrigger for SitePolicy {
    fn candidates(
        &self,
        event: &LifecycleEvent,
        ctx: TriggerContext<'_>,
    ) -> HostResult<Vec<MigrationCandidate>> {
        match event {
            LifecycleEvent::NodeMoved {
                node,
                old_parent,
                new_parent,
            } => {
                let old_scope = site_scope(ctx.nodes, old_parent, ctx.site_model)?;
                let new_scope = site_scope(ctx.nodes, new_parent, ctx.site_model)?;
                if same_site_scope(&old_scope, &new_scope) {
                    tracing::trace!(node = %node, "move within the same site scope");
                    return Ok(Vec::new());
                }
                Ok(vec![MigrationCandidate::new(node.clone())])
            }
            LifecycleEvent::NodeCopied { target, .. } => {
                Ok(vec![MigrationCandidate::new(target.clone())])
            }
            _ => Ok(Vec::new()),
        }
    }

    fn migrated_properties(&self) -> RouteProperties {
        self.route_properties().clone()
    }

    fn initializers(&self, site_model: &SiteModel) -> Vec<Box<dyn ContextInitializer>> {
        vec![Box::new(SiteInitializer::new(site_model.clone()))]
    }
}

// ---------------------------------------------------------------------------
// Selector
// ---------------------------------------------------------------------------

fn text_value(properties: &PropertyMap, name: &QName) -> Option<String> {
    properties
        .get(name)
        .and_then(|value| value.as_text())
        .map(str::to_string)
}

impl MigrationTrigger for SelectorPolicy {
    fn candidates(
        &self,
        event: &LifecycleEvent,
        ctx: TriggerContext<'_>,
    ) -> HostResult<Vec<MigrationCandidate>> {
        let property = self.selector_property();
        let candidate = |node: &NodeRef, value: Option<String>| {
            vec![MigrationCandidate::new(node.clone()).with_selector(property.clone(), value)]
        };
        match event {
            LifecycleEvent::PropertiesUpdated {
                node,
                before,
                after,
            } => {
                // creations carry no previous values and nothing to move
                if before.is_empty() {
                    return Ok(Vec::new());
                }
                let old = text_value(before, property);
                let new = text_value(after, property);
                if old == new {
                    return Ok(Vec::new());
                }
                tracing::debug!(node = %node, ?old, ?new, "selector value changed");
                Ok(candidate(node, new))
            }
            LifecycleEvent::AspectAdded { node, .. } => {
                let current = text_value(&ctx.nodes.properties(node)?, property);
                match current {
                    Some(value) => Ok(candidate(node, Some(value))),
                    None => Ok(Vec::new()),
                }
            }
            LifecycleEvent::AspectRemoving {
                node,
                removed_properties,
                ..
            } => {
                if !removed_properties.contains(property) {
                    return Ok(Vec::new());
                }
                let current = text_value(&ctx.nodes.properties(node)?, property);
                if current.is_none() {
                    return Ok(Vec::new());
                }
                Ok(candidate(node, None))
            }
            _ => Ok(Vec::new()),
        }
    }

    fn migrated_properties(&self) -> RouteProperties {
        self.route_properties().clone()
    }

    fn initializers(&self, _site_model: &SiteModel) -> Vec<Box<dyn ContextInitializer>> {
        vec![Box::new(SelectorInitializer::new([self
            .selector_property()
            .clone()]))]
    }
}

// ---------------------------------------------------------------------------
// Node type
// ---------------------------------------------------------------------------

impl MigrationTrigger for TypePolicy {
    fn candidates(
        &self,
        event: &LifecycleEvent,
        _ctx: TriggerContext<'_>,
    ) -> HostResult<Vec<MigrationCandidate>> {
        let LifecycleEvent::TypeChanged {
            node,
            old_type,
            new_type,
        } = event
        else {
            return Ok(Vec::new());
        };
        if same_store(&self.route_for_type(old_type), &self.route_for_type(new_type)) {
            tracing::trace!(node = %node, %old_type, %new_type, "type change keeps the same store");
            return Ok(Vec::new());
        }
        Ok(vec![MigrationCandidate::new(node.clone())])
    }

    fn migrated_properties(&self) -> RouteProperties {
        self.route_properties().clone()
    }

    fn initializers(&self, _site_model: &SiteModel) -> Vec<Box<dyn ContextInitializer>> {
        vec![Box::new(NodeTypeInitializer)]
    }
}
