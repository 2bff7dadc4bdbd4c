use std::collections::BTreeSet;

use contour_types::{NodeRef, PropertyMap, QName};

/// Host lifecycle notifications the coordinator reacts to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// `node` was moved from `old_parent` to `new_parent`.
    NodeMoved {
        node: NodeRef,
        old_parent: NodeRef,
        new_parent: NodeRef,
    },
    /// `target` was created as a copy of `source`.
    NodeCopied { source: NodeRef, target: NodeRef },
    /// Property values changed. `before` is empty for a newly created node.
    PropertiesUpdated {
        node: NodeRef,
        before: PropertyMap,
        after: PropertyMap,
    },
    /// An aspect was added, possibly bringing new property values along.
    AspectAdded { node: NodeRef, aspect: QName },
    /// An aspect is about to be removed, dropping `removed_properties`.
    AspectRemoving {
        node: NodeRef,
        aspect: QName,
        removed_properties: BTreeSet<QName>,
    },
    /// The type of `node` was specialised or changed.
    TypeChanged {
        node: NodeRef,
        old_type: QName,
        new_type: QName,
    },
}

impl LifecycleEvent {
    /// The node whose content the event concerns.
    pub fn node(&self) -> &NodeRef {
        match self {
            Self::NodeMoved { node, .. }
            | Self::PropertiesUpdated { node, .. }
            | Self::AspectAdded { node, .. }
            | Self::AspectRemoving { node, .. }
            | Self::TypeChanged { node, .. } => node,
            Self::NodeCopied { target, .. } => target,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::NodeMoved { .. } => "node-moved",
            Self::NodeCopied { .. } => "node-copied",
            Self::PropertiesUpdated { .. } => "properties-updated",
            Self::AspectAdded { .. } => "aspect-added",
            Self::AspectRemoving { .. } => "aspect-removing",
            Self::TypeChanged { .. } => "type-changed",
        }
    }
}
