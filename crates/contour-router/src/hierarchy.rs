use std::collections::HashMap;

use contour_types::QName;

/// Read-only view of the host's content-model type hierarchy.
pub trait TypeHierarchy: Send + Sync {
    /// Direct parent type, or `None` at the root.
    fn parent(&self, node_type: &QName) -> Option<QName>;

    /// `node_type` followed by its ancestors, nearest first.
    fn ancestry(&self, node_type: &QName) -> Vec<QName> {
        let mut chain = vec![node_type.clone()];
        let mut current = node_type.clone();
        while let Some(parent) = self.parent(&current) {
            if chain.contains(&parent) {
                break;
            }
            chain.push(parent.clone());
            current = parent;
        }
        chain
    }

    fn is_subtype_of(&self, node_type: &QName, ancestor: &QName) -> bool {
        self.ancestry(node_type).contains(ancestor)
    }
}

/// HashMap-based [`TypeHierarchy`].
#[derive(Clone, Debug, Default)]
pub struct InMemoryTypeHierarchy {
    parents: HashMap<QName, QName>,
}

impl InMemoryTypeHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, node_type: impl Into<QName>, parent: impl Into<QName>) -> Self {
        self.parents.insert(node_type.into(), parent.into());
        self
    }
}

impl TypeHierarchy for InMemoryTypeHierarchy {
    fn parent(&self, node_type: &QName) -> Option<QName> {
        self.parents.get(node_type).cloned()
    }
}
