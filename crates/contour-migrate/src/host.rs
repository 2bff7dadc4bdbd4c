use contour_types::{NodeRef, PropertyMap, PropertyValue, QName};

use crate::error::HostResult;

/// The slice of the host's metadata store the migration coordinator uses.
pub trait NodeService: Send + Sync {
    /// Current property values of `node`.
    fn properties(&self, node: &NodeRef) -> HostResult<PropertyMap>;

    /// Batch-write `updates` onto `node`, leaving other properties alone.
    fn add_properties(&self, node: &NodeRef, updates: PropertyMap) -> HostResult<()>;

    fn node_type(&self, node: &NodeRef) -> HostResult<QName>;

    /// Primary parent, or `None` for a root node.
    fn primary_parent(&self, node: &NodeRef) -> HostResult<Option<NodeRef>>;

    fn property(&self, node: &NodeRef, name: &QName) -> HostResult<Option<PropertyValue>> {
        Ok(self.properties(node)?.remove(name))
    }
}
