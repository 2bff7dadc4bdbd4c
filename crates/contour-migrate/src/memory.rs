use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use contour_types::{NodeRef, PropertyMap, PropertyValue, QName};

use crate::error::{HostError, HostResult};
use crate::host::NodeService;

#[derive(Clone, Debug)]
struct NodeRecord {
    node_type: QName,
    parent: Option<NodeRef>,
    properties: PropertyMap,
}

/// HashMap-based node tree for tests and embedding.
pub struct InMemoryNodeService {
    nodes: RwLock<HashMap<NodeRef, NodeRecord>>,
    property_writes: AtomicU64,
}

impl InMemoryNodeService {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            property_writes: AtomicU64::new(0),
        }
    }

    /// Create a node and return its reference.
    pub fn create_node(&self, node_type: QName, parent: Option<&NodeRef>) -> NodeRef {
        let node = NodeRef::generate();
        let record = NodeRecord {
            node_type,
            parent: parent.cloned(),
            properties: PropertyMap::new(),
        };
        self.nodes
            .write()
            .expect("lock poisoned")
            .insert(node.clone(), record);
        node
    }

    pub fn set_property(&self, node: &NodeRef, name: QName, value: PropertyValue) -> HostResult<()> {
        self.with_record(node, |record| {
            record.properties.insert(name, value);
        })
    }

    pub fn remove_property(&self, node: &NodeRef, name: &QName) -> HostResult<Option<PropertyValue>> {
        self.with_record(node, |record| record.properties.remove(name))
    }

    /// Re-parent `node`, returning its previous parent.
    pub fn move_node(&self, node: &NodeRef, new_parent: &NodeRef) -> HostResult<Option<NodeRef>> {
        self.with_record(node, |record| record.parent.replace(new_parent.clone()))
    }

    /// Copy `source` (properties included) under `parent`.
    pub fn copy_node(&self, source: &NodeRef, parent: &NodeRef) -> HostResult<NodeRef> {
        let mut record = self.record(source)?;
        record.parent = Some(parent.clone());
        let copy = NodeRef::generate();
        self.nodes
            .write()
            .expect("lock poisoned")
            .insert(copy.clone(), record);
        Ok(copy)
    }

    pub fn set_type(&self, node: &NodeRef, node_type: QName) -> HostResult<QName> {
        self.with_record(node, |record| std::mem::replace(&mut record.node_type, node_type))
    }

    /// Number of [`add_properties`](NodeService::add_properties) calls.
    pub fn property_writes(&self) -> u64 {
        self.property_writes.load(Ordering::Relaxed)
    }

    fn record(&self, node: &NodeRef) -> HostResult<NodeRecord> {
        self.nodes
            .read()
            .expect("lock poisoned")
            .get(node)
            .cloned()
            .ok_or_else(|| HostError::NodeNotFound(node.clone()))
    }

    fn with_record<T>(&self, node: &NodeRef, f: impl FnOnce(&mut NodeRecord) -> T) -> HostResult<T> {
        let mut nodes = self.nodes.write().expect("lock poisoned");
        let record = nodes
            .get_mut(node)
            .ok_or_else(|| HostError::NodeNotFound(node.clone()))?;
        Ok(f(record))
    }
}

impl Default for InMemoryNodeService {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeService for InMemoryNodeService {
    fn properties(&self, node: &NodeRef) -> HostResult<PropertyMap> {
        Ok(self.record(node)?.properties)
    }

    fn add_properties(&self, node: &NodeRef, updates: PropertyMap) -> HostResult<()> {
        self.with_record(node, |record| record.properties.extend(updates))?;
        self.property_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn node_type(&self, node: &NodeRef) -> HostResult<QName> {
        Ok(self.record(node)?.node_type)
    }

    fn primary_parent(&self, node: &NodeRef) -> HostResult<Option<NodeRef>> {
        Ok(self.record(node)?.parent)
    }
}

impl fmt::Debug for InMemoryNodeService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.nodes.read().expect("lock poisoned").len();
        f.debug_struct("InMemoryNodeService")
            .field("node_count", &count)
            .finish()
    }
}
