use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use contour_types::ContentAddress;

use crate::content::{ContentReader, WriteContext};
use crate::error::StoreResult;

/// Capability contract satisfied by every physical store, facade and router.
///
/// All implementations must satisfy these invariants:
/// - `supports_address` is a pure format check and performs no I/O.
/// - `read` fails with `NotFound` for a missing object.
/// - `delete` of a missing object returns `Ok(false)`, not an error.
/// - The wildcard protocol is accepted wherever the store's own protocol is,
///   for probes, reads and requested-address writes.
pub trait BackingStore: Send + Sync + fmt::Debug {
    /// Short name used in diagnostics.
    fn name(&self) -> &str;

    /// Is `address` in a format this store handles?
    fn supports_address(&self, address: &ContentAddress) -> bool;

    /// Check whether an object exists at `address`.
    fn exists(&self, address: &ContentAddress) -> StoreResult<bool>;

    /// Read the object at `address`.
    fn read(&self, address: &ContentAddress) -> StoreResult<ContentReader>;

    /// Open a writer for a new object.
    ///
    /// If `context.address` is set the store writes there (or fails with
    /// `ContentExists`); otherwise it assigns a fresh address.
    fn write(&self, context: &WriteContext) -> StoreResult<Box<dyn ContentWriter>>;

    /// Delete the object at `address`. Returns `true` if it existed.
    fn delete(&self, address: &ContentAddress) -> StoreResult<bool>;

    /// Returns `false` for stores that reject every write.
    fn is_write_supported(&self) -> bool {
        true
    }
}

/// Single-use sink for the bytes of one new object.
pub trait ContentWriter: Send {
    /// Address the object will be stored at.
    fn address(&self) -> &ContentAddress;

    /// Store `content` and return the number of bytes written.
    fn put_content(self: Box<Self>, content: Bytes) -> StoreResult<u64>;
}

/// Shared handle to a configured store.
pub type StoreHandle = Arc<dyn BackingStore>;

/// Reference identity of two store handles.
///
/// Two distinct stores are never equal, even if configured identically.
pub fn same_store(a: &StoreHandle, b: &StoreHandle) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackingStore;

    #[test]
    fn identity_is_by_reference() {
        let a: StoreHandle = Arc::new(InMemoryBackingStore::new("a", "mem"));
        let b: StoreHandle = Arc::new(InMemoryBackingStore::new("a", "mem"));
        let a2 = Arc::clone(&a);
        assert!(same_store(&a, &a2));
        assert!(!same_store(&a, &b));
    }
}
