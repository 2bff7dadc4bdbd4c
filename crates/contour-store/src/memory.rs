use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use contour_types::ContentAddress;
use uuid::Uuid;

use crate::content::{ContentReader, WriteContext};
use crate::error::{StoreError, StoreResult};
use crate::traits::{BackingStore, ContentWriter};

/// Counts of I/O calls made against an [`InMemoryBackingStore`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub exists_calls: u64,
    pub reads: u64,
    /// Completed `put_content` calls.
    pub writes: u64,
    pub deletes: u64,
}

impl StoreStats {
    /// Total number of I/O calls of any kind.
    pub fn total(&self) -> u64 {
        self.exists_calls + self.reads + self.writes + self.deletes
    }
}

#[derive(Default)]
struct MemoryState {
    objects: RwLock<HashMap<String, Bytes>>,
    exists_calls: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    fail_writes: AtomicBool,
    fail_after_store: AtomicBool,
}

/// In-memory, HashMap-based physical store.
///
/// Objects are keyed by the *base* identifier of their address: routing
/// prefixes are ignored, so `mem://_rp2/site/a/x` and `mem://x` name the
/// same object. The addresses the store reports are always the canonical
/// `protocol://base` form. Intended for tests and embedding.
pub struct InMemoryBackingStore {
    name: String,
    protocol: String,
    writable: bool,
    state: Arc<MemoryState>,
}

impl InMemoryBackingStore {
    /// Create a new empty writable store handling `protocol` addresses.
    pub fn new(name: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            protocol: protocol.into(),
            writable: true,
            state: Arc::new(MemoryState::default()),
        }
    }

    /// Create a store that rejects writes.
    pub fn read_only(name: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            writable: false,
            ..Self::new(name, protocol)
        }
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.state.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.state.objects.read().expect("lock poisoned").is_empty()
    }

    /// Place an object directly, bypassing the writer and the counters.
    pub fn insert(&self, identifier: &str, content: impl Into<Bytes>) -> StoreResult<ContentAddress> {
        let address = ContentAddress::new(self.protocol.clone(), identifier)?.base()?;
        self.state
            .objects
            .write()
            .expect("lock poisoned")
            .insert(address.identifier().to_string(), content.into());
        Ok(address)
    }

    /// Snapshot of the I/O counters.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            exists_calls: self.state.exists_calls.load(Ordering::Relaxed),
            reads: self.state.reads.load(Ordering::Relaxed),
            writes: self.state.writes.load(Ordering::Relaxed),
            deletes: self.state.deletes.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        self.state.exists_calls.store(0, Ordering::Relaxed);
        self.state.reads.store(0, Ordering::Relaxed);
        self.state.writes.store(0, Ordering::Relaxed);
        self.state.deletes.store(0, Ordering::Relaxed);
    }

    /// Make every subsequent `put_content` fail with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Make every subsequent `put_content` store its bytes and then fail
    /// with an I/O error, as a failed flush would.
    pub fn set_fail_after_write(&self, fail: bool) {
        self.state.fail_after_store.store(fail, Ordering::Relaxed);
    }

    /// Map a supported address to its storage key and canonical address.
    fn locate(&self, address: &ContentAddress) -> StoreResult<(String, ContentAddress)> {
        if !self.handles_protocol(address) {
            return Err(StoreError::UnsupportedAddress(format!(
                "{address} (store '{}' handles '{}')",
                self.name, self.protocol
            )));
        }
        let canonical = address.resolve_wildcard(&self.protocol).base()?;
        Ok((canonical.identifier().to_string(), canonical))
    }

    fn handles_protocol(&self, address: &ContentAddress) -> bool {
        address.is_wildcard() || address.protocol() == self.protocol
    }

    fn fresh_address(&self) -> StoreResult<ContentAddress> {
        let id = Uuid::now_v7().simple().to_string();
        let identifier = format!("{}/{}/{id}.bin", &id[..4], &id[4..8]);
        Ok(ContentAddress::new(self.protocol.clone(), identifier)?)
    }
}

impl BackingStore for InMemoryBackingStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_address(&self, address: &ContentAddress) -> bool {
        self.handles_protocol(address) && address.base().is_ok()
    }

    fn exists(&self, address: &ContentAddress) -> StoreResult<bool> {
        self.state.exists_calls.fetch_add(1, Ordering::Relaxed);
        if !self.supports_address(address) {
            return Ok(false);
        }
        let (key, _) = self.locate(address)?;
        let map = self.state.objects.read().expect("lock poisoned");
        Ok(map.contains_key(&key))
    }

    fn read(&self, address: &ContentAddress) -> StoreResult<ContentReader> {
        self.state.reads.fetch_add(1, Ordering::Relaxed);
        let (key, canonical) = self.locate(address)?;
        let map = self.state.objects.read().expect("lock poisoned");
        let content = map
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(address.clone()))?;
        Ok(ContentReader::new(canonical, content))
    }

    fn write(&self, context: &WriteContext) -> StoreResult<Box<dyn ContentWriter>> {
        if !self.writable {
            return Err(StoreError::ReadOnly(self.name.clone()));
        }
        let (key, address) = match &context.address {
            Some(requested) => {
                let (key, canonical) = self.locate(requested)?;
                let map = self.state.objects.read().expect("lock poisoned");
                if map.contains_key(&key) {
                    return Err(StoreError::ContentExists(requested.clone()));
                }
                (key, canonical)
            }
            None => {
                let address = self.fresh_address()?;
                (address.identifier().to_string(), address)
            }
        };
        tracing::trace!(store = %self.name, address = %address, "opened writer");
        Ok(Box::new(MemoryWriter {
            store: self.name.clone(),
            state: Arc::clone(&self.state),
            key,
            address,
        }))
    }

    fn delete(&self, address: &ContentAddress) -> StoreResult<bool> {
        self.state.deletes.fetch_add(1, Ordering::Relaxed);
        if !self.supports_address(address) {
            return Ok(false);
        }
        let (key, _) = self.locate(address)?;
        let mut map = self.state.objects.write().expect("lock poisoned");
        Ok(map.remove(&key).is_some())
    }

    fn is_write_supported(&self) -> bool {
        self.writable
    }
}

impl fmt::Debug for InMemoryBackingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryBackingStore")
            .field("name", &self.name)
            .field("protocol", &self.protocol)
            .field("object_count", &self.len())
            .finish()
    }
}

struct MemoryWriter {
    store: String,
    state: Arc<MemoryState>,
    key: String,
    address: ContentAddress,
}

impl ContentWriter for MemoryWriter {
    fn address(&self) -> &ContentAddress {
        &self.address
    }

    fn put_content(self: Box<Self>, content: Bytes) -> StoreResult<u64> {
        if self.state.fail_writes.load(Ordering::Relaxed) {
            return Err(StoreError::io(
                &self.address,
                &self.store,
                std::io::Error::other("simulated write failure"),
            ));
        }
        let size = content.len() as u64;
        let mut map = self.state.objects.write().expect("lock poisoned");
        if map.contains_key(&self.key) {
            return Err(StoreError::ContentExists(self.address.clone()));
        }
        map.insert(self.key.clone(), content);
        self.state.writes.fetch_add(1, Ordering::Relaxed);
        if self.state.fail_after_store.load(Ordering::Relaxed) {
            return Err(StoreError::io(
                &self.address,
                &self.store,
                std::io::Error::other("simulated flush failure"),
            ));
        }
        Ok(size)
    }
}
