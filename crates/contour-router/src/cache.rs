//! Resolution cache: which store owns which address, per router instance.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use contour_store::StoreHandle;
use contour_types::ContentAddress;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace key separating the cache entries of different routers that
/// share one [`StoreCache`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouterInstanceId(Uuid);

impl RouterInstanceId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for RouterInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "router-{}", self.0)
    }
}

/// Cache key: one entry per (router, address).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub router: RouterInstanceId,
    pub address: ContentAddress,
}

/// Process-wide store for resolution results.
///
/// Implementations are internally synchronized. Eviction is entirely the
/// cache's business; the resolver treats every entry as advisory.
pub trait StoreCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<StoreHandle>;

    fn insert(&self, key: CacheKey, store: StoreHandle);

    /// Remove an entry. Returns `true` if one was present.
    fn remove(&self, key: &CacheKey) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, StoreHandle>,
    insertion_order: VecDeque<CacheKey>,
}

/// HashMap-based [`StoreCache`], optionally bounded.
///
/// When a capacity is set, the oldest insertions are evicted first.
#[derive(Default)]
pub struct InMemoryStoreCache {
    capacity: Option<usize>,
    state: RwLock<CacheState>,
}

impl InMemoryStoreCache {
    /// Create an unbounded cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache holding at most `capacity` entries.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            state: RwLock::default(),
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

impl StoreCache for InMemoryStoreCache {
    fn get(&self, key: &CacheKey) -> Option<StoreHandle> {
        let state = self.state.read().expect("lock poisoned");
        state.entries.get(key).cloned()
    }

    fn insert(&self, key: CacheKey, store: StoreHandle) {
        let mut state = self.state.write().expect("lock poisoned");
        if state.entries.insert(key.clone(), store).is_some() {
            return;
        }
        state.insertion_order.push_back(key);
        if let Some(capacity) = self.capacity {
            while state.entries.len() > capacity {
                let Some(oldest) = state.insertion_order.pop_front() else {
                    break;
                };
                state.entries.remove(&oldest);
            }
        }
    }

    fn remove(&self, key: &CacheKey) -> bool {
        let mut state = self.state.write().expect("lock poisoned");
        let removed = state.entries.remove(key).is_some();
        if removed {
            state.insertion_order.retain(|k| k != key);
        }
        removed
    }

    fn len(&self) -> usize {
        self.state.read().expect("lock poisoned").entries.len()
    }
}

impl fmt::Debug for InMemoryStoreCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryStoreCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

/// One router's view of a [`StoreCache`], plus the lock that serializes
/// its first resolutions.
///
/// Lookups take the read side of `lock`; a miss takes the write side for
/// the whole re-check, scan and insert sequence. Routers sharing a
/// `StoreCache` each have their own lock and never block one another.
pub struct ResolutionCache {
    instance: RouterInstanceId,
    store: Arc<dyn StoreCache>,
    lock: RwLock<()>,
}

impl ResolutionCache {
    pub fn new(store: Arc<dyn StoreCache>) -> Self {
        Self {
            instance: RouterInstanceId::generate(),
            store,
            lock: RwLock::new(()),
        }
    }

    pub fn instance(&self) -> RouterInstanceId {
        self.instance
    }

    pub fn get(&self, address: &ContentAddress) -> Option<StoreHandle> {
        self.store.get(&self.key(address))
    }

    pub fn contains(&self, address: &ContentAddress) -> bool {
        self.get(address).is_some()
    }

    pub fn put(&self, address: &ContentAddress, store: StoreHandle) {
        self.store.insert(self.key(address), store);
    }

    pub fn invalidate(&self, address: &ContentAddress) -> bool {
        self.store.remove(&self.key(address))
    }

    pub(crate) fn read_lock(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read().expect("resolution lock poisoned")
    }

    pub(crate) fn write_lock(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write().expect("resolution lock poisoned")
    }

    fn key(&self, address: &ContentAddress) -> CacheKey {
        CacheKey {
            router: self.instance,
            address: address.clone(),
        }
    }
}

impl fmt::Debug for ResolutionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionCache")
            .field("instance", &self.instance)
            .field("shared_entries", &self.store.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contour_store::{same_store, InMemoryBackingStore};

    fn addr(s: &str) -> ContentAddress {
        ContentAddress::parse(s).unwrap()
    }

    fn store(name: &str) -> StoreHandle {
        Arc::new(InMemoryBackingStore::new(name, "mem"))
    }

    // -----------------------------------------------------------------------
    // InMemoryStoreCache
    // -----------------------------------------------------------------------

    #[test]
    fn bounded_cache_evicts_oldest() {
        let cache = InMemoryStoreCache::bounded(2);
        let router = RouterInstanceId::generate();
        let key = |s: &str| CacheKey {
            router,
            address: addr(s),
        };
        let a = store("a");
        cache.insert(key("mem://1"), a.clone());
        cache.insert(key("mem://2"), a.clone());
        cache.insert(key("mem://3"), a);

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("mem://1")).is_none());
        assert!(cache.get(&key("mem://2")).is_some());
        assert!(cache.get(&key("mem://3")).is_some());
    }

    #[test]
    fn reinsert_does_not_grow() {
        let cache = InMemoryStoreCache::bounded(2);
        let router = RouterInstanceId::generate();
        let k = CacheKey {
            router,
            address: addr("mem://1"),
        };
        cache.insert(k.clone(), store("a"));
        cache.insert(k.clone(), store("b"));
        assert_eq!(cache.len(), 1);
        assert!(cache.remove(&k));
        assert!(!cache.remove(&k));
        assert!(cache.is_empty());
    }

    // -----------------------------------------------------------------------
    // ResolutionCache
    // -----------------------------------------------------------------------

    #[test]
    fn routers_sharing_a_cache_are_isolated() {
        let shared: Arc<dyn StoreCache> = Arc::new(InMemoryStoreCache::new());
        let first = ResolutionCache::new(shared.clone());
        let second = ResolutionCache::new(shared.clone());
        let a = store("a");
        let address = addr("mem://x");

        first.put(&address, a.clone());
        assert!(same_store(&first.get(&address).unwrap(), &a));
        assert!(second.get(&address).is_none());
        assert_eq!(shared.len(), 1);

        assert!(first.invalidate(&address));
        assert!(!first.contains(&address));
    }
}
