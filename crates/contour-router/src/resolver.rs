use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contour_store::{same_store, StoreError, StoreHandle, StoreResult};
use contour_types::ContentAddress;

use crate::cache::ResolutionCache;
use crate::registry::StoreRegistry;

/// Maps a content address to the store that owns it.
///
/// Resolution is cache first, then a scan of a policy-narrowed candidate
/// list, then a scan of the full registry. A miss holds the cache's write
/// lock for the whole re-check, scan and insert sequence so that threads
/// racing on the same address collapse into a single scan.
pub struct AddressResolver {
    cache: ResolutionCache,
    registry: Arc<StoreRegistry>,
    scans: AtomicU64,
}

impl AddressResolver {
    pub fn new(cache: ResolutionCache, registry: Arc<StoreRegistry>) -> Self {
        Self {
            cache,
            registry,
            scans: AtomicU64::new(0),
        }
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    pub fn registry(&self) -> &StoreRegistry {
        &self.registry
    }

    /// Record that `store` owns `address`, under the cache's write lock.
    pub fn record_owner(&self, address: &ContentAddress, store: StoreHandle) {
        let _write = self.cache.write_lock();
        self.cache.put(address, store);
    }

    /// Number of store scans performed so far (cache misses that reached
    /// step 4 of resolution).
    pub fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }

    /// Resolve `address` to its owning store.
    ///
    /// Returns `Ok(None)` if stores support the address but none holds it
    /// (only possible with `must_exist`). Fails with `UnsupportedAddress`
    /// if no store in the registry supports the address format at all.
    ///
    /// `candidates` narrows the first scan; it is only called on a miss.
    pub fn resolve<F>(
        &self,
        address: &ContentAddress,
        must_exist: bool,
        candidates: F,
    ) -> StoreResult<Option<StoreHandle>>
    where
        F: FnOnce(&ContentAddress) -> Vec<StoreHandle>,
    {
        {
            let _read = self.cache.read_lock();
            if let Some(store) = self.check_cached(address, must_exist)? {
                tracing::trace!(address = %address, store = store.name(), "resolution cache hit");
                return Ok(Some(store));
            }
        }

        let _write = self.cache.write_lock();
        if let Some(store) = self.check_cached(address, must_exist)? {
            return Ok(Some(store));
        }

        self.scans.fetch_add(1, Ordering::Relaxed);
        let narrowed = candidates(address);
        let mut selection = select_store(&narrowed, address, must_exist)?;
        if selection.store.is_none() && !covers_registry(&narrowed, &self.registry) {
            tracing::trace!(address = %address, "narrowed scan missed, scanning full registry");
            let full = select_store(self.registry.all_stores(), address, must_exist)?;
            selection = Selection {
                store: full.store,
                supported: selection.supported || full.supported,
            };
        }

        match selection.store {
            Some(store) => {
                tracing::debug!(address = %address, store = store.name(), "resolved content address");
                self.cache.put(address, store.clone());
                Ok(Some(store))
            }
            None if selection.supported => Ok(None),
            None => Err(StoreError::UnsupportedAddress(address.to_string())),
        }
    }

    fn check_cached(
        &self,
        address: &ContentAddress,
        must_exist: bool,
    ) -> StoreResult<Option<StoreHandle>> {
        let Some(store) = self.cache.get(address) else {
            return Ok(None);
        };
        if !store.supports_address(address) {
            return Err(StoreError::InconsistentCache {
                address: address.clone(),
                store: store.name().to_string(),
            });
        }
        if !must_exist || store.exists(address)? {
            return Ok(Some(store));
        }
        tracing::warn!(address = %address, store = store.name(), "cached store no longer holds address, invalidating");
        self.cache.invalidate(address);
        Ok(None)
    }
}

impl fmt::Debug for AddressResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressResolver")
            .field("cache", &self.cache)
            .field("stores", &self.registry.len())
            .field("scans", &self.scan_count())
            .finish()
    }
}

struct Selection {
    store: Option<StoreHandle>,
    supported: bool,
}

fn covers_registry(candidates: &[StoreHandle], registry: &StoreRegistry) -> bool {
    registry
        .all_stores()
        .iter()
        .all(|store| candidates.iter().any(|candidate| same_store(candidate, store)))
}

fn select_store(
    stores: &[StoreHandle],
    address: &ContentAddress,
    must_exist: bool,
) -> StoreResult<Selection> {
    let mut supported = false;
    for store in stores {
        if !store.supports_address(address) {
            continue;
        }
        supported = true;
        if !must_exist || store.exists(address)? {
            return Ok(Selection {
                store: Some(store.clone()),
                supported,
            });
        }
    }
    Ok(Selection {
        store: None,
        supported,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;

    use super::*;
    use crate::cache::InMemoryStoreCache;
    use contour_store::{BackingStore, InMemoryBackingStore};

    fn addr(s: &str) -> ContentAddress {
        ContentAddress::parse(s).unwrap()
    }

    struct Fixture {
        a: Arc<InMemoryBackingStore>,
        f: Arc<InMemoryBackingStore>,
        resolver: AddressResolver,
    }

    fn fixture() -> Fixture {
        let a = Arc::new(InMemoryBackingStore::new("a", "store-a"));
        let f = Arc::new(InMemoryBackingStore::new("f", "store-f"));
        let registry = StoreRegistry::new(
            vec![a.clone() as StoreHandle],
            f.clone() as StoreHandle,
        );
        let cache = ResolutionCache::new(Arc::new(InMemoryStoreCache::new()));
        Fixture {
            a,
            f,
            resolver: AddressResolver::new(cache, Arc::new(registry)),
        }
    }

    fn all(resolver: &AddressResolver) -> impl FnOnce(&ContentAddress) -> Vec<StoreHandle> + '_ {
        move |_| resolver.registry().all_stores().to_vec()
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    #[test]
    fn resolves_by_protocol() {
        let fx = fixture();
        let address = fx.a.insert("x", &b"data"[..]).unwrap();
        let store = fx.resolver.resolve(&address, true, all(&fx.resolver)).unwrap().unwrap();
        assert!(same_store(&store, &(fx.a.clone() as StoreHandle)));
    }

    #[test]
    fn recorded_owner_is_served_from_cache() {
        let fx = fixture();
        let address = fx.a.insert("x", &b"data"[..]).unwrap();
        fx.resolver.record_owner(&address, fx.a.clone());
        let store = fx
            .resolver
            .resolve(&address, true, |_| panic!("cache hit expected"))
            .unwrap()
            .unwrap();
        assert!(same_store(&store, &(fx.a.clone() as StoreHandle)));
        assert_eq!(fx.resolver.scan_count(), 0);
    }

    #[test]
    fn missing_content_is_not_an_error() {
        let fx = fixture();
        let address = addr("store-a://missing");
        assert!(fx.resolver.resolve(&address, true, all(&fx.resolver)).unwrap().is_none());
        let store = fx.resolver.resolve(&address, false, all(&fx.resolver)).unwrap();
        assert!(store.is_some());
    }

    #[test]
    fn unsupported_protocol_is_an_error() {
        let fx = fixture();
        for must_exist in [true, false] {
            let err = fx
                .resolver
                .resolve(&addr("nobody://x"), must_exist, all(&fx.resolver))
                .unwrap_err();
            assert!(matches!(err, StoreError::UnsupportedAddress(_)));
        }
    }

    #[test]
    fn wildcard_probe_finds_the_holder() {
        let fx = fixture();
        fx.f.insert("x", &b"data"[..]).unwrap();
        let store = fx
            .resolver
            .resolve(&addr("wildcard-store://x"), true, all(&fx.resolver))
            .unwrap()
            .unwrap();
        assert!(same_store(&store, &(fx.f.clone() as StoreHandle)));
    }

    #[test]
    fn narrowed_miss_falls_back_to_full_registry() {
        let fx = fixture();
        let address = fx.f.insert("x", &b"data"[..]).unwrap();
        let a = fx.a.clone() as StoreHandle;
        let store = fx
            .resolver
            .resolve(&address, true, move |_| vec![a])
            .unwrap()
            .unwrap();
        assert!(same_store(&store, &(fx.f.clone() as StoreHandle)));
    }

    // -----------------------------------------------------------------------
    // Caching
    // -----------------------------------------------------------------------

    #[test]
    fn second_resolution_hits_the_cache() {
        let fx = fixture();
        let address = fx.a.insert("x", &b"data"[..]).unwrap();
        fx.resolver.resolve(&address, true, all(&fx.resolver)).unwrap();
        fx.resolver.resolve(&address, true, all(&fx.resolver)).unwrap();
        assert_eq!(fx.resolver.scan_count(), 1);
        assert!(fx.resolver.cache().contains(&address));
    }

    #[test]
    fn stale_entry_is_invalidated_and_re_resolved() {
        let fx = fixture();
        let address = fx.a.insert("x", &b"data"[..]).unwrap();
        fx.resolver.resolve(&address, true, all(&fx.resolver)).unwrap();
        fx.a.delete(&address).unwrap();

        assert!(fx.resolver.resolve(&address, true, all(&fx.resolver)).unwrap().is_none());
        assert_eq!(fx.resolver.scan_count(), 2);
        assert!(!fx.resolver.cache().contains(&address));
    }

    #[test]
    fn cached_store_dropping_support_is_inconsistent() {
        let fx = fixture();
        let address = addr("store-a://x");
        fx.resolver
            .cache()
            .put(&address, fx.f.clone() as StoreHandle);
        let err = fx.resolver.resolve(&address, false, all(&fx.resolver)).unwrap_err();
        assert!(matches!(err, StoreError::InconsistentCache { .. }));
    }

    #[test]
    fn concurrent_resolution_scans_once() {
        let fx = Arc::new(fixture());
        let address = fx.a.insert("x", &b"data"[..]).unwrap();
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let fx = Arc::clone(&fx);
                let address = address.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    fx.resolver
                        .resolve(&address, true, all(&fx.resolver))
                        .unwrap()
                        .unwrap()
                })
            })
            .collect();

        let expected = fx.a.clone() as StoreHandle;
        for handle in handles {
            assert!(same_store(&handle.join().unwrap(), &expected));
        }
        assert_eq!(fx.resolver.scan_count(), 1);
    }
}
