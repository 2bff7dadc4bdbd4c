use std::fmt;
use std::sync::Arc;

use contour_store::{
    BackingStore, ContentReader, ContentWriter, StoreError, StoreHandle, StoreResult, WriteContext,
};
use contour_types::{ContentAddress, QName, RoutingCriteria};

use crate::cache::{InMemoryStoreCache, ResolutionCache, StoreCache};
use crate::config::RouterConfig;
use crate::context::RoutingContext;
use crate::policy::RoutingPolicy;
use crate::resolver::AddressResolver;

/// A backing store that routes every call to one of the stores of its
/// policy.
///
/// Reads, probes and deletes are resolved by address; writes are placed by
/// the policy from the criteria of the write (or, if the write carries none,
/// the ambient [`RoutingContext`]).
pub struct ContentRouter<P> {
    name: String,
    policy: P,
    resolver: AddressResolver,
}

impl<P: RoutingPolicy> ContentRouter<P> {
    /// Create a router with its own resolution cache.
    pub fn new(policy: P, config: &RouterConfig) -> Self {
        let cache: Arc<dyn StoreCache> = match config.cache_capacity {
            Some(capacity) => Arc::new(InMemoryStoreCache::bounded(capacity)),
            None => Arc::new(InMemoryStoreCache::new()),
        };
        Self::with_cache(policy, cache)
    }

    /// Create a router whose entries live in a shared cache.
    pub fn with_cache(policy: P, cache: Arc<dyn StoreCache>) -> Self {
        let resolver = AddressResolver::new(ResolutionCache::new(cache), Arc::clone(policy.registry()));
        Self {
            name: format!("{}-router", policy.name()),
            policy,
            resolver,
        }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn resolver(&self) -> &AddressResolver {
        &self.resolver
    }

    /// Resolve `address` to its owner, narrowing by the policy first.
    pub fn resolve(&self, address: &ContentAddress, must_exist: bool) -> StoreResult<Option<StoreHandle>> {
        self.resolver
            .resolve(address, must_exist, |address| self.policy.candidate_stores(address))
    }

    /// Store a new write should go to.
    ///
    /// 1. Not routable: the policy's default route.
    /// 2. Mapped criteria: the mapped route.
    /// 3. Requested address: whichever store supports it.
    /// 4. Otherwise: the policy's fallback route.
    pub fn select_write_target(
        &self,
        criteria: &RoutingCriteria,
        property: Option<&QName>,
        requested: Option<&ContentAddress>,
    ) -> StoreResult<StoreHandle> {
        let routes = self.policy.reserved_routes();
        if !self.policy.is_routable(criteria, property) {
            tracing::debug!(policy = self.policy.name(), "write not routable, using default route");
            return Ok(routes.default_route().clone());
        }
        if let Some(store) = self.policy.lookup(criteria) {
            tracing::debug!(policy = self.policy.name(), store = store.name(), "selected mapped route");
            return Ok(store);
        }
        if let Some(address) = requested {
            if let Some(store) = self.resolve(address, false)? {
                return Ok(store);
            }
        }
        tracing::debug!(policy = self.policy.name(), "no route mapped, using fallback route");
        Ok(routes.fallback_route().clone())
    }

    /// Store existing content should migrate to under `criteria`: the mapped
    /// route, else the fallback route.
    pub fn select_move_target(&self, criteria: &RoutingCriteria) -> StoreHandle {
        self.policy
            .lookup(criteria)
            .unwrap_or_else(|| self.policy.reserved_routes().fallback_route().clone())
    }

    fn owner(&self, address: &ContentAddress) -> StoreResult<StoreHandle> {
        self.resolve(address, true)?
            .ok_or_else(|| StoreError::NotFound(address.clone()))
    }
}

impl<P: RoutingPolicy> BackingStore for ContentRouter<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_address(&self, address: &ContentAddress) -> bool {
        self.policy
            .registry()
            .all_stores()
            .iter()
            .any(|store| store.supports_address(address))
    }

    fn exists(&self, address: &ContentAddress) -> StoreResult<bool> {
        Ok(self.resolve(address, true)?.is_some())
    }

    fn read(&self, address: &ContentAddress) -> StoreResult<ContentReader> {
        let reader = self.owner(address)?.read(address)?;
        if address.is_wildcard() {
            Ok(reader)
        } else {
            Ok(reader.with_address(address.clone()))
        }
    }

    fn write(&self, context: &WriteContext) -> StoreResult<Box<dyn ContentWriter>> {
        if let Some(requested) = &context.address {
            if self.resolver.cache().contains(requested) {
                return Err(StoreError::ContentExists(requested.clone()));
            }
        }
        let criteria = if context.criteria.is_empty() {
            RoutingContext::current()
        } else {
            context.criteria.clone()
        };
        let store = self.select_write_target(
            &criteria,
            context.property.as_ref(),
            context.address.as_ref(),
        )?;
        if !store.is_write_supported() {
            return Err(StoreError::ReadOnly(store.name().to_string()));
        }
        let writer = store.write(context)?;
        self.resolver.record_owner(writer.address(), store);
        Ok(writer)
    }

    fn delete(&self, address: &ContentAddress) -> StoreResult<bool> {
        let mut deleted = false;
        for store in self.policy.registry().writable_stores() {
            if store.supports_address(address) {
                deleted |= store.delete(address)?;
            }
        }
        self.resolver.cache().invalidate(address);
        Ok(deleted)
    }
}

impl<P: RoutingPolicy> fmt::Debug for ContentRouter<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentRouter")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("resolver", &self.resolver)
            .finish()
    }
}
