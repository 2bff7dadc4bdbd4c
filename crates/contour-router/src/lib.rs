//! Address resolution and routing policies for contour.
//!
//! A [`ContentRouter`] is itself a backing store. It owns an
//! [`AddressResolver`] for finding the store that holds an address and a
//! [`RoutingPolicy`] for deciding where new content goes.
//!
//! # Resolution
//!
//! 1. Cache lookup under the read lock, re-checking existence when asked.
//! 2. On a miss, the write lock, a second cache check, then a scan of the
//!    policy's narrowed candidates.
//! 3. A narrowed miss always falls back to the full registry.
//! 4. An address no store supports is `UnsupportedAddress`; a supported but
//!    absent address is a plain miss.
//!
//! # Policies
//!
//! - [`TenantPolicy`] -- by tenant domain
//! - [`SitePolicy`] -- by site, then site preset
//! - [`SelectorPolicy`] -- by the value of a node property
//! - [`TypePolicy`] -- by node type, via the [`TypeHierarchy`]

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod hierarchy;
pub mod policy;
pub mod registry;
pub mod resolver;
pub mod router;

pub use cache::{CacheKey, InMemoryStoreCache, ResolutionCache, RouterInstanceId, StoreCache};
pub use config::{
    MigrationSettings, RouterConfig, SelectorPolicyConfig, SitePolicyConfig, StoreCatalog,
    TenantPolicyConfig, TypePolicyConfig,
};
pub use context::{ContextScope, RoutingContext};
pub use error::ConfigError;
pub use hierarchy::{InMemoryTypeHierarchy, TypeHierarchy};
pub use policy::{
    ReservedRoutes, RouteProperties, RouteTable, RoutingPolicy, SelectorPolicy, SitePolicy,
    TenantPolicy, TypePolicy, DEFAULT_ROUTE, FALLBACK_ROUTE,
};
pub use registry::StoreRegistry;
pub use resolver::AddressResolver;
pub use router::ContentRouter;
