//! Backing stores for contour.
//!
//! A backing store is anything that can hold content objects addressed by
//! a [`ContentAddress`](contour_types::ContentAddress): a physical store,
//! a facade decorating one, or a router choosing among many. The router
//! never creates or destroys stores; it only selects among a pre-built,
//! immutable list of [`StoreHandle`]s.
//!
//! # Capability Contract
//!
//! All stores implement the [`BackingStore`] trait:
//!
//! - `supports_address` -- is the address format one this store handles?
//! - `exists` / `read` -- probe or fetch an object
//! - `write` -- obtain a [`ContentWriter`] for a new object
//! - `delete` -- idempotent removal
//!
//! # Implementations
//!
//! - [`InMemoryBackingStore`] -- `HashMap`-based physical store with I/O
//!   counters, for tests and embedding
//! - [`RoutingPrefixStore`] -- facade that adds a `tag/value` routing prefix
//!   to every address it hands out and strips it on the way in
//!
//! # Design Rules
//!
//! 1. Store identity is reference identity ([`same_store`]).
//! 2. Deleting a missing object is a successful no-op.
//! 3. Store I/O failures are wrapped with address and store name, never
//!    swallowed.

pub mod content;
pub mod error;
pub mod facade;
pub mod memory;
pub mod traits;

pub use content::{ContentReader, WriteContext};
pub use error::{StoreError, StoreResult};
pub use facade::RoutingPrefixStore;
pub use memory::{InMemoryBackingStore, StoreStats};
pub use traits::{same_store, BackingStore, ContentWriter, StoreHandle};
