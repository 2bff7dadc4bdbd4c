//! Lifecycle-driven content migration for contour.
//!
//! When a node's routing criteria change (it moves to another site, its
//! selector property is edited, its type changes) its content may no longer
//! live where the router would now place it. The [`MigrationCoordinator`]
//! reacts to host [`LifecycleEvent`]s by copying or relinking that content
//! and rewriting the node's content properties.
//!
//! # Key Types
//!
//! - [`MigrationTrigger`] -- per-policy decision of which events matter
//! - [`MigrationCoordinator`] -- the copy-then-rewrite sequence
//! - [`NodeService`] / [`TransactionHooks`] -- what the host must provide
//! - [`LocalTransaction`] -- in-process transaction with rollback deletions
//! - [`InMemoryNodeService`] -- node tree for tests and embedding
//!
//! # Design Rules
//!
//! 1. A node's properties are rewritten in one batch, only after every copy
//!    for that node succeeded.
//! 2. Objects created by a migration are deleted if the transaction rolls
//!    back; the original objects are never touched.
//! 3. Content the router does not own is left alone.
//! 4. Migrating the same node twice without a criteria change copies
//!    nothing the second time.

pub mod coordinator;
pub mod error;
pub mod event;
pub mod host;
pub mod initializer;
pub mod memory;
pub mod scope;
pub mod transaction;
pub mod trigger;

pub use coordinator::{MigrationCoordinator, MigrationReport};
pub use error::{HostError, HostResult, MigrationError, MigrationResult};
pub use event::LifecycleEvent;
pub use host::NodeService;
pub use initializer::{ContextInitializer, NodeTypeInitializer, SelectorInitializer, SiteInitializer};
pub use memory::InMemoryNodeService;
pub use scope::{same_site_scope, site_scope, SiteModel, SiteScope};
pub use transaction::{
    CommitSubscriber, LocalTransaction, MigrationRecord, RollbackSummary, TransactionHooks,
};
pub use trigger::{MigrationCandidate, MigrationTrigger, TriggerContext};
