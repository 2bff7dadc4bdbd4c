use std::fmt;
use std::sync::Mutex;

use contour_store::StoreHandle;
use contour_types::{ContentAddress, NodeRef, QName};

/// One relocation made inside a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigrationRecord {
    pub node: NodeRef,
    pub property: QName,
    pub old_address: ContentAddress,
    pub new_address: ContentAddress,
}

/// Callback run after a successful commit.
pub type CommitSubscriber = Box<dyn FnOnce() + Send>;

/// Hooks into the host's ambient transaction.
pub trait TransactionHooks {
    /// Delete `record.new_address` from `store` if the transaction rolls
    /// back. Nothing happens on commit.
    fn register_rollback_deletion(&self, store: StoreHandle, record: MigrationRecord);

    /// Run `subscriber` once the transaction commits.
    fn register_commit_subscriber(&self, subscriber: CommitSubscriber);
}

/// Outcome of rolling back a [`LocalTransaction`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RollbackSummary {
    pub deleted: usize,
    /// Orphans that were already gone.
    pub missing: usize,
    /// Deletions that failed; logged, never raised.
    pub failed: usize,
}

/// Minimal in-process transaction implementing [`TransactionHooks`].
///
/// Consumed exactly once, by [`commit`](Self::commit) or
/// [`rollback`](Self::rollback).
#[derive(Default)]
pub struct LocalTransaction {
    rollback_deletions: Mutex<Vec<(StoreHandle, MigrationRecord)>>,
    commit_subscribers: Mutex<Vec<CommitSubscriber>>,
}

impl LocalTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records scheduled for deletion on rollback.
    pub fn pending_records(&self) -> Vec<MigrationRecord> {
        self.rollback_deletions
            .lock()
            .expect("transaction lock poisoned")
            .iter()
            .map(|(_, record)| record.clone())
            .collect()
    }

    /// Commit: run subscribers and forget the rollback deletions.
    pub fn commit(self) {
        let subscribers = self
            .commit_subscribers
            .into_inner()
            .expect("transaction lock poisoned");
        tracing::debug!(subscribers = subscribers.len(), "committing transaction");
        for subscriber in subscribers {
            subscriber();
        }
    }

    /// Roll back: delete every newly created object. Failures are logged
    /// and counted, never raised.
    pub fn rollback(self) -> RollbackSummary {
        let deletions = self
            .rollback_deletions
            .into_inner()
            .expect("transaction lock poisoned");
        let mut summary = RollbackSummary::default();
        for (store, record) in deletions {
            match store.delete(&record.new_address) {
                Ok(true) => summary.deleted += 1,
                Ok(false) => summary.missing += 1,
                Err(err) => {
                    summary.failed += 1;
                    tracing::warn!(
                        address = %record.new_address,
                        store = store.name(),
                        node = %record.node,
                        error = %err,
                        "failed to delete orphaned content during rollback"
                    );
                }
            }
        }
        tracing::debug!(?summary, "rolled back transaction");
        summary
    }
}

impl TransactionHooks for LocalTransaction {
    fn register_rollback_deletion(&self, store: StoreHandle, record: MigrationRecord) {
        self.rollback_deletions
            .lock()
            .expect("transaction lock poisoned")
            .push((store, record));
    }

    fn register_commit_subscriber(&self, subscriber: CommitSubscriber) {
        self.commit_subscribers
            .lock()
            .expect("transaction lock poisoned")
            .push(subscriber);
    }
}

impl fmt::Debug for LocalTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let deletions = self
            .rollback_deletions
            .lock()
            .map(|d| d.len())
            .unwrap_or_default();
        f.debug_struct("LocalTransaction")
            .field("rollback_deletions", &deletions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;
    use contour_store::{
        BackingStore, ContentReader, ContentWriter, InMemoryBackingStore, StoreError, StoreResult,
        WriteContext,
    };

    fn record(new_address: ContentAddress) -> MigrationRecord {
        MigrationRecord {
            node: NodeRef::new("n1"),
            property: QName::new("cm:content"),
            old_address: ContentAddress::parse("old://x").unwrap(),
            new_address,
        }
    }

    #[test]
    fn rollback_deletes_new_objects() {
        let store = Arc::new(InMemoryBackingStore::new("a", "mem"));
        let created = store.insert("new", &b"data"[..]).unwrap();

        let tx = LocalTransaction::new();
        tx.register_rollback_deletion(store.clone(), record(created.clone()));
        tx.register_rollback_deletion(
            store.clone(),
            record(ContentAddress::parse("mem://gone").unwrap()),
        );
        assert_eq!(tx.pending_records().len(), 2);

        let summary = tx.rollback();
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.missing, 1);
        assert!(!store.exists(&created).unwrap());
    }

    #[derive(Debug)]
    struct BrokenStore;

    impl BackingStore for BrokenStore {
        fn name(&self) -> &str {
            "broken"
        }

        fn supports_address(&self, _address: &ContentAddress) -> bool {
            true
        }

        fn exists(&self, _address: &ContentAddress) -> StoreResult<bool> {
            Ok(true)
        }

        fn read(&self, address: &ContentAddress) -> StoreResult<ContentReader> {
            Err(StoreError::NotFound(address.clone()))
        }

        fn write(&self, _context: &WriteContext) -> StoreResult<Box<dyn ContentWriter>> {
            Err(StoreError::ReadOnly("broken".to_string()))
        }

        fn delete(&self, address: &ContentAddress) -> StoreResult<bool> {
            Err(StoreError::io(address, "broken", std::io::Error::other("device gone")))
        }
    }

    #[test]
    fn rollback_failures_are_counted_not_raised() {
        let tx = LocalTransaction::new();
        tx.register_rollback_deletion(
            Arc::new(BrokenStore),
            record(ContentAddress::parse("mem://x").unwrap()),
        );
        let summary = tx.rollback();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.deleted, 0);
    }

    #[test]
    fn commit_keeps_objects_and_runs_subscribers() {
        let store = Arc::new(InMemoryBackingStore::new("a", "mem"));
        let created = store.insert("new", &b"data"[..]).unwrap();
        let ran = Arc::new(AtomicBool::new(false));

        let tx = LocalTransaction::new();
        tx.register_rollback_deletion(store.clone(), record(created.clone()));
        let flag = Arc::clone(&ran);
        tx.register_commit_subscriber(Box::new(move || flag.store(true, Ordering::SeqCst)));
        tx.commit();

        assert!(ran.load(Ordering::SeqCst));
        assert!(store.exists(&created).unwrap());
    }
}
