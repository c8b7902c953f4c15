//! In-memory queue store for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

use finpro_common::{Error, Result};

use crate::operation::{OperationId, OperationKind, OperationStatus, QueuedOperation};
use crate::store::QueueStore;

/// In-memory queue store.
///
/// Useful for testing and development. All entries are kept in memory
/// and lost on drop. Clones share the same entries.
#[derive(Clone, Default)]
pub struct MemoryQueueStore {
    entries: Arc<RwLock<HashMap<OperationId, QueuedOperation>>>,
}

impl MemoryQueueStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<OperationId, QueuedOperation>>> {
        self.entries
            .read()
            .map_err(|_| Error::Storage("Queue lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<OperationId, QueuedOperation>>> {
        self.entries
            .write()
            .map_err(|_| Error::Storage("Queue lock poisoned".to_string()))
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn enqueue(
        &self,
        kind: OperationKind,
        destination: &str,
        payload: serde_json::Value,
    ) -> Result<OperationId> {
        let operation = QueuedOperation::new(kind, destination, payload)?;
        let id = operation.id.clone();

        let mut entries = self.write()?;
        if entries.contains_key(&id) {
            return Err(Error::AlreadyExists(format!("Operation {} already queued", id)));
        }
        entries.insert(id.clone(), operation);

        debug!(%id, %kind, destination, "Queued operation");
        Ok(id)
    }

    async fn get(&self, id: &OperationId) -> Result<Option<QueuedOperation>> {
        Ok(self.read()?.get(id).cloned())
    }

    async fn list(&self, status: Option<OperationStatus>) -> Result<Vec<QueuedOperation>> {
        let entries = self.read()?;
        Ok(entries
            .values()
            .filter(|op| status.map_or(true, |s| op.status == s))
            .cloned()
            .collect())
    }

    async fn mark_processing(&self, id: &OperationId) -> Result<bool> {
        let mut entries = self.write()?;
        match entries.get_mut(id) {
            Some(op) if op.status == OperationStatus::Pending => {
                op.status = OperationStatus::Processing;
                Ok(true)
            }
            Some(op) => {
                debug!(%id, status = %op.status, "Operation not claimable");
                Ok(false)
            }
            None => {
                warn!(%id, "Cannot claim missing operation");
                Ok(false)
            }
        }
    }

    async fn requeue(&self, id: &OperationId, retry_count: u32) -> Result<()> {
        let mut entries = self.write()?;
        match entries.get_mut(id) {
            Some(op) => {
                op.status = OperationStatus::Pending;
                op.retry_count = retry_count;
            }
            None => warn!(%id, "Cannot requeue missing operation"),
        }
        Ok(())
    }

    async fn mark_failed(&self, id: &OperationId) -> Result<()> {
        let mut entries = self.write()?;
        match entries.get_mut(id) {
            Some(op) => op.status = OperationStatus::Failed,
            None => warn!(%id, "Cannot fail missing operation"),
        }
        Ok(())
    }

    async fn delete(&self, id: &OperationId) -> Result<()> {
        if self.write()?.remove(id).is_none() {
            warn!(%id, "Cannot delete missing operation");
        }
        Ok(())
    }

    async fn count(&self, status: OperationStatus) -> Result<usize> {
        Ok(self.read()?.values().filter(|op| op.status == status).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_enqueue_and_list_pending() {
        let store = MemoryQueueStore::new();
        let id = store
            .enqueue(OperationKind::Create, "/api/leads", json!({"email": "a@b.com"}))
            .await
            .unwrap();

        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert_eq!(pending[0].status, OperationStatus::Pending);
        assert_eq!(pending[0].retry_count, 0);
    }

    #[tokio::test]
    async fn test_processing_hidden_from_pending() {
        let store = MemoryQueueStore::new();
        let id = store
            .enqueue(OperationKind::Update, "/api/profile", json!({}))
            .await
            .unwrap();

        assert!(store.mark_processing(&id).await.unwrap());
        assert!(store.list_pending().await.unwrap().is_empty());
        assert_eq!(store.count(OperationStatus::Processing).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let store = MemoryQueueStore::new();
        let id = store
            .enqueue(OperationKind::Create, "/api/leads", json!({}))
            .await
            .unwrap();

        assert!(store.mark_processing(&id).await.unwrap());
        assert!(!store.mark_processing(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_requeue_sets_retry_count() {
        let store = MemoryQueueStore::new();
        let id = store
            .enqueue(OperationKind::Create, "/api/leads", json!({}))
            .await
            .unwrap();

        store.mark_processing(&id).await.unwrap();
        store.requeue(&id, 1).await.unwrap();

        let op = store.get(&id).await.unwrap().unwrap();
        assert_eq!(op.status, OperationStatus::Pending);
        assert_eq!(op.retry_count, 1);
    }

    #[tokio::test]
    async fn test_missing_ids_are_ignored() {
        let store = MemoryQueueStore::new();
        let ghost = OperationId::new("0-ghost").unwrap();

        assert!(!store.mark_processing(&ghost).await.unwrap());
        store.requeue(&ghost, 2).await.unwrap();
        store.mark_failed(&ghost).await.unwrap();
        store.delete(&ghost).await.unwrap();
        assert!(store.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_retained() {
        let store = MemoryQueueStore::new();
        let id = store
            .enqueue(OperationKind::Delete, "/api/leads/7", json!(null))
            .await
            .unwrap();

        store.mark_failed(&id).await.unwrap();

        assert_eq!(store.count(OperationStatus::Failed).await.unwrap(), 1);
        assert!(store.list_pending().await.unwrap().is_empty());
        assert!(store.get(&id).await.unwrap().is_some());
    }

    proptest! {
        #[test]
        fn prop_pending_count_tracks_enqueues_and_deletes(n in 0usize..40, drained in 0usize..40) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let store = MemoryQueueStore::new();
                for i in 0..n {
                    store
                        .enqueue(OperationKind::Create, "/api/leads", json!({"n": i}))
                        .await
                        .unwrap();
                }

                let pending = store.list_pending().await.unwrap();
                let drained = drained.min(pending.len());
                for op in pending.iter().take(drained) {
                    store.delete(&op.id).await.unwrap();
                }

                let all = store.list(None).await.unwrap();
                let mut ids: Vec<_> = all.iter().map(|op| op.id.clone()).collect();
                ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
                ids.dedup();

                assert_eq!(store.count(OperationStatus::Pending).await.unwrap(), n - drained);
                assert_eq!(ids.len(), all.len());
            });
        }
    }
}
