//! Queue store trait definition.

use async_trait::async_trait;

use finpro_common::Result;

use crate::operation::{OperationId, OperationKind, OperationStatus, QueuedOperation};

/// Record store holding queued operations.
///
/// Each call is atomic on its own. Callers that need a compare-and-set use
/// [`QueueStore::mark_processing`], which only succeeds for pending entries.
/// The UI layer only appends and reads counts; status transitions belong to
/// the sync engine.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Backend name (e.g. "memory", "sqlite").
    fn name(&self) -> &str;

    /// Append a new pending operation.
    ///
    /// # Postconditions
    /// - Entry is stored with `status = pending` and `retry_count = 0`
    ///
    /// # Errors
    /// - `StorageUnavailable` if the store cannot be written
    /// - `InvalidInput` for an empty destination
    async fn enqueue(
        &self,
        kind: OperationKind,
        destination: &str,
        payload: serde_json::Value,
    ) -> Result<OperationId>;

    /// Fetch a single entry.
    async fn get(&self, id: &OperationId) -> Result<Option<QueuedOperation>>;

    /// All entries with the given status, or every entry for `None`.
    ///
    /// No ordering is guaranteed.
    async fn list(&self, status: Option<OperationStatus>) -> Result<Vec<QueuedOperation>>;

    /// All pending entries, in no guaranteed order.
    async fn list_pending(&self) -> Result<Vec<QueuedOperation>> {
        self.list(Some(OperationStatus::Pending)).await
    }

    /// Claim a pending entry for an attempt.
    ///
    /// Returns `false` if the entry is absent or no longer pending.
    async fn mark_processing(&self, id: &OperationId) -> Result<bool>;

    /// Put an entry back to pending with the given retry count.
    ///
    /// Absent ids are logged and ignored.
    async fn requeue(&self, id: &OperationId, retry_count: u32) -> Result<()>;

    /// Mark an entry as terminally failed.
    ///
    /// Absent ids are logged and ignored.
    async fn mark_failed(&self, id: &OperationId) -> Result<()>;

    /// Remove an entry.
    ///
    /// Absent ids are logged and ignored.
    async fn delete(&self, id: &OperationId) -> Result<()>;

    /// Number of entries with the given status.
    async fn count(&self, status: OperationStatus) -> Result<usize>;
}
