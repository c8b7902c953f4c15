//! Sync engine that drains the local queue against the origin.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use url::Url;

use finpro_common::{Error, FetchRequest, Result};
use finpro_network::{resolve_url, ConnectivityMonitor, Transport};
use finpro_storage::{OperationId, OperationKind, OperationStatus, QueueStore, QueuedOperation};

use crate::retry::{RetryDecision, RetryPolicy, DEFAULT_MAX_ATTEMPTS};
use crate::scheduler::SyncMode;
use crate::state::{DrainOutcome, DrainReport, SyncEvent, SyncTrigger};

/// Tag registered for background sync of queued operations.
pub const DEFAULT_SYNC_TAG: &str = "sync-offline-operations";

/// Tag used by older clients for offline form submissions.
pub const LEGACY_SYNC_TAG: &str = "sync-form-data";

/// Tag registered for periodic background sync.
pub const DEFAULT_PERIODIC_SYNC_TAG: &str = "content-sync";

const EVENT_CAPACITY: usize = 64;

/// Configuration for the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Total attempts per operation, including the first.
    pub max_attempts: u32,
    /// When drains happen without an explicit request.
    pub sync_mode: SyncMode,
    /// Background-sync tag requested on enqueue.
    pub background_sync_tag: String,
    /// Additional tags that also trigger a drain.
    pub legacy_sync_tags: Vec<String>,
    /// Periodic-sync tag that triggers a drain.
    pub periodic_sync_tag: String,
}

impl SyncConfig {
    /// Whether a background-sync callback with `tag` should drain the queue.
    pub fn accepts_tag(&self, tag: &str) -> bool {
        tag == self.background_sync_tag || self.legacy_sync_tags.iter().any(|t| t == tag)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            sync_mode: SyncMode::OnReconnect,
            background_sync_tag: DEFAULT_SYNC_TAG.to_string(),
            legacy_sync_tags: vec![LEGACY_SYNC_TAG.to_string()],
            periodic_sync_tag: DEFAULT_PERIODIC_SYNC_TAG.to_string(),
        }
    }
}

/// Clears the single-flight flag when a pass ends, however it ends.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drains pending operations, one pass per trigger.
///
/// The single-flight flag only guards passes within this engine. Passes
/// from another context sharing the store are kept apart per entry by the
/// store's conditional claim.
pub struct SyncEngine {
    store: Arc<dyn QueueStore>,
    transport: Arc<dyn Transport>,
    connectivity: ConnectivityMonitor,
    origin: Url,
    policy: RetryPolicy,
    config: SyncConfig,
    draining: AtomicBool,
    /// Claimed entries a failed store update could not release.
    stranded: Mutex<Vec<(OperationId, u32)>>,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncEngine {
    /// Create a new sync engine.
    pub fn new(
        store: Arc<dyn QueueStore>,
        transport: Arc<dyn Transport>,
        connectivity: ConnectivityMonitor,
        origin: Url,
        config: SyncConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            transport,
            connectivity,
            origin,
            policy: RetryPolicy::new(config.max_attempts),
            config,
            draining: AtomicBool::new(false),
            stranded: Mutex::new(Vec::new()),
            events,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn QueueStore> {
        &self.store
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    /// Whether a pass is running in this engine.
    pub fn is_syncing(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Observe pass start and completion.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub async fn pending_count(&self) -> Result<usize> {
        self.store.count(OperationStatus::Pending).await
    }

    /// Drain if `tag` names the periodic sync registration.
    pub async fn handle_periodic_sync(&self, tag: &str) -> Result<Option<DrainOutcome>> {
        if tag != self.config.periodic_sync_tag {
            debug!(tag, "Ignoring unrelated periodic sync");
            return Ok(None);
        }
        Ok(Some(self.drain(SyncTrigger::Periodic).await?))
    }

    /// Run one drain pass over the entries pending right now.
    ///
    /// Each entry is attempted at most once per pass. Entries requeued during
    /// the pass wait for the next trigger.
    pub async fn drain(&self, trigger: SyncTrigger) -> Result<DrainOutcome> {
        if self.connectivity.is_offline() {
            debug!(%trigger, "Offline, skipping drain");
            return Ok(DrainOutcome::Offline);
        }

        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(%trigger, "Drain already running");
            return Ok(DrainOutcome::AlreadyRunning);
        }
        let _guard = FlightGuard(&self.draining);

        self.release_stranded().await;

        let pending = self.store.list_pending().await?;
        info!(%trigger, pending = pending.len(), "Starting drain");

        let start = Instant::now();
        let _ = self.events.send(SyncEvent::SyncStarted {
            trigger: trigger.clone(),
        });

        let mut success_count = 0;
        let mut failed_count = 0;
        let mut skipped_count = 0;

        for operation in pending {
            let claimed = match self.store.mark_processing(&operation.id).await {
                Ok(claimed) => claimed,
                Err(err) => {
                    warn!(id = %operation.id, error = %err, "Could not claim operation");
                    false
                }
            };
            if !claimed {
                skipped_count += 1;
                continue;
            }

            match self.settle(&operation).await {
                Ok(true) => success_count += 1,
                Ok(false) => failed_count += 1,
                Err(err) => {
                    warn!(id = %operation.id, error = %err, "Queue update failed, releasing operation");
                    failed_count += 1;
                    self.release(&operation).await;
                }
            }
        }

        let report = DrainReport::new(success_count, failed_count, skipped_count, start.elapsed());
        info!(
            %trigger,
            success = report.success_count,
            failed = report.failed_count,
            skipped = report.skipped_count,
            "Drain completed in {:?}",
            report.duration
        );

        let _ = self.events.send(SyncEvent::SyncCompleted {
            trigger,
            report: report.clone(),
        });
        Ok(DrainOutcome::Completed(report))
    }

    /// Drain if `tag` names a queue background sync.
    pub async fn handle_background_sync(&self, tag: &str) -> Result<Option<DrainOutcome>> {
        if !self.config.accepts_tag(tag) {
            debug!(tag, "Ignoring unrelated background sync");
            return Ok(None);
        }
        let outcome = self
            .drain(SyncTrigger::Background {
                tag: tag.to_string(),
            })
            .await?;
        Ok(Some(outcome))
    }

    /// Attempt a claimed operation and record the result in the store.
    ///
    /// Returns whether it was delivered. A store error leaves the entry
    /// claimed; the caller releases it.
    async fn settle(&self, operation: &QueuedOperation) -> Result<bool> {
        let err = match self.attempt(operation).await {
            Ok(()) => {
                self.store.delete(&operation.id).await?;
                debug!(id = %operation.id, "Operation delivered");
                return Ok(true);
            }
            Err(err) => err,
        };

        match self.policy.on_failure(operation.retry_count, &err) {
            RetryDecision::Requeue { retry_count } => {
                self.store.requeue(&operation.id, retry_count).await?;
            }
            RetryDecision::Fail => {
                error!(
                    id = %operation.id,
                    destination = %operation.destination,
                    retry_count = operation.retry_count,
                    error = %err,
                    "Operation failed permanently"
                );
                self.store.mark_failed(&operation.id).await?;
            }
        }
        Ok(false)
    }

    /// Return a claimed entry to pending with its retry count unchanged.
    ///
    /// Entries the store refuses are kept and released at the start of the
    /// next pass.
    async fn release(&self, operation: &QueuedOperation) {
        if let Err(err) = self.store.requeue(&operation.id, operation.retry_count).await {
            error!(id = %operation.id, error = %err, "Could not release operation");
            self.stranded().push((operation.id.clone(), operation.retry_count));
        }
    }

    async fn release_stranded(&self) {
        let stranded = std::mem::take(&mut *self.stranded());
        for (id, retry_count) in stranded {
            match self.store.requeue(&id, retry_count).await {
                Ok(()) => info!(%id, "Released operation from an earlier pass"),
                Err(err) => {
                    warn!(%id, error = %err, "Operation still stranded");
                    self.stranded().push((id, retry_count));
                }
            }
        }
    }

    fn stranded(&self) -> MutexGuard<'_, Vec<(OperationId, u32)>> {
        self.stranded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Deliver one operation. Non-success statuses are failures.
    async fn attempt(&self, operation: &QueuedOperation) -> Result<()> {
        let url = resolve_url(&self.origin, &operation.destination)?;
        let mut request = FetchRequest::new(operation.kind.http_method(), url);
        if operation.kind != OperationKind::Delete {
            request = request.with_json_body(&operation.payload)?;
        }

        let response = self.transport.fetch(request).await.map_err(|err| {
            warn!(id = %operation.id, error = %err, "Sync attempt failed");
            err
        })?;

        if !response.is_success() {
            warn!(id = %operation.id, status = response.status, "Sync attempt rejected");
            return Err(Error::Http {
                status: response.status,
                url: operation.destination.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finpro_common::{FetchResponse, HttpMethod};
    use finpro_network::{MemoryTransport, Reply};
    use crate::scheduler::SyncScheduler;
    use async_trait::async_trait;
    use finpro_storage::{MemoryQueueStore, SqliteQueueStore};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use serde_json::json;

    const ORIGIN: &str = "https://fintech.example";
    const LEADS: &str = "https://fintech.example/api/leads";

    struct Fixture {
        store: Arc<dyn QueueStore>,
        transport: MemoryTransport,
        connectivity: ConnectivityMonitor,
        engine: SyncEngine,
    }

    fn fixture_with(store: Arc<dyn QueueStore>, online: bool) -> Fixture {
        let transport = MemoryTransport::new();
        let connectivity = ConnectivityMonitor::new(online);
        let engine = SyncEngine::new(
            store.clone(),
            Arc::new(transport.clone()),
            connectivity.clone(),
            Url::parse(ORIGIN).unwrap(),
            SyncConfig::default(),
        );
        Fixture {
            store,
            transport,
            connectivity,
            engine,
        }
    }

    fn fixture(online: bool) -> Fixture {
        fixture_with(Arc::new(MemoryQueueStore::new()), online)
    }

    fn completed(outcome: DrainOutcome) -> DrainReport {
        match outcome {
            DrainOutcome::Completed(report) => report,
            other => panic!("expected a completed drain, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_drain_is_idempotent() {
        let f = fixture(true);

        let report = completed(f.engine.drain(SyncTrigger::Manual).await.unwrap());
        assert_eq!(report.success_count, 0);
        assert_eq!(report.failed_count, 0);
        assert!(f.store.list(None).await.unwrap().is_empty());
        assert!(f.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_offline_drain_does_nothing() {
        let f = fixture(false);
        f.store
            .enqueue(OperationKind::Create, "/api/leads", json!({"email": "a@b.com"}))
            .await
            .unwrap();

        let outcome = f.engine.drain(SyncTrigger::Manual).await.unwrap();
        assert_eq!(outcome, DrainOutcome::Offline);
        assert_eq!(f.engine.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_success_deletes_and_sends_json() {
        let f = fixture(true);
        f.transport
            .respond(HttpMethod::Post, LEADS, FetchResponse::new(201, "{}"));
        f.store
            .enqueue(OperationKind::Create, "/api/leads", json!({"email": "a@b.com"}))
            .await
            .unwrap();

        let report = completed(f.engine.drain(SyncTrigger::Manual).await.unwrap());
        assert_eq!(report.success_count, 1);
        assert!(f.store.list(None).await.unwrap().is_empty());

        let calls = f.transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].header("Content-Type"), Some("application/json"));
        assert_eq!(
            calls[0].body.as_deref(),
            Some(br#"{"email":"a@b.com"}"#.as_slice())
        );
    }

    #[tokio::test]
    async fn test_kinds_map_to_verbs() {
        let f = fixture(true);
        let item = "https://fintech.example/api/leads/42";
        f.transport.respond(HttpMethod::Put, item, FetchResponse::ok(""));
        f.transport
            .respond(HttpMethod::Delete, item, FetchResponse::new(204, ""));

        f.store
            .enqueue(OperationKind::Update, "/api/leads/42", json!({"stage": "won"}))
            .await
            .unwrap();
        f.store
            .enqueue(OperationKind::Delete, "/api/leads/42", json!(null))
            .await
            .unwrap();

        let report = completed(f.engine.drain(SyncTrigger::Manual).await.unwrap());
        assert_eq!(report.success_count, 2);
        assert_eq!(f.transport.call_count(HttpMethod::Put, item), 1);
        assert_eq!(f.transport.call_count(HttpMethod::Delete, item), 1);

        let delete = f
            .transport
            .calls()
            .into_iter()
            .find(|r| r.method == HttpMethod::Delete)
            .unwrap();
        assert!(delete.body.is_none());
    }

    #[tokio::test]
    async fn test_leads_scenario_retries_to_failed() {
        let f = fixture(false);
        f.transport
            .respond(HttpMethod::Post, LEADS, FetchResponse::new(500, "boom"));

        let id = f
            .store
            .enqueue(OperationKind::Create, "/api/leads", json!({"email": "a@b.com"}))
            .await
            .unwrap();

        let pending = f.store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].status, OperationStatus::Pending);
        assert_eq!(pending[0].retry_count, 0);

        let mut statuses = Vec::new();
        for _ in 0..3 {
            f.connectivity.set_online(false);
            f.connectivity.set_online(true);
            let report = completed(
                f.engine
                    .drain(SyncTrigger::ConnectivityRestored)
                    .await
                    .unwrap(),
            );
            assert_eq!(report.failed_count, 1);
            statuses.push(f.store.get(&id).await.unwrap().unwrap().status);
        }

        assert_eq!(
            statuses,
            vec![
                OperationStatus::Pending,
                OperationStatus::Pending,
                OperationStatus::Failed
            ]
        );

        let entry = f.store.get(&id).await.unwrap().unwrap();
        assert_eq!(entry.status, OperationStatus::Failed);
        assert_eq!(entry.retry_count, 2);
        assert_eq!(f.transport.call_count(HttpMethod::Post, LEADS), 3);

        // A failed entry is never attempted again automatically.
        let report = completed(f.engine.drain(SyncTrigger::Manual).await.unwrap());
        assert!(report.is_empty());
        assert_eq!(f.transport.call_count(HttpMethod::Post, LEADS), 3);
    }

    #[tokio::test]
    async fn test_requeued_entries_wait_for_next_pass() {
        let f = fixture(true);
        f.transport.script(
            HttpMethod::Post,
            LEADS,
            vec![Reply::Fail("reset".to_string())],
        );
        f.transport.respond(HttpMethod::Post, LEADS, FetchResponse::ok(""));
        f.store
            .enqueue(OperationKind::Create, "/api/leads", json!({}))
            .await
            .unwrap();

        let first = completed(f.engine.drain(SyncTrigger::Manual).await.unwrap());
        assert_eq!((first.success_count, first.failed_count), (0, 1));
        assert_eq!(f.transport.call_count(HttpMethod::Post, LEADS), 1);
        assert_eq!(f.engine.pending_count().await.unwrap(), 1);

        let second = completed(f.engine.drain(SyncTrigger::Manual).await.unwrap());
        assert_eq!((second.success_count, second.failed_count), (1, 0));
        assert_eq!(f.engine.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invalid_destination_fails_without_retry() {
        let f = fixture(true);
        let id = f
            .store
            .enqueue(OperationKind::Create, "http://[::1", json!({}))
            .await
            .unwrap();

        completed(f.engine.drain(SyncTrigger::Manual).await.unwrap());

        let entry = f.store.get(&id).await.unwrap().unwrap();
        assert_eq!(entry.status, OperationStatus::Failed);
        assert_eq!(entry.retry_count, 0);
        assert!(f.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_processing_entries_are_not_drained() {
        let f = fixture(true);
        f.transport.respond(HttpMethod::Post, LEADS, FetchResponse::ok(""));
        let id = f
            .store
            .enqueue(OperationKind::Create, "/api/leads", json!({}))
            .await
            .unwrap();

        // Another context is mid-attempt.
        assert!(f.store.mark_processing(&id).await.unwrap());

        let report = completed(f.engine.drain(SyncTrigger::Manual).await.unwrap());
        assert_eq!(report.skipped_count, 0);
        assert_eq!(report.success_count, 0);
        assert!(f.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_events_bracket_the_pass() {
        let f = fixture(true);
        let mut events = f.engine.subscribe();

        f.engine.drain(SyncTrigger::Manual).await.unwrap();

        assert!(matches!(
            events.recv().await.unwrap(),
            SyncEvent::SyncStarted { trigger: SyncTrigger::Manual }
        ));
        match events.recv().await.unwrap() {
            SyncEvent::SyncCompleted { report, .. } => assert!(report.is_empty()),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(!f.engine.is_syncing());
    }

    #[tokio::test]
    async fn test_background_sync_tags() {
        let f = fixture(true);

        assert!(f
            .engine
            .handle_background_sync("sync-offline-operations")
            .await
            .unwrap()
            .is_some());
        assert!(f
            .engine
            .handle_background_sync("sync-form-data")
            .await
            .unwrap()
            .is_some());
        assert!(f
            .engine
            .handle_background_sync("content-sync")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_periodic_sync_tag() {
        let f = fixture(true);
        assert!(f.engine.handle_periodic_sync("content-sync").await.unwrap().is_some());
        assert!(f
            .engine
            .handle_periodic_sync("sync-offline-operations")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_drain_over_sqlite_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SqliteQueueStore::open(dir.path().join("queue.db")).unwrap();
        let f = fixture_with(Arc::new(store), true);
        f.transport
            .respond(HttpMethod::Post, LEADS, FetchResponse::new(500, ""));
        let id = f
            .store
            .enqueue(OperationKind::Create, "/api/leads", json!({"email": "a@b.com"}))
            .await
            .unwrap();

        for _ in 0..4 {
            f.engine.drain(SyncTrigger::Manual).await.unwrap();
        }

        let entry = f.store.get(&id).await.unwrap().unwrap();
        assert_eq!(entry.status, OperationStatus::Failed);
        assert_eq!(entry.retry_count, 2);
        assert_eq!(f.transport.call_count(HttpMethod::Post, LEADS), 3);
    }

    /// Memory store whose updates can be made to fail a set number of times.
    struct FlakyStore {
        inner: MemoryQueueStore,
        fail_deletes: AtomicUsize,
        fail_requeues: AtomicUsize,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: MemoryQueueStore::new(),
                fail_deletes: AtomicUsize::new(0),
                fail_requeues: AtomicUsize::new(0),
            }
        }

        fn trip(counter: &AtomicUsize) -> Result<()> {
            let tripped = counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if tripped {
                return Err(Error::StorageUnavailable("disk full".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl QueueStore for FlakyStore {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn enqueue(
            &self,
            kind: OperationKind,
            destination: &str,
            payload: serde_json::Value,
        ) -> Result<OperationId> {
            self.inner.enqueue(kind, destination, payload).await
        }

        async fn get(&self, id: &OperationId) -> Result<Option<QueuedOperation>> {
            self.inner.get(id).await
        }

        async fn list(&self, status: Option<OperationStatus>) -> Result<Vec<QueuedOperation>> {
            self.inner.list(status).await
        }

        async fn mark_processing(&self, id: &OperationId) -> Result<bool> {
            self.inner.mark_processing(id).await
        }

        async fn requeue(&self, id: &OperationId, retry_count: u32) -> Result<()> {
            Self::trip(&self.fail_requeues)?;
            self.inner.requeue(id, retry_count).await
        }

        async fn mark_failed(&self, id: &OperationId) -> Result<()> {
            self.inner.mark_failed(id).await
        }

        async fn delete(&self, id: &OperationId) -> Result<()> {
            Self::trip(&self.fail_deletes)?;
            self.inner.delete(id).await
        }

        async fn count(&self, status: OperationStatus) -> Result<usize> {
            self.inner.count(status).await
        }
    }

    #[tokio::test]
    async fn test_failed_delete_releases_entry_and_finishes_pass() {
        let store = Arc::new(FlakyStore::new());
        store.fail_deletes.store(1, Ordering::SeqCst);
        let f = fixture_with(store.clone(), true);
        f.transport.respond(HttpMethod::Post, LEADS, FetchResponse::ok(""));
        for email in ["a@b.com", "c@d.com"] {
            f.store
                .enqueue(OperationKind::Create, "/api/leads", json!({ "email": email }))
                .await
                .unwrap();
        }
        let mut events = f.engine.subscribe();

        let first = completed(f.engine.drain(SyncTrigger::Manual).await.unwrap());
        assert_eq!((first.success_count, first.failed_count), (1, 1));
        assert_eq!(f.store.count(OperationStatus::Processing).await.unwrap(), 0);
        assert_eq!(f.engine.pending_count().await.unwrap(), 1);
        assert!(!f.engine.is_syncing());

        assert!(matches!(events.recv().await.unwrap(), SyncEvent::SyncStarted { .. }));
        assert!(matches!(
            events.recv().await.unwrap(),
            SyncEvent::SyncCompleted { .. }
        ));

        // The released entry is delivered again on the next pass.
        let second = completed(f.engine.drain(SyncTrigger::Manual).await.unwrap());
        assert_eq!((second.success_count, second.failed_count), (1, 0));
        assert_eq!(f.engine.pending_count().await.unwrap(), 0);
        assert_eq!(f.transport.call_count(HttpMethod::Post, LEADS), 3);
    }

    #[tokio::test]
    async fn test_unreleased_entry_is_recovered_next_pass() {
        let store = Arc::new(FlakyStore::new());
        store.fail_deletes.store(1, Ordering::SeqCst);
        store.fail_requeues.store(1, Ordering::SeqCst);
        let f = fixture_with(store.clone(), true);
        f.transport.respond(HttpMethod::Post, LEADS, FetchResponse::ok(""));
        let id = f
            .store
            .enqueue(OperationKind::Create, "/api/leads", json!({}))
            .await
            .unwrap();

        let first = completed(f.engine.drain(SyncTrigger::Manual).await.unwrap());
        assert_eq!(first.failed_count, 1);
        assert_eq!(
            f.store.get(&id).await.unwrap().unwrap().status,
            OperationStatus::Processing
        );

        let second = completed(f.engine.drain(SyncTrigger::Manual).await.unwrap());
        assert_eq!(second.success_count, 1);
        assert!(f.store.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_requeue_does_not_abort_pass() {
        let store = Arc::new(FlakyStore::new());
        store.fail_requeues.store(1, Ordering::SeqCst);
        let f = fixture_with(store.clone(), true);
        f.transport.script(
            HttpMethod::Post,
            LEADS,
            vec![Reply::Fail("reset".to_string())],
        );
        f.transport.respond(HttpMethod::Post, LEADS, FetchResponse::ok(""));
        for _ in 0..2 {
            f.store
                .enqueue(OperationKind::Create, "/api/leads", json!({}))
                .await
                .unwrap();
        }

        let report = completed(f.engine.drain(SyncTrigger::Manual).await.unwrap());
        assert_eq!((report.success_count, report.failed_count), (1, 1));
        assert_eq!(f.store.count(OperationStatus::Processing).await.unwrap(), 0);
        assert_eq!(f.engine.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reconnect_through_scheduler_drains_queue() {
        let f = fixture(false);
        f.transport
            .respond(HttpMethod::Post, LEADS, FetchResponse::new(201, "{}"));
        f.store
            .enqueue(OperationKind::Create, "/api/leads", json!({"email": "a@b.com"}))
            .await
            .unwrap();

        let engine = Arc::new(f.engine);
        let (scheduler, handle) = SyncScheduler::new(SyncMode::OnReconnect);
        let drain_engine = engine.clone();
        let task = tokio::spawn(handle.run(f.connectivity.restored_events(), move |trigger| {
            let engine = drain_engine.clone();
            async move { engine.drain(trigger).await }
        }));

        f.connectivity.set_online(false);
        f.connectivity.set_online(true);

        let drained = tokio::time::timeout(Duration::from_secs(2), async {
            while engine.pending_count().await.unwrap() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(drained.is_ok());
        assert_eq!(f.transport.call_count(HttpMethod::Post, LEADS), 1);
        assert!(f.store.list(None).await.unwrap().is_empty());

        scheduler.shutdown().await;
        task.await.unwrap();
    }
}
