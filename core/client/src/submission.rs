//! Submission boundary between page forms and the network.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use finpro_common::{Error, FetchRequest, FetchResponse, Result};
use finpro_network::{resolve_url, ConnectivityMonitor, Transport};
use finpro_storage::{OperationId, OperationKind, OperationStatus, QueueStore};
use finpro_sync::DEFAULT_SYNC_TAG;

use crate::page::PagePlatform;

/// What happened to a submission.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum SubmitOutcome {
    /// Delivered directly.
    Sent { status: u16 },
    /// Stored for later delivery.
    Queued { id: OperationId },
}

impl SubmitOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, SubmitOutcome::Queued { .. })
    }
}

/// Sends operations while online and queues them while offline.
///
/// The submitter only appends to the queue and reads its counts; delivery
/// of queued entries belongs to the sync engine.
pub struct Submitter {
    store: Arc<dyn QueueStore>,
    transport: Arc<dyn Transport>,
    connectivity: ConnectivityMonitor,
    page: Arc<dyn PagePlatform>,
    origin: Url,
    sync_tag: String,
}

impl Submitter {
    pub fn new(
        store: Arc<dyn QueueStore>,
        transport: Arc<dyn Transport>,
        connectivity: ConnectivityMonitor,
        page: Arc<dyn PagePlatform>,
        origin: Url,
    ) -> Self {
        Self {
            store,
            transport,
            connectivity,
            page,
            origin,
            sync_tag: DEFAULT_SYNC_TAG.to_string(),
        }
    }

    /// Background-sync tag requested after each enqueue.
    pub fn with_sync_tag(mut self, tag: impl Into<String>) -> Self {
        self.sync_tag = tag.into();
        self
    }

    /// Submit an operation.
    ///
    /// # Errors
    /// - `StorageUnavailable` if offline and the queue cannot be written;
    ///   the operation is lost and the caller should tell the user
    /// - `Http` if online and the server rejects the request
    /// - `Network` if online and the request never completes
    pub async fn submit(
        &self,
        kind: OperationKind,
        destination: &str,
        payload: serde_json::Value,
    ) -> Result<SubmitOutcome> {
        if self.connectivity.is_offline() {
            let id = self.queue(kind, destination, payload).await?;
            return Ok(SubmitOutcome::Queued { id });
        }

        let response = self.send(kind, destination, &payload).await?;
        Ok(SubmitOutcome::Sent {
            status: response.status,
        })
    }

    /// Submit a form to `endpoint`. Forms are always creates.
    pub async fn submit_form(
        &self,
        endpoint: &str,
        data: serde_json::Value,
    ) -> Result<SubmitOutcome> {
        self.submit(OperationKind::Create, endpoint, data).await
    }

    pub async fn create(&self, destination: &str, payload: serde_json::Value) -> Result<SubmitOutcome> {
        self.submit(OperationKind::Create, destination, payload).await
    }

    pub async fn update(&self, destination: &str, payload: serde_json::Value) -> Result<SubmitOutcome> {
        self.submit(OperationKind::Update, destination, payload).await
    }

    pub async fn delete(&self, destination: &str) -> Result<SubmitOutcome> {
        self.submit(OperationKind::Delete, destination, serde_json::Value::Null)
            .await
    }

    /// Queue an operation regardless of connectivity and ask for a
    /// background sync.
    pub async fn queue(
        &self,
        kind: OperationKind,
        destination: &str,
        payload: serde_json::Value,
    ) -> Result<OperationId> {
        let id = self
            .store
            .enqueue(kind, destination, payload)
            .await
            .inspect_err(|e| warn!(destination, "Failed to queue operation: {}", e))?;
        info!(%id, %kind, destination, "Operation queued for sync");

        self.request_background_sync().await;
        Ok(id)
    }

    pub async fn pending_count(&self) -> Result<usize> {
        self.store.count(OperationStatus::Pending).await
    }

    async fn request_background_sync(&self) {
        if !self.page.has_controller() {
            debug!("No active worker, background sync not requested");
            return;
        }
        if let Err(e) = self.page.register_background_sync(&self.sync_tag).await {
            warn!(tag = %self.sync_tag, "Background sync registration failed: {}", e);
        }
    }

    async fn send(
        &self,
        kind: OperationKind,
        destination: &str,
        payload: &serde_json::Value,
    ) -> Result<FetchResponse> {
        let url = resolve_url(&self.origin, destination)?;
        let mut request = FetchRequest::new(kind.http_method(), url);
        if kind != OperationKind::Delete {
            request = request.with_json_body(payload)?;
        }

        let response = self.transport.fetch(request).await?;
        if !response.is_success() {
            return Err(Error::Http {
                status: response.status,
                url: destination.to_string(),
            });
        }
        debug!(destination, status = response.status, "Submission delivered");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{HeadlessPage, PageAction};
    use finpro_common::HttpMethod;
    use finpro_network::MemoryTransport;
    use finpro_storage::MemoryQueueStore;
    use serde_json::json;

    const ORIGIN: &str = "https://fintech.example";
    const LEADS: &str = "https://fintech.example/api/leads";

    struct Fixture {
        store: Arc<MemoryQueueStore>,
        transport: MemoryTransport,
        connectivity: ConnectivityMonitor,
        page: HeadlessPage,
        submitter: Submitter,
    }

    fn fixture(online: bool) -> Fixture {
        let store = Arc::new(MemoryQueueStore::new());
        let transport = MemoryTransport::new();
        let connectivity = ConnectivityMonitor::new(online);
        let page = HeadlessPage::new(Url::parse(ORIGIN).unwrap());
        let submitter = Submitter::new(
            store.clone(),
            Arc::new(transport.clone()),
            connectivity.clone(),
            Arc::new(page.clone()),
            Url::parse(ORIGIN).unwrap(),
        );
        Fixture {
            store,
            transport,
            connectivity,
            page,
            submitter,
        }
    }

    #[tokio::test]
    async fn test_offline_submission_is_queued() {
        let f = fixture(false);
        f.page.set_controlled(true);

        let outcome = f
            .submitter
            .submit_form("/api/leads", json!({"email": "a@b.com"}))
            .await
            .unwrap();
        assert!(outcome.is_queued());

        let pending = f.store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, OperationKind::Create);
        assert_eq!(pending[0].retry_count, 0);
        assert!(f.transport.calls().is_empty());
        assert_eq!(
            f.page.actions(),
            vec![PageAction::RegisterBackgroundSync(
                "sync-offline-operations".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_background_sync_needs_controller() {
        let f = fixture(false);

        f.submitter.delete("/api/leads/7").await.unwrap();
        assert!(f.page.actions().is_empty());
        assert_eq!(f.submitter.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_background_sync_failure_keeps_entry() {
        let f = fixture(false);
        f.page.set_controlled(true);
        f.page.set_supports_background_sync(false);

        let outcome = f.submitter.create("/api/leads", json!({})).await.unwrap();
        assert!(outcome.is_queued());
        assert_eq!(f.submitter.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_online_submission_is_sent() {
        let f = fixture(true);
        f.transport
            .respond(HttpMethod::Put, LEADS, FetchResponse::new(201, "{}"));

        let outcome = f
            .submitter
            .update("/api/leads", json!({"email": "a@b.com"}))
            .await
            .unwrap();
        assert!(matches!(outcome, SubmitOutcome::Sent { status: 201 }));

        let calls = f.transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, HttpMethod::Put);
        assert_eq!(calls[0].header("content-type"), Some("application/json"));
        assert_eq!(f.store.count(OperationStatus::Pending).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_online_rejection_is_not_queued() {
        let f = fixture(true);
        f.transport
            .respond(HttpMethod::Post, LEADS, FetchResponse::new(422, "{}"));

        let result = f.submitter.create("/api/leads", json!({})).await;
        assert!(matches!(result, Err(Error::Http { status: 422, .. })));
        assert_eq!(f.submitter.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reconnect_switches_to_direct_send() {
        let f = fixture(false);
        f.transport
            .respond(HttpMethod::Post, LEADS, FetchResponse::ok("{}"));

        f.submitter.create("/api/leads", json!({})).await.unwrap();
        f.connectivity.set_online(true);
        let outcome = f.submitter.create("/api/leads", json!({})).await.unwrap();

        assert!(!outcome.is_queued());
        assert_eq!(f.transport.call_count(HttpMethod::Post, LEADS), 1);
        assert_eq!(f.submitter.pending_count().await.unwrap(), 1);
    }
}
