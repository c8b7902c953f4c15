//! The interception-layer context with its default handlers.

use std::sync::Arc;
use tracing::info;

use finpro_cache::{CacheManager, FetchDisposition};
use finpro_common::{Error, FetchRequest, Result};
use finpro_sync::{DrainOutcome, SyncEngine};

use crate::dispatcher::Dispatcher;
use crate::events::{EventKind, HandlerOutcome, WorkerEvent};
use crate::handlers::{
    ActivateHandler, FetchHandler, InstallHandler, NotificationClickHandler, PushHandler,
    SyncHandler,
};
use crate::platform::WorkerPlatform;
use crate::push::NotificationData;

/// Interception layer: one dispatcher with every event handler registered.
pub struct ServiceWorker {
    dispatcher: Dispatcher,
    cache: Arc<CacheManager>,
    engine: Arc<SyncEngine>,
}

impl ServiceWorker {
    /// Register the built-in handlers.
    pub fn new(
        cache: Arc<CacheManager>,
        engine: Arc<SyncEngine>,
        platform: Arc<dyn WorkerPlatform>,
    ) -> Result<Self> {
        let mut dispatcher = Dispatcher::new();
        let sync = Arc::new(SyncHandler {
            engine: engine.clone(),
        });

        dispatcher.register(
            EventKind::Install,
            Arc::new(InstallHandler {
                cache: cache.clone(),
                platform: platform.clone(),
            }),
        )?;
        dispatcher.register(
            EventKind::Activate,
            Arc::new(ActivateHandler {
                cache: cache.clone(),
                platform: platform.clone(),
            }),
        )?;
        dispatcher.register(
            EventKind::Fetch,
            Arc::new(FetchHandler {
                cache: cache.clone(),
            }),
        )?;
        dispatcher.register(EventKind::Sync, sync.clone())?;
        dispatcher.register(EventKind::PeriodicSync, sync)?;
        dispatcher.register(
            EventKind::Push,
            Arc::new(PushHandler {
                platform: platform.clone(),
            }),
        )?;
        dispatcher.register(
            EventKind::NotificationClick,
            Arc::new(NotificationClickHandler {
                origin: cache.origin().clone(),
                platform,
            }),
        )?;

        info!(cache = %cache.config().cache_name, "Worker ready");
        Ok(Self {
            dispatcher,
            cache,
            engine,
        })
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    pub async fn dispatch(&self, event: WorkerEvent) -> Result<HandlerOutcome> {
        self.dispatcher.dispatch(event).await
    }

    pub async fn install(&self) -> Result<()> {
        self.dispatch(WorkerEvent::Install).await.map(|_| ())
    }

    pub async fn activate(&self) -> Result<()> {
        self.dispatch(WorkerEvent::Activate).await.map(|_| ())
    }

    /// Deliver a fetch event and return its single disposition.
    pub async fn fetch(&self, request: FetchRequest) -> Result<FetchDisposition> {
        match self.dispatch(WorkerEvent::Fetch(request)).await? {
            HandlerOutcome::Fetch(disposition) => Ok(disposition),
            other => Err(Error::InvalidInput(format!(
                "Fetch handler produced {:?}",
                other
            ))),
        }
    }

    /// Deliver a background-sync callback.
    pub async fn sync(&self, tag: &str) -> Result<Option<DrainOutcome>> {
        let event = WorkerEvent::Sync {
            tag: tag.to_string(),
        };
        match self.dispatch(event).await? {
            HandlerOutcome::Sync(outcome) => Ok(outcome),
            other => Err(Error::InvalidInput(format!(
                "Sync handler produced {:?}",
                other
            ))),
        }
    }

    pub async fn push(&self, data: Option<bytes::Bytes>) -> Result<()> {
        self.dispatch(WorkerEvent::Push { data }).await.map(|_| ())
    }

    pub async fn notification_click(&self, url: impl Into<String>) -> Result<()> {
        let data = NotificationData { url: url.into() };
        self.dispatch(WorkerEvent::NotificationClick { data })
            .await
            .map(|_| ())
    }
}
