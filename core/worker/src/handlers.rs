//! Built-in handlers wiring events to the cache manager, sync engine and
//! host platform.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info};
use url::Url;

use finpro_cache::CacheManager;
use finpro_common::{Error, Result};
use finpro_sync::SyncEngine;

use crate::dispatcher::EventHandler;
use crate::events::{HandlerOutcome, WorkerEvent};
use crate::platform::WorkerPlatform;
use crate::push::{parse_push, NotificationData};

fn unexpected(handler: &str, event: &WorkerEvent) -> Error {
    Error::InvalidInput(format!("{} handler received {} event", handler, event.kind()))
}

/// Primes the cache, then activates without waiting.
pub struct InstallHandler {
    pub cache: Arc<CacheManager>,
    pub platform: Arc<dyn WorkerPlatform>,
}

#[async_trait]
impl EventHandler for InstallHandler {
    async fn handle(&self, event: WorkerEvent) -> Result<HandlerOutcome> {
        if !matches!(event, WorkerEvent::Install) {
            return Err(unexpected("install", &event));
        }
        self.cache.install().await?;
        self.platform.skip_waiting().await?;
        Ok(HandlerOutcome::Done)
    }
}

/// Deletes stale cache generations, then claims open clients.
pub struct ActivateHandler {
    pub cache: Arc<CacheManager>,
    pub platform: Arc<dyn WorkerPlatform>,
}

#[async_trait]
impl EventHandler for ActivateHandler {
    async fn handle(&self, event: WorkerEvent) -> Result<HandlerOutcome> {
        if !matches!(event, WorkerEvent::Activate) {
            return Err(unexpected("activate", &event));
        }
        self.cache.activate().await?;
        self.platform.claim_clients().await?;
        Ok(HandlerOutcome::Done)
    }
}

pub struct FetchHandler {
    pub cache: Arc<CacheManager>,
}

#[async_trait]
impl EventHandler for FetchHandler {
    async fn handle(&self, event: WorkerEvent) -> Result<HandlerOutcome> {
        let request = match event {
            WorkerEvent::Fetch(request) => request,
            other => return Err(unexpected("fetch", &other)),
        };
        Ok(HandlerOutcome::Fetch(self.cache.handle_fetch(request).await?))
    }
}

/// Background sync: drains the queue for the queue tags.
pub struct SyncHandler {
    pub engine: Arc<SyncEngine>,
}

#[async_trait]
impl EventHandler for SyncHandler {
    async fn handle(&self, event: WorkerEvent) -> Result<HandlerOutcome> {
        let outcome = match &event {
            WorkerEvent::Sync { tag } => self.engine.handle_background_sync(tag).await?,
            WorkerEvent::PeriodicSync { tag } => self.engine.handle_periodic_sync(tag).await?,
            _ => return Err(unexpected("sync", &event)),
        };
        Ok(HandlerOutcome::Sync(outcome))
    }
}

/// Shows a notification for each push with data.
///
/// Malformed payloads are logged and dropped.
pub struct PushHandler {
    pub platform: Arc<dyn WorkerPlatform>,
}

#[async_trait]
impl EventHandler for PushHandler {
    async fn handle(&self, event: WorkerEvent) -> Result<HandlerOutcome> {
        let data = match event {
            WorkerEvent::Push { data } => data,
            other => return Err(unexpected("push", &other)),
        };

        match parse_push(data.as_deref()) {
            Ok(Some(notification)) => {
                self.platform.show_notification(&notification).await?;
                Ok(HandlerOutcome::Done)
            }
            Ok(None) => {
                debug!("Push without data");
                Ok(HandlerOutcome::Ignored)
            }
            Err(e) => {
                error!("Push notification error: {}", e);
                Ok(HandlerOutcome::Ignored)
            }
        }
    }
}

/// Focuses the window already showing the notification's URL, or opens one.
pub struct NotificationClickHandler {
    pub origin: Url,
    pub platform: Arc<dyn WorkerPlatform>,
}

impl NotificationClickHandler {
    fn matches(&self, window_url: &str, data: &NotificationData) -> bool {
        if window_url == data.url {
            return true;
        }
        self.origin
            .join(&data.url)
            .map(|target| target.as_str() == window_url)
            .unwrap_or(false)
    }
}

#[async_trait]
impl EventHandler for NotificationClickHandler {
    async fn handle(&self, event: WorkerEvent) -> Result<HandlerOutcome> {
        let data = match event {
            WorkerEvent::NotificationClick { data } => data,
            other => return Err(unexpected("notificationclick", &other)),
        };

        let windows = self.platform.window_clients().await?;
        if let Some(window) = windows.iter().find(|w| self.matches(&w.url, &data)) {
            info!(url = %data.url, "Focusing existing window");
            self.platform.focus(&window.id).await?;
        } else {
            self.platform.open_window(&data.url).await?;
        }
        Ok(HandlerOutcome::Done)
    }
}
