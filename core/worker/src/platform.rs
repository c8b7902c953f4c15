//! Host surface available to the interception layer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

use finpro_common::{Error, Result};

use crate::push::Notification;

/// An open window controlled by this worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowClient {
    pub id: String,
    pub url: String,
}

/// Operations the embedding host performs on the worker's behalf.
#[async_trait]
pub trait WorkerPlatform: Send + Sync {
    /// Activate this version without waiting for older ones to finish.
    async fn skip_waiting(&self) -> Result<()>;

    /// Take control of every open client.
    async fn claim_clients(&self) -> Result<()>;

    async fn show_notification(&self, notification: &Notification) -> Result<()>;

    /// Windows currently controlled by this worker.
    async fn window_clients(&self) -> Result<Vec<WindowClient>>;

    async fn focus(&self, client_id: &str) -> Result<()>;

    async fn open_window(&self, url: &str) -> Result<()>;
}

/// Side effect performed by [`HeadlessPlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformAction {
    SkipWaiting,
    ClaimClients,
    ShowNotification(Notification),
    Focus(String),
    OpenWindow(String),
}

#[derive(Default)]
struct HeadlessState {
    windows: Vec<WindowClient>,
    actions: Vec<PlatformAction>,
}

/// Platform with no real windows or notification center.
///
/// Every action is logged and recorded. Used by the CLI and in tests.
/// Clones share the same state.
#[derive(Clone, Default)]
pub struct HeadlessPlatform {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HeadlessState>> {
        self.state
            .lock()
            .map_err(|_| Error::Storage("Platform state lock poisoned".to_string()))
    }

    /// Pretend a window is open at `url`.
    pub fn add_window(&self, id: impl Into<String>, url: impl Into<String>) -> Result<()> {
        self.lock()?.windows.push(WindowClient {
            id: id.into(),
            url: url.into(),
        });
        Ok(())
    }

    /// Actions performed so far, oldest first.
    pub fn actions(&self) -> Result<Vec<PlatformAction>> {
        Ok(self.lock()?.actions.clone())
    }

    fn record(&self, action: PlatformAction) -> Result<()> {
        self.lock()?.actions.push(action);
        Ok(())
    }
}

#[async_trait]
impl WorkerPlatform for HeadlessPlatform {
    async fn skip_waiting(&self) -> Result<()> {
        info!("Skipping wait, activating immediately");
        self.record(PlatformAction::SkipWaiting)
    }

    async fn claim_clients(&self) -> Result<()> {
        info!("Claiming clients");
        self.record(PlatformAction::ClaimClients)
    }

    async fn show_notification(&self, notification: &Notification) -> Result<()> {
        info!(
            title = %notification.title,
            body = %notification.options.body,
            url = %notification.options.data.url,
            "Notification"
        );
        self.record(PlatformAction::ShowNotification(notification.clone()))
    }

    async fn window_clients(&self) -> Result<Vec<WindowClient>> {
        Ok(self.lock()?.windows.clone())
    }

    async fn focus(&self, client_id: &str) -> Result<()> {
        info!(client_id, "Focusing window");
        self.record(PlatformAction::Focus(client_id.to_string()))
    }

    async fn open_window(&self, url: &str) -> Result<()> {
        info!(url, "Opening window");
        let mut state = self.lock()?;
        let id = format!("window-{}", state.windows.len() + 1);
        state.windows.push(WindowClient {
            id,
            url: url.to_string(),
        });
        state.actions.push(PlatformAction::OpenWindow(url.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_window_is_listed() {
        let platform = HeadlessPlatform::new();
        platform.open_window("/markets").await.unwrap();

        let windows = platform.window_clients().await.unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].url, "/markets");
        assert_eq!(
            platform.actions().unwrap(),
            vec![PlatformAction::OpenWindow("/markets".to_string())]
        );
    }
}
