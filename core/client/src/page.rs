//! Host surface available to the page context.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::info;
use url::Url;

use finpro_common::{Error, Result};

/// A successful worker registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub scope: String,
    pub supports_periodic_sync: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
}

/// Operations the page performs through the browser.
#[async_trait]
pub trait PagePlatform: Send + Sync {
    /// Current page location.
    fn location(&self) -> Url;

    /// Whether the browser can run an interception worker at all.
    fn supports_worker(&self) -> bool;

    /// Whether a worker currently controls this page.
    fn has_controller(&self) -> bool;

    async fn register_worker(&self, script_url: &str, scope: &str) -> Result<Registration>;

    async fn periodic_sync_permission(&self) -> Result<PermissionState>;

    async fn register_periodic_sync(&self, tag: &str, min_interval: Duration) -> Result<()>;

    /// Ask for a one-off background sync. Fails if unsupported.
    async fn register_background_sync(&self, tag: &str) -> Result<()>;

    /// Blocking yes/no dialog.
    fn confirm(&self, message: &str) -> bool;

    /// Full page reload.
    fn reload(&self);
}

/// Side effect performed by [`HeadlessPage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageAction {
    RegisterWorker { script_url: String, scope: String },
    RegisterPeriodicSync { tag: String, min_interval: Duration },
    RegisterBackgroundSync(String),
    Confirm(String),
    Reload,
}

struct HeadlessState {
    location: Url,
    supports_worker: bool,
    supports_periodic_sync: bool,
    supports_background_sync: bool,
    periodic_permission: PermissionState,
    confirm_answer: bool,
    actions: Vec<PageAction>,
}

/// Page with no browser behind it.
///
/// Capabilities and dialog answers are configurable; every action is
/// logged and recorded. Clones share the same state.
#[derive(Clone)]
pub struct HeadlessPage {
    state: Arc<Mutex<HeadlessState>>,
    controlled: Arc<AtomicBool>,
}

impl HeadlessPage {
    /// A page at `location` supporting every capability, with no controller.
    pub fn new(location: Url) -> Self {
        Self {
            state: Arc::new(Mutex::new(HeadlessState {
                location,
                supports_worker: true,
                supports_periodic_sync: true,
                supports_background_sync: true,
                periodic_permission: PermissionState::Granted,
                confirm_answer: true,
                actions: Vec::new(),
            })),
            controlled: Arc::new(AtomicBool::new(false)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_supports_worker(&self, supported: bool) {
        self.lock().supports_worker = supported;
    }

    pub fn set_supports_periodic_sync(&self, supported: bool) {
        self.lock().supports_periodic_sync = supported;
    }

    pub fn set_supports_background_sync(&self, supported: bool) {
        self.lock().supports_background_sync = supported;
    }

    pub fn set_periodic_permission(&self, state: PermissionState) {
        self.lock().periodic_permission = state;
    }

    /// Answer given to every confirm dialog.
    pub fn set_confirm_answer(&self, answer: bool) {
        self.lock().confirm_answer = answer;
    }

    pub fn set_controlled(&self, controlled: bool) {
        self.controlled.store(controlled, Ordering::SeqCst);
    }

    /// Actions performed so far, oldest first.
    pub fn actions(&self) -> Vec<PageAction> {
        self.lock().actions.clone()
    }

    pub fn reload_count(&self) -> usize {
        self.lock()
            .actions
            .iter()
            .filter(|a| **a == PageAction::Reload)
            .count()
    }
}

#[async_trait]
impl PagePlatform for HeadlessPage {
    fn location(&self) -> Url {
        self.lock().location.clone()
    }

    fn supports_worker(&self) -> bool {
        self.lock().supports_worker
    }

    fn has_controller(&self) -> bool {
        self.controlled.load(Ordering::SeqCst)
    }

    async fn register_worker(&self, script_url: &str, scope: &str) -> Result<Registration> {
        let mut state = self.lock();
        if !state.supports_worker {
            return Err(Error::NotPermitted("Workers are not supported".to_string()));
        }
        state.actions.push(PageAction::RegisterWorker {
            script_url: script_url.to_string(),
            scope: scope.to_string(),
        });
        let scope = state
            .location
            .join(scope)
            .map_err(|e| Error::InvalidInput(format!("Invalid scope {}: {}", scope, e)))?;
        Ok(Registration {
            scope: scope.to_string(),
            supports_periodic_sync: state.supports_periodic_sync,
        })
    }

    async fn periodic_sync_permission(&self) -> Result<PermissionState> {
        Ok(self.lock().periodic_permission)
    }

    async fn register_periodic_sync(&self, tag: &str, min_interval: Duration) -> Result<()> {
        info!(tag, ?min_interval, "Registered periodic sync");
        self.lock().actions.push(PageAction::RegisterPeriodicSync {
            tag: tag.to_string(),
            min_interval,
        });
        Ok(())
    }

    async fn register_background_sync(&self, tag: &str) -> Result<()> {
        let mut state = self.lock();
        if !state.supports_background_sync {
            return Err(Error::NotPermitted("Background sync is not supported".to_string()));
        }
        info!(tag, "Registered background sync");
        state
            .actions
            .push(PageAction::RegisterBackgroundSync(tag.to_string()));
        Ok(())
    }

    fn confirm(&self, message: &str) -> bool {
        let mut state = self.lock();
        state.actions.push(PageAction::Confirm(message.to_string()));
        info!(message, answer = state.confirm_answer, "Confirm dialog");
        state.confirm_answer
    }

    fn reload(&self) {
        info!("Reloading page");
        self.lock().actions.push(PageAction::Reload);
    }
}
