//! Install and update lifecycle of the interception worker, seen from the
//! page.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use finpro_common::Result;
use finpro_sync::DEFAULT_PERIODIC_SYNC_TAG;

use crate::page::{PagePlatform, PermissionState, Registration};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for worker registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    pub script_url: String,
    pub scope: String,
    pub periodic_sync_tag: String,
    pub periodic_min_interval: Duration,
    pub update_prompt: String,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            script_url: "/service-worker.js".to_string(),
            scope: "/".to_string(),
            periodic_sync_tag: DEFAULT_PERIODIC_SYNC_TAG.to_string(),
            periodic_min_interval: DAY,
            update_prompt: "New version available! Reload to update?".to_string(),
        }
    }
}

/// Registration is allowed over https and on the local development host.
pub fn is_secure_context(location: &Url) -> bool {
    location.scheme() == "https" || location.host_str() == Some("localhost")
}

/// Result of a registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered(Registration),
    /// Registration already happened this session.
    AlreadyRegistered(Registration),
    Unsupported,
    InsecureContext,
}

/// States an installing worker moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

/// What happened when a new worker finished installing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePrompt {
    /// First install or not yet installed; nothing to ask.
    NotShown,
    Accepted,
    Declined,
}

/// Registers the worker once per session and drives the update prompt.
pub struct LifecycleController {
    page: Arc<dyn PagePlatform>,
    config: RegistrationConfig,
    registration: Mutex<Option<Registration>>,
    refreshing: AtomicBool,
}

impl LifecycleController {
    pub fn new(page: Arc<dyn PagePlatform>, config: RegistrationConfig) -> Self {
        Self {
            page,
            config,
            registration: Mutex::new(None),
            refreshing: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// Register the worker. Call once the document has finished loading.
    ///
    /// Periodic sync is set up when supported and granted; failures there
    /// are logged and do not fail registration. Concurrent callers wait for
    /// the first one; a failed attempt leaves the session unregistered.
    pub async fn register(&self) -> Result<RegistrationOutcome> {
        let mut slot = self.registration.lock().await;
        if let Some(existing) = slot.as_ref() {
            return Ok(RegistrationOutcome::AlreadyRegistered(existing.clone()));
        }

        if !self.page.supports_worker() {
            debug!("Workers unsupported, skipping registration");
            return Ok(RegistrationOutcome::Unsupported);
        }

        let location = self.page.location();
        if !is_secure_context(&location) {
            info!(%location, "Insecure context, skipping registration");
            return Ok(RegistrationOutcome::InsecureContext);
        }

        let registration = self
            .page
            .register_worker(&self.config.script_url, &self.config.scope)
            .await
            .inspect_err(|e| warn!("Service worker registration failed: {}", e))?;
        info!(scope = %registration.scope, "Service worker registered");

        if registration.supports_periodic_sync {
            if let Err(e) = self.register_periodic_sync().await {
                warn!("Periodic sync registration failed: {}", e);
            }
        }

        *slot = Some(registration.clone());
        Ok(RegistrationOutcome::Registered(registration))
    }

    async fn register_periodic_sync(&self) -> Result<()> {
        match self.page.periodic_sync_permission().await? {
            PermissionState::Granted => {
                self.page
                    .register_periodic_sync(
                        &self.config.periodic_sync_tag,
                        self.config.periodic_min_interval,
                    )
                    .await
            }
            state => {
                debug!(?state, "Periodic sync not granted");
                Ok(())
            }
        }
    }

    /// A newly found worker changed state.
    ///
    /// When it finished installing while another worker controls the page,
    /// the user is asked to reload.
    pub fn on_worker_state_change(&self, state: WorkerState) -> UpdatePrompt {
        if state != WorkerState::Installed || !self.page.has_controller() {
            return UpdatePrompt::NotShown;
        }

        info!("New version installed");
        if self.page.confirm(&self.config.update_prompt) {
            self.reload_once();
            UpdatePrompt::Accepted
        } else {
            UpdatePrompt::Declined
        }
    }

    /// The controlling worker changed. Returns whether a reload was issued.
    pub fn on_controller_change(&self) -> bool {
        self.reload_once()
    }

    fn reload_once(&self) -> bool {
        if self.refreshing.swap(true, Ordering::SeqCst) {
            debug!("Reload already in progress");
            return false;
        }
        self.page.reload();
        true
    }
}
