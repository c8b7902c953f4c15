//! Deferred install prompt.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use finpro_common::Result;
use finpro_network::DeviceClass;

/// Engagement time before the prompt shows itself on mobile.
pub const AUTO_SHOW_DELAY: Duration = Duration::from_secs(30);

/// How the page is being displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayMode {
    #[default]
    Browser,
    Standalone,
    Fullscreen,
    MinimalUi,
}

/// Whether the app already runs installed. `ios_standalone` is the
/// separate flag some platforms expose instead of a display mode.
pub fn is_installed(mode: DisplayMode, ios_standalone: bool) -> bool {
    mode != DisplayMode::Browser || ios_standalone
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallOutcome {
    Accepted,
    Dismissed,
}

/// A captured install prompt that can be shown once.
#[async_trait]
pub trait DeferredPrompt: Send + Sync {
    /// Show the native prompt and wait for the user's choice.
    async fn prompt(&self) -> Result<InstallOutcome>;
}

/// Prompt with a fixed answer that counts how often it was shown.
pub struct ScriptedPrompt {
    outcome: InstallOutcome,
    shown: AtomicUsize,
}

impl ScriptedPrompt {
    pub fn new(outcome: InstallOutcome) -> Self {
        Self {
            outcome,
            shown: AtomicUsize::new(0),
        }
    }

    pub fn times_shown(&self) -> usize {
        self.shown.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeferredPrompt for ScriptedPrompt {
    async fn prompt(&self) -> Result<InstallOutcome> {
        self.shown.fetch_add(1, Ordering::SeqCst);
        Ok(self.outcome)
    }
}

#[derive(Default)]
struct PromptState {
    prompt: Option<Arc<dyn DeferredPrompt>>,
    installed: bool,
    visible: bool,
    auto_show: Option<JoinHandle<()>>,
}

/// Tracks the deferred prompt and whether the install banner is shown.
///
/// Clones share the same state.
#[derive(Clone)]
pub struct InstallPromptController {
    state: Arc<Mutex<PromptState>>,
}

impl InstallPromptController {
    pub fn new(mode: DisplayMode, ios_standalone: bool) -> Self {
        let state = PromptState {
            installed: is_installed(mode, ios_standalone),
            ..PromptState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PromptState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The platform offered an install prompt.
    ///
    /// On mobile the banner appears by itself after [`AUTO_SHOW_DELAY`].
    /// Must be called from within a tokio runtime.
    pub fn on_before_install_prompt(&self, prompt: Arc<dyn DeferredPrompt>, device: DeviceClass) {
        let mut state = self.lock();
        state.prompt = Some(prompt);
        debug!(%device, "Install prompt deferred");

        if device != DeviceClass::Mobile {
            return;
        }
        if let Some(previous) = state.auto_show.take() {
            previous.abort();
        }

        let shared = self.state.clone();
        state.auto_show = Some(tokio::spawn(async move {
            tokio::time::sleep(AUTO_SHOW_DELAY).await;
            let mut state = shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            state.visible = true;
            state.auto_show = None;
        }));
    }

    /// Show the banner now, if a prompt is available.
    pub fn show(&self) {
        let mut state = self.lock();
        state.visible = state.prompt.is_some();
    }

    /// Hide the banner. The prompt stays available.
    pub fn dismiss(&self) {
        self.lock().visible = false;
    }

    pub fn is_installed(&self) -> bool {
        self.lock().installed
    }

    /// Whether the install banner should be on screen.
    pub fn should_render(&self) -> bool {
        let state = self.lock();
        !state.installed && state.prompt.is_some() && state.visible
    }

    /// Show the native prompt. The prompt is used up either way.
    ///
    /// Returns `None` when no prompt is available.
    pub async fn install(&self) -> Result<Option<InstallOutcome>> {
        let Some(prompt) = self.lock().prompt.take() else {
            return Ok(None);
        };
        self.lock().visible = false;

        let outcome = prompt.prompt().await?;
        match outcome {
            InstallOutcome::Accepted => info!("User accepted the install prompt"),
            InstallOutcome::Dismissed => info!("User dismissed the install prompt"),
        }
        Ok(Some(outcome))
    }

    /// The app was installed.
    pub fn on_app_installed(&self) {
        let mut state = self.lock();
        state.installed = true;
        state.prompt = None;
        state.visible = false;
        if let Some(timer) = state.auto_show.take() {
            timer.abort();
        }
        info!("App installed");
    }
}
