//! Page-context side of the offline pipeline.
//!
//! This module provides:
//! - A submission boundary that sends while online and queues while offline
//! - The worker registration and update lifecycle
//! - Install prompt and offline banner state
//!
//! Browser capabilities are reached through the [`PagePlatform`] trait;
//! [`HeadlessPage`] implements it without a browser.

pub mod banner;
pub mod install_prompt;
pub mod page;
pub mod registration;
pub mod submission;

pub use banner::{OfflineBanner, SyncNotice, SyncStatus, NOTICE_DURATION, OFFLINE_MESSAGE};
pub use install_prompt::{
    is_installed, DeferredPrompt, DisplayMode, InstallOutcome, InstallPromptController,
    ScriptedPrompt, AUTO_SHOW_DELAY,
};
pub use page::{HeadlessPage, PageAction, PagePlatform, PermissionState, Registration};
pub use registration::{
    is_secure_context, LifecycleController, RegistrationConfig, RegistrationOutcome,
    UpdatePrompt, WorkerState,
};
pub use submission::{SubmitOutcome, Submitter};
