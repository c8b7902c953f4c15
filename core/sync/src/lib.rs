//! Sync engine for the offline queue.
//!
//! This module provides:
//! - A drain pass that delivers pending operations with a single-flight guard
//! - Bounded retry bookkeeping (three attempts by default)
//! - A scheduler reacting to reconnects, explicit requests and timers
//! - Start/completion events for observers

pub mod engine;
pub mod retry;
pub mod scheduler;
pub mod state;

pub use engine::{
    SyncConfig, SyncEngine, DEFAULT_PERIODIC_SYNC_TAG, DEFAULT_SYNC_TAG, LEGACY_SYNC_TAG,
};
pub use retry::{RetryDecision, RetryPolicy, DEFAULT_MAX_ATTEMPTS};
pub use scheduler::{SyncMode, SyncRequest, SyncScheduler, SyncSchedulerHandle};
pub use state::{DrainOutcome, DrainReport, SyncEvent, SyncTrigger};
