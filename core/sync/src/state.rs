//! Drain reports and sync events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// What started a drain pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncTrigger {
    /// The page went from offline to online.
    ConnectivityRestored,
    /// An explicit request, e.g. a "sync now" action.
    Manual,
    /// A platform background-sync callback with its tag.
    Background { tag: String },
    /// A periodic timer.
    Periodic,
}

impl fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncTrigger::ConnectivityRestored => f.write_str("connectivity-restored"),
            SyncTrigger::Manual => f.write_str("manual"),
            SyncTrigger::Background { tag } => write!(f, "background:{}", tag),
            SyncTrigger::Periodic => f.write_str("periodic"),
        }
    }
}

/// Aggregate result of one drain pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    /// Operations delivered and removed from the queue.
    pub success_count: usize,
    /// Attempts that failed in this pass, whether requeued or terminal.
    pub failed_count: usize,
    /// Entries another drainer claimed first.
    #[serde(skip_serializing_if = "is_zero", default)]
    pub skipped_count: usize,
    #[serde(skip)]
    pub duration: Duration,
    pub completed_at: DateTime<Utc>,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl DrainReport {
    pub(crate) fn new(
        success_count: usize,
        failed_count: usize,
        skipped_count: usize,
        duration: Duration,
    ) -> Self {
        Self {
            success_count,
            failed_count,
            skipped_count,
            duration,
            completed_at: Utc::now(),
        }
    }

    /// Whether the pass touched nothing.
    pub fn is_empty(&self) -> bool {
        self.success_count == 0 && self.failed_count == 0 && self.skipped_count == 0
    }
}

/// Result of asking the engine to drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// A pass ran to the end.
    Completed(DrainReport),
    /// Another pass in this context was already running; nothing was done.
    AlreadyRunning,
    /// The connectivity monitor reports offline; nothing was done.
    Offline,
}

impl DrainOutcome {
    pub fn report(&self) -> Option<&DrainReport> {
        match self {
            DrainOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// Broadcast to sync observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    SyncStarted { trigger: SyncTrigger },
    SyncCompleted { trigger: SyncTrigger, report: DrainReport },
}
