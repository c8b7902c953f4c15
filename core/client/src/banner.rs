//! Offline banner and sync status notices.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::debug;

use finpro_network::ConnectivityMonitor;
use finpro_sync::{DrainReport, SyncEvent};

use crate::page::PagePlatform;

pub const OFFLINE_MESSAGE: &str = "You're offline. Some features may be unavailable.";

/// How long a sync result stays on screen.
pub const NOTICE_DURATION: Duration = Duration::from_secs(5);

/// Banner shown while the page is offline.
pub struct OfflineBanner {
    connectivity: ConnectivityMonitor,
    page: Arc<dyn PagePlatform>,
}

impl OfflineBanner {
    pub fn new(connectivity: ConnectivityMonitor, page: Arc<dyn PagePlatform>) -> Self {
        Self { connectivity, page }
    }

    pub fn is_visible(&self) -> bool {
        self.connectivity.is_offline()
    }

    /// Banner text, or `None` while online.
    pub fn message(&self) -> Option<&'static str> {
        self.is_visible().then_some(OFFLINE_MESSAGE)
    }

    /// Manual retry: reload the page.
    pub fn retry(&self) {
        self.page.reload();
    }
}

/// Result of a drain pass as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncNotice {
    pub synced: usize,
    pub failed: usize,
}

impl SyncNotice {
    pub fn new(synced: usize, failed: usize) -> Self {
        Self { synced, failed }
    }

    /// Non-zero counts, one line each.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.synced > 0 {
            lines.push(format!("{} operations synced", self.synced));
        }
        if self.failed > 0 {
            lines.push(format!("{} operations failed", self.failed));
        }
        lines
    }
}

impl From<&DrainReport> for SyncNotice {
    fn from(report: &DrainReport) -> Self {
        Self::new(report.success_count, report.failed_count)
    }
}

/// Page-side view of sync activity, fed by engine events.
#[derive(Debug, Default)]
pub struct SyncStatus {
    syncing: bool,
    notice: Option<(SyncNotice, Instant)>,
}

impl SyncStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &SyncEvent) {
        match event {
            SyncEvent::SyncStarted { .. } => self.syncing = true,
            SyncEvent::SyncCompleted { report, .. } => {
                self.syncing = false;
                let notice = SyncNotice::from(report);
                debug!(?notice, "Sync notice posted");
                self.notice = Some((notice, Instant::now() + NOTICE_DURATION));
            }
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing
    }

    /// The latest notice, until it expires.
    pub fn notice(&self) -> Option<SyncNotice> {
        self.notice
            .filter(|(_, expires_at)| Instant::now() < *expires_at)
            .map(|(notice, _)| notice)
    }

    /// Apply every event available on `events` without waiting.
    pub fn drain_events(&mut self, events: &mut broadcast::Receiver<SyncEvent>) {
        loop {
            match events.try_recv() {
                Ok(event) => self.apply(&event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "Sync status lagged behind events");
                }
                Err(_) => break,
            }
        }
    }
}
