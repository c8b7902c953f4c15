//! Drain scheduling: explicit requests, reconnects and periodic passes.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::time::{interval_at, Instant, Interval};
use tracing::{debug, error, info};

use finpro_common::{Error, Result};
use finpro_network::RestoredEvents;

use crate::state::{DrainOutcome, SyncTrigger};

/// When drains run without an explicit request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    /// Explicit requests only.
    Manual,
    /// Drain whenever connectivity is restored.
    OnReconnect,
    /// Drain at regular intervals.
    Periodic { interval: Duration },
    /// Both reconnect and periodic.
    Hybrid { interval: Duration },
}

impl SyncMode {
    fn drains_on_reconnect(&self) -> bool {
        matches!(self, SyncMode::OnReconnect | SyncMode::Hybrid { .. })
    }

    fn interval(&self) -> Option<Duration> {
        match self {
            SyncMode::Periodic { interval } | SyncMode::Hybrid { interval } => Some(*interval),
            _ => None,
        }
    }
}

/// Scheduler request types.
#[derive(Debug)]
pub enum SyncRequest {
    /// Run a drain pass.
    Drain(SyncTrigger),
    /// Shutdown the scheduler.
    Shutdown,
}

type Reply = oneshot::Sender<Result<DrainOutcome>>;

/// Front end for requesting drains from the scheduler task.
#[derive(Clone)]
pub struct SyncScheduler {
    mode: Arc<RwLock<SyncMode>>,
    request_tx: mpsc::Sender<(SyncRequest, Reply)>,
}

impl SyncScheduler {
    /// Create a new scheduler with the given mode.
    pub fn new(mode: SyncMode) -> (Self, SyncSchedulerHandle) {
        let (request_tx, request_rx) = mpsc::channel(100);
        let mode = Arc::new(RwLock::new(mode));

        let scheduler = Self {
            mode: mode.clone(),
            request_tx,
        };
        let handle = SyncSchedulerHandle { mode, request_rx };

        (scheduler, handle)
    }

    /// Request a drain and wait for its outcome.
    pub async fn request_drain(&self, trigger: SyncTrigger) -> Result<DrainOutcome> {
        let (response_tx, response_rx) = oneshot::channel();

        self.request_tx
            .send((SyncRequest::Drain(trigger), response_tx))
            .await
            .map_err(|_| Error::NotPermitted("Sync scheduler not running".to_string()))?;

        response_rx.await.map_err(|_| {
            Error::NotPermitted("Sync scheduler stopped before replying".to_string())
        })?
    }

    /// Change the sync mode. Takes effect after the current wakeup.
    pub async fn set_mode(&self, mode: SyncMode) {
        *self.mode.write().await = mode;
    }

    pub async fn get_mode(&self) -> SyncMode {
        self.mode.read().await.clone()
    }

    /// Shutdown the scheduler.
    pub async fn shutdown(&self) {
        let (response_tx, _) = oneshot::channel();
        let _ = self
            .request_tx
            .send((SyncRequest::Shutdown, response_tx))
            .await;
    }
}

/// Handle for the scheduler background task.
pub struct SyncSchedulerHandle {
    mode: Arc<RwLock<SyncMode>>,
    request_rx: mpsc::Receiver<(SyncRequest, Reply)>,
}

impl SyncSchedulerHandle {
    /// Run the scheduler background task.
    ///
    /// This should be spawned in a tokio task. `drain_fn` is called for
    /// every trigger; requests are served one at a time.
    pub async fn run<F, Fut>(mut self, mut restored: RestoredEvents, drain_fn: F)
    where
        F: Fn(SyncTrigger) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<DrainOutcome>> + Send,
    {
        let mut current = self.mode.read().await.interval();
        let mut periodic = current.map(periodic_interval);
        let mut reconnects_open = true;

        info!("Sync scheduler started");

        loop {
            tokio::select! {
                request = self.request_rx.recv() => {
                    match request {
                        Some((SyncRequest::Drain(trigger), response_tx)) => {
                            debug!(%trigger, "Processing drain request");
                            let _ = response_tx.send(drain_fn(trigger).await);
                        }
                        Some((SyncRequest::Shutdown, _)) => {
                            info!("Received shutdown request");
                            break;
                        }
                        None => {
                            info!("All schedulers dropped, stopping");
                            break;
                        }
                    }
                }

                event = restored.recv(), if reconnects_open => {
                    if event.is_none() {
                        reconnects_open = false;
                    } else if self.mode.read().await.drains_on_reconnect() {
                        log_outcome(drain_fn(SyncTrigger::ConnectivityRestored).await);
                    } else {
                        debug!("Reconnect ignored in current mode");
                    }
                }

                _ = wait_for_periodic(&mut periodic) => {
                    log_outcome(drain_fn(SyncTrigger::Periodic).await);
                }
            }

            let expected = self.mode.read().await.interval();
            if expected != current {
                current = expected;
                periodic = current.map(periodic_interval);
            }
        }
    }
}

fn periodic_interval(period: Duration) -> Interval {
    interval_at(Instant::now() + period, period)
}

async fn wait_for_periodic(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn log_outcome(result: Result<DrainOutcome>) {
    match result {
        Ok(DrainOutcome::Completed(report)) => info!(
            success = report.success_count,
            failed = report.failed_count,
            "Scheduled drain completed"
        ),
        Ok(other) => debug!(outcome = ?other, "Scheduled drain not run"),
        Err(e) => error!("Scheduled drain failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DrainReport;
    use finpro_network::ConnectivityMonitor;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn empty_report() -> DrainReport {
        DrainReport::new(0, 0, 0, Duration::ZERO)
    }

    fn counting(
        count: Arc<AtomicU32>,
    ) -> impl Fn(SyncTrigger) -> std::future::Ready<Result<DrainOutcome>> + Send + Sync + 'static
    {
        move |_trigger| {
            count.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(DrainOutcome::Completed(empty_report())))
        }
    }

    #[tokio::test]
    async fn test_mode_change() {
        let (scheduler, _handle) = SyncScheduler::new(SyncMode::Manual);

        scheduler
            .set_mode(SyncMode::Periodic {
                interval: Duration::from_secs(60),
            })
            .await;

        assert!(matches!(scheduler.get_mode().await, SyncMode::Periodic { .. }));
    }

    #[tokio::test]
    async fn test_drain_request() {
        let (scheduler, handle) = SyncScheduler::new(SyncMode::Manual);
        let monitor = ConnectivityMonitor::new(true);
        let count = Arc::new(AtomicU32::new(0));

        let task = tokio::spawn(handle.run(monitor.restored_events(), counting(count.clone())));

        let outcome = scheduler.request_drain(SyncTrigger::Manual).await.unwrap();
        assert!(outcome.report().is_some());
        assert_eq!(count.load(Ordering::SeqCst), 1);

        scheduler.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_reconnect_triggers_drain() {
        let (scheduler, handle) = SyncScheduler::new(SyncMode::OnReconnect);
        let monitor = ConnectivityMonitor::new(false);
        let count = Arc::new(AtomicU32::new(0));

        let task = tokio::spawn(handle.run(monitor.restored_events(), counting(count.clone())));

        monitor.set_online(true);
        for _ in 0..100 {
            if count.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);

        scheduler.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_manual_mode_ignores_reconnect() {
        let (scheduler, handle) = SyncScheduler::new(SyncMode::Manual);
        let monitor = ConnectivityMonitor::new(false);
        let count = Arc::new(AtomicU32::new(0));

        let task = tokio::spawn(handle.run(monitor.restored_events(), counting(count.clone())));

        monitor.set_online(true);
        // A request is served after the reconnect event was seen.
        tokio::time::sleep(Duration::from_millis(20)).await;
        scheduler.request_drain(SyncTrigger::Manual).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        scheduler.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_drain() {
        let (scheduler, handle) = SyncScheduler::new(SyncMode::Periodic {
            interval: Duration::from_secs(60),
        });
        let monitor = ConnectivityMonitor::new(true);
        let count = Arc::new(AtomicU32::new(0));

        let task = tokio::spawn(handle.run(monitor.restored_events(), counting(count.clone())));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        scheduler.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_request_after_shutdown_fails() {
        let (scheduler, handle) = SyncScheduler::new(SyncMode::Manual);
        let monitor = ConnectivityMonitor::new(true);
        let count = Arc::new(AtomicU32::new(0));

        let task = tokio::spawn(handle.run(monitor.restored_events(), counting(count)));
        scheduler.shutdown().await;
        task.await.unwrap();

        let result = scheduler.request_drain(SyncTrigger::Manual).await;
        assert!(matches!(result, Err(Error::NotPermitted(_))));
    }
}
