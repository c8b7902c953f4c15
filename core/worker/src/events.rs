//! Lifecycle and functional events delivered to the worker.

use bytes::Bytes;
use std::fmt;

use finpro_cache::FetchDisposition;
use finpro_common::FetchRequest;
use finpro_sync::DrainOutcome;

use crate::push::NotificationData;

/// Event names handlers register against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Install,
    Activate,
    Fetch,
    Sync,
    PeriodicSync,
    Push,
    NotificationClick,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Install => "install",
            EventKind::Activate => "activate",
            EventKind::Fetch => "fetch",
            EventKind::Sync => "sync",
            EventKind::PeriodicSync => "periodicsync",
            EventKind::Push => "push",
            EventKind::NotificationClick => "notificationclick",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(FetchRequest),
    Sync { tag: String },
    PeriodicSync { tag: String },
    Push { data: Option<Bytes> },
    NotificationClick { data: NotificationData },
}

impl WorkerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            WorkerEvent::Install => EventKind::Install,
            WorkerEvent::Activate => EventKind::Activate,
            WorkerEvent::Fetch(_) => EventKind::Fetch,
            WorkerEvent::Sync { .. } => EventKind::Sync,
            WorkerEvent::PeriodicSync { .. } => EventKind::PeriodicSync,
            WorkerEvent::Push { .. } => EventKind::Push,
            WorkerEvent::NotificationClick { .. } => EventKind::NotificationClick,
        }
    }
}

/// What a handler did with its event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The event's work finished.
    Done,
    /// The single response for a fetch event.
    Fetch(FetchDisposition),
    /// A sync callback ran a drain (or did not, for unrelated tags).
    Sync(Option<DrainOutcome>),
    /// Nothing to do for this event.
    Ignored,
}
