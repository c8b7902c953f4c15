//! Single dispatcher for named worker event handlers.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

use finpro_cache::FetchDisposition;
use finpro_common::{Error, Result};

use crate::events::{EventKind, HandlerOutcome, WorkerEvent};

/// Handler for one kind of worker event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event of the kind this handler is registered for.
    ///
    /// A fetch handler must resolve to exactly one disposition or an error.
    async fn handle(&self, event: WorkerEvent) -> Result<HandlerOutcome>;
}

/// Routes events to the handler registered for their kind.
///
/// At most one handler per kind. Fetch events with no handler pass through
/// to the network; other unhandled events are ignored.
pub struct Dispatcher {
    handlers: HashMap<EventKind, Arc<dyn EventHandler>>,
}

impl Dispatcher {
    /// Create a new empty dispatcher.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler.
    ///
    /// # Errors
    /// - Returns error if a handler is already registered for `kind`
    pub fn register(&mut self, kind: EventKind, handler: Arc<dyn EventHandler>) -> Result<()> {
        if self.handlers.contains_key(&kind) {
            return Err(Error::AlreadyExists(format!(
                "Handler for '{}' is already registered",
                kind
            )));
        }
        self.handlers.insert(kind, handler);
        Ok(())
    }

    pub fn has_handler(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Registered event kinds.
    pub fn kinds(&self) -> Vec<EventKind> {
        self.handlers.keys().copied().collect()
    }

    /// Deliver an event.
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<HandlerOutcome> {
        let kind = event.kind();
        let Some(handler) = self.handlers.get(&kind) else {
            debug!(event = %kind, "No handler registered");
            return Ok(match kind {
                EventKind::Fetch => HandlerOutcome::Fetch(FetchDisposition::Passthrough),
                _ => HandlerOutcome::Ignored,
            });
        };

        let outcome = handler.handle(event).await;
        if let Err(e) = &outcome {
            error!(event = %kind, "Handler failed: {}", e);
        }
        outcome
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
