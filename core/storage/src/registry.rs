//! Queue backends selectable by name from configuration.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use finpro_common::{Error, Result};

use crate::memory::MemoryQueueStore;
use crate::sqlite::SqliteQueueStore;
use crate::store::QueueStore;

/// Opens a queue backend from its settings object.
pub type StoreFactory = Box<dyn Fn(&Value) -> Result<Arc<dyn QueueStore>> + Send + Sync>;

/// Named queue backends.
///
/// Settings are backend specific and passed through untouched, so a config
/// file can carry `{"backend": "sqlite", "config": {"path": ...}}` without
/// the caller knowing what each backend needs.
#[derive(Default)]
pub struct StoreRegistry {
    backends: BTreeMap<String, StoreFactory>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a backend. Names are unique.
    pub fn register(&mut self, name: impl Into<String>, factory: StoreFactory) -> Result<()> {
        let name = name.into();
        if self.backends.contains_key(&name) {
            return Err(Error::AlreadyExists(format!("Queue backend '{}'", name)));
        }
        self.backends.insert(name, factory);
        Ok(())
    }

    /// Open the backend called `name` with `settings`.
    ///
    /// An unknown name reports the backends that do exist.
    pub fn open(&self, name: &str, settings: &Value) -> Result<Arc<dyn QueueStore>> {
        match self.backends.get(name) {
            Some(factory) => factory(settings),
            None => Err(Error::NotFound(format!(
                "Queue backend '{}' (available: {})",
                name,
                self.backends().join(", ")
            ))),
        }
    }

    /// Backend names in sorted order.
    pub fn backends(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }
}

fn open_memory(_settings: &Value) -> Result<Arc<dyn QueueStore>> {
    Ok(Arc::new(MemoryQueueStore::new()))
}

fn open_sqlite(settings: &Value) -> Result<Arc<dyn QueueStore>> {
    let Some(path) = settings.get("path").and_then(Value::as_str) else {
        return Err(Error::InvalidInput(
            "sqlite queue backend needs a 'path' setting".to_string(),
        ));
    };
    Ok(Arc::new(SqliteQueueStore::open(path)?))
}

/// Registry with `memory` (no settings) and `sqlite` (`{"path": ...}`).
pub fn create_default_registry() -> StoreRegistry {
    let mut registry = StoreRegistry::new();
    registry.backends.insert("memory".to_string(), Box::new(open_memory));
    registry.backends.insert("sqlite".to_string(), Box::new(open_sqlite));
    registry
}
