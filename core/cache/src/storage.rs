//! Generation-scoped response cache.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use finpro_common::{Error, FetchResponse, HttpMethod, RequestKey, Result};

/// A stored response and the generation it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct CachedResponse {
    pub response: FetchResponse,
    pub generation: String,
    pub stored_at: DateTime<Utc>,
}

struct Generation {
    name: String,
    entries: HashMap<RequestKey, CachedResponse>,
}

/// Named cache generations, each mapping GET request identities to
/// response snapshots.
///
/// Lookups across generations search in creation order. Clones share the
/// same generations.
#[derive(Clone, Default)]
pub struct CacheStorage {
    generations: Arc<RwLock<Vec<Generation>>>,
}

impl CacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Generation>>> {
        self.generations
            .read()
            .map_err(|_| Error::Storage("Cache lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Generation>>> {
        self.generations
            .write()
            .map_err(|_| Error::Storage("Cache lock poisoned".to_string()))
    }

    /// Create a generation if it does not exist yet.
    pub fn open(&self, name: &str) -> Result<()> {
        let mut generations = self.write()?;
        if !generations.iter().any(|g| g.name == name) {
            debug!(cache = name, "Opened cache generation");
            generations.push(Generation {
                name: name.to_string(),
                entries: HashMap::new(),
            });
        }
        Ok(())
    }

    /// Store a response under `key`, replacing any previous entry.
    ///
    /// The generation is created on demand. Only GET requests are cacheable.
    pub fn put(&self, name: &str, key: RequestKey, response: FetchResponse) -> Result<()> {
        self.put_all(name, vec![(key, response)])
    }

    /// Store several responses at once. Either all land or none do.
    pub fn put_all(&self, name: &str, entries: Vec<(RequestKey, FetchResponse)>) -> Result<()> {
        if let Some((key, _)) = entries.iter().find(|(k, _)| k.method != HttpMethod::Get) {
            return Err(Error::InvalidInput(format!("Cannot cache {}", key)));
        }

        let mut generations = self.write()?;
        let index = match generations.iter().position(|g| g.name == name) {
            Some(index) => index,
            None => {
                generations.push(Generation {
                    name: name.to_string(),
                    entries: HashMap::new(),
                });
                generations.len() - 1
            }
        };

        let stored_at = Utc::now();
        for (key, response) in entries {
            debug!(cache = name, %key, "Cached response");
            let entry = CachedResponse {
                response,
                generation: name.to_string(),
                stored_at,
            };
            generations[index].entries.insert(key, entry);
        }
        Ok(())
    }

    /// Look up `key` in every generation, oldest first.
    pub fn match_any(&self, key: &RequestKey) -> Result<Option<CachedResponse>> {
        Ok(self
            .read()?
            .iter()
            .find_map(|g| g.entries.get(key).cloned()))
    }

    /// Look up `key` in one generation.
    pub fn match_in(&self, name: &str, key: &RequestKey) -> Result<Option<CachedResponse>> {
        Ok(self
            .read()?
            .iter()
            .find(|g| g.name == name)
            .and_then(|g| g.entries.get(key).cloned()))
    }

    /// Generation names in creation order.
    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self.read()?.iter().map(|g| g.name.clone()).collect())
    }

    pub fn has(&self, name: &str) -> Result<bool> {
        Ok(self.read()?.iter().any(|g| g.name == name))
    }

    /// Drop a generation and all its entries. Returns whether it existed.
    pub fn delete(&self, name: &str) -> Result<bool> {
        let mut generations = self.write()?;
        let before = generations.len();
        generations.retain(|g| g.name != name);
        Ok(generations.len() != before)
    }

    /// Request identities stored in one generation.
    pub fn entries(&self, name: &str) -> Result<Vec<RequestKey>> {
        Ok(self
            .read()?
            .iter()
            .find(|g| g.name == name)
            .map(|g| g.entries.keys().cloned().collect())
            .unwrap_or_default())
    }

    pub fn entry_count(&self, name: &str) -> Result<usize> {
        Ok(self
            .read()?
            .iter()
            .find(|g| g.name == name)
            .map_or(0, |g| g.entries.len()))
    }
}

#[cfg(test)]
impl CacheStorage {
    /// Poison the lock as a panicking writer would.
    pub(crate) fn poison(&self) {
        let generations = self.generations.clone();
        let _ = std::thread::spawn(move || {
            let _guard = generations.write();
            panic!("writer panicked");
        })
        .join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn key(path: &str) -> RequestKey {
        RequestKey::get(&Url::parse("https://fintech.example").unwrap().join(path).unwrap())
    }

    #[test]
    fn test_put_and_match() {
        let storage = CacheStorage::new();
        storage
            .put("v1", key("/globe.svg"), FetchResponse::ok("<svg/>"))
            .unwrap();

        let hit = storage.match_in("v1", &key("/globe.svg")).unwrap().unwrap();
        assert_eq!(hit.generation, "v1");
        assert_eq!(hit.response.text(), "<svg/>");
        assert!(storage.match_in("v2", &key("/globe.svg")).unwrap().is_none());
        assert!(storage.match_any(&key("/globe.svg")).unwrap().is_some());
    }

    #[test]
    fn test_match_any_prefers_oldest_generation() {
        let storage = CacheStorage::new();
        storage.put("v1", key("/"), FetchResponse::ok("old")).unwrap();
        storage.put("v2", key("/"), FetchResponse::ok("new")).unwrap();

        let hit = storage.match_any(&key("/")).unwrap().unwrap();
        assert_eq!(hit.generation, "v1");
        assert_eq!(storage.keys().unwrap(), vec!["v1", "v2"]);
    }

    #[test]
    fn test_delete_generation() {
        let storage = CacheStorage::new();
        storage.put("v1", key("/"), FetchResponse::ok("old")).unwrap();

        assert!(storage.delete("v1").unwrap());
        assert!(!storage.delete("v1").unwrap());
        assert!(storage.match_any(&key("/")).unwrap().is_none());
        assert_eq!(storage.entry_count("v1").unwrap(), 0);
    }

    #[test]
    fn test_non_get_rejected() {
        let storage = CacheStorage::new();
        let mut post = key("/api/leads");
        post.method = HttpMethod::Post;

        assert!(matches!(
            storage.put("v1", post.clone(), FetchResponse::ok("")),
            Err(Error::InvalidInput(_))
        ));

        let batch = vec![
            (key("/"), FetchResponse::ok("home")),
            (post, FetchResponse::ok("")),
        ];
        assert!(storage.put_all("v1", batch).is_err());
        assert!(!storage.has("v1").unwrap());
    }

    #[test]
    fn test_open_is_idempotent() {
        let storage = CacheStorage::new();
        storage.open("v1").unwrap();
        storage.put("v1", key("/"), FetchResponse::ok("home")).unwrap();
        storage.open("v1").unwrap();

        assert_eq!(storage.entry_count("v1").unwrap(), 1);
        assert_eq!(storage.entries("v1").unwrap(), vec![key("/")]);
    }
}
