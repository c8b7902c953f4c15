//! CLI configuration file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use url::Url;

use finpro_cache::CacheConfig;
use finpro_sync::SyncConfig;

const DEFAULT_ORIGIN: &str = "http://localhost:3000";

/// Queue backend selection, resolved through the store registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Registered backend name ("memory" or "sqlite").
    pub backend: String,
    /// Backend-specific configuration.
    pub config: Value,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            config: json!({ "path": default_db_path() }),
        }
    }
}

impl StoreConfig {
    /// Database file for the sqlite backend, if configured.
    pub fn sqlite_path(&self) -> Option<PathBuf> {
        if self.backend != "sqlite" {
            return None;
        }
        self.config
            .get("path")
            .and_then(|v| v.as_str())
            .map(PathBuf::from)
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("finpro")
        .join("queue.db")
}

/// Everything the CLI needs to build the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FinproConfig {
    /// Site origin that relative destinations resolve against.
    pub origin: String,
    pub store: StoreConfig,
    pub cache: CacheConfig,
    pub sync: SyncConfig,
}

impl Default for FinproConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            store: StoreConfig::default(),
            cache: CacheConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl FinproConfig {
    /// Read a JSON config file, or the defaults when `path` is `None`.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn origin_url(&self) -> Result<Url> {
        Url::parse(&self.origin).with_context(|| format!("Invalid origin: {}", self.origin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults_without_file() {
        let config = FinproConfig::load(None).await.unwrap();
        assert_eq!(config.origin_url().unwrap().as_str(), "http://localhost:3000/");
        assert_eq!(config.store.backend, "sqlite");
        assert!(config.store.sqlite_path().unwrap().ends_with("finpro/queue.db"));
        assert_eq!(config.sync.max_attempts, 3);
    }

    #[tokio::test]
    async fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("finpro.json");
        tokio::fs::write(
            &path,
            r#"{"origin": "https://fintech.example", "store": {"backend": "memory"}, "sync": {"max_attempts": 5}}"#,
        )
        .await
        .unwrap();

        let config = FinproConfig::load(Some(&path)).await.unwrap();
        assert_eq!(config.origin, "https://fintech.example");
        assert_eq!(config.store.backend, "memory");
        assert!(config.store.sqlite_path().is_none());
        assert_eq!(config.sync.max_attempts, 5);
        assert_eq!(config.cache.cache_name, "fintech-pro-cache-v1");
    }

    #[tokio::test]
    async fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        tokio::fs::write(&path, "{").await.unwrap();
        assert!(FinproConfig::load(Some(&path)).await.is_err());
    }
}
