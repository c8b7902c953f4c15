//! Cache manager configuration.

use serde::{Deserialize, Serialize};

/// Current cache generation. Bump on every deployment.
pub const DEFAULT_CACHE_NAME: &str = "fintech-pro-cache-v1";

/// Page served for navigations when neither network nor cache can answer.
pub const DEFAULT_OFFLINE_URL: &str = "/offline.html";

const STATIC_ASSETS: &[&str] = &[
    "/",
    "/offline.html",
    "/favicon.ico",
    "/manifest.json",
    "/file.svg",
    "/globe.svg",
    "/next.svg",
    "/vercel.svg",
    "/window.svg",
    "/icons/icon-72x72.png",
    "/icons/icon-96x96.png",
    "/icons/icon-128x128.png",
    "/icons/icon-144x144.png",
    "/icons/icon-152x152.png",
    "/icons/icon-192x192.png",
    "/icons/icon-384x384.png",
    "/icons/icon-512x512.png",
];

const CACHEABLE_EXTENSIONS: &[&str] = &[
    "js", "css", "png", "jpg", "jpeg", "svg", "gif", "webp", "woff", "woff2", "ttf", "otf",
];

/// Configuration for the cache manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Name of the current cache generation.
    pub cache_name: String,
    /// Offline fallback page, also part of the install manifest.
    pub offline_url: String,
    /// Paths primed at install time.
    pub static_assets: Vec<String>,
    /// File extensions stored opportunistically on network-first hits.
    pub cacheable_extensions: Vec<String>,
    /// Paths with any of these prefixes are never intercepted.
    pub excluded_prefixes: Vec<String>,
    /// Paths containing any of these fragments are never intercepted.
    pub excluded_fragments: Vec<String>,
}

impl CacheConfig {
    /// Set the generation name.
    pub fn with_cache_name(mut self, name: impl Into<String>) -> Self {
        self.cache_name = name.into();
        self
    }

    /// Replace the install manifest.
    pub fn with_static_assets(mut self, assets: Vec<String>) -> Self {
        self.static_assets = assets;
        self
    }

    /// Whether a path is opted out of interception (API, analytics, tracking).
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded_prefixes.iter().any(|p| path.starts_with(p.as_str()))
            || self.excluded_fragments.iter().any(|f| path.contains(f.as_str()))
    }

    /// Whether a path has a dynamically cacheable extension.
    pub fn has_cacheable_extension(&self, path: &str) -> bool {
        let Some((_, extension)) = path.rsplit_once('.') else {
            return false;
        };
        if extension.contains('/') {
            return false;
        }
        self.cacheable_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            offline_url: DEFAULT_OFFLINE_URL.to_string(),
            static_assets: STATIC_ASSETS.iter().map(|s| s.to_string()).collect(),
            cacheable_extensions: CACHEABLE_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            excluded_prefixes: vec!["/api/".to_string()],
            excluded_fragments: vec!["analytics".to_string(), "tracking".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let config = CacheConfig::default();
        assert_eq!(config.cache_name, "fintech-pro-cache-v1");
        assert_eq!(config.static_assets.len(), 17);
        assert!(config.static_assets.contains(&config.offline_url));
        assert!(config
            .static_assets
            .contains(&"/icons/icon-192x192.png".to_string()));
    }

    #[test]
    fn test_exclusions() {
        let config = CacheConfig::default();
        assert!(config.is_excluded("/api/leads"));
        assert!(config.is_excluded("/js/analytics.js"));
        assert!(config.is_excluded("/pixel/tracking"));
        assert!(!config.is_excluded("/apix/page"));
        assert!(!config.is_excluded("/pricing"));
    }

    #[test]
    fn test_cacheable_extensions() {
        let config = CacheConfig::default();
        assert!(config.has_cacheable_extension("/_next/static/app.js"));
        assert!(config.has_cacheable_extension("/fonts/Inter.WOFF2"));
        assert!(!config.has_cacheable_extension("/pricing"));
        assert!(!config.has_cacheable_extension("/v1.2/pricing"));
        assert!(!config.has_cacheable_extension("/manifest.json"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"cache_name": "fintech-pro-cache-v2"}"#).unwrap();
        assert_eq!(config.cache_name, "fintech-pro-cache-v2");
        assert_eq!(config.offline_url, "/offline.html");
    }
}
