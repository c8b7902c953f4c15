//! Fetch interception: routing, strategies and lifecycle.

use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use finpro_common::{
    Error, FetchRequest, FetchResponse, HttpMethod, RequestDestination, RequestKey, Result,
};
use finpro_network::{resolve_url, Transport};

use crate::config::CacheConfig;
use crate::storage::CacheStorage;

const IMAGE_PLACEHOLDER: &str = concat!(
    r##"<svg width="400" height="300" xmlns="http://www.w3.org/2000/svg">"##,
    r##"<rect width="400" height="300" fill="#eee"/>"##,
    r##"<text x="200" y="150" text-anchor="middle" fill="#888">Image Unavailable</text>"##,
    r##"</svg>"##,
);

/// Inline graphic served when an image can be neither read from cache nor
/// fetched.
pub fn image_placeholder() -> FetchResponse {
    FetchResponse::ok(IMAGE_PLACEHOLDER).with_header("Content-Type", "image/svg+xml")
}

/// How an intercepted request is satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Not intercepted; the request goes to the network untouched.
    Passthrough,
    /// Network, then cache, then (for navigations) the offline page.
    NetworkFirst,
    /// Cache, then network, then (for images) a placeholder.
    CacheFirst,
}

/// Outcome of a fetch event. Exactly one per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchDisposition {
    RespondWith(FetchResponse),
    Passthrough,
}

/// Summary of an install pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub cache_name: String,
    pub assets_cached: usize,
}

/// Intercepts same-origin GET requests and maintains the current cache
/// generation.
pub struct CacheManager {
    storage: CacheStorage,
    transport: Arc<dyn Transport>,
    config: CacheConfig,
    origin: Url,
}

impl CacheManager {
    /// Create a manager with fresh cache storage.
    pub fn new(origin: Url, config: CacheConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_storage(origin, config, transport, CacheStorage::new())
    }

    /// Create a manager over existing cache storage (e.g. shared with a
    /// previous generation's manager).
    pub fn with_storage(
        origin: Url,
        config: CacheConfig,
        transport: Arc<dyn Transport>,
        storage: CacheStorage,
    ) -> Self {
        Self {
            storage,
            transport,
            config,
            origin,
        }
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Choose a strategy for `request`.
    pub fn route(&self, request: &FetchRequest) -> Route {
        if request.method != HttpMethod::Get {
            return Route::Passthrough;
        }
        if request.url.origin() != self.origin.origin() {
            return Route::Passthrough;
        }
        if self.config.is_excluded(request.url.path()) {
            return Route::Passthrough;
        }

        match request.destination {
            RequestDestination::Document => Route::NetworkFirst,
            d if d.is_static_asset() => Route::CacheFirst,
            _ => Route::NetworkFirst,
        }
    }

    /// Handle a fetch event.
    ///
    /// Strategy failures that have a substitute resolve to a response. The
    /// error is only returned when nothing can answer.
    pub async fn handle_fetch(&self, request: FetchRequest) -> Result<FetchDisposition> {
        let route = self.route(&request);
        debug!(url = %request.url, ?route, "Routing fetch");

        let response = match route {
            Route::Passthrough => return Ok(FetchDisposition::Passthrough),
            Route::NetworkFirst => self.network_first(request).await?,
            Route::CacheFirst => self.cache_first(request).await?,
        };
        Ok(FetchDisposition::RespondWith(response))
    }

    /// Network, then any cached copy, then the offline page for navigations.
    pub async fn network_first(&self, request: FetchRequest) -> Result<FetchResponse> {
        let key = request.key();
        let navigation = request.is_navigation();
        let cacheable = self.is_dynamically_cacheable(&request);

        let err = match self.transport.fetch(request).await {
            Ok(response) => {
                if response.is_success() && cacheable {
                    self.store_copy(key, &response);
                }
                return Ok(response);
            }
            Err(err) => err,
        };

        debug!(%key, error = %err, "Network failed, trying cache");

        if let Some(cached) = self.storage.match_any(&key)? {
            return Ok(cached.response);
        }

        if navigation {
            let offline_key = RequestKey::get(&self.offline_url()?);
            if let Some(offline) = self.storage.match_in(&self.config.cache_name, &offline_key)? {
                info!(%key, "Serving offline page");
                return Ok(offline.response);
            }
            warn!(%key, "Offline page not cached");
        }

        Err(err)
    }

    /// Cache, then network, then a placeholder for images.
    pub async fn cache_first(&self, request: FetchRequest) -> Result<FetchResponse> {
        let key = request.key();

        match self.storage.match_any(&key) {
            Ok(Some(cached)) => {
                debug!(%key, "Cache hit");
                return Ok(cached.response);
            }
            Ok(None) => {}
            Err(err) => warn!(%key, error = %err, "Cache lookup failed, using network"),
        }

        let destination = request.destination;
        match self.transport.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.store_copy(key, &response);
                }
                Ok(response)
            }
            Err(err) if destination == RequestDestination::Image => {
                debug!(%key, error = %err, "Serving image placeholder");
                Ok(image_placeholder())
            }
            Err(err) => Err(Error::CacheMiss(format!("{}: {}", key, err))),
        }
    }

    /// Prime the current generation with the static manifest and the
    /// offline page.
    ///
    /// Priming is all-or-nothing: every asset, the offline page included, is
    /// fetched and checked before anything is stored. Any failed or
    /// non-success response aborts the install and leaves the cache as it
    /// was.
    pub async fn install(&self) -> Result<InstallReport> {
        let name = &self.config.cache_name;
        info!(cache = %name, assets = self.config.static_assets.len(), "Installing");

        let mut urls = self
            .config
            .static_assets
            .iter()
            .map(|path| resolve_url(&self.origin, path))
            .collect::<Result<Vec<_>>>()?;
        let offline_url = self.offline_url()?;
        if !urls.contains(&offline_url) {
            urls.push(offline_url);
        }

        let fetches = urls.into_iter().map(|url| async move {
            let response = self.transport.fetch(FetchRequest::get(url.clone())).await?;
            if !response.is_success() {
                return Err(Error::Http {
                    status: response.status,
                    url: url.to_string(),
                });
            }
            Ok((RequestKey::get(&url), response))
        });
        let entries = try_join_all(fetches).await?;
        let assets_cached = entries.len();

        self.storage.open(name)?;
        self.storage.put_all(name, entries)?;

        info!(cache = %name, assets_cached, "Install complete");
        Ok(InstallReport {
            cache_name: name.clone(),
            assets_cached,
        })
    }

    /// Delete every generation other than the current one.
    ///
    /// Returns the deleted generation names.
    pub async fn activate(&self) -> Result<Vec<String>> {
        let stale: Vec<String> = self
            .storage
            .keys()?
            .into_iter()
            .filter(|name| *name != self.config.cache_name)
            .collect();

        for name in &stale {
            self.storage.delete(name)?;
            info!(cache = %name, "Deleted stale cache generation");
        }
        Ok(stale)
    }

    /// Keep a copy of a network response. Failing to store it does not
    /// fail the request.
    fn store_copy(&self, key: RequestKey, response: &FetchResponse) {
        if let Err(err) = self
            .storage
            .put(&self.config.cache_name, key.clone(), response.clone())
        {
            warn!(%key, error = %err, "Could not cache response");
        }
    }

    fn offline_url(&self) -> Result<Url> {
        resolve_url(&self.origin, &self.config.offline_url)
    }

    fn is_dynamically_cacheable(&self, request: &FetchRequest) -> bool {
        let path = request.url.path();
        !self.config.is_excluded(path)
            && (request.is_navigation() || self.config.has_cacheable_extension(path))
    }
}
