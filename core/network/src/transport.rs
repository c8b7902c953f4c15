//! Transport trait definition.

use async_trait::async_trait;
use url::Url;

use finpro_common::{Error, FetchRequest, FetchResponse, Result};

/// Outbound request executor.
///
/// A non-success status is still a response. Only requests that never
/// produce a response fail, with `Error::Network`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name (e.g. "http", "memory").
    fn name(&self) -> &str;

    /// Perform a request and buffer the full response.
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse>;
}

/// Resolve a destination against the site origin.
///
/// Absolute URLs pass through; paths are joined onto `origin`.
pub fn resolve_url(origin: &Url, destination: &str) -> Result<Url> {
    origin
        .join(destination)
        .map_err(|e| Error::InvalidInput(format!("Invalid destination {}: {}", destination, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_path() {
        let origin = Url::parse("https://fintech.example").unwrap();
        let url = resolve_url(&origin, "/api/leads").unwrap();
        assert_eq!(url.as_str(), "https://fintech.example/api/leads");
    }

    #[test]
    fn test_resolve_absolute_passthrough() {
        let origin = Url::parse("https://fintech.example").unwrap();
        let url = resolve_url(&origin, "https://crm.example/hooks/lead").unwrap();
        assert_eq!(url.host_str(), Some("crm.example"));
    }
}
