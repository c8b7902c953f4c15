//! HTTP transport backed by reqwest.

use async_trait::async_trait;
use reqwest::{Client, Method};
use tracing::debug;

use finpro_common::{Error, FetchRequest, FetchResponse, Result};

use crate::transport::Transport;

const USER_AGENT: &str = "FinTechPro/0.1";

/// Transport that performs real HTTP requests.
///
/// No request timeout is applied; a hung request delays its caller.
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    /// Create a transport with a default client.
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { http })
    }

    /// Use an existing client.
    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        let method = Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| Error::InvalidInput(format!("Invalid method: {}", e)))?;

        debug!(method = %request.method, url = %request.url, "Sending request");

        let mut builder = self.http.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Network(format!("Request to {} failed: {}", request.url, e)))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("Failed to read body from {}: {}", request.url, e)))?;

        debug!(status, url = %request.url, bytes = body.len(), "Received response");

        Ok(FetchResponse {
            status,
            headers,
            body,
        })
    }
}
