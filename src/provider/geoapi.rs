//! HTTP adapter for the enrichment gateway.
//!
//! Authenticates with a mutual-TLS client identity plus an API-key header,
//! POSTs JSON payloads, and maps non-success statuses onto the error
//! taxonomy. The transport timeout is always finite.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::Value;

use super::error::{ErrorContext, ProviderError};
use crate::config::ProviderConfig;

/// Header carrying the API key.
const API_KEY_HEADER: &str = "BIK-OAPI-Key";

/// Maximum allowed response body (1MB). Criterion responses are tiny.
const MAX_RESPONSE_LEN: usize = 1_024 * 1_024;

/// Transport seam for the enrichment provider.
#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    async fn post(&self, endpoint: &str, payload: &Value) -> Result<Value, ProviderError>;
}

/// Gateway adapter over reqwest.
#[derive(Debug, Clone)]
pub struct GeoApiAdapter {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl GeoApiAdapter {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let key_value = HeaderValue::from_str(&config.api_key)
            .map_err(|_| ProviderError::config("API key is not a valid header value"))?;
        headers.insert(API_KEY_HEADER, key_value);

        let timeout = config.timeout();
        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .gzip(true);

        if let (Some(cert), Some(key)) = (&config.cert_path, &config.key_path) {
            let mut pem = std::fs::read(cert).map_err(|e| {
                ProviderError::config(format!("cannot read certificate {}: {e}", cert.display()))
            })?;
            let key_pem = std::fs::read(key).map_err(|e| {
                ProviderError::config(format!("cannot read private key {}: {e}", key.display()))
            })?;
            pem.extend_from_slice(&key_pem);
            let identity = reqwest::Identity::from_pem(&pem)
                .map_err(|e| ProviderError::config(format!("invalid client identity: {e}")))?;
            builder = builder.identity(identity);
        }

        let client = builder
            .build()
            .map_err(|e| ProviderError::config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    fn extract_request_id(headers: &reqwest::header::HeaderMap) -> Option<String> {
        headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }
}

#[async_trait]
impl EnrichmentProvider for GeoApiAdapter {
    async fn post(&self, endpoint: &str, payload: &Value) -> Result<Value, ProviderError> {
        let result = self.client.post(self.url(endpoint)).json(payload).send().await;
        let mut response = match result {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                return Err(ProviderError::Timeout(
                    self.timeout,
                    Some(ErrorContext::new().with_endpoint(endpoint)),
                ));
            }
            Err(err) => return Err(err.into()),
        };

        let status = response.status();
        let request_id = Self::extract_request_id(response.headers());

        // Stream the body to enforce the size limit.
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let new_len = bytes.len() + chunk.len();
            if new_len > MAX_RESPONSE_LEN {
                return Err(ProviderError::invalid_response(
                    format!("response too large: {new_len} bytes"),
                    ErrorContext::new().with_endpoint(endpoint),
                ));
            }
            bytes.extend_from_slice(&chunk);
        }
        let body = String::from_utf8_lossy(&bytes).to_string();

        let mut ctx = ErrorContext::new()
            .with_status(status.as_u16())
            .with_endpoint(endpoint);
        if let Some(id) = request_id {
            ctx = ctx.with_request_id(id);
        }

        if !status.is_success() {
            let message = if body.trim().is_empty() {
                format!("HTTP {}", status.as_u16())
            } else {
                format!("HTTP {}: {}", status.as_u16(), body.trim())
            };
            return Err(ProviderError::rejected(
                message,
                status.as_u16() >= 500,
                ctx,
            ));
        }

        serde_json::from_str(&body)
            .map_err(|e| ProviderError::invalid_response(format!("invalid JSON: {e}"), ctx))
    }
}
