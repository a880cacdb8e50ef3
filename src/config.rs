//! Provider configuration.
//!
//! Constructed once at process start (from a JSON file or the environment)
//! and passed by reference into the cache store and enrichment client. No
//! module-level state.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::provider::ProviderError;

const DEFAULT_BASE_URL: &str = "https://gateway.oapi.bik.pl";

/// Credentials and transport parameters for the enrichment provider.
///
/// The JSON field aliases match the provider's conventional `connection.json`
/// layout, so an existing credentials file loads unchanged.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// API key sent with every request.
    #[serde(alias = "BIK-OAPI-Key")]
    pub api_key: String,
    /// Client certificate (PEM) for mutual TLS.
    #[serde(default, alias = "cert-crt")]
    pub cert_path: Option<PathBuf>,
    /// Client private key (PEM) for mutual TLS.
    #[serde(default, alias = "cert-key")]
    pub key_path: Option<PathBuf>,
    /// Gateway base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Directory for the durable cache tier.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Remote call timeout in seconds. Always finite.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".cache")
}

fn default_timeout_secs() -> u64 {
    30
}

impl ProviderConfig {
    /// Load from a JSON credentials file (`connection.json`).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| ProviderError::config(format!("invalid config {}: {e}", path.display())))
    }

    /// Load from `HOMESCOUT_*` environment variables.
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = std::env::var("HOMESCOUT_API_KEY")
            .map_err(|_| ProviderError::config("HOMESCOUT_API_KEY not set"))?;
        let base_url =
            std::env::var("HOMESCOUT_BASE_URL").unwrap_or_else(|_| default_base_url());
        let cache_dir = std::env::var("HOMESCOUT_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_cache_dir());
        let timeout_secs = std::env::var("HOMESCOUT_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(default_timeout_secs);
        Ok(Self {
            api_key,
            cert_path: std::env::var("HOMESCOUT_CERT_PATH").ok().map(PathBuf::from),
            key_path: std::env::var("HOMESCOUT_KEY_PATH").ok().map(PathBuf::from),
            base_url,
            cache_dir,
            timeout_secs,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
