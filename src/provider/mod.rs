//! Cache-first client for the geospatial enrichment provider.

pub mod error;
pub mod geoapi;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::sleep;

use crate::cache::{CacheKey, EnrichmentCache, JsonlCacheStore};
use crate::config::ProviderConfig;

pub use error::{ErrorContext, ProviderError};
pub use geoapi::{EnrichmentProvider, GeoApiAdapter};
pub use types::{Address, Query, RawValue};

/// Retry policy for remote calls.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

/// Orchestrates one remote call per distinct (endpoint, payload) query.
///
/// The cache is consulted first; only a confirmed miss reaches the network.
/// A per-key lock guarantees at most one in-flight remote call per distinct
/// cache key; late joiners wait and are then served from the cache.
pub struct EnrichmentClient {
    provider: Arc<dyn EnrichmentProvider>,
    cache: Arc<dyn EnrichmentCache>,
    config: ClientConfig,
    in_flight: tokio::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl EnrichmentClient {
    pub fn new(
        provider: Arc<dyn EnrichmentProvider>,
        cache: Arc<dyn EnrichmentCache>,
        config: ClientConfig,
    ) -> Self {
        Self {
            provider,
            cache,
            config,
            in_flight: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Build the production client: gateway adapter + durable JSONL cache.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let adapter = GeoApiAdapter::new(config)?;
        let cache = JsonlCacheStore::new(&config.cache_dir)?;
        Ok(Self::new(
            Arc::new(adapter),
            Arc::new(cache),
            ClientConfig::default(),
        ))
    }

    /// Fetch one catalog query for an address, unpacked to its raw value.
    pub async fn fetch(&self, address: &Address, query: Query) -> Result<RawValue, ProviderError> {
        address.validate()?;
        let response = self.fetch_response(query.endpoint(), query.payload(address)).await?;
        query.unpack(&response)
    }

    /// Fetch the full provider response for an (endpoint, payload) pair,
    /// cache-checked and cached on success before any unpacking.
    pub async fn fetch_response(
        &self,
        endpoint: &str,
        payload: Value,
    ) -> Result<Value, ProviderError> {
        let key = CacheKey::new(endpoint, payload);
        let lock = self.key_lock(&key.key_hash).await;
        let result = {
            let _guard = lock.lock().await;
            self.fetch_under_lock(&key).await
        };
        self.prune_key_lock(&key.key_hash, lock).await;
        result
    }

    async fn fetch_under_lock(&self, key: &CacheKey) -> Result<Value, ProviderError> {
        if let Some(hit) = self.cache.get(key).await? {
            return Ok(hit);
        }

        let output = self.call_with_retry(&key.endpoint, &key.payload).await?;
        // A record is written only after a complete, valid response.
        self.cache.put(key, &output).await?;
        Ok(output)
    }

    /// Live per-key lock entries. Empty whenever no fetch is in flight.
    pub async fn in_flight_len(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    async fn key_lock(&self, key_hash: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.in_flight.lock().await;
        map.entry(key_hash.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Drop our handle on a key lock and remove the map entry once no other
    /// task holds it. Waiters registered before the removal keep their clone;
    /// later arrivals get a fresh entry.
    async fn prune_key_lock(&self, key_hash: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        drop(lock);
        let mut map = self.in_flight.lock().await;
        if let Some(entry) = map.get(key_hash) {
            if Arc::strong_count(entry) == 1 {
                map.remove(key_hash);
            }
        }
    }

    async fn call_with_retry(
        &self,
        endpoint: &str,
        payload: &Value,
    ) -> Result<Value, ProviderError> {
        let mut last_error: Option<ProviderError> = None;

        for attempt in 0..=self.config.max_retries {
            match self.provider.post(endpoint, payload).await {
                Ok(output) => return Ok(output),
                Err(err) => {
                    if !err.is_retryable() || attempt == self.config.max_retries {
                        return Err(err);
                    }
                    let delay = backoff_delay(self.config.retry_base_delay, attempt);
                    tracing::warn!(
                        endpoint,
                        code = err.code(),
                        attempt,
                        ?delay,
                        "retrying enrichment call"
                    );
                    last_error = Some(err);
                    sleep(delay).await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ProviderError::rejected("unknown provider error", false, ErrorContext::new())
        }))
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let multiplier = 2u64.pow(attempt.min(5));
    base * multiplier as u32
}
