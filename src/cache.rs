//! Two-tier cache for enrichment provider lookups.
//!
//! Every remote call is identified by its endpoint plus the canonical JSON
//! serialization of its request payload. Confirmed responses are kept forever:
//! an in-process map serves repeat lookups, and an append-only JSONL file per
//! (endpoint, key-hash) survives restarts. Lookups in the durable tier compare
//! the full input payload, not just the hash, so hash collisions degrade to a
//! linear scan rather than a wrong answer.

use async_trait::async_trait;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Deterministic identity of one remote request.
#[derive(Debug, Clone)]
pub struct CacheKey {
    /// Endpoint identifier, e.g. `bik-api-4/punkty-zainteresowania-adres`.
    pub endpoint: String,
    /// The request payload itself (object keys are order-insensitive).
    pub payload: Value,
    /// Canonical serialization of `payload` (stable field ordering).
    pub canonical: String,
    /// blake3 over `endpoint | canonical`; names the durable record file.
    pub key_hash: String,
}

impl CacheKey {
    pub fn new(endpoint: impl Into<String>, payload: Value) -> Self {
        let endpoint = endpoint.into();
        // `serde_json::Value` objects are BTreeMap-backed, so serializing the
        // payload through `Value` yields sorted keys: the canonical form.
        let canonical = payload.to_string();
        let key_hash = hash_fields(&[&endpoint, &canonical]);
        Self {
            endpoint,
            payload,
            canonical,
            key_hash,
        }
    }
}

/// One durable record: the exact request and the response it earned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub input: Value,
    pub output: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("cache lock poisoned")]
    Poisoned,
    #[error("task join error: {0}")]
    Join(String),
}

#[async_trait]
pub trait EnrichmentCache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<Value>, CacheError>;
    async fn put(&self, key: &CacheKey, output: &Value) -> Result<(), CacheError>;
}

/// File-backed cache store with an in-process fast path.
#[derive(Clone)]
pub struct JsonlCacheStore {
    dir: PathBuf,
    memory: Arc<Mutex<HashMap<(String, String), Value>>>,
}

impl JsonlCacheStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, CacheError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            memory: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Durable record file for a key: one JSONL file per (endpoint, key-hash).
    pub fn record_path(&self, key: &CacheKey) -> PathBuf {
        self.dir
            .join(key.endpoint.replace('/', "_"))
            .join(format!("{}.jsonl", key.key_hash))
    }

    /// Entries currently held in the memory tier.
    pub fn memory_len(&self) -> usize {
        self.memory.lock().map(|m| m.len()).unwrap_or(0)
    }

    fn memory_get(&self, key: &CacheKey) -> Result<Option<Value>, CacheError> {
        let guard = self.memory.lock().map_err(|_| CacheError::Poisoned)?;
        Ok(guard
            .get(&(key.endpoint.clone(), key.canonical.clone()))
            .cloned())
    }

    fn memory_insert(&self, key: &CacheKey, output: Value) -> Result<(), CacheError> {
        let mut guard = self.memory.lock().map_err(|_| CacheError::Poisoned)?;
        guard.insert((key.endpoint.clone(), key.canonical.clone()), output);
        Ok(())
    }

    /// Scan the record file for an entry whose full input matches `payload`.
    /// Malformed lines are skipped: one bad line never invalidates the file.
    fn scan_durable(path: &Path, payload: &Value) -> Result<Option<Value>, CacheError> {
        let file = match std::fs::File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let reader = BufReader::new(file);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: CacheRecord = match serde_json::from_str(&line) {
                Ok(record) => record,
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "skipping malformed cache record");
                    continue;
                }
            };
            if record.input == *payload {
                return Ok(Some(record.output));
            }
        }
        Ok(None)
    }

    fn append_durable(path: &Path, record: &CacheRecord) -> Result<(), CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        // Exclusive lock so concurrent writers never interleave records.
        FileExt::lock_exclusive(&file)?;
        let line = serde_json::to_string(record).map_err(|e| CacheError::Serde(e.to_string()))?;
        let mut writer = &file;
        writeln!(writer, "{line}")?;
        writer.flush()?;
        FileExt::unlock(&file)?;
        Ok(())
    }
}

#[async_trait]
impl EnrichmentCache for JsonlCacheStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<Value>, CacheError> {
        if let Some(hit) = self.memory_get(key)? {
            return Ok(Some(hit));
        }
        let store = self.clone();
        let key = key.clone();
        tokio::task::spawn_blocking(move || {
            let path = store.record_path(&key);
            match Self::scan_durable(&path, &key.payload)? {
                Some(output) => {
                    // Promote the durable hit for same-process repeats.
                    store.memory_insert(&key, output.clone())?;
                    Ok(Some(output))
                }
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| CacheError::Join(e.to_string()))?
    }

    async fn put(&self, key: &CacheKey, output: &Value) -> Result<(), CacheError> {
        let store = self.clone();
        let key = key.clone();
        let output = output.clone();
        tokio::task::spawn_blocking(move || {
            let path = store.record_path(&key);
            let record = CacheRecord {
                input: key.payload.clone(),
                output: output.clone(),
            };
            Self::append_durable(&path, &record)?;
            store.memory_insert(&key, output)
        })
        .await
        .map_err(|e| CacheError::Join(e.to_string()))?
    }
}

fn hash_fields(fields: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for (idx, field) in fields.iter().enumerate() {
        if idx > 0 {
            hasher.update(b"|");
        }
        hasher.update(field.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
