//! The storage backend boundary.
//!
//! The core never implements real persistence; it drives an injected
//! [`CacheStorage`] per partition. This module ships [`MemoryStorage`], a
//! process-local reference implementation used by the integration tests, and
//! [`StoragePartitions`], the per-[`CacheKind`] handle bundle consumed by the
//! invalidator.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::CacheError;
use crate::tags::CacheKind;

/// Write options for a storage call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// Backend-enforced expiry. The policy layer tracks its own expiry in
    /// entry metadata; this only bounds how long the backend keeps the blob.
    pub ttl: Option<Duration>,
}

/// Asynchronous key-value storage for one cache partition.
///
/// Implementations own their retry and timeout policy; the core never
/// retries.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Fetches a stored blob as raw bytes.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Fetches a stored blob as a string, for use with the entry codec.
    /// Returns `None` for absent keys and for blobs that are not valid
    /// UTF-8.
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        let bytes = self.get(key).await?;
        Ok(bytes.and_then(|bytes| String::from_utf8(bytes).ok()))
    }

    /// Stores raw bytes.
    async fn set(&self, key: &str, value: Vec<u8>, options: SetOptions) -> Result<(), CacheError>;

    /// Stores an encoded entry string.
    async fn set_raw(&self, key: &str, value: String, options: SetOptions) -> Result<(), CacheError> {
        self.set(key, value.into_bytes(), options).await
    }

    /// Removes one key, if present.
    async fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Lists all live keys in this partition.
    async fn list_keys(&self) -> Result<Vec<String>, CacheError>;

    /// Drops everything in this partition.
    async fn clear(&self) -> Result<(), CacheError>;
}

#[derive(Clone)]
struct StoredValue {
    bytes: Vec<u8>,
    expires_at: Option<SystemTime>,
}

impl StoredValue {
    fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }
}

/// In-memory reference [`CacheStorage`].
///
/// Cheap to clone; clones share the underlying map. Expired values are
/// dropped lazily on read.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    values: Arc<DashMap<String, StoredValue>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = SystemTime::now();
        self.values
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        if let Some(stored) = self.values.get(key) {
            if stored.is_expired(SystemTime::now()) {
                drop(stored);
                self.values.remove(key);
                return Ok(None);
            }
            return Ok(Some(stored.bytes.clone()));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, options: SetOptions) -> Result<(), CacheError> {
        let expires_at = options.ttl.map(|ttl| SystemTime::now() + ttl);
        self.values.insert(
            key.to_owned(),
            StoredValue {
                bytes: value,
                expires_at,
            },
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.values.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, CacheError> {
        let now = SystemTime::now();
        Ok(self
            .values
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.values.clear();
        Ok(())
    }
}

/// One storage handle per cache partition.
#[derive(Clone)]
pub struct StoragePartitions {
    partitions: HashMap<CacheKind, Arc<dyn CacheStorage>>,
}

impl StoragePartitions {
    pub fn new(
        route: Arc<dyn CacheStorage>,
        data: Arc<dyn CacheStorage>,
        component: Arc<dyn CacheStorage>,
    ) -> Self {
        let mut partitions: HashMap<CacheKind, Arc<dyn CacheStorage>> = HashMap::new();
        partitions.insert(CacheKind::Route, route);
        partitions.insert(CacheKind::Data, data);
        partitions.insert(CacheKind::Component, component);
        Self { partitions }
    }

    /// Builds partitions backed by fresh [`MemoryStorage`] instances.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryStorage::new()),
        )
    }

    pub fn get(&self, kind: CacheKind) -> &Arc<dyn CacheStorage> {
        // The map is populated for every kind at construction.
        &self.partitions[&kind]
    }
}
