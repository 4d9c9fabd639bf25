//! Debounced tag invalidation.
//!
//! Invalidation requests arrive tag-by-tag from webhooks, admin actions, or
//! content updates, often in bursts. [`DebouncedInvalidator`] collects them
//! into a pending set and performs one purge per window instead of one per
//! request.
//!
//! The window is fixed, not sliding: the flush fires a fixed delay after the
//! *first* tag of the window, and later adds never extend it. Consumers get a
//! bounded worst-case latency between requesting an invalidation and the
//! purge happening.
//!
//! The purge itself takes one of two paths. With a [`TagRegistry`] the
//! affected keys are looked up directly, O(affected keys). Without one the
//! invalidator falls back to scanning every partition, decoding each stored
//! entry to inspect its tags, O(total stored items); callers that invalidate
//! frequently at scale must supply a registry.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::codec;
use crate::error::CacheError;
use crate::storage::StoragePartitions;
use crate::tags::{CacheKind, TagRegistry};

/// Default debounce window.
pub const DEFAULT_DEBOUNCE_DELAY: Duration = Duration::from_secs(60);

struct Pending {
    tags: HashSet<String>,
    flush_scheduled: bool,
}

/// Batches tag invalidations over a fixed delay window.
///
/// Cheap to clone; clones share the pending set and schedule state.
#[derive(Clone)]
pub struct DebouncedInvalidator {
    state: Arc<Mutex<Pending>>,
    storages: StoragePartitions,
    registry: Option<Arc<dyn TagRegistry>>,
    delay: Duration,
}

impl DebouncedInvalidator {
    pub fn new(storages: StoragePartitions) -> Self {
        Self {
            state: Arc::new(Mutex::new(Pending {
                tags: HashSet::new(),
                flush_scheduled: false,
            })),
            storages,
            registry: None,
            delay: DEFAULT_DEBOUNCE_DELAY,
        }
    }

    /// Attaches a tag registry, enabling the O(affected keys) purge path.
    pub fn with_registry(mut self, registry: Arc<dyn TagRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Overrides the debounce window.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queues tags for invalidation.
    ///
    /// The pending-set insert and the "is a flush already scheduled"
    /// check-and-set happen under one lock, so concurrent callers can
    /// neither double-schedule nor lose tags.
    pub async fn add<I, S>(&self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.lock().await;
        state.tags.extend(tags.into_iter().map(Into::into));

        if !state.tags.is_empty() && !state.flush_scheduled {
            state.flush_scheduled = true;
            let this = self.clone();
            let delay = self.delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Err(err) = this.invalidate().await {
                    warn!(error = %err, "tag invalidation flush failed");
                }
            });
        }
    }

    /// Flushes the pending set now.
    ///
    /// Safe to call with nothing pending; that is a no-op. A storage removal
    /// failure for one key is logged and does not abort the rest.
    pub async fn invalidate(&self) -> Result<(), CacheError> {
        let tags: Vec<String> = {
            let mut state = self.state.lock().await;
            state.flush_scheduled = false;
            state.tags.drain().collect()
        };

        if tags.is_empty() {
            return Ok(());
        }

        debug!(tags = tags.len(), "flushing tag invalidation");

        match &self.registry {
            Some(registry) => self.invalidate_via_registry(registry, &tags).await,
            None => {
                self.invalidate_via_scan(&tags).await;
                Ok(())
            }
        }
    }

    async fn invalidate_via_registry(
        &self,
        registry: &Arc<dyn TagRegistry>,
        tags: &[String],
    ) -> Result<(), CacheError> {
        let keys_by_kind = registry.cache_keys_for_tags(tags).await?;

        for (kind, keys) in &keys_by_kind {
            let storage = self.storages.get(*kind);
            debug!(kind = %kind, keys = keys.len(), "purging tagged cache items");
            for key in keys {
                if let Err(err) = storage.remove(key).await {
                    warn!(kind = %kind, key = %key, error = %err, "failed to remove cache item");
                }
            }
        }

        registry.remove_tags(tags).await
    }

    /// Fallback purge without a registry: scan every partition and decode
    /// each entry to inspect its tags.
    async fn invalidate_via_scan(&self, tags: &[String]) {
        let tag_set: HashSet<&str> = tags.iter().map(String::as_str).collect();

        for kind in CacheKind::ALL {
            let storage = self.storages.get(kind);
            let keys = match storage.list_keys().await {
                Ok(keys) => keys,
                Err(err) => {
                    warn!(kind = %kind, error = %err, "failed to list keys, skipping partition");
                    continue;
                }
            };

            for key in keys {
                let blob = match storage.get_raw(&key).await {
                    Ok(Some(blob)) => blob,
                    Ok(None) => continue,
                    Err(err) => {
                        warn!(kind = %kind, key = %key, error = %err, "failed to load cache item");
                        continue;
                    }
                };

                // Undecodable entries are stale-format leftovers; leave them
                // to expire through storage TTLs.
                let Some(entry) = codec::decode(&blob) else {
                    continue;
                };

                let matches = entry
                    .metadata
                    .cache_tags
                    .iter()
                    .any(|tag| tag_set.contains(tag.as_str()));
                if !matches {
                    continue;
                }

                if let Err(err) = storage.remove(&key).await {
                    warn!(kind = %kind, key = %key, error = %err, "failed to remove cache item");
                }
            }
        }
    }
}
