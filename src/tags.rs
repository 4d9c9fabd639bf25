//! Cache tags and the tag → key reverse index.
//!
//! Tags let many cache entries be invalidated together ("all entries for
//! user:123"). The registry keeps a bidirectional index per cache partition:
//! `tag → set<key>` for reverse lookups and `key → set<tag>` for cleanup when
//! a single item is removed. Both directions stay mutually consistent and
//! self-cleaning: a tag or key mapping to an empty set is deleted outright.
//!
//! The trait is async so a persistent backend (e.g. a remote index) can
//! implement the same contract; the in-memory implementation completes
//! synchronously.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::CacheError;

/// The closed set of cache partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Route,
    Data,
    Component,
}

impl CacheKind {
    /// All partitions, in a stable order.
    pub const ALL: [CacheKind; 3] = [CacheKind::Route, CacheKind::Data, CacheKind::Component];

    pub fn as_str(self) -> &'static str {
        match self {
            CacheKind::Route => "route",
            CacheKind::Data => "data",
            CacheKind::Component => "component",
        }
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheKind {
    type Err = CacheError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "route" => Ok(CacheKind::Route),
            "data" => Ok(CacheKind::Data),
            "component" => Ok(CacheKind::Component),
            other => Err(CacheError::UnknownKind(other.to_owned())),
        }
    }
}

/// Bidirectional tag index, partitioned by [`CacheKind`].
#[async_trait]
pub trait TagRegistry: Send + Sync {
    /// Associates `key` in partition `kind` with every given tag.
    async fn add_cache_tags(
        &self,
        kind: CacheKind,
        key: &str,
        tags: &[String],
    ) -> Result<(), CacheError>;

    /// Returns, per partition, the deduplicated union of keys reachable from
    /// any of the given tags. Partitions with no matches are omitted.
    async fn cache_keys_for_tags(
        &self,
        tags: &[String],
    ) -> Result<HashMap<CacheKind, Vec<String>>, CacheError>;

    /// Drops the given tags from every partition, cleaning up keys whose tag
    /// set becomes empty.
    async fn remove_tags(&self, tags: &[String]) -> Result<(), CacheError>;

    /// Drops keys from one partition, cleaning up tags whose key set becomes
    /// empty.
    async fn remove_cache_items(&self, kind: CacheKind, keys: &[String])
        -> Result<(), CacheError>;

    /// Clears one partition's index.
    async fn purge_kind(&self, kind: CacheKind) -> Result<(), CacheError>;

    /// Clears the whole index.
    async fn purge_everything(&self) -> Result<(), CacheError>;
}

/// One partition's forward and reverse maps.
#[derive(Default)]
struct KindIndex {
    /// tag → set of cache keys
    forward: DashMap<String, HashSet<String>>,
    /// cache key → set of tags
    reverse: DashMap<String, HashSet<String>>,
}

impl KindIndex {
    fn index(&self, key: &str, tags: &[String]) {
        for tag in tags {
            self.forward
                .entry(tag.clone())
                .or_default()
                .insert(key.to_owned());
        }
        self.reverse
            .entry(key.to_owned())
            .or_default()
            .extend(tags.iter().cloned());
    }

    fn keys_for_tag(&self, tag: &str) -> Vec<String> {
        self.forward
            .get(tag)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn remove_tag(&self, tag: &str) {
        if let Some((_, keys)) = self.forward.remove(tag) {
            for key in keys {
                if let Some(mut tags) = self.reverse.get_mut(&key) {
                    tags.remove(tag);
                    if tags.is_empty() {
                        drop(tags);
                        self.reverse.remove(&key);
                    }
                }
            }
        }
    }

    fn remove_key(&self, key: &str) {
        if let Some((_, tags)) = self.reverse.remove(key) {
            for tag in tags {
                if let Some(mut keys) = self.forward.get_mut(&tag) {
                    keys.remove(key);
                    if keys.is_empty() {
                        drop(keys);
                        self.forward.remove(&tag);
                    }
                }
            }
        }
    }

    fn clear(&self) {
        self.forward.clear();
        self.reverse.clear();
    }
}

/// Thread-safe in-memory [`TagRegistry`].
///
/// Cheap to clone; clones share the underlying maps.
#[derive(Clone, Default)]
pub struct InMemoryTagRegistry {
    route: Arc<KindIndex>,
    data: Arc<KindIndex>,
    component: Arc<KindIndex>,
}

impl InMemoryTagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn partition(&self, kind: CacheKind) -> &KindIndex {
        match kind {
            CacheKind::Route => &self.route,
            CacheKind::Data => &self.data,
            CacheKind::Component => &self.component,
        }
    }
}

#[async_trait]
impl TagRegistry for InMemoryTagRegistry {
    async fn add_cache_tags(
        &self,
        kind: CacheKind,
        key: &str,
        tags: &[String],
    ) -> Result<(), CacheError> {
        if !tags.is_empty() {
            self.partition(kind).index(key, tags);
        }
        Ok(())
    }

    async fn cache_keys_for_tags(
        &self,
        tags: &[String],
    ) -> Result<HashMap<CacheKind, Vec<String>>, CacheError> {
        let mut result = HashMap::new();

        for kind in CacheKind::ALL {
            let partition = self.partition(kind);
            let mut keys = HashSet::new();
            for tag in tags {
                keys.extend(partition.keys_for_tag(tag));
            }
            if !keys.is_empty() {
                result.insert(kind, keys.into_iter().collect());
            }
        }

        Ok(result)
    }

    async fn remove_tags(&self, tags: &[String]) -> Result<(), CacheError> {
        for kind in CacheKind::ALL {
            let partition = self.partition(kind);
            for tag in tags {
                partition.remove_tag(tag);
            }
        }
        Ok(())
    }

    async fn remove_cache_items(
        &self,
        kind: CacheKind,
        keys: &[String],
    ) -> Result<(), CacheError> {
        let partition = self.partition(kind);
        for key in keys {
            partition.remove_key(key);
        }
        Ok(())
    }

    async fn purge_kind(&self, kind: CacheKind) -> Result<(), CacheError> {
        self.partition(kind).clear();
        Ok(())
    }

    async fn purge_everything(&self) -> Result<(), CacheError> {
        for kind in CacheKind::ALL {
            self.partition(kind).clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_owned()).collect()
    }

    fn sorted(mut keys: Vec<String>) -> Vec<String> {
        keys.sort();
        keys
    }

    #[tokio::test]
    async fn keys_are_reachable_from_any_of_their_tags() {
        let registry = InMemoryTagRegistry::new();
        registry
            .add_cache_tags(CacheKind::Route, "k1", &tags(&["a", "b"]))
            .await
            .unwrap();
        registry
            .add_cache_tags(CacheKind::Route, "k2", &tags(&["b"]))
            .await
            .unwrap();

        let result = registry.cache_keys_for_tags(&tags(&["b"])).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(
            sorted(result[&CacheKind::Route].clone()),
            vec!["k1", "k2"]
        );
    }

    #[tokio::test]
    async fn lookup_unions_keys_across_tags_without_duplicates() {
        let registry = InMemoryTagRegistry::new();
        registry
            .add_cache_tags(CacheKind::Data, "k1", &tags(&["a", "b"]))
            .await
            .unwrap();

        let result = registry
            .cache_keys_for_tags(&tags(&["a", "b"]))
            .await
            .unwrap();
        assert_eq!(result[&CacheKind::Data], vec!["k1"]);
    }

    #[tokio::test]
    async fn empty_partitions_are_omitted_from_lookup() {
        let registry = InMemoryTagRegistry::new();
        registry
            .add_cache_tags(CacheKind::Component, "c1", &tags(&["x"]))
            .await
            .unwrap();

        let result = registry.cache_keys_for_tags(&tags(&["x"])).await.unwrap();
        assert!(result.contains_key(&CacheKind::Component));
        assert!(!result.contains_key(&CacheKind::Route));
        assert!(!result.contains_key(&CacheKind::Data));
    }

    #[tokio::test]
    async fn remove_cache_items_cleans_both_directions() {
        let registry = InMemoryTagRegistry::new();
        registry
            .add_cache_tags(CacheKind::Route, "k1", &tags(&["a", "b"]))
            .await
            .unwrap();
        registry
            .add_cache_tags(CacheKind::Route, "k2", &tags(&["b"]))
            .await
            .unwrap();

        registry
            .remove_cache_items(CacheKind::Route, &["k1".to_owned()])
            .await
            .unwrap();

        let for_a = registry.cache_keys_for_tags(&tags(&["a"])).await.unwrap();
        assert!(for_a.is_empty());

        let for_b = registry.cache_keys_for_tags(&tags(&["b"])).await.unwrap();
        assert_eq!(for_b[&CacheKind::Route], vec!["k2"]);
    }

    #[tokio::test]
    async fn remove_tags_cleans_keys_left_without_tags() {
        let registry = InMemoryTagRegistry::new();
        registry
            .add_cache_tags(CacheKind::Data, "k1", &tags(&["only"]))
            .await
            .unwrap();
        registry
            .add_cache_tags(CacheKind::Data, "k2", &tags(&["only", "other"]))
            .await
            .unwrap();

        registry.remove_tags(&tags(&["only"])).await.unwrap();

        assert!(registry
            .cache_keys_for_tags(&tags(&["only"]))
            .await
            .unwrap()
            .is_empty());
        // k2 is still reachable through its remaining tag.
        let result = registry
            .cache_keys_for_tags(&tags(&["other"]))
            .await
            .unwrap();
        assert_eq!(result[&CacheKind::Data], vec!["k2"]);
    }

    #[tokio::test]
    async fn partitions_are_isolated() {
        let registry = InMemoryTagRegistry::new();
        registry
            .add_cache_tags(CacheKind::Route, "k", &tags(&["shared"]))
            .await
            .unwrap();
        registry
            .add_cache_tags(CacheKind::Data, "k", &tags(&["shared"]))
            .await
            .unwrap();

        registry
            .remove_cache_items(CacheKind::Route, &["k".to_owned()])
            .await
            .unwrap();

        let result = registry
            .cache_keys_for_tags(&tags(&["shared"]))
            .await
            .unwrap();
        assert!(!result.contains_key(&CacheKind::Route));
        assert_eq!(result[&CacheKind::Data], vec!["k"]);
    }

    #[tokio::test]
    async fn purge_kind_only_clears_that_partition() {
        let registry = InMemoryTagRegistry::new();
        registry
            .add_cache_tags(CacheKind::Route, "r", &tags(&["t"]))
            .await
            .unwrap();
        registry
            .add_cache_tags(CacheKind::Component, "c", &tags(&["t"]))
            .await
            .unwrap();

        registry.purge_kind(CacheKind::Route).await.unwrap();

        let result = registry.cache_keys_for_tags(&tags(&["t"])).await.unwrap();
        assert!(!result.contains_key(&CacheKind::Route));
        assert_eq!(result[&CacheKind::Component], vec!["c"]);
    }

    #[tokio::test]
    async fn purge_everything_clears_all_partitions() {
        let registry = InMemoryTagRegistry::new();
        for kind in CacheKind::ALL {
            registry
                .add_cache_tags(kind, "k", &tags(&["t"]))
                .await
                .unwrap();
        }

        registry.purge_everything().await.unwrap();
        assert!(registry
            .cache_keys_for_tags(&tags(&["t"]))
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn cache_kind_round_trips_through_strings() {
        for kind in CacheKind::ALL {
            assert_eq!(kind.as_str().parse::<CacheKind>().unwrap(), kind);
        }
        assert!(matches!(
            "bogus".parse::<CacheKind>(),
            Err(CacheError::UnknownKind(_))
        ));
    }

    #[test]
    fn concurrent_indexing_is_safe() {
        use std::thread;

        let registry = InMemoryTagRegistry::new();
        let mut handles = vec![];

        for i in 0..10 {
            let registry = registry.clone();
            handles.push(thread::spawn(move || {
                let key = format!("key{i}");
                let tag = format!("tag{}", i % 3);
                registry.partition(CacheKind::Route).index(&key, &[tag]);
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.route.reverse.len(), 10);
        assert!(registry.route.forward.len() <= 3);
    }
}
