//! Per-request cacheability accumulation.
//!
//! While a route, component, or data loader produces a value, it mutates a
//! [`Cacheability`] owned by that one in-flight operation. Tags accumulate in
//! insertion order, the cacheable flag is tri-state with uncacheable as a
//! terminal state, and numeric lifetime fields merge with tightest-wins
//! semantics: any nested unit can reduce the lifetime of its container, but a
//! container can never loosen what a nested unit already tightened.
//!
//! Specializations compose the base accumulator rather than extending it:
//! [`RouteCacheability`] adds a monotonic stale-while-revalidate flag,
//! [`ComponentCacheability`] captures the payload keys a component depends on.

use crate::codec::EntryMetadata;
use crate::max_age::{MaxAge, NEVER, PERMANENT};

/// A numeric lifetime bound with tightest-wins merge semantics.
///
/// The first assignment always applies. After that a candidate only wins if
/// it is strictly smaller, with one exception: a stored permanent sentinel is
/// overridable by any concrete value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct TtlBound {
    value: Option<i64>,
}

impl TtlBound {
    fn tighten(&mut self, candidate: i64) {
        match self.value {
            None => self.value = Some(candidate),
            Some(PERMANENT) => self.value = Some(candidate),
            Some(current) if candidate < current => self.value = Some(candidate),
            Some(_) => {}
        }
    }

    fn get(self) -> Option<i64> {
        self.value
    }

    /// Converts the bound into an absolute expiry timestamp. Sentinels pass
    /// through unchanged; an unset bound yields `None`.
    fn expires(self, now: i64) -> Option<i64> {
        match self.value {
            None => None,
            Some(PERMANENT) => Some(PERMANENT),
            Some(NEVER) => Some(NEVER),
            Some(seconds) => Some(now + seconds),
        }
    }
}

/// Mutable cacheability state for one in-flight operation.
///
/// Owned by exactly one operation; never shared across requests.
#[derive(Debug, Clone)]
pub struct Cacheability {
    now: i64,
    tags: Vec<String>,
    cacheable: Option<bool>,
    max_age: TtlBound,
    stale_if_error: TtlBound,
}

impl Cacheability {
    /// Creates an accumulator anchored at `now` (UTC epoch seconds). All
    /// max-age specs set on this instance resolve against the same instant.
    pub fn new(now: i64) -> Self {
        Self {
            now,
            tags: Vec::new(),
            cacheable: None,
            max_age: TtlBound::default(),
            stale_if_error: TtlBound::default(),
        }
    }

    /// Appends tags in insertion order. Duplicates are kept; consumers
    /// deduplicate at output time where needed.
    pub fn add_tags<I, S>(&mut self, tags: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Marks the operation cacheable. Only takes effect while the flag is
    /// still unset; uncacheable is terminal.
    pub fn set_cacheable(&mut self) -> &mut Self {
        if self.cacheable.is_none() {
            self.cacheable = Some(true);
        }
        self
    }

    /// Marks the operation uncacheable. Terminal: no later call can undo it.
    pub fn set_uncacheable(&mut self) -> &mut Self {
        self.cacheable = Some(false);
        self
    }

    /// Tightens the max-age bound with a resolved spec.
    pub fn set_max_age(&mut self, spec: MaxAge) -> &mut Self {
        self.max_age.tighten(spec.resolve(self.now));
        self
    }

    /// Tightens the stale-if-error window with a resolved spec.
    pub fn set_stale_if_error(&mut self, spec: MaxAge) -> &mut Self {
        self.stale_if_error.tighten(spec.resolve(self.now));
        self
    }

    pub fn is_cacheable(&self) -> bool {
        self.cacheable == Some(true)
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// The timestamp this accumulator resolves specs against.
    pub fn now(&self) -> i64 {
        self.now
    }

    /// Current max-age bound in seconds, if any was set.
    pub fn max_age(&self) -> Option<i64> {
        self.max_age.get()
    }

    /// Current stale-if-error window in seconds, if any was set.
    pub fn stale_if_error(&self) -> Option<i64> {
        self.stale_if_error.get()
    }

    /// Absolute expiry timestamp derived from the max-age bound. Sentinels
    /// pass through unchanged.
    pub fn expires(&self) -> Option<i64> {
        self.max_age.expires(self.now)
    }

    /// Absolute stale-if-error expiry timestamp.
    pub fn stale_if_error_expires(&self) -> Option<i64> {
        self.stale_if_error.expires(self.now)
    }

    /// Merges a nested unit's accumulated state into this one: tags append,
    /// numeric bounds tighten, and an uncacheable child makes the container
    /// uncacheable. Used when a component's cacheability bubbles into the
    /// route that rendered it.
    pub fn merge_from(&mut self, child: &Cacheability) -> &mut Self {
        self.tags.extend(child.tags.iter().cloned());
        if let Some(max_age) = child.max_age.get() {
            self.max_age.tighten(max_age);
        }
        if let Some(window) = child.stale_if_error.get() {
            self.stale_if_error.tighten(window);
        }
        if child.cacheable == Some(false) {
            self.cacheable = Some(false);
        }
        self
    }

    /// Snapshot for the entry codec.
    pub fn to_metadata(&self) -> EntryMetadata {
        EntryMetadata {
            expires: self.expires(),
            stale_if_error_expires: self.stale_if_error_expires(),
            stale_while_revalidate: None,
            cache_tags: self.tags.clone(),
            payload_keys: None,
        }
    }
}

/// Cacheability for a full route render.
///
/// Adds a stale-while-revalidate flag on top of the base accumulator. Unlike
/// the numeric bounds the flag merges with a simple monotonic OR: once a unit
/// opts in, it stays on.
#[derive(Debug, Clone)]
pub struct RouteCacheability {
    inner: Cacheability,
    stale_while_revalidate: bool,
}

impl RouteCacheability {
    pub fn new(now: i64) -> Self {
        Self {
            inner: Cacheability::new(now),
            stale_while_revalidate: false,
        }
    }

    pub fn add_tags<I, S>(&mut self, tags: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.add_tags(tags);
        self
    }

    pub fn set_cacheable(&mut self) -> &mut Self {
        self.inner.set_cacheable();
        self
    }

    pub fn set_uncacheable(&mut self) -> &mut Self {
        self.inner.set_uncacheable();
        self
    }

    pub fn set_max_age(&mut self, spec: MaxAge) -> &mut Self {
        self.inner.set_max_age(spec);
        self
    }

    pub fn set_stale_if_error(&mut self, spec: MaxAge) -> &mut Self {
        self.inner.set_stale_if_error(spec);
        self
    }

    /// Allows serving this route stale while a fresh copy regenerates in the
    /// background. Monotonic: once enabled, stays enabled.
    pub fn set_stale_while_revalidate(&mut self) -> &mut Self {
        self.stale_while_revalidate = true;
        self
    }

    pub fn is_cacheable(&self) -> bool {
        self.inner.is_cacheable()
    }

    pub fn stale_while_revalidate(&self) -> bool {
        self.stale_while_revalidate
    }

    pub fn cacheability(&self) -> &Cacheability {
        &self.inner
    }

    pub fn cacheability_mut(&mut self) -> &mut Cacheability {
        &mut self.inner
    }

    pub fn to_metadata(&self) -> EntryMetadata {
        EntryMetadata {
            stale_while_revalidate: self.stale_while_revalidate.then_some(true),
            ..self.inner.to_metadata()
        }
    }
}

/// Cacheability for a single rendered component.
///
/// Captures the payload keys the component read while rendering so a cache
/// hit can replay the same payload subset.
#[derive(Debug, Clone)]
pub struct ComponentCacheability {
    inner: Cacheability,
    payload_keys: Vec<String>,
}

impl ComponentCacheability {
    pub fn new(now: i64) -> Self {
        Self {
            inner: Cacheability::new(now),
            payload_keys: Vec::new(),
        }
    }

    pub fn add_tags<I, S>(&mut self, tags: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.add_tags(tags);
        self
    }

    pub fn set_cacheable(&mut self) -> &mut Self {
        self.inner.set_cacheable();
        self
    }

    pub fn set_uncacheable(&mut self) -> &mut Self {
        self.inner.set_uncacheable();
        self
    }

    pub fn set_max_age(&mut self, spec: MaxAge) -> &mut Self {
        self.inner.set_max_age(spec);
        self
    }

    /// Records payload keys in insertion order.
    pub fn add_payload_keys<I, S>(&mut self, keys: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.payload_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn is_cacheable(&self) -> bool {
        self.inner.is_cacheable()
    }

    pub fn payload_keys(&self) -> &[String] {
        &self.payload_keys
    }

    pub fn cacheability(&self) -> &Cacheability {
        &self.inner
    }

    pub fn cacheability_mut(&mut self) -> &mut Cacheability {
        &mut self.inner
    }

    /// Snapshot for the entry codec. Payload keys are deduplicated here,
    /// preserving first-occurrence order.
    pub fn to_metadata(&self) -> EntryMetadata {
        let mut seen = std::collections::HashSet::new();
        let payload_keys: Vec<String> = self
            .payload_keys
            .iter()
            .filter(|key| seen.insert(key.as_str()))
            .cloned()
            .collect();

        EntryMetadata {
            payload_keys: (!payload_keys.is_empty()).then_some(payload_keys),
            ..self.inner.to_metadata()
        }
    }
}
