//! Serve-or-regenerate decisions for cached entries.
//!
//! Given decoded entry metadata and the shared in-flight set, the read path
//! asks [`decide_serve`] what to do with a cached value. Expired entries with
//! stale-while-revalidate enabled are served stale to everyone except the one
//! caller that wins the in-flight race; that caller regenerates. A separate
//! check, [`may_serve_on_error`], decides whether a stale entry can substitute
//! for a regeneration failure.

use std::sync::Arc;

use dashmap::DashSet;

use crate::codec::EntryMetadata;
use crate::max_age::PERMANENT;

/// Shared set of keys currently being regenerated.
///
/// Cheap to clone; clones share the underlying set. Whoever marks a key
/// in-flight must call [`InFlight::finish`] unconditionally when the
/// regeneration ends, success or failure, or the key would be served stale
/// forever.
#[derive(Clone, Default)]
pub struct InFlight {
    keys: Arc<DashSet<String>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically marks `key` as in-flight. Returns `true` when this caller
    /// won the race and owns the regeneration.
    pub fn begin(&self, key: &str) -> bool {
        self.keys.insert(key.to_owned())
    }

    /// Clears the in-flight mark.
    pub fn finish(&self, key: &str) {
        self.keys.remove(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

/// What to do with a cached entry on the read path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeDecision {
    /// The entry is fresh; serve it as-is.
    Fresh,
    /// The entry is expired but another caller is already regenerating it;
    /// serve the stale value.
    Stale,
    /// The caller must regenerate. When stale-while-revalidate applied, this
    /// caller was marked in-flight and must call [`InFlight::finish`] when
    /// done.
    Regenerate,
}

/// Decides whether a cached entry is servable, servable-but-stale, or must
/// be regenerated.
pub fn decide_serve(
    metadata: &EntryMetadata,
    now: i64,
    key: &str,
    in_flight: &InFlight,
) -> ServeDecision {
    let expires = match metadata.expires {
        // No expiry was ever recorded; the entry does not age out.
        None => return ServeDecision::Fresh,
        Some(PERMANENT) => return ServeDecision::Fresh,
        Some(expires) => expires,
    };

    if now < expires {
        return ServeDecision::Fresh;
    }

    if metadata.stale_while_revalidate == Some(true) {
        if in_flight.begin(key) {
            ServeDecision::Regenerate
        } else {
            ServeDecision::Stale
        }
    } else {
        ServeDecision::Regenerate
    }
}

/// Decides whether a stale entry may substitute for a failed regeneration.
pub fn may_serve_on_error(metadata: &EntryMetadata, now: i64) -> bool {
    match metadata.stale_if_error_expires {
        Some(PERMANENT) => true,
        Some(expires) => now < expires,
        None => false,
    }
}
