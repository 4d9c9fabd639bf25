//! Cache entry encoding: a JSON metadata prefix, a fixed delimiter, and the
//! opaque body.
//!
//! The body may itself contain the delimiter literal; only the first
//! occurrence is significant, and the metadata prefix is always
//! `serde_json`-produced so it never contains the raw delimiter sequence.

use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Separates the metadata prefix from the body in a stored entry.
pub const DELIMITER: &str = "<CACHE_ITEM_DELIMITER>";

/// Policy metadata persisted alongside a cached body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetadata {
    /// Absolute expiry timestamp in epoch seconds, or one of the sentinels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,

    /// Absolute end of the stale-if-error window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_if_error_expires: Option<i64>,

    /// Whether the entry may be served stale while revalidating.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_while_revalidate: Option<bool>,

    /// Tags attached for bulk invalidation, insertion-ordered.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cache_tags: Vec<String>,

    /// Payload keys a cached component depends on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_keys: Option<Vec<String>>,
}

/// A successfully decoded cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEntry {
    pub metadata: EntryMetadata,
    pub body: String,
}

/// Encodes a body plus metadata into one storable string.
pub fn encode(body: &str, metadata: &EntryMetadata) -> Result<String, CacheError> {
    let prefix =
        serde_json::to_string(metadata).map_err(|err| CacheError::Storage(err.to_string()))?;

    let mut blob = String::with_capacity(prefix.len() + DELIMITER.len() + body.len());
    blob.push_str(&prefix);
    blob.push_str(DELIMITER);
    blob.push_str(body);
    Ok(blob)
}

/// Decodes a stored blob back into metadata and body.
///
/// Splits on the *first* delimiter occurrence. Returns `None` on a missing
/// delimiter or unparseable metadata; callers treat that as a cache miss so
/// stale-format entries surviving a deployment never take a request down.
pub fn decode(blob: &str) -> Option<DecodedEntry> {
    let (prefix, body) = blob.split_once(DELIMITER)?;
    let metadata = serde_json::from_str(prefix).ok()?;
    Some(DecodedEntry {
        metadata,
        body: body.to_owned(),
    })
}
