use thiserror::Error;

/// Errors surfaced by the cache core.
///
/// Decode failures are deliberately *not* represented here: a stored entry
/// that cannot be decoded is treated as a cache miss by
/// [`crate::codec::decode`], never as an error.
#[derive(Debug, Error)]
pub enum CacheError {
    /// An unknown max-age duration string. This is a configuration error and
    /// is fatal to the caller.
    #[error("invalid max age spec: {0}")]
    InvalidMaxAge(String),

    /// An unknown cache partition name.
    #[error("unknown cache kind: {0}")]
    UnknownKind(String),

    /// A failure reported by the underlying storage backend.
    #[error("storage error: {0}")]
    Storage(String),
}
