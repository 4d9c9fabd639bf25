//! Re-exports for consumers who prefer a single import.
//!
//! ```
//! use ssr_cache::prelude::*;
//!
//! let mut item = Cacheability::new(1_700_000_000);
//! item.set_cacheable().set_max_age(MaxAge::Seconds(60));
//! assert!(item.is_cacheable());
//! ```

pub use crate::cdn::{CdnCacheControl, CdnHeaders, Directive, CACHE_CONTROL_HEADER, CACHE_TAG_HEADER};
pub use crate::codec::{decode, encode, DecodedEntry, EntryMetadata, DELIMITER};
pub use crate::error::CacheError;
pub use crate::invalidator::{DebouncedInvalidator, DEFAULT_DEBOUNCE_DELAY};
pub use crate::max_age::{FixedDuration, Interval, MaxAge, NEVER, PERMANENT};
pub use crate::policy::{Cacheability, ComponentCacheability, RouteCacheability};
pub use crate::serve::{decide_serve, may_serve_on_error, InFlight, ServeDecision};
pub use crate::storage::{CacheStorage, MemoryStorage, SetOptions, StoragePartitions};
pub use crate::tags::{CacheKind, InMemoryTagRegistry, TagRegistry};
