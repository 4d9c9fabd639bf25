//! SSR Cache
//! =========
//!
//! `ssr-cache` is the cache policy and invalidation engine for a
//! server-rendering host: component, route, and generic-data caching plus CDN
//! cache-control header management. The host decides *when* to consult the
//! cache; this crate decides *whether* something is cacheable, for how long,
//! under which tags, and how tag invalidation runs without blocking
//! request handling.
//!
//! Storage is an injected dependency behind [`storage::CacheStorage`]; the
//! crate ships an in-memory reference backend but implements no persistence
//! of its own.
//!
//! ```
//! use ssr_cache::prelude::*;
//!
//! let now = 1_700_000_000;
//! let mut route = RouteCacheability::new(now);
//! route
//!     .set_cacheable()
//!     .set_max_age(MaxAge::Seconds(300))
//!     .set_stale_while_revalidate()
//!     .add_tags(["page:home", "menu"]);
//!
//! let blob = ssr_cache::codec::encode("<html>...</html>", &route.to_metadata()).unwrap();
//! let entry = ssr_cache::codec::decode(&blob).unwrap();
//! assert_eq!(entry.metadata.expires, Some(now + 300));
//! ```

pub mod cdn;
pub mod codec;
pub mod error;
pub mod invalidator;
pub mod max_age;
pub mod policy;
pub mod prelude;
pub mod serve;
pub mod storage;
pub mod tags;

pub use cdn::{CdnCacheControl, CdnHeaders};
pub use codec::{DecodedEntry, EntryMetadata};
pub use error::CacheError;
pub use invalidator::DebouncedInvalidator;
pub use max_age::{MaxAge, NEVER, PERMANENT};
pub use policy::{Cacheability, ComponentCacheability, RouteCacheability};
pub use serve::{decide_serve, may_serve_on_error, InFlight, ServeDecision};
pub use storage::{CacheStorage, MemoryStorage, StoragePartitions};
pub use tags::{CacheKind, InMemoryTagRegistry, TagRegistry};
