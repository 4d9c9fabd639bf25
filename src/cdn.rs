//! CDN cache-control directive accumulation.
//!
//! [`CdnCacheControl`] collects cache-control-like directives from local
//! policy decisions and from downstream responses, merging them safely:
//! numeric directives keep the tightest (smallest) value, boolean directives
//! OR together, and `private` is terminal and always beats `public`. The
//! merged state renders back into header values for the CDN.
//!
//! Directive-string parsing is best effort and field scoped: a malformed
//! token is skipped, never fatal.

use std::collections::HashSet;
use std::fmt;

/// Header carrying the space-joined cache tags for the CDN.
pub const CACHE_TAG_HEADER: &str = "Cache-Tag";

/// Header carrying the rendered cache-control directives.
pub const CACHE_CONTROL_HEADER: &str = "Cache-Control";

/// A single parsed cache-control directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    MaxAge(i64),
    SharedMaxAge(i64),
    StaleWhileRevalidate(i64),
    StaleIfError(i64),
    MinFresh(i64),
    MaxStale(i64),
    Immutable,
    MustRevalidate,
    NoCache,
    NoStore,
    NoTransform,
    OnlyIfCached,
    ProxyRevalidate,
    Private,
    Public,
}

impl Directive {
    /// Parses one comma-separated token. Returns `None` for anything
    /// unrecognized or malformed.
    fn parse(token: &str) -> Option<Directive> {
        let token = token.trim().to_ascii_lowercase();

        if let Some((name, value)) = token.split_once('=') {
            let seconds: i64 = value.trim().parse().ok()?;
            return match name.trim() {
                "max-age" => Some(Directive::MaxAge(seconds)),
                "s-maxage" => Some(Directive::SharedMaxAge(seconds)),
                "stale-while-revalidate" => Some(Directive::StaleWhileRevalidate(seconds)),
                "stale-if-error" => Some(Directive::StaleIfError(seconds)),
                "min-fresh" => Some(Directive::MinFresh(seconds)),
                "max-stale" => Some(Directive::MaxStale(seconds)),
                _ => None,
            };
        }

        match token.as_str() {
            "immutable" => Some(Directive::Immutable),
            "must-revalidate" => Some(Directive::MustRevalidate),
            "no-cache" => Some(Directive::NoCache),
            "no-store" => Some(Directive::NoStore),
            "no-transform" => Some(Directive::NoTransform),
            "only-if-cached" => Some(Directive::OnlyIfCached),
            "proxy-revalidate" => Some(Directive::ProxyRevalidate),
            "private" => Some(Directive::Private),
            "public" => Some(Directive::Public),
            _ => None,
        }
    }
}

/// Accumulated CDN directive state for one response.
#[derive(Debug, Clone, Default)]
pub struct CdnCacheControl {
    max_age: Option<i64>,
    shared_max_age: Option<i64>,
    stale_while_revalidate: Option<i64>,
    stale_if_error: Option<i64>,
    min_fresh: Option<i64>,
    max_stale: Option<i64>,
    immutable: bool,
    must_revalidate: bool,
    no_cache: bool,
    no_store: bool,
    no_transform: bool,
    only_if_cached: bool,
    proxy_revalidate: bool,
    private: bool,
    public: bool,
    tags: Vec<String>,
}

fn tighten(slot: &mut Option<i64>, candidate: i64) {
    match *slot {
        None => *slot = Some(candidate),
        Some(current) if candidate < current => *slot = Some(candidate),
        Some(_) => {}
    }
}

impl CdnCacheControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one directive with the module's merge rules.
    pub fn apply(&mut self, directive: Directive) -> &mut Self {
        match directive {
            Directive::MaxAge(v) => tighten(&mut self.max_age, v),
            Directive::SharedMaxAge(v) => tighten(&mut self.shared_max_age, v),
            Directive::StaleWhileRevalidate(v) => tighten(&mut self.stale_while_revalidate, v),
            Directive::StaleIfError(v) => tighten(&mut self.stale_if_error, v),
            Directive::MinFresh(v) => tighten(&mut self.min_fresh, v),
            Directive::MaxStale(v) => tighten(&mut self.max_stale, v),
            Directive::Immutable => self.immutable = true,
            Directive::MustRevalidate => self.must_revalidate = true,
            Directive::NoCache => self.no_cache = true,
            Directive::NoStore => self.no_store = true,
            Directive::NoTransform => self.no_transform = true,
            Directive::OnlyIfCached => self.only_if_cached = true,
            Directive::ProxyRevalidate => self.proxy_revalidate = true,
            // private is terminal and mutually exclusive with public.
            Directive::Private => {
                self.private = true;
                self.public = false;
            }
            Directive::Public => {
                if !self.private {
                    self.public = true;
                }
            }
        }
        self
    }

    /// Merges every recognized directive from a raw cache-control string.
    /// Malformed tokens are skipped.
    pub fn merge_directives(&mut self, raw: &str) -> &mut Self {
        for token in raw.split(',') {
            if let Some(directive) = Directive::parse(token) {
                self.apply(directive);
            }
        }
        self
    }

    /// Merges tag and cache-control header values observed on a downstream
    /// response.
    pub fn merge_from_response(
        &mut self,
        tags_header: Option<&str>,
        cache_control_header: Option<&str>,
    ) -> &mut Self {
        if let Some(raw) = tags_header {
            let tags = raw
                .split([' ', ','])
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_owned);
            self.tags.extend(tags);
        }
        if let Some(raw) = cache_control_header {
            self.merge_directives(raw);
        }
        self
    }

    /// Appends tags in insertion order; deduplication happens at render time.
    pub fn add_tags<I, S>(&mut self, tags: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn max_age(&self) -> Option<i64> {
        self.max_age
    }

    pub fn shared_max_age(&self) -> Option<i64> {
        self.shared_max_age
    }

    pub fn is_private(&self) -> bool {
        self.private
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Renders the accumulated state into header values. Either value is
    /// `None` when there is nothing to emit.
    pub fn render(&self) -> CdnHeaders {
        let mut seen = HashSet::new();
        let tags: Vec<&str> = self
            .tags
            .iter()
            .map(String::as_str)
            .filter(|tag| seen.insert(*tag))
            .collect();

        let mut parts: Vec<String> = Vec::new();
        if self.private {
            parts.push("private".to_owned());
        } else if self.public {
            parts.push("public".to_owned());
        }

        let numeric = [
            ("max-age", self.max_age),
            ("s-maxage", self.shared_max_age),
            ("stale-while-revalidate", self.stale_while_revalidate),
            ("stale-if-error", self.stale_if_error),
            ("min-fresh", self.min_fresh),
            ("max-stale", self.max_stale),
        ];
        for (name, value) in numeric {
            if let Some(value) = value {
                parts.push(format!("{name}={value}"));
            }
        }

        let booleans = [
            ("immutable", self.immutable),
            ("must-revalidate", self.must_revalidate),
            ("no-cache", self.no_cache),
            ("no-store", self.no_store),
            ("no-transform", self.no_transform),
            ("only-if-cached", self.only_if_cached),
            ("proxy-revalidate", self.proxy_revalidate),
        ];
        for (name, set) in booleans {
            if set {
                parts.push(name.to_owned());
            }
        }

        CdnHeaders {
            cache_tags: (!tags.is_empty()).then(|| tags.join(" ")),
            cache_control: (!parts.is_empty()).then(|| parts.join(", ")),
        }
    }
}

/// Rendered header values for the CDN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdnHeaders {
    /// Value for [`CACHE_TAG_HEADER`], space-joined and deduplicated.
    pub cache_tags: Option<String>,
    /// Value for [`CACHE_CONTROL_HEADER`].
    pub cache_control: Option<String>,
}

impl fmt::Display for CdnHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(cache_control) = &self.cache_control {
            writeln!(f, "{CACHE_CONTROL_HEADER}: {cache_control}")?;
        }
        if let Some(tags) = &self.cache_tags {
            writeln!(f, "{CACHE_TAG_HEADER}: {tags}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_directives_keep_the_tightest_value() {
        let mut cdn = CdnCacheControl::new();
        cdn.apply(Directive::MaxAge(600)).apply(Directive::MaxAge(60));
        assert_eq!(cdn.max_age(), Some(60));

        cdn.apply(Directive::MaxAge(3_600));
        assert_eq!(cdn.max_age(), Some(60));
    }

    #[test]
    fn boolean_directives_never_reset() {
        let mut cdn = CdnCacheControl::new();
        cdn.merge_directives("no-cache");
        cdn.merge_directives("max-age=60");

        let headers = cdn.render();
        assert_eq!(headers.cache_control.as_deref(), Some("max-age=60, no-cache"));
    }

    #[test]
    fn private_is_terminal() {
        let mut cdn = CdnCacheControl::new();
        cdn.apply(Directive::Private).apply(Directive::Public);
        assert!(cdn.is_private());
        assert_eq!(cdn.render().cache_control.as_deref(), Some("private"));
    }

    #[test]
    fn private_overrides_earlier_public() {
        let mut cdn = CdnCacheControl::new();
        cdn.apply(Directive::Public).apply(Directive::Private);
        assert_eq!(cdn.render().cache_control.as_deref(), Some("private"));
    }

    #[test]
    fn merge_directives_parses_numeric_and_boolean_fields() {
        let mut cdn = CdnCacheControl::new();
        cdn.merge_directives("public, max-age=300, s-maxage=60, must-revalidate");

        assert_eq!(cdn.max_age(), Some(300));
        assert_eq!(cdn.shared_max_age(), Some(60));
        assert_eq!(
            cdn.render().cache_control.as_deref(),
            Some("public, max-age=300, s-maxage=60, must-revalidate")
        );
    }

    #[test]
    fn malformed_tokens_are_skipped_field_by_field() {
        let mut cdn = CdnCacheControl::new();
        cdn.merge_directives("max-age=abc, bogus-directive, s-maxage=120, =, max-age");
        assert_eq!(cdn.max_age(), None);
        assert_eq!(cdn.shared_max_age(), Some(120));
    }

    #[test]
    fn merge_from_response_takes_tags_and_directives() {
        let mut cdn = CdnCacheControl::new();
        cdn.add_tags(["local"]);
        cdn.merge_from_response(Some("upstream:1, upstream:2"), Some("private, max-age=30"));

        assert!(cdn.is_private());
        assert_eq!(cdn.max_age(), Some(30));
        assert_eq!(
            cdn.render().cache_tags.as_deref(),
            Some("local upstream:1 upstream:2")
        );
    }

    #[test]
    fn render_dedups_tags_preserving_first_occurrence() {
        let mut cdn = CdnCacheControl::new();
        cdn.add_tags(["b", "a", "b", "c", "a"]);
        assert_eq!(cdn.render().cache_tags.as_deref(), Some("b a c"));
    }

    #[test]
    fn empty_state_renders_nothing() {
        let headers = CdnCacheControl::new().render();
        assert_eq!(headers.cache_tags, None);
        assert_eq!(headers.cache_control, None);
    }
}
