//! Resolution of request URLs against an optional base.

use reqwest::Url;
use tracing::warn;

use crate::domain::errors::{CacheError, CacheResult};

/// Turns caller-supplied URLs into the absolute form used as cache identity.
#[derive(Debug, Clone, Default)]
pub struct UrlResolver {
    base: Option<Url>,
}

impl UrlResolver {
    /// Creates a resolver that passes URLs through untouched.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver with the given base, ignoring it if unparsable.
    #[must_use]
    pub fn with_base(base: Option<&str>) -> Self {
        let mut resolver = Self::new();
        resolver.set_base_url(base);
        resolver
    }

    /// Replaces the base URL.
    ///
    /// `None` removes it. A malformed base is logged and also removes it.
    pub fn set_base_url(&mut self, base: Option<&str>) {
        self.base = base.and_then(|raw| match Url::parse(raw) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(base = %raw, error = %e, "Bad base url");
                None
            }
        });
    }

    /// Resolves `url` against the base.
    ///
    /// Without a base the input is returned unchanged.
    ///
    /// # Errors
    /// Returns `InvalidUrl` if `url` cannot be joined onto the base.
    pub fn resolve(&self, url: &str) -> CacheResult<String> {
        match &self.base {
            None => Ok(url.to_string()),
            Some(base) => base
                .join(url)
                .map(String::from)
                .map_err(|e| CacheError::InvalidUrl(format!("{url}: {e}"))),
        }
    }
}
