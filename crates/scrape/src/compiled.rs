// ABOUTME: Process-wide cache of compiled CSS selectors shared by every extractor.
// ABOUTME: Compiles each selector string once; invalid selectors are cached as None.

//! Selector caching for repeated DOM queries.
//!
//! Parsing a CSS selector costs more than matching it against a small
//! listing page, and every run of a source reuses the same handful of
//! selector strings. The cache compiles each string once and hands out
//! clones of the compiled [`Selector`].

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use once_cell::sync::Lazy;
use scraper::Selector;

static SELECTOR_CACHE: Lazy<RwLock<HashMap<String, Option<Selector>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Gets or compiles a CSS selector, caching the result.
///
/// Returns `None` if the selector does not parse. Subsequent calls with the
/// same string return the cached result.
pub fn get_or_compile(css: &str) -> Option<Selector> {
    {
        let cache = SELECTOR_CACHE.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = cache.get(css) {
            return cached.clone();
        }
    }

    let compiled = Selector::parse(css).ok();
    let mut cache = SELECTOR_CACHE.write().unwrap_or_else(PoisonError::into_inner);
    // Another thread may have inserted while we compiled
    if let Some(cached) = cache.get(css) {
        return cached.clone();
    }
    cache.insert(css.to_string(), compiled.clone());
    compiled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_selector_is_cached() {
        assert!(get_or_compile("div.toc > a.paper").is_some());
        // Second call is served from the cache
        assert!(get_or_compile("div.toc > a.paper").is_some());
    }

    #[test]
    fn invalid_selector_returns_none() {
        assert!(get_or_compile("a[[").is_none());
        assert!(get_or_compile("a[[").is_none());
    }
}
