//! Topic -> first usable web source.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::fetch::{Page, PageFetcher};
use super::search::{SearchHit, SearchProvider};
use crate::cache::{CacheKey, CallStore, memoize};

/// A resolved source: where the text came from, and the text itself.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub origin: String,
    pub title: Option<String>,
    pub text: String,
}

/// Resolves topics to sources through memoized search and fetch calls.
///
/// Safe to share across concurrent resolutions; the hit counter is atomic.
pub struct SourceResolver<'a> {
    search: &'a dyn SearchProvider,
    fetcher: &'a dyn PageFetcher,
    store: &'a dyn CallStore,
    max_results: usize,
    cache_hits: AtomicU32,
}

impl<'a> SourceResolver<'a> {
    pub fn new(
        search: &'a dyn SearchProvider,
        fetcher: &'a dyn PageFetcher,
        store: &'a dyn CallStore,
        max_results: usize,
    ) -> Self {
        Self {
            search,
            fetcher,
            store,
            max_results,
            cache_hits: AtomicU32::new(0),
        }
    }

    /// Search and fetch calls answered from the cache so far.
    pub fn cache_hits(&self) -> u32 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Return the first search result for `topic` whose page has non-blank
    /// text. Results after the first hit are never fetched.
    ///
    /// Search and fetch failures are logged and never propagate: a failed
    /// search resolves to `None`, a failed fetch skips that candidate.
    pub async fn resolve(&self, topic: &str) -> Option<Source> {
        info!("Searching for: {topic}");
        let hits = match self.search_hits(topic).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("{e}");
                return None;
            }
        };

        for hit in hits {
            info!("  Fetching {}", hit.url);
            let page = match self.fetch_page(&hit.url).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("Error fetching {}: {e}", hit.url);
                    continue;
                }
            };
            if !page.text.trim().is_empty() {
                return Some(Source {
                    origin: hit.url,
                    title: page.title,
                    text: page.text,
                });
            }
        }

        warn!("No content found for topic: {topic}");
        None
    }

    async fn search_hits(&self, topic: &str) -> crate::Result<Vec<SearchHit>> {
        let key = CacheKey::new("search", &(topic, self.max_results))?;
        let cached = memoize(self.store, key, || self.search.search(topic, self.max_results)).await?;
        self.note(cached.hit);
        Ok(cached.value)
    }

    async fn fetch_page(&self, url: &str) -> crate::Result<Page> {
        let key = CacheKey::new("fetch", &url)?;
        let cached = memoize(self.store, key, || self.fetcher.fetch(url)).await?;
        self.note(cached.hit);
        Ok(cached.value)
    }

    fn note(&self, hit: bool) {
        if hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        }
    }
}
