//! Web search providers.
//!
//! [`DuckDuckGo`] scrapes the HTML endpoint, which needs no API key. Result
//! links on that page point at a `duckduckgo.com/l/?uddg=...` redirect; the
//! real target is unwrapped before results are returned.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Result, SearchError};

/// Default DuckDuckGo HTML search endpoint.
pub const DUCKDUCKGO_URL: &str = "https://html.duckduckgo.com/html/";

/// Browser user agent; the HTML endpoint serves an empty page to unknown
/// clients.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// One search result.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

/// Boxed future returned by [`SearchProvider::search`].
pub type SearchFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<SearchHit>>> + Send + 'a>>;

/// Query -> ordered results.
pub trait SearchProvider: Send + Sync {
    /// Return at most `max_results` hits for `query`, best first.
    fn search<'a>(&'a self, query: &'a str, max_results: usize) -> SearchFuture<'a>;
}

/// Scraping client for DuckDuckGo's HTML interface.
pub struct DuckDuckGo {
    client: reqwest::Client,
    base_url: String,
}

impl DuckDuckGo {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DUCKDUCKGO_URL)
    }

    /// Point at a different endpoint (tests, mirrors).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SearchError::Client(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn fetch_results(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let url = format!("{}?q={}", self.base_url, urlencoding::encode(query));
        let search_err = |reason: String| SearchError::Search {
            query: query.to_string(),
            reason,
        };

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| search_err(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(search_err(format!("HTTP {status}")));
        }

        let html = resp
            .text()
            .await
            .map_err(|e| search_err(format!("failed to read response: {e}")))?;

        let hits = parse_html(&html, max_results)?;
        debug!("search '{query}': {} result(s)", hits.len());
        Ok(hits)
    }
}

impl SearchProvider for DuckDuckGo {
    fn search<'a>(&'a self, query: &'a str, max_results: usize) -> SearchFuture<'a> {
        Box::pin(self.fetch_results(query, max_results))
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| SearchError::Client(format!("invalid CSS selector {css}: {e:?}")))
}

/// Extract results from a DuckDuckGo HTML results page, in page order.
///
/// Entries without a link are skipped. A missing snippet is tolerated.
pub fn parse_html(html: &str, max_results: usize) -> Result<Vec<SearchHit>> {
    let document = Html::parse_document(html);
    let result_sel = selector(".result.web-result")?;
    let title_sel = selector(".result__a")?;
    let snippet_sel = selector(".result__snippet")?;

    let hits = document
        .select(&result_sel)
        .filter_map(|node| {
            let title = node.select(&title_sel).next()?;
            let href = title.value().attr("href")?;
            let snippet = node
                .select(&snippet_sel)
                .next()
                .map(|s| s.text().collect::<String>().trim().to_string())
                .unwrap_or_default();
            Some(SearchHit {
                url: clean_duckduckgo_url(href),
                title: title.text().collect::<String>().trim().to_string(),
                snippet,
            })
        })
        .take(max_results)
        .collect();
    Ok(hits)
}

/// Unwrap a `duckduckgo.com/l/?uddg=<target>` redirect link.
///
/// Links are often protocol-relative (`//duckduckgo.com/l/...`). Anything
/// that is not a redirect is returned unchanged.
pub fn clean_duckduckgo_url(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let Ok(parsed) = url::Url::parse(&absolute) else {
        return href.to_string();
    };
    let is_redirect = parsed
        .host_str()
        .is_some_and(|h| h.ends_with("duckduckgo.com"))
        && parsed.path() == "/l/";
    if is_redirect {
        if let Some((_, target)) = parsed.query_pairs().find(|(k, _)| k == "uddg") {
            return target.into_owned();
        }
    }
    href.to_string()
}
