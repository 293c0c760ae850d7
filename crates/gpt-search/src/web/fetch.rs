//! Page download and plain-text extraction.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use scraper::{Html, Node, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::search::BROWSER_USER_AGENT;
use crate::{Result, SearchError};

/// Elements whose text is never shown to a reader.
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Extracted page content.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Page {
    /// Contents of `<title>`, if present and non-blank.
    pub title: Option<String>,
    /// Visible text nodes, trimmed and joined by single spaces.
    pub text: String,
}

/// Boxed future returned by [`PageFetcher::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Page>> + Send + 'a>>;

/// URL -> extracted page.
pub trait PageFetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> FetchFuture<'a>;
}

/// Fetches pages over HTTP(S), following redirects.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SearchError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<Page> {
        let fetch_err = |reason: String| SearchError::Fetch {
            url: url.to_string(),
            reason,
        };

        let resp = self
            .client
            .get(url)
            .header("Accept", "text/html,text/plain;q=0.9,*/*;q=0.5")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    fetch_err("request timed out".into())
                } else {
                    fetch_err(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SearchError::FetchStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| fetch_err(format!("failed to read body: {e}")))?;
        let page = extract_page(&body);
        debug!(
            "fetched {url}: {} bytes of html, {} bytes of text",
            body.len(),
            page.text.len()
        );
        Ok(page)
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> FetchFuture<'a> {
        Box::pin(self.get(url))
    }
}

/// Pull the title and visible text out of an HTML document.
///
/// Plain-text bodies parse as a document with a single text node, so they
/// come through unchanged apart from whitespace trimming.
pub fn extract_page(html: &str) -> Page {
    let document = Html::parse_document(html);

    let title = Selector::parse("title")
        .ok()
        .and_then(|sel| {
            document
                .select(&sel)
                .next()
                .map(|t| t.text().collect::<String>().trim().to_string())
        })
        .filter(|t| !t.is_empty());

    let text = document
        .root_element()
        .descendants()
        .filter_map(|node| match node.value() {
            Node::Text(text) => Some((node, text)),
            _ => None,
        })
        .filter(|(node, _)| {
            !node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|el| HIDDEN_TAGS.contains(&el.name()))
            })
        })
        .map(|(_, text)| text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    Page { title, text }
}
