//! Web search and page retrieval.
//!
//! [`SearchProvider`] and [`PageFetcher`] are the two external seams; the
//! [`SourceResolver`] combines them (through the cache) into a single
//! topic -> [`Source`] lookup.

pub mod fetch;
pub mod resolver;
pub mod search;

pub use fetch::{FetchFuture, HttpFetcher, Page, PageFetcher, extract_page};
pub use resolver::{Source, SourceResolver};
pub use search::{DuckDuckGo, SearchFuture, SearchHit, SearchProvider};
