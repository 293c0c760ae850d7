//! Convenience re-exports for common `gpt-search` types.
//!
//! ```ignore
//! use gpt_search::prelude::*;
//! ```
//!
//! Covers what a caller needs to run the pipeline with the stock
//! collaborators. Reducer internals and the raw chat types stay in their
//! modules.

// ── Model access ────────────────────────────────────────────────────
pub use crate::{ChatClient, LanguageModel, LlmFuture, Result, SearchError};

// ── Configuration ───────────────────────────────────────────────────
pub use crate::config::{CacheMode, ModelProfile, SearchConfig};

// ── Cache ───────────────────────────────────────────────────────────
pub use crate::cache::{CallStore, DiskStore, MemoryStore};

// ── Web ─────────────────────────────────────────────────────────────
pub use crate::web::{DuckDuckGo, HttpFetcher, PageFetcher, SearchProvider};

// ── Pipeline ────────────────────────────────────────────────────────
pub use crate::pipeline::{Pipeline, Report};
