//! Run configuration with sensible defaults.
//!
//! [`SearchConfig`] captures everything a run needs to know up front: which
//! [`ModelProfile`] is active, where the endpoint lives, where cached calls
//! are stored, and how aggressively the reducer may summarize. The binary
//! builds one from CLI flags; library callers start from `Default`.

use std::path::PathBuf;

use crate::context::ReducerConfig;
use crate::{OPENAI_URL, Result, SearchError};

/// A supported model and its context-token ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelProfile {
    /// Model name sent to the API.
    pub name: &'static str,
    /// Maximum context size in tokens.
    pub context_tokens: usize,
}

impl ModelProfile {
    /// Higher-capacity, higher-cost model.
    pub const GPT_4: ModelProfile = ModelProfile {
        name: "gpt-4",
        context_tokens: 8192,
    };

    /// Lower-capacity, lower-cost default.
    pub const GPT_35_TURBO: ModelProfile = ModelProfile {
        name: "gpt-3.5-turbo",
        context_tokens: 4097,
    };

    /// Every profile the tool knows about.
    pub const ALL: [ModelProfile; 2] = [Self::GPT_4, Self::GPT_35_TURBO];

    /// Look up a profile by model name.
    pub fn lookup(name: &str) -> Result<ModelProfile> {
        Self::ALL
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| SearchError::UnknownModel(name.to_string()))
    }
}

impl Default for ModelProfile {
    fn default() -> Self {
        Self::GPT_35_TURBO
    }
}

/// Where memoized calls are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheMode {
    /// Durable JSON entries under a directory; survives restarts.
    Disk(PathBuf),
    /// In-process only; dropped when the run ends.
    Memory,
}

impl Default for CacheMode {
    fn default() -> Self {
        CacheMode::Disk(PathBuf::from(".cache"))
    }
}

/// Configuration for a question-answering run.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Active model. Default: `gpt-3.5-turbo`.
    pub profile: ModelProfile,
    /// Chat completions endpoint. Default: OpenAI.
    pub api_url: String,
    /// Cache location. Default: `.cache/` in the working directory.
    pub cache: CacheMode,
    /// Number of search topics requested from the model. Default: `3`.
    pub topic_count: usize,
    /// Search results considered per topic. Default: `10`.
    pub max_search_results: usize,
    /// Reduction limits.
    pub reducer: ReducerConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            profile: ModelProfile::default(),
            api_url: OPENAI_URL.to_string(),
            cache: CacheMode::default(),
            topic_count: 3,
            max_search_results: 10,
            reducer: ReducerConfig::default(),
        }
    }
}

impl SearchConfig {
    pub fn with_profile(mut self, profile: ModelProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_cache(mut self, cache: CacheMode) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_max_search_results(mut self, max: usize) -> Self {
        self.max_search_results = max;
        self
    }

    pub fn with_reducer(mut self, reducer: ReducerConfig) -> Self {
        self.reducer = reducer;
        self
    }
}
