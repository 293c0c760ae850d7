//! Per-run model access: memoized completions and call accounting.

use tracing::{debug, trace};

use crate::cache::{CacheKey, CallStore, memoize};
use crate::config::ModelProfile;
use crate::context::{Summarizer, summarization_prompt};
use crate::{LanguageModel, LlmFuture, Result};

/// Counters for one run. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    pub profile: ModelProfile,
    /// Completions that reached the model. Cache hits are not counted.
    pub llm_calls: u32,
    /// Completions replayed from the cache.
    pub cache_hits: u32,
}

impl RunState {
    pub fn new(profile: ModelProfile) -> Self {
        Self {
            profile,
            llm_calls: 0,
            cache_hits: 0,
        }
    }
}

/// Sends prompts to the active model through the cache.
pub struct Session<'a> {
    model: &'a dyn LanguageModel,
    store: &'a dyn CallStore,
    state: RunState,
}

impl<'a> Session<'a> {
    pub fn new(model: &'a dyn LanguageModel, store: &'a dyn CallStore, profile: ModelProfile) -> Self {
        Self {
            model,
            store,
            state: RunState::new(profile),
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn into_state(self) -> RunState {
        self.state
    }

    /// Complete `prompt` with the session's model.
    ///
    /// Identical (model, prompt) pairs are answered from the cache. Failed
    /// completions are not cached and do not count as calls.
    pub async fn ask(&mut self, prompt: &str) -> Result<String> {
        let name = self.state.profile.name;
        let key = CacheKey::new("complete", &(name, prompt))?;
        trace!("prompt ({name}):\n{prompt}");

        let model = self.model;
        let cached = memoize(self.store, key, || model.complete(name, prompt)).await?;

        if cached.hit {
            self.state.cache_hits += 1;
            debug!("completion replayed from cache");
        } else {
            self.state.llm_calls += 1;
        }
        trace!("response ({name}):\n{}", cached.value);
        Ok(cached.value)
    }
}

impl Summarizer for Session<'_> {
    fn summarize<'b>(&'b mut self, topic: &'b str, text: &'b str) -> LlmFuture<'b> {
        Box::pin(async move { self.ask(&summarization_prompt(topic, text)).await })
    }
}
