//! End-to-end question answering.
//!
//! A run makes three kinds of language-model request, in order:
//!
//! 1. a topic request asking for search queries as a JSON list,
//! 2. zero or more summarization requests issued by the reducer,
//! 3. the final question, prefixed by the reduced background.
//!
//! Topic resolution happens between 1 and 2 and runs concurrently across
//! topics; everything else is sequential.

pub mod report;
pub mod session;

use chrono::{Local, NaiveDate};
use futures::future::join_all;
use tracing::{debug, info};

use crate::cache::CallStore;
use crate::config::SearchConfig;
use crate::context::{Background, ContextReducer, estimator_for};
use crate::web::{PageFetcher, SearchProvider, SourceResolver};
use crate::{LanguageModel, Result, SearchError};

pub use report::{Citation, Report, format_citations};
pub use session::{RunState, Session};

/// `Today is Thursday, November 09, 1989.`
pub fn today_line(date: NaiveDate) -> String {
    format!("Today is {}.", date.format("%A, %B %d, %Y"))
}

/// Prompt asking the model which topics to search for.
pub fn topic_prompt(today: &str, question: &str, count: usize) -> String {
    format!(
        "{today}\n\nI want to know: {question}\n\n\
         What {count} search topics would help you answer this question? \
         Answer in a JSON list only."
    )
}

/// Prompt for the final answer.
pub fn answer_prompt(background: &Background, today: &str, question: &str) -> String {
    format!("{}\n\n{today}\n\n{question}", background.render())
}

/// Parse the topic reply as a JSON list of strings.
///
/// No repair is attempted: prose, code fences or a non-string element are all
/// errors.
pub fn parse_topics(response: &str) -> Result<Vec<String>> {
    serde_json::from_str(response).map_err(|e| SearchError::TopicParse {
        response: response.to_string(),
        reason: e.to_string(),
    })
}

/// Wires the collaborators together for one question at a time.
pub struct Pipeline<'a> {
    model: &'a dyn LanguageModel,
    search: &'a dyn SearchProvider,
    fetcher: &'a dyn PageFetcher,
    store: &'a dyn CallStore,
    config: &'a SearchConfig,
    today: Option<NaiveDate>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        model: &'a dyn LanguageModel,
        search: &'a dyn SearchProvider,
        fetcher: &'a dyn PageFetcher,
        store: &'a dyn CallStore,
        config: &'a SearchConfig,
    ) -> Self {
        Self {
            model,
            search,
            fetcher,
            store,
            config,
            today: None,
        }
    }

    /// Pin the date used in prompts. Defaults to the local date at run time.
    pub fn with_today(mut self, date: NaiveDate) -> Self {
        self.today = Some(date);
        self
    }

    /// Answer `question`.
    pub async fn run(&self, question: &str) -> Result<Report> {
        let profile = self.config.profile;
        let today = today_line(self.today.unwrap_or_else(|| Local::now().date_naive()));
        let mut session = Session::new(self.model, self.store, profile);

        // Topics.
        let reply = session
            .ask(&topic_prompt(&today, question, self.config.topic_count))
            .await?;
        let topics = parse_topics(&reply)?;
        info!("Topics: {topics:?}");

        // Sources, one per topic, in topic order.
        let resolver = SourceResolver::new(
            self.search,
            self.fetcher,
            self.store,
            self.config.max_search_results,
        );
        let resolved = join_all(topics.iter().map(|t| resolver.resolve(t))).await;

        let mut background = Background::new();
        let mut sources = Vec::with_capacity(topics.len());
        for (topic, source) in topics.iter().zip(resolved) {
            sources.push(source.as_ref().map(Citation::from));
            background.push(topic.as_str(), source.map(|s| s.text));
        }
        if background.entries().iter().all(|e| !e.has_text()) {
            info!("No topic produced any content; answering without background");
        }

        // Reduction.
        let estimator = estimator_for(&profile);
        let reducer = ContextReducer::new(estimator.as_ref(), profile.context_tokens)
            .with_config(self.config.reducer.clone());
        let reduction = reducer.reduce(&mut background, &mut session).await?;
        info!("fetched: {:?}", reduction.fetched);
        info!("shortened: {:?}", reduction.truncated);
        info!("summarized: {:?}", reduction.summarized);
        debug!(
            "background ~{} tokens of {} after {} summaries",
            reduction.final_tokens, profile.context_tokens, reduction.summaries
        );

        // Answer.
        let answer = session
            .ask(&answer_prompt(&background, &today, question))
            .await?;

        let state = session.into_state();
        info!(
            "Cache: {} completion hit(s), {} web hit(s); {} model call(s)",
            state.cache_hits,
            resolver.cache_hits(),
            state.llm_calls
        );

        Ok(Report {
            answer,
            model: profile.name.to_string(),
            llm_calls: state.llm_calls,
            sources,
        })
    }
}
