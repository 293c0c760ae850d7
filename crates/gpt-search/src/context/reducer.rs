//! Fit a [`Background`] under a token ceiling.
//!
//! Reduction runs in a fixed order:
//!
//! 1. **Truncation** - any single topic whose text alone is over the ceiling
//!    is cut to 90% of its length, repeatedly, keeping the prefix. Length
//!    strictly shrinks each pass, so this always terminates.
//! 2. **Summarization** - while the rendered background is over the ceiling,
//!    the next topic with text (in background order, wrapping around) is
//!    replaced by a model summary of itself.
//! 3. **Fallback truncation** - if summarization stops before the background
//!    fits (call cap reached, or every topic stalled), the largest block is
//!    cut 10% at a time until it does.
//!
//! A summary that is not smaller than its input is discarded, and a summary
//! that shrinks its block by less than
//! [`min_reduction_fraction`](ReducerConfig::min_reduction_fraction) marks
//! the topic as stalled so it is not summarized again.

use tracing::{debug, info, warn};

use super::background::Background;
use super::budget::TokenEstimator;
use super::summarizer::Summarizer;
use crate::{Result, SearchError};

/// Per-topic text sizes in bytes.
pub type TopicSizes = Vec<(String, usize)>;

/// Limits for the reducer.
#[derive(Debug, Clone)]
pub struct ReducerConfig {
    /// Fraction of the text kept by each truncation pass. Default: `0.9`.
    pub truncate_ratio: f64,
    /// Maximum summarization calls per reduction. Default: `6`.
    pub max_summaries: u32,
    /// Minimum fractional token reduction for a summary to count as
    /// progress. Default: `0.10`.
    pub min_reduction_fraction: f64,
}

impl Default for ReducerConfig {
    fn default() -> Self {
        Self {
            truncate_ratio: 0.9,
            max_summaries: 6,
            min_reduction_fraction: 0.10,
        }
    }
}

/// What a reduction did, for progress output.
#[derive(Debug, Clone, Default)]
pub struct ReductionReport {
    /// Sizes before any reduction.
    pub fetched: TopicSizes,
    /// Sizes after per-topic truncation.
    pub truncated: TopicSizes,
    /// Sizes after summarization and fallback truncation.
    pub summarized: TopicSizes,
    /// Truncation passes applied in phase 1.
    pub truncation_cuts: usize,
    /// Summarization calls made.
    pub summaries: u32,
    /// Truncation passes applied after summarization gave up.
    pub fallback_cuts: usize,
    /// Estimated tokens of the final rendered background.
    pub final_tokens: usize,
}

/// Cut `text` to `ratio` of its length until its estimate is at most
/// `ceiling`. The retained text is always a prefix of the original.
///
/// Returns the number of cuts made.
pub fn truncate_to_fit(
    text: &mut String,
    ceiling: usize,
    estimator: &dyn TokenEstimator,
    ratio: f64,
) -> usize {
    let mut cuts = 0;
    while estimator.estimate(text) > ceiling {
        cut_once(text, ratio);
        cuts += 1;
    }
    cuts
}

/// Shrink `text` to `ratio` of its byte length, rounded down to a char
/// boundary. Always removes at least one character from non-empty text.
fn cut_once(text: &mut String, ratio: f64) {
    let ratio = ratio.clamp(0.0, 0.99);
    let target = (text.len() as f64 * ratio) as usize;
    let cut = text.floor_char_boundary(target.min(text.len().saturating_sub(1)));
    text.truncate(cut);
}

/// Reduces a [`Background`] until it fits the ceiling.
pub struct ContextReducer<'a> {
    estimator: &'a dyn TokenEstimator,
    ceiling: usize,
    config: ReducerConfig,
}

impl<'a> ContextReducer<'a> {
    pub fn new(estimator: &'a dyn TokenEstimator, ceiling: usize) -> Self {
        Self {
            estimator,
            ceiling,
            config: ReducerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ReducerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Estimated tokens of the rendered background.
    pub fn combined_tokens(&self, background: &Background) -> usize {
        self.estimator.estimate(&background.render())
    }

    /// Whether the rendered background is within the ceiling.
    pub fn fits(&self, background: &Background) -> bool {
        self.combined_tokens(background) <= self.ceiling
    }

    /// Run all phases and return what happened.
    ///
    /// On success the rendered background is guaranteed to be within the
    /// ceiling. Fails with [`SearchError::BudgetUnreachable`] when the topic
    /// labels alone exceed it, and with whatever the summarizer returns if a
    /// model call fails.
    pub async fn reduce(
        &self,
        background: &mut Background,
        summarizer: &mut dyn Summarizer,
    ) -> Result<ReductionReport> {
        let mut report = ReductionReport {
            fetched: background.sizes(),
            ..Default::default()
        };

        report.truncation_cuts = self.truncate(background);
        report.truncated = background.sizes();

        report.summaries = self.summarize(background, summarizer).await?;
        report.fallback_cuts = self.enforce(background)?;
        report.summarized = background.sizes();
        report.final_tokens = self.combined_tokens(background);

        debug!(
            "reduced background to ~{} tokens (ceiling {})",
            report.final_tokens, self.ceiling
        );
        Ok(report)
    }

    /// Phase 1: truncate every block that alone exceeds the ceiling.
    pub fn truncate(&self, background: &mut Background) -> usize {
        let mut total = 0;
        for entry in background.entries_mut() {
            if !entry.has_text() {
                continue;
            }
            let Some(text) = entry.text.as_mut() else {
                continue;
            };
            let before = text.len();
            let cuts = truncate_to_fit(
                text,
                self.ceiling,
                self.estimator,
                self.config.truncate_ratio,
            );
            if cuts > 0 {
                info!(
                    "Truncated '{}' from {before} to {} bytes in {cuts} cut(s)",
                    entry.topic,
                    text.len()
                );
            }
            total += cuts;
        }
        total
    }

    /// Phase 2: summarize blocks round-robin until the whole background fits,
    /// the call cap is reached, or no block can make progress.
    ///
    /// Returns the number of summarization calls made.
    pub async fn summarize(
        &self,
        background: &mut Background,
        summarizer: &mut dyn Summarizer,
    ) -> Result<u32> {
        let n = background.len();
        let mut stalled = vec![false; n];
        let mut cursor = 0;
        let mut calls = 0;

        while !self.fits(background) {
            if calls >= self.config.max_summaries {
                warn!(
                    "Background still over budget after {calls} summaries; falling back to truncation"
                );
                break;
            }

            let next = (0..n)
                .map(|offset| (cursor + offset) % n)
                .find(|&i| background.entries()[i].has_text() && !stalled[i]);
            let Some(idx) = next else {
                warn!("No topic can be summarized further; falling back to truncation");
                break;
            };
            cursor = idx + 1;

            let entry = &background.entries()[idx];
            let topic = entry.topic.clone();
            let text = entry.text.clone().unwrap_or_default();
            let before = self.estimator.estimate(&text);

            info!("Summarizing '{topic}' (~{before} tokens)");
            let summary = summarizer.summarize(&topic, &text).await?;
            calls += 1;

            let after = self.estimator.estimate(&summary);
            if after >= before {
                warn!("Summary of '{topic}' did not shrink ({before} -> {after} tokens); keeping original");
                stalled[idx] = true;
                continue;
            }
            if (after as f64) > before as f64 * (1.0 - self.config.min_reduction_fraction) {
                debug!("Summary of '{topic}' barely shrank; not summarizing it again");
                stalled[idx] = true;
            }
            background.entries_mut()[idx].text = Some(summary);
        }

        Ok(calls)
    }

    /// Phase 3: cut the largest block until the background fits.
    ///
    /// Returns the number of cuts made.
    pub fn enforce(&self, background: &mut Background) -> Result<usize> {
        let mut cuts = 0;
        while !self.fits(background) {
            let largest = background
                .entries()
                .iter()
                .enumerate()
                .filter(|(_, e)| e.has_text())
                .max_by_key(|(_, e)| e.text_len())
                .map(|(i, _)| i);
            let Some(idx) = largest else {
                return Err(SearchError::BudgetUnreachable {
                    needed: self.combined_tokens(background),
                    ceiling: self.ceiling,
                });
            };
            if let Some(text) = background.entries_mut()[idx].text.as_mut() {
                cut_once(text, self.config.truncate_ratio);
            }
            cuts += 1;
        }
        if cuts > 0 {
            info!("Cut {cuts} time(s) after summarization to fit the ceiling");
        }
        Ok(cuts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LlmFuture;
    use crate::context::budget::CharEstimator;

    /// One token per byte, doubled: estimate == 2 * len.
    fn bytes() -> CharEstimator {
        CharEstimator::new(1.0)
    }

    /// Replaces text with its first `keep` bytes.
    struct Prefix {
        keep: usize,
        calls: Vec<String>,
    }

    impl Summarizer for Prefix {
        fn summarize<'a>(&'a mut self, topic: &'a str, text: &'a str) -> LlmFuture<'a> {
            self.calls.push(topic.to_string());
            let keep = self.keep.min(text.len());
            let out = text.get(..keep).unwrap_or_default().to_string();
            Box::pin(async move { Ok::<_, SearchError>(out) })
        }
    }

    /// Echoes its input with extra text appended.
    struct Expanding;

    impl Summarizer for Expanding {
        fn summarize<'a>(&'a mut self, _topic: &'a str, text: &'a str) -> LlmFuture<'a> {
            Box::pin(async move { Ok::<_, SearchError>(format!("{text} and more")) })
        }
    }

    struct Failing;

    impl Summarizer for Failing {
        fn summarize<'a>(&'a mut self, _topic: &'a str, _text: &'a str) -> LlmFuture<'a> {
            Box::pin(async move { Err(SearchError::Request("connection reset".into())) })
        }
    }

    fn background(texts: &[(&str, Option<&str>)]) -> Background {
        let mut bg = Background::new();
        for (topic, text) in texts {
            bg.push(*topic, text.map(str::to_string));
        }
        bg
    }

    #[test]
    fn truncation_keeps_a_prefix_and_converges() {
        let est = bytes();
        let original: String = (0..1000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let mut text = original.clone();

        let cuts = truncate_to_fit(&mut text, 100, &est, 0.9);

        assert!(est.estimate(&text) <= 100);
        assert!(original.starts_with(&text));
        // 1000 bytes must fall to 50; log(0.05)/log(0.9) is about 28.4.
        assert!((28..=30).contains(&cuts), "cuts = {cuts}");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let est = bytes();
        let mut text = "é".repeat(200);
        truncate_to_fit(&mut text, 50, &est, 0.9);
        assert!(est.estimate(&text) <= 50);
        assert!(text.chars().all(|c| c == 'é'));
    }

    #[test]
    fn short_text_is_untouched() {
        let est = bytes();
        let mut text = "short".to_string();
        assert_eq!(truncate_to_fit(&mut text, 100, &est, 0.9), 0);
        assert_eq!(text, "short");
    }

    #[test]
    fn cut_once_always_shrinks() {
        let mut text = "a".to_string();
        cut_once(&mut text, 0.9);
        assert!(text.is_empty());

        let mut text = "abcdefghij".to_string();
        cut_once(&mut text, 1.5);
        assert!(text.len() < 10);
    }

    #[test]
    fn phase_one_skips_empty_topics() {
        let est = bytes();
        let mut bg = background(&[("A", Some(&"x".repeat(500))), ("B", None), ("C", Some(""))]);
        let reducer = ContextReducer::new(&est, 200);

        reducer.truncate(&mut bg);

        assert!(bg.entries()[0].text_len() <= 100);
        assert_eq!(bg.entries()[1].text, None);
        assert_eq!(bg.entries()[2].text.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn already_fitting_background_is_a_no_op() {
        let est = bytes();
        let mut bg = background(&[("A", Some("one")), ("B", Some("two"))]);
        let before = bg.clone();
        let mut summarizer = Prefix {
            keep: 1,
            calls: vec![],
        };

        let report = ContextReducer::new(&est, 1000)
            .reduce(&mut bg, &mut summarizer)
            .await
            .unwrap();

        assert_eq!(bg, before);
        assert_eq!(report.summaries, 0);
        assert_eq!(report.truncation_cuts, 0);
        assert!(summarizer.calls.is_empty());
    }

    #[tokio::test]
    async fn summarizes_in_order_until_it_fits() {
        let est = bytes();
        // Each block is 60 bytes; rendered total is ~2 * (3 * 63 + 4) = 386 tokens.
        let text = "y".repeat(60);
        let mut bg = background(&[
            ("A", Some(text.as_str())),
            ("B", Some(text.as_str())),
            ("C", Some(text.as_str())),
        ]);
        let mut summarizer = Prefix {
            keep: 5,
            calls: vec![],
        };

        let report = ContextReducer::new(&est, 200)
            .reduce(&mut bg, &mut summarizer)
            .await
            .unwrap();

        assert_eq!(summarizer.calls, vec!["A", "B"]);
        assert_eq!(report.summaries, 2);
        assert_eq!(report.fallback_cuts, 0);
        assert_eq!(bg.get("A"), Some("yyyyy"));
        assert_eq!(bg.get("C").map(str::len), Some(60));
        assert!(report.final_tokens <= 200);
    }

    #[tokio::test]
    async fn unresolved_topics_are_never_summarized() {
        let est = bytes();
        let mut bg = background(&[("A", None), ("B", Some(&"z".repeat(150)))]);
        let mut summarizer = Prefix {
            keep: 10,
            calls: vec![],
        };

        ContextReducer::new(&est, 200)
            .reduce(&mut bg, &mut summarizer)
            .await
            .unwrap();

        assert_eq!(summarizer.calls, vec!["B"]);
        assert_eq!(bg.get("A"), None);
        assert!(bg.contains("A"));
    }

    #[tokio::test]
    async fn expanding_summaries_fall_back_to_truncation() {
        let est = bytes();
        let text = "w".repeat(90);
        let mut bg = background(&[("A", Some(text.as_str())), ("B", Some(text.as_str()))]);

        let reducer = ContextReducer::new(&est, 200);
        let report = reducer.reduce(&mut bg, &mut Expanding).await.unwrap();

        // Each topic is tried once, stalls, and is then cut instead.
        assert_eq!(report.summaries, 2);
        assert!(report.fallback_cuts > 0);
        assert!(reducer.fits(&bg));
        assert!(text.starts_with(bg.get("A").unwrap()));
    }

    #[tokio::test]
    async fn summary_cap_bounds_model_calls() {
        let est = bytes();
        let text = "v".repeat(95);
        let mut bg = background(&[("A", Some(text.as_str())), ("B", Some(text.as_str()))]);
        // Dropping one byte per call never gets under budget on its own.
        let mut summarizer = Prefix {
            keep: 94,
            calls: vec![],
        };
        let config = ReducerConfig {
            max_summaries: 3,
            min_reduction_fraction: 0.0,
            ..Default::default()
        };

        let reducer = ContextReducer::new(&est, 200).with_config(config);
        let report = reducer.reduce(&mut bg, &mut summarizer).await.unwrap();

        assert_eq!(report.summaries, 3);
        assert!(reducer.fits(&bg));
    }

    #[tokio::test]
    async fn labels_over_budget_is_an_error() {
        let est = bytes();
        let mut bg = background(&[("a very long topic label", Some("text"))]);
        let mut summarizer = Prefix {
            keep: 0,
            calls: vec![],
        };

        let err = ContextReducer::new(&est, 10)
            .reduce(&mut bg, &mut summarizer)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::BudgetUnreachable { ceiling: 10, .. }));
    }

    #[tokio::test]
    async fn summarizer_failure_propagates() {
        let est = bytes();
        let text = "q".repeat(90);
        let mut bg = background(&[("A", Some(text.as_str())), ("B", Some(text.as_str()))]);

        let err = ContextReducer::new(&est, 200)
            .reduce(&mut bg, &mut Failing)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Request(_)));
    }

    #[tokio::test]
    async fn report_tracks_sizes_per_phase() {
        let est = bytes();
        let mut bg = background(&[("A", Some(&"p".repeat(400))), ("B", Some(&"p".repeat(80)))]);
        let mut summarizer = Prefix {
            keep: 10,
            calls: vec![],
        };

        let report = ContextReducer::new(&est, 200)
            .reduce(&mut bg, &mut summarizer)
            .await
            .unwrap();

        assert_eq!(report.fetched, vec![("A".into(), 400), ("B".into(), 80)]);
        assert!(report.truncated[0].1 <= 100);
        assert_eq!(report.truncated[1].1, 80);
        assert_eq!(report.summarized[0].1, 10);
        assert!(report.truncation_cuts > 0);
    }
}
