//! Background assembly and context-window management.
//!
//! - [`budget`]: conservative token estimation.
//! - [`background`]: the ordered topic -> text map.
//! - [`summarizer`]: the summarization prompt and trait.
//! - [`reducer`]: truncation, summarization and fallback cuts.

pub mod background;
pub mod budget;
pub mod reducer;
pub mod summarizer;

pub use background::{Background, BackgroundEntry};
pub use budget::{BpeEstimator, CharEstimator, TokenEstimator, estimator_for};
pub use reducer::{ContextReducer, ReducerConfig, ReductionReport, TopicSizes, truncate_to_fit};
pub use summarizer::{Summarizer, summarization_prompt};
