//! Per-topic summarization requests.
//!
//! The reducer never talks to a model directly. It hands a topic and its
//! current text to a [`Summarizer`], which is implemented by the run's
//! [`Session`](crate::pipeline::Session) (memoized, counted model calls) and
//! by scripted fakes in tests.

use crate::LlmFuture;

/// Build the prompt asking the model to compress one topic's text.
pub fn summarization_prompt(topic: &str, text: &str) -> String {
    format!("Concisely summarize the facts about {topic}:\n{text}")
}

/// Something that can shorten a topic's text.
pub trait Summarizer: Send {
    fn summarize<'a>(&'a mut self, topic: &'a str, text: &'a str) -> LlmFuture<'a>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_topic_then_text() {
        let prompt = summarization_prompt("Cold War timeline", "1947: ...\n1989: ...");
        assert_eq!(
            prompt,
            "Concisely summarize the facts about Cold War timeline:\n1947: ...\n1989: ..."
        );
    }

    #[test]
    fn prompt_preserves_full_text() {
        let long = "x".repeat(5000);
        let prompt = summarization_prompt("t", &long);
        assert!(prompt.ends_with(&long));
    }
}
