//! The topic-to-text evidence map assembled before the final question.

use std::fmt;

/// One topic and whatever text was found for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundEntry {
    pub topic: String,
    /// `None` when no source could be resolved for the topic.
    pub text: Option<String>,
}

impl BackgroundEntry {
    /// Whether this entry carries text the reducer should work on.
    pub fn has_text(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Length of the text in bytes, zero when absent.
    pub fn text_len(&self) -> usize {
        self.text.as_deref().map_or(0, str::len)
    }
}

/// Ordered topic -> text mapping.
///
/// Entries keep topic-derivation order. Duplicate topics get separate
/// entries, so a repeated topic never overwrites an earlier one. Entries
/// without text stay in place and render as an empty block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Background {
    entries: Vec<BackgroundEntry>,
}

impl Background {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, topic: impl Into<String>, text: Option<String>) {
        self.entries.push(BackgroundEntry {
            topic: topic.into(),
            text,
        });
    }

    pub fn entries(&self) -> &[BackgroundEntry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [BackgroundEntry] {
        &mut self.entries
    }

    /// Text of the first entry for `topic`.
    pub fn get(&self, topic: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.topic == topic)
            .and_then(|e| e.text.as_deref())
    }

    /// Whether an entry exists for `topic`, with or without text.
    pub fn contains(&self, topic: &str) -> bool {
        self.entries.iter().any(|e| e.topic == topic)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Per-topic text sizes in bytes, for progress logs.
    pub fn sizes(&self) -> Vec<(String, usize)> {
        self.entries
            .iter()
            .map(|e| (e.topic.clone(), e.text_len()))
            .collect()
    }

    /// Serialize as the model sees it: `"{topic}:\n{text}"` blocks joined by
    /// a blank line.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{}:\n{}", e.topic, e.text.as_deref().unwrap_or("")))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl fmt::Display for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
