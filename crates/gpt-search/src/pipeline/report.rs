//! The printable result of a run.

use std::fmt;

use crate::web::Source;

/// Where one topic's background came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub origin: String,
    pub title: Option<String>,
}

impl From<&Source> for Citation {
    fn from(source: &Source) -> Self {
        Self {
            origin: source.origin.clone(),
            title: source.title.clone(),
        }
    }
}

/// Final answer plus run metadata.
///
/// Renders as:
///
/// ```text
/// {answer}
/// ({model}, {n} queries)
///
/// Sources:
/// * [{title}]({origin})
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub answer: String,
    pub model: String,
    /// Language-model calls that reached the model during the run.
    pub llm_calls: u32,
    /// One entry per topic, in topic order. `None` for unresolved topics.
    pub sources: Vec<Option<Citation>>,
}

impl Report {
    /// Resolved citations in topic order.
    pub fn citations(&self) -> impl Iterator<Item = &Citation> {
        self.sources.iter().flatten()
    }
}

/// Format citations as a markdown bullet list. A citation without a title
/// uses its origin as the link text.
pub fn format_citations<'a>(citations: impl IntoIterator<Item = &'a Citation>) -> String {
    citations
        .into_iter()
        .map(|c| {
            let title = c.title.as_deref().unwrap_or(&c.origin);
            format!("* [{title}]({})\n", c.origin)
        })
        .collect()
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.answer)?;
        writeln!(f, "({}, {} queries)", self.model, self.llm_calls)?;
        writeln!(f)?;
        writeln!(f, "Sources:")?;
        f.write_str(&format_citations(self.citations()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cite(origin: &str, title: Option<&str>) -> Option<Citation> {
        Some(Citation {
            origin: origin.into(),
            title: title.map(str::to_string),
        })
    }

    #[test]
    fn renders_answer_trailer_and_sources() {
        let report = Report {
            answer: "1989.".into(),
            model: "gpt-3.5-turbo".into(),
            llm_calls: 2,
            sources: vec![
                cite("https://a.example", Some("A")),
                cite("https://b.example", Some("B")),
            ],
        };
        assert_eq!(
            report.to_string(),
            "1989.\n(gpt-3.5-turbo, 2 queries)\n\nSources:\n\
             * [A](https://a.example)\n\
             * [B](https://b.example)\n"
        );
    }

    #[test]
    fn unresolved_topics_are_omitted() {
        let report = Report {
            answer: "x".into(),
            model: "gpt-4".into(),
            llm_calls: 1,
            sources: vec![cite("https://a", Some("A")), None, cite("https://c", Some("C"))],
        };
        let text = report.to_string();
        assert_eq!(text.matches("* [").count(), 2);
        assert_eq!(report.citations().count(), 2);
        assert_eq!(report.sources.len(), 3);
    }

    #[test]
    fn missing_title_falls_back_to_origin() {
        let rendered = format_citations(cite("https://plain.example", None).iter());
        assert_eq!(rendered, "* [https://plain.example](https://plain.example)\n");
    }

    #[test]
    fn no_sources_still_prints_the_heading() {
        let report = Report {
            answer: "unknown".into(),
            model: "gpt-4".into(),
            llm_calls: 2,
            sources: vec![None, None],
        };
        assert!(report.to_string().ends_with("Sources:\n"));
    }
}
