//! Error type shared by every stage of the pipeline.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = SearchError> = std::result::Result<T, E>;

/// Everything that can go wrong while answering a question.
///
/// Search and fetch failures are usually swallowed by the
/// [`SourceResolver`](crate::web::SourceResolver) and only surface here when
/// a collaborator is called directly.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("{0} environment variable is not set")]
    MissingCredential(&'static str),

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    /// Transport-level failure talking to the language-model endpoint.
    #[error("request failed: {0}")]
    Request(String),

    /// Non-success status from the language-model endpoint.
    #[error("API HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// Error object inside an otherwise successful response body.
    #[error("API error: {0}")]
    ApiMessage(String),

    #[error("failed to parse API response: {0}")]
    Decode(String),

    #[error("empty completion from model {0}")]
    EmptyCompletion(String),

    /// The topic-derivation reply was not a JSON list of strings.
    #[error("topic list is not a JSON list of strings ({reason}): {response}")]
    TopicParse { response: String, reason: String },

    #[error("unknown model '{0}'")]
    UnknownModel(String),

    #[error("search for '{query}' failed: {reason}")]
    Search { query: String, reason: String },

    #[error("fetching {url} failed: {reason}")]
    Fetch { url: String, reason: String },

    #[error("HTTP {status} fetching {url}")]
    FetchStatus { url: String, status: u16 },

    #[error("cache: {0}")]
    Cache(String),

    /// Topic labels alone exceed the ceiling, so no amount of reduction fits.
    #[error("background labels need ~{needed} tokens, over the {ceiling}-token ceiling")]
    BudgetUnreachable { needed: usize, ceiling: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_status_names_the_url() {
        let err = SearchError::FetchStatus {
            url: "https://example.com".into(),
            status: 404,
        };
        assert_eq!(err.to_string(), "HTTP 404 fetching https://example.com");
    }

    #[test]
    fn budget_error_reports_both_sides() {
        let err = SearchError::BudgetUnreachable {
            needed: 120,
            ceiling: 100,
        };
        let msg = err.to_string();
        assert!(msg.contains("~120 tokens"));
        assert!(msg.contains("100-token ceiling"));
    }
}
