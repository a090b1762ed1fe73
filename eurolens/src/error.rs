//! Error types.

/// Fatal failure modes of a pipeline run. Data-quality conditions (duplicate keys, join
/// fan-out, unmatched rows) are logged warnings rather than variants here: the run continues
/// and the dedupe step restores key uniqueness.
#[derive(thiserror::Error, Debug)]
pub enum EurolensError {
    #[error("Failed to fetch source '{source_id}' from {url}: {reason}")]
    Fetch {
        source_id: String,
        url: String,
        reason: String,
    },
    #[error(
        "Source '{source_id}' is missing required column '{column}' (tried candidates {candidates:?})"
    )]
    SchemaMismatch {
        source_id: String,
        column: String,
        candidates: Vec<String>,
    },
    #[error("Expected alcohol frequency category '{category}' is absent from the filtered data")]
    MissingCategory { category: String },
    #[error("Malformed JSON-stat document: {0}")]
    MalformedJsonStat(String),
    #[error("Wrapped JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Wrapped polars error: {0}")]
    PolarsError(#[from] polars::error::PolarsError),
    #[error("Wrapped anyhow error: {0}")]
    AnyhowError(#[from] anyhow::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
