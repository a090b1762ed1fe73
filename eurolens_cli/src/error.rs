use eurolens::error::EurolensError;
use polars::error::PolarsError;

#[derive(thiserror::Error, Debug)]
pub enum EurolensCliError {
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("serde JSON error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("eurolens error: {0}")]
    EurolensError(#[from] EurolensError),
    #[error("std IO error: {0}")]
    IOError(#[from] std::io::Error),
}

pub type EurolensCliResult<T> = Result<T, EurolensCliError>;
