/// Engine-level error type.
///
/// Input validation problems (`EmptyQuery`, `DimensionMismatch`,
/// `InvalidOption`) are surfaced to the caller as-is and never retried.
/// Storage errors are fatal for the current call. Embedding provider
/// failures do not appear here at all: search converts them into a
/// degraded response instead.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("operation cancelled")]
    Cancelled,

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
