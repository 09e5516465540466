//! Error types for the ingestion pipeline.
//!
//! Each stage owns its error enum. `is_transient()` decides whether the shared
//! [`RetryPolicy`](crate::retry::RetryPolicy) gets another attempt.

use thiserror::Error;

/// Failures while talking to the statistics provider.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode provider response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Network failures, 429 and 5xx are retried. Other statuses and bad
    /// bodies will come back the same way.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport(_) => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Decode(_) | FetchError::Cancelled => false,
        }
    }
}

/// Failures while streaming a flat file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("input has no header row")]
    MissingHeader,

    #[error("could not find {column} column (tried {aliases})")]
    MissingAnchor { column: &'static str, aliases: String },

    #[error("batch flush failed: {0}")]
    Flush(#[source] anyhow::Error),
}

/// Failures reported by a record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("row {key} rejected: {reason}")]
    Rejected { key: String, reason: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Connection level failures are worth another attempt, constraint and
    /// data errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            ),
            StoreError::Rejected { .. } => false,
            StoreError::Unavailable(_) => true,
        }
    }
}

/// A provider payload that cannot be turned into a record at all.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("unparseable game date '{0}'")]
    InvalidDate(String),
}
