pub mod postgres;
pub mod rest;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{LeadRow, LeadSubmission};

pub use postgres::PgStore;
pub use rest::RestStore;

/// Filter for the initial candidate scan. Status is always the retryable set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateQuery {
    pub cutoff: DateTime<Utc>,
    pub limit: usize,
}

#[derive(Debug)]
pub enum StoreError {
    /// The store could not be reached or the exchange broke mid-way.
    Transport(String),
    /// The store answered with a non-success status.
    Status { status: u16, body: String },
    /// A row or response body did not have the expected shape.
    Decode(String),
    Database(sqlx::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Transport(msg) => write!(f, "store request failed: {msg}"),
            StoreError::Status { status, body } if body.is_empty() => {
                write!(f, "store returned HTTP {status}")
            }
            StoreError::Status { status, body } => {
                write!(f, "store returned HTTP {status}: {body}")
            }
            StoreError::Decode(msg) => write!(f, "unexpected store data: {msg}"),
            StoreError::Database(err) => write!(f, "database error: {err}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err)
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::Decode(err.to_string())
        } else {
            StoreError::Transport(err.to_string())
        }
    }
}

/// The remote table of lead submissions. Implementations hold no state
/// between calls; the `processing_status` column is the only coordination.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Backend label for logs.
    fn name(&self) -> &str;

    /// Retryable rows created at or after `cutoff`, oldest first.
    async fn fetch_candidates(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<LeadSubmission>, StoreError>;

    /// Move a row to `processing` if it is still `pending` or `failed`.
    /// `Ok(None)` means another writer got there first.
    async fn claim(&self, id: &str) -> Result<Option<LeadSubmission>, StoreError>;

    /// Set a row to `failed` regardless of its current status.
    async fn mark_failed(&self, id: &str) -> Result<(), StoreError>;
}

pub(crate) fn decode_rows(rows: Vec<LeadRow>) -> Result<Vec<LeadSubmission>, StoreError> {
    rows.into_iter()
        .map(|row| LeadSubmission::try_from(row).map_err(StoreError::Decode))
        .collect()
}
