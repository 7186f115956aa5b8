use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::{decode_rows, CandidateQuery, LeadStore, StoreError};
use crate::models::{LeadRow, LeadSubmission, ProcessingStatus};

const COLUMNS: &str = "id::text AS id, full_name, email, phone, business_name, website, \
                       message, created_at, processing_status";

/// Direct Postgres access to the lead table.
pub struct PgStore {
    pool: PgPool,
    table: String,
}

impl PgStore {
    /// `table` must already be a validated identifier; it is interpolated
    /// into every statement.
    pub fn new(pool: PgPool, table: &str) -> Self {
        Self {
            pool,
            table: table.to_string(),
        }
    }

    pub async fn connect(database_url: &str, table: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool, table))
    }
}

fn retryable() -> Vec<String> {
    ProcessingStatus::RETRYABLE
        .iter()
        .map(|s| s.as_str().to_string())
        .collect()
}

#[async_trait]
impl LeadStore for PgStore {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn fetch_candidates(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<LeadSubmission>, StoreError> {
        let limit = i64::try_from(query.limit)
            .map_err(|_| StoreError::Decode(format!("limit {} is out of range", query.limit)))?;

        let rows = sqlx::query_as::<_, LeadRow>(&format!(
            "SELECT {COLUMNS} FROM {table}
             WHERE processing_status = ANY($1)
               AND created_at >= $2
             ORDER BY created_at ASC
             LIMIT $3",
            table = self.table
        ))
        .bind(retryable())
        .bind(query.cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        decode_rows(rows)
    }

    /// Single-statement compare-and-swap; Postgres row locking makes it atomic
    /// against concurrent sweeps.
    async fn claim(&self, id: &str) -> Result<Option<LeadSubmission>, StoreError> {
        let row = sqlx::query_as::<_, LeadRow>(&format!(
            "UPDATE {table} SET processing_status = $3
             WHERE id::text = $1 AND processing_status = ANY($2)
             RETURNING {COLUMNS}",
            table = self.table
        ))
        .bind(id)
        .bind(retryable())
        .bind(ProcessingStatus::Processing.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => LeadSubmission::try_from(row)
                .map(Some)
                .map_err(StoreError::Decode),
            None => Ok(None),
        }
    }

    async fn mark_failed(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "UPDATE {table} SET processing_status = $2 WHERE id::text = $1",
            table = self.table
        ))
        .bind(id)
        .bind(ProcessingStatus::Failed.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
