use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::json;

use super::{decode_rows, CandidateQuery, LeadStore, StoreError};
use crate::models::{LeadRow, LeadSubmission, ProcessingStatus};

/// PostgREST-style store, as exposed by hosted Postgres services under
/// `/rest/v1/<table>`.
pub struct RestStore {
    client: reqwest::Client,
    table_url: String,
}

impl RestStore {
    pub fn new(base_url: &str, key: &str, table: &str) -> Result<Self, StoreError> {
        let mut headers = HeaderMap::new();
        let apikey = HeaderValue::from_str(key)
            .map_err(|e| StoreError::Transport(format!("invalid store key: {e}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| StoreError::Transport(format!("invalid store key: {e}")))?;
        headers.insert("apikey", apikey);
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            table_url: format!("{}/rest/v1/{table}", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl LeadStore for RestStore {
    fn name(&self) -> &str {
        "rest"
    }

    async fn fetch_candidates(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<LeadSubmission>, StoreError> {
        let cutoff = query.cutoff.to_rfc3339_opts(SecondsFormat::Millis, true);
        let limit = query.limit.to_string();

        let resp = self
            .client
            .get(&self.table_url)
            .query(&[
                ("select", "*".to_string()),
                ("processing_status", retryable_filter()),
                ("created_at", format!("gte.{cutoff}")),
                ("order", "created_at.asc".to_string()),
                ("limit", limit),
            ])
            .send()
            .await?;

        let rows: Vec<LeadRow> = ensure_success(resp).await?.json().await?;
        decode_rows(rows)
    }

    async fn claim(&self, id: &str) -> Result<Option<LeadSubmission>, StoreError> {
        let resp = self
            .client
            .patch(&self.table_url)
            .query(&[
                ("id", format!("eq.{id}")),
                ("processing_status", retryable_filter()),
            ])
            .header("Prefer", "return=representation")
            .json(&json!({ "processing_status": ProcessingStatus::Processing }))
            .send()
            .await?;

        let rows: Vec<LeadRow> = ensure_success(resp).await?.json().await?;
        Ok(decode_rows(rows)?.into_iter().next())
    }

    async fn mark_failed(&self, id: &str) -> Result<(), StoreError> {
        let resp = self
            .client
            .patch(&self.table_url)
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=minimal")
            .json(&json!({ "processing_status": ProcessingStatus::Failed }))
            .send()
            .await?;

        ensure_success(resp).await?;
        Ok(())
    }
}

/// `in.(pending,failed)`
fn retryable_filter() -> String {
    let statuses: Vec<&str> = ProcessingStatus::RETRYABLE
        .iter()
        .map(|s| s.as_str())
        .collect();
    format!("in.({})", statuses.join(","))
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp
        .text()
        .await
        .unwrap_or_default()
        .chars()
        .take(1024)
        .collect::<String>();

    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}
