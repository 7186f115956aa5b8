use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Failed,
    Completed,
}

impl ProcessingStatus {
    /// Statuses a sweep is allowed to pick up and claim.
    pub const RETRYABLE: [ProcessingStatus; 2] =
        [ProcessingStatus::Pending, ProcessingStatus::Failed];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Failed => "failed",
            ProcessingStatus::Completed => "completed",
        }
    }

    pub fn is_retryable(&self) -> bool {
        Self::RETRYABLE.contains(self)
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProcessingStatus::Pending),
            "processing" => Ok(ProcessingStatus::Processing),
            "failed" => Ok(ProcessingStatus::Failed),
            "completed" => Ok(ProcessingStatus::Completed),
            other => Err(format!("unknown processing_status '{other}'")),
        }
    }
}

/// A lead as the rest of the crate sees it. Only the store layer ever
/// handles the raw [`LeadRow`].
#[derive(Debug, Clone, PartialEq)]
pub struct LeadSubmission {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub business_name: String,
    pub website: Option<String>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processing_status: ProcessingStatus,
}

/// Row shape as returned by either store backend.
#[derive(Debug, Clone, sqlx::FromRow, Deserialize)]
pub struct LeadRow {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processing_status: String,
}

impl TryFrom<LeadRow> for LeadSubmission {
    type Error = String;

    fn try_from(row: LeadRow) -> Result<Self, Self::Error> {
        let processing_status = row
            .processing_status
            .parse()
            .map_err(|e| format!("row {}: {e}", row.id))?;

        Ok(LeadSubmission {
            id: row.id,
            full_name: row.full_name.unwrap_or_default(),
            email: row.email.unwrap_or_default(),
            phone: present(row.phone),
            business_name: row.business_name.unwrap_or_default(),
            website: present(row.website),
            message: present(row.message),
            created_at: row.created_at,
            processing_status,
        })
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Ids are opaque: accept uuid/text columns as well as integer keys.
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}
