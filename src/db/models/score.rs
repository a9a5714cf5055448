use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for an uploaded score. The PDF bytes live with the file store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    pub id: String,
    pub title: String,
    pub page_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreInput {
    /// Reuse the file store's id when there is one.
    pub id: Option<String>,
    pub title: String,
    pub page_count: u32,
}
