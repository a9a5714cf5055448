//! Highlight records as stored in the `highlights` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::highlights::{geometry::FractionRect, Confidence};

pub type HighlightId = String;
pub type ScoreId = String;

/// A rectangle on one page of one score, tagged with a confidence level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub id: HighlightId,
    pub score_id: ScoreId,
    pub page: u32,
    pub confidence: Confidence,
    #[serde(flatten)]
    pub rect: FractionRect,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A highlight that has not been saved yet; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHighlight {
    pub score_id: ScoreId,
    pub page: u32,
    pub confidence: Confidence,
    #[serde(flatten)]
    pub rect: FractionRect,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightPatch {
    pub confidence: Option<Confidence>,
    pub rect: Option<FractionRect>,
}

impl HighlightPatch {
    pub fn confidence(level: Confidence) -> Self {
        Self {
            confidence: Some(level),
            rect: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.confidence.is_none() && self.rect.is_none()
    }
}
