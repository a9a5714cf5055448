use serde::{Deserialize, Serialize};

use super::{confidence::Confidence, geometry::CanvasSize};
use crate::db::ScoreId;

/// Process-wide UI state the highlight engine reads and writes. Each field has
/// one writer: score selection, the confidence controls, the mode toggle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppContext {
    pub current_score: Option<ScoreId>,
    pub active_confidence: Option<Confidence>,
    pub highlighting_enabled: bool,
}

impl AppContext {
    pub fn new() -> Self {
        Self {
            current_score: None,
            active_confidence: None,
            highlighting_enabled: true,
        }
    }

    pub fn is_current(&self, score_id: &str) -> bool {
        self.current_score.as_deref() == Some(score_id)
    }
}

impl Default for AppContext {
    fn default() -> Self {
        Self::new()
    }
}

/// What the PDF renderer currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    /// 1-based.
    pub page: u32,
    pub zoom: f64,
    /// Rendered canvas in pixels, already including zoom.
    pub canvas: CanvasSize,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            page: 1,
            zoom: 1.0,
            canvas: CanvasSize::default(),
        }
    }
}
