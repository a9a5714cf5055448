//! Visual side of the highlight engine.
//!
//! The engine never touches the DOM directly. It pushes fully built
//! `OverlayUpdate`s into an `OverlaySink`; the desktop shell forwards them to
//! the webview, tests record them.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::{
    confidence::{ColorToken, Confidence},
    geometry::{FractionRect, PixelRect},
};
use crate::db::{HighlightId, ScoreId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SaveState {
    /// Drawn, save in flight.
    Pending,
    Saved,
    /// Save failed; kept on screen until `retry_unsaved` succeeds.
    Unsaved,
}

/// One rectangle drawn over the page for a highlight of the active score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightElement {
    pub element_id: ElementId,
    pub highlight_id: Option<HighlightId>,
    pub score_id: ScoreId,
    pub page: u32,
    pub confidence: Confidence,
    pub color: ColorToken,
    /// CSS fill for `color`.
    pub fill: String,
    pub fraction: FractionRect,
    pub rect: PixelRect,
    pub visible: bool,
    pub save_state: SaveState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OverlayUpdate {
    SelectionShown { rect: PixelRect },
    SelectionHidden,
    /// Listen for moves and releases on the whole document until released.
    PointerCaptured,
    PointerReleased,
    ElementAttached { element: HighlightElement },
    ElementUpdated { element: HighlightElement },
    ElementRemoved { element_id: ElementId },
    Cleared,
}

pub trait OverlaySink: Send + Sync {
    fn apply(&self, update: OverlayUpdate);
}

/// Keeps every update in order.
#[derive(Debug, Default)]
pub struct RecordingOverlay {
    updates: Mutex<Vec<OverlayUpdate>>,
}

impl RecordingOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<OverlayUpdate> {
        match self.updates.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn take(&self) -> Vec<OverlayUpdate> {
        match self.updates.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl OverlaySink for RecordingOverlay {
    fn apply(&self, update: OverlayUpdate) {
        match self.updates.lock() {
            Ok(mut guard) => guard.push(update),
            Err(poisoned) => poisoned.into_inner().push(update),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn updates_serialize_with_kind_tag() {
        let json = serde_json::to_value(OverlayUpdate::ElementRemoved {
            element_id: ElementId(7),
        })
        .unwrap();
        assert_eq!(json["kind"], "elementRemoved");
        assert_eq!(json["element_id"], 7);

        let json = serde_json::to_value(OverlayUpdate::Cleared).unwrap();
        assert_eq!(json["kind"], "cleared");
    }

    #[test]
    fn recording_overlay_keeps_order_and_drains() {
        let overlay = RecordingOverlay::new();
        overlay.apply(OverlayUpdate::PointerCaptured);
        overlay.apply(OverlayUpdate::SelectionHidden);
        assert_eq!(
            overlay.take(),
            vec![OverlayUpdate::PointerCaptured, OverlayUpdate::SelectionHidden]
        );
        assert!(overlay.updates().is_empty());
    }
}
