use tauri::{AppHandle, Emitter, State};

use super::{
    geometry::{CanvasSize, Point},
    overlay::{ElementId, HighlightElement, OverlaySink, OverlayUpdate},
    Confidence, DragResolution,
};
use crate::{db::Highlight, events::HighlightEvent, AppState};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_error;

pub const OVERLAY_EVENT: &str = "highlight-overlay";

/// Forwards overlay updates to the webview as `highlight-overlay` events.
pub struct TauriOverlay {
    app_handle: AppHandle,
}

impl TauriOverlay {
    pub fn new(app_handle: AppHandle) -> Self {
        Self { app_handle }
    }
}

impl OverlaySink for TauriOverlay {
    fn apply(&self, update: OverlayUpdate) {
        if let Err(err) = self.app_handle.emit(OVERLAY_EVENT, &update) {
            log_error!("Failed to emit overlay update: {}", err);
        }
    }
}

fn publish(state: &AppState, event: HighlightEvent) -> Result<(), String> {
    let kind = event.kind();
    if state.bus.publish(&event) == 0 && state.bus.subscriber_count(kind) > 0 {
        return Err(format!("{} was not handled", kind.name()));
    }
    Ok(())
}

/// Async so the score-selected handler can spawn rehydration on the runtime.
#[tauri::command]
pub async fn select_score(state: State<'_, AppState>, score_id: String) -> Result<(), String> {
    publish(
        &state,
        HighlightEvent::ScoreSelected {
            score_id: score_id.clone(),
        },
    )?;
    state
        .settings
        .remember_score(&score_id)
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn change_page(state: State<'_, AppState>, page: u32) -> Result<(), String> {
    publish(&state, HighlightEvent::PageChanged { page })
}

#[tauri::command]
pub fn change_layout(
    state: State<'_, AppState>,
    zoom: f64,
    width: f64,
    height: f64,
) -> Result<(), String> {
    publish(
        &state,
        HighlightEvent::LayoutChanged {
            zoom,
            canvas: CanvasSize::new(width, height),
        },
    )
}

#[tauri::command]
pub fn set_confidence(
    state: State<'_, AppState>,
    confidence: Option<Confidence>,
) -> Result<(), String> {
    publish(&state, HighlightEvent::ConfidenceChanged { confidence })
}

#[tauri::command]
pub fn set_highlighting_mode(state: State<'_, AppState>, enabled: bool) {
    state.highlights.set_highlighting_enabled(enabled);
}

#[tauri::command]
pub fn pointer_down(state: State<'_, AppState>, x: f64, y: f64) -> bool {
    state.highlights.pointer_down(Point::new(x, y))
}

#[tauri::command]
pub fn pointer_move(state: State<'_, AppState>, x: f64, y: f64) {
    state.highlights.pointer_move(Point::new(x, y));
}

#[tauri::command]
pub async fn pointer_up(
    state: State<'_, AppState>,
    x: f64,
    y: f64,
) -> Result<DragResolution, String> {
    Ok(state.highlights.pointer_up(Point::new(x, y)).await)
}

#[tauri::command]
pub async fn pointer_leave(state: State<'_, AppState>) -> Result<DragResolution, String> {
    Ok(state.highlights.pointer_leave().await)
}

#[tauri::command]
pub async fn list_highlights(
    state: State<'_, AppState>,
    score_id: String,
    page: Option<u32>,
) -> Result<Vec<Highlight>, String> {
    let store = state.highlights.store();
    let result = match page {
        Some(page) => store.load_for_page(&score_id, page).await,
        None => store.load_for_score(&score_id).await,
    };
    result.map_err(|e| e.to_string())
}

#[tauri::command]
pub fn visible_highlights(state: State<'_, AppState>) -> Vec<HighlightElement> {
    state.highlights.visible_elements()
}

#[tauri::command]
pub async fn recolor_highlight(
    state: State<'_, AppState>,
    element_id: u64,
    confidence: Confidence,
) -> Result<bool, String> {
    state
        .highlights
        .recolor(ElementId(element_id), confidence)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn remove_highlight(state: State<'_, AppState>, element_id: u64) -> Result<bool, String> {
    state
        .highlights
        .remove(ElementId(element_id))
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn retry_unsaved_highlights(state: State<'_, AppState>) -> Result<usize, String> {
    Ok(state.highlights.retry_unsaved().await)
}
