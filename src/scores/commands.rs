use tauri::State;

use crate::{
    db::models::{ScoreInput, ScoreRecord},
    AppState,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[tauri::command]
pub async fn register_score(
    state: State<'_, AppState>,
    input: ScoreInput,
) -> Result<ScoreRecord, String> {
    state.db.upsert_score(input).await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn list_scores(state: State<'_, AppState>) -> Result<Vec<ScoreRecord>, String> {
    state.db.list_scores().await.map_err(|e| e.to_string())
}

/// Deletes the score together with its highlights. Closes it first if open.
#[tauri::command]
pub async fn delete_score(state: State<'_, AppState>, score_id: String) -> Result<bool, String> {
    let highlights = state
        .highlights
        .discard_score(&score_id)
        .await
        .map_err(|e| e.to_string())?;

    let deleted = state
        .db
        .delete_score(&score_id)
        .await
        .map_err(|e| e.to_string())?;

    if let Err(err) = state.settings.forget_score(&score_id) {
        log_warn!("Failed to forget deleted score {}: {}", score_id, err);
    }
    if deleted {
        log_info!("Deleted score {} and {} highlights", score_id, highlights);
    }
    Ok(deleted)
}
