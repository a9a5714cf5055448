pub mod db;
pub mod events;
pub mod highlights;
#[cfg(feature = "desktop")]
mod scores;
pub mod settings;
#[cfg(test)]
mod test_support;
pub mod utils;

#[cfg(feature = "desktop")]
pub use desktop::run;

#[cfg(feature = "desktop")]
pub(crate) use desktop::AppState;

#[cfg(feature = "desktop")]
mod desktop {
    use std::sync::Arc;

    use tauri::{Emitter, Manager, State};

    use crate::{
        db::Database,
        events::EventBus,
        highlights::{
            commands::{
                change_layout, change_page, list_highlights, pointer_down, pointer_leave,
                pointer_move, pointer_up, recolor_highlight, remove_highlight,
                retry_unsaved_highlights, select_score, set_confidence, set_highlighting_mode,
                visible_highlights, TauriOverlay,
            },
            HighlightController, HighlightStore,
        },
        scores::commands::{delete_score, list_scores, register_score},
        settings::{HighlightSettings, SettingsStore},
        utils::logging,
    };

    pub(crate) struct AppState {
        pub(crate) db: Database,
        pub(crate) highlights: HighlightController,
        pub(crate) bus: Arc<EventBus>,
        pub(crate) settings: SettingsStore,
    }

    #[tauri::command]
    fn get_highlight_settings(state: State<AppState>) -> Result<HighlightSettings, String> {
        Ok(state.settings.highlight())
    }

    #[tauri::command]
    fn set_highlight_settings(
        settings: HighlightSettings,
        state: State<AppState>,
        app_handle: tauri::AppHandle,
    ) -> Result<(), String> {
        state
            .settings
            .update_highlight(settings.clone())
            .map_err(|e| e.to_string())?;

        state
            .highlights
            .set_selection_config(settings.selection_config());

        app_handle
            .emit("highlight-settings-updated", &settings)
            .map_err(|e| e.to_string())?;

        Ok(())
    }

    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        logging::init();

        log::info!("Scoremark starting up...");

        tauri::Builder::default()
            .plugin(tauri_plugin_opener::init())
            .setup(|app| {
                let result = (|| -> anyhow::Result<()> {
                    let app_data_dir = app
                        .path()
                        .app_data_dir()
                        .map_err(|err| anyhow::anyhow!(err))?;
                    std::fs::create_dir_all(&app_data_dir)?;

                    let db_path = app_data_dir.join("scoremark.sqlite3");
                    let database = Database::new(db_path)?;

                    let settings_path = app_data_dir.join("settings.json");
                    let settings_store = SettingsStore::new(settings_path)?;
                    let initial_settings = settings_store.highlight();

                    let controller = HighlightController::new(
                        HighlightStore::new(database.clone()),
                        Arc::new(TauriOverlay::new(app.handle().clone())),
                        initial_settings.selection_config(),
                    );

                    let bus = Arc::new(EventBus::new());
                    controller.bind(&bus);

                    // Reopen the score the user had open last time.
                    if let Some(score_id) = initial_settings.startup_score() {
                        let controller = controller.clone();
                        let score_id = score_id.to_string();
                        let outcome = tauri::async_runtime::block_on(async move {
                            controller.on_score_selected(score_id).await
                        });
                        log::info!("Restored last score: {:?}", outcome);
                    }

                    app.manage(AppState {
                        db: database,
                        highlights: controller,
                        bus,
                        settings: settings_store,
                    });

                    Ok(())
                })();

                result.map_err(|err| err.into())
            })
            .invoke_handler(tauri::generate_handler![
                select_score,
                change_page,
                change_layout,
                set_confidence,
                set_highlighting_mode,
                pointer_down,
                pointer_move,
                pointer_up,
                pointer_leave,
                list_highlights,
                visible_highlights,
                recolor_highlight,
                remove_highlight,
                retry_unsaved_highlights,
                register_score,
                list_scores,
                delete_score,
                get_highlight_settings,
                set_highlight_settings,
            ])
            .run(tauri::generate_context!())
            .expect("error while running tauri application");
    }
}
