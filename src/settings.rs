use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{db::ScoreId, highlights::selection::{SelectionConfig, DEFAULT_MIN_SELECTION_PX}};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HighlightSettings {
    /// Drags at or below this many pixels in either dimension are ignored.
    pub min_selection_px: f64,
    /// Reopen the last score on startup.
    pub restore_last_score: bool,
    pub last_score_id: Option<ScoreId>,
}

impl Default for HighlightSettings {
    fn default() -> Self {
        Self {
            min_selection_px: DEFAULT_MIN_SELECTION_PX,
            restore_last_score: true,
            last_score_id: None,
        }
    }
}

impl HighlightSettings {
    pub fn selection_config(&self) -> SelectionConfig {
        if self.min_selection_px.is_finite() && self.min_selection_px >= 0.0 {
            SelectionConfig {
                min_size_px: self.min_selection_px,
            }
        } else {
            SelectionConfig::default()
        }
    }

    /// Score to reopen on startup, if any.
    pub fn startup_score(&self) -> Option<&str> {
        if self.restore_last_score {
            self.last_score_id.as_deref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct UserSettings {
    highlight: HighlightSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log_warn!(
                    "Ignoring unreadable settings in {}: {}",
                    path.display(),
                    err
                );
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn highlight(&self) -> HighlightSettings {
        self.read().highlight.clone()
    }

    pub fn update_highlight(&self, settings: HighlightSettings) -> Result<()> {
        let mut guard = self.write();
        guard.highlight = settings;
        self.persist(&guard)
    }

    /// Records the score that was just opened. No write when nothing changed.
    pub fn remember_score(&self, score_id: &str) -> Result<()> {
        let mut guard = self.write();
        if guard.highlight.last_score_id.as_deref() == Some(score_id) {
            return Ok(());
        }
        guard.highlight.last_score_id = Some(score_id.to_string());
        self.persist(&guard)
    }

    /// Forgets `score_id` if it is the remembered one (e.g. it was deleted).
    pub fn forget_score(&self, score_id: &str) -> Result<()> {
        let mut guard = self.write();
        if guard.highlight.last_score_id.as_deref() != Some(score_id) {
            return Ok(());
        }
        guard.highlight.last_score_id = None;
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        let settings = store.highlight();
        assert_eq!(settings, HighlightSettings::default());
        assert_eq!(settings.selection_config(), SelectionConfig::default());
        assert_eq!(settings.startup_score(), None);
    }

    #[test]
    fn updates_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::new(path.clone()).unwrap();
        store
            .update_highlight(HighlightSettings {
                min_selection_px: 5.0,
                restore_last_score: true,
                last_score_id: None,
            })
            .unwrap();
        store.remember_score("score-a").unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        let settings = reopened.highlight();
        assert_eq!(settings.min_selection_px, 5.0);
        assert_eq!(settings.startup_score(), Some("score-a"));
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.highlight(), HighlightSettings::default());
    }

    #[test]
    fn partial_file_fills_missing_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"highlight":{"restoreLastScore":false}}"#).unwrap();

        let settings = SettingsStore::new(path).unwrap().highlight();
        assert!(!settings.restore_last_score);
        assert_eq!(settings.min_selection_px, DEFAULT_MIN_SELECTION_PX);
    }

    #[test]
    fn forget_only_clears_matching_score() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        store.remember_score("a").unwrap();

        store.forget_score("b").unwrap();
        assert_eq!(store.highlight().last_score_id.as_deref(), Some("a"));

        store.forget_score("a").unwrap();
        assert_eq!(store.highlight().last_score_id, None);
    }

    #[test]
    fn invalid_threshold_uses_default_config() {
        let settings = HighlightSettings {
            min_selection_px: f64::NAN,
            ..HighlightSettings::default()
        };
        assert_eq!(settings.selection_config(), SelectionConfig::default());
    }
}
