//! Persistence adapter for highlights.
//!
//! Wraps the database handle and turns its `anyhow` failures into the small
//! error set the highlight engine reacts to.

use thiserror::Error;

use crate::db::{Database, Highlight, HighlightId, HighlightPatch, NewHighlight};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("highlight storage is not initialized")]
    StorageUnavailable,
    #[error("failed to write highlight")]
    StorageWriteFailed(#[source] anyhow::Error),
    #[error("failed to read highlights")]
    StorageReadFailed(#[source] anyhow::Error),
    #[error("highlight {0} not found")]
    NotFound(HighlightId),
    #[error("highlight has no area")]
    InvalidCoordinates,
}

/// Highlight CRUD keyed by score and page. Clones share the same database.
#[derive(Clone, Default)]
pub struct HighlightStore {
    db: Option<Database>,
}

impl HighlightStore {
    pub fn new(db: Database) -> Self {
        Self { db: Some(db) }
    }

    /// A store with no database behind it; every call fails with
    /// `StorageUnavailable`.
    pub fn uninitialized() -> Self {
        Self { db: None }
    }

    fn db(&self) -> Result<&Database, StoreError> {
        self.db.as_ref().ok_or(StoreError::StorageUnavailable)
    }

    pub async fn save(&self, highlight: &NewHighlight) -> Result<HighlightId, StoreError> {
        let db = self.db()?;
        if !highlight.rect.has_area() || highlight.page == 0 {
            return Err(StoreError::InvalidCoordinates);
        }

        db.insert_highlight(highlight)
            .await
            .map(|stored| stored.id)
            .map_err(StoreError::StorageWriteFailed)
    }

    /// Every highlight of the score, all pages. Callers partition by page.
    pub async fn load_for_score(&self, score_id: &str) -> Result<Vec<Highlight>, StoreError> {
        self.db()?
            .get_highlights_for_score(score_id)
            .await
            .map_err(StoreError::StorageReadFailed)
    }

    pub async fn load_for_page(
        &self,
        score_id: &str,
        page: u32,
    ) -> Result<Vec<Highlight>, StoreError> {
        self.db()?
            .get_highlights_for_page(score_id, page)
            .await
            .map_err(StoreError::StorageReadFailed)
    }

    pub async fn get(&self, id: &str) -> Result<Highlight, StoreError> {
        self.db()?
            .get_highlight(id)
            .await
            .map_err(StoreError::StorageReadFailed)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// An empty patch writes nothing and returns the stored row as is.
    pub async fn update(&self, id: &str, patch: HighlightPatch) -> Result<Highlight, StoreError> {
        let db = self.db()?;
        if patch.is_empty() {
            return self.get(id).await;
        }
        if let Some(rect) = &patch.rect {
            if !rect.has_area() {
                return Err(StoreError::InvalidCoordinates);
            }
        }

        db.update_highlight(id, patch)
            .await
            .map_err(StoreError::StorageWriteFailed)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Deleting an unknown id succeeds.
    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.db()?
            .delete_highlight(id)
            .await
            .map(|_| ())
            .map_err(StoreError::StorageWriteFailed)
    }

    pub async fn delete_for_score(&self, score_id: &str) -> Result<usize, StoreError> {
        self.db()?
            .delete_highlights_for_score(score_id)
            .await
            .map_err(StoreError::StorageWriteFailed)
    }
}
