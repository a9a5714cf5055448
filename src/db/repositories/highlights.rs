use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::db::{
    connection::Database,
    helpers::{parse_confidence, parse_datetime, to_i64, to_u32},
    models::{Highlight, HighlightPatch, NewHighlight},
};
use crate::highlights::geometry::FractionRect;

const HIGHLIGHT_COLUMNS: &str =
    "id, score_id, page, confidence, x_pct, y_pct, w_pct, h_pct, created_at, updated_at";

fn row_to_highlight(row: &Row) -> Result<Highlight> {
    let page: i64 = row.get("page")?;
    let confidence: String = row.get("confidence")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Highlight {
        id: row.get("id")?,
        score_id: row.get("score_id")?,
        page: to_u32(page, "page")?,
        confidence: parse_confidence(&confidence)?,
        rect: FractionRect {
            x_pct: row.get("x_pct")?,
            y_pct: row.get("y_pct")?,
            w_pct: row.get("w_pct")?,
            h_pct: row.get("h_pct")?,
        },
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn select_by_id(conn: &Connection, id: &str) -> Result<Option<Highlight>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {HIGHLIGHT_COLUMNS} FROM highlights WHERE id = ?1"
    ))?;
    let mut rows = stmt.query(params![id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_highlight(row)?)),
        None => Ok(None),
    }
}

impl Database {
    pub async fn insert_highlight(&self, highlight: &NewHighlight) -> Result<Highlight> {
        let record = highlight.clone();
        self.execute(move |conn| {
            let now = Utc::now();
            let stored = Highlight {
                id: Uuid::new_v4().to_string(),
                score_id: record.score_id,
                page: record.page,
                confidence: record.confidence,
                rect: record.rect,
                created_at: now,
                updated_at: now,
            };

            conn.execute(
                "INSERT INTO highlights
                     (id, score_id, page, confidence, x_pct, y_pct, w_pct, h_pct,
                      created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    stored.id,
                    stored.score_id,
                    to_i64(stored.page),
                    stored.confidence.as_str(),
                    stored.rect.x_pct,
                    stored.rect.y_pct,
                    stored.rect.w_pct,
                    stored.rect.h_pct,
                    stored.created_at.to_rfc3339(),
                    stored.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(stored)
        })
        .await
    }

    pub async fn get_highlights_for_score(&self, score_id: &str) -> Result<Vec<Highlight>> {
        let score_id = score_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {HIGHLIGHT_COLUMNS}
                 FROM highlights
                 WHERE score_id = ?1
                 ORDER BY page ASC, created_at ASC"
            ))?;

            let mut rows = stmt.query(params![score_id])?;
            let mut highlights = Vec::new();
            while let Some(row) = rows.next()? {
                highlights.push(row_to_highlight(row)?);
            }
            Ok(highlights)
        })
        .await
    }

    pub async fn get_highlights_for_page(
        &self,
        score_id: &str,
        page: u32,
    ) -> Result<Vec<Highlight>> {
        let score_id = score_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {HIGHLIGHT_COLUMNS}
                 FROM highlights
                 WHERE score_id = ?1 AND page = ?2
                 ORDER BY created_at ASC"
            ))?;

            let mut rows = stmt.query(params![score_id, to_i64(page)])?;
            let mut highlights = Vec::new();
            while let Some(row) = rows.next()? {
                highlights.push(row_to_highlight(row)?);
            }
            Ok(highlights)
        })
        .await
    }

    pub async fn get_highlight(&self, highlight_id: &str) -> Result<Option<Highlight>> {
        let highlight_id = highlight_id.to_string();
        self.execute(move |conn| select_by_id(conn, &highlight_id))
            .await
    }

    /// Applies the patch and returns the updated row, or `None` when no
    /// highlight has that id.
    pub async fn update_highlight(
        &self,
        highlight_id: &str,
        patch: HighlightPatch,
    ) -> Result<Option<Highlight>> {
        let highlight_id = highlight_id.to_string();
        self.execute(move |conn| {
            let now = Utc::now();

            // Build update query dynamically based on what's being updated
            let mut updates = Vec::new();
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(level) = patch.confidence {
                updates.push("confidence = ?");
                params_vec.push(Box::new(level.as_str()));
            }
            if let Some(rect) = patch.rect {
                updates.push("x_pct = ?");
                params_vec.push(Box::new(rect.x_pct));
                updates.push("y_pct = ?");
                params_vec.push(Box::new(rect.y_pct));
                updates.push("w_pct = ?");
                params_vec.push(Box::new(rect.w_pct));
                updates.push("h_pct = ?");
                params_vec.push(Box::new(rect.h_pct));
            }

            updates.push("updated_at = ?");
            params_vec.push(Box::new(now.to_rfc3339()));

            let query = format!("UPDATE highlights SET {} WHERE id = ?", updates.join(", "));
            params_vec.push(Box::new(highlight_id.clone()));

            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|b| b.as_ref()).collect();

            let rows_affected = conn.execute(&query, params_refs.as_slice())?;
            if rows_affected == 0 {
                return Ok(None);
            }

            select_by_id(conn, &highlight_id)
        })
        .await
    }

    /// Returns whether a row was removed.
    pub async fn delete_highlight(&self, highlight_id: &str) -> Result<bool> {
        let highlight_id = highlight_id.to_string();
        self.execute(move |conn| {
            let rows_affected =
                conn.execute("DELETE FROM highlights WHERE id = ?1", params![highlight_id])?;
            Ok(rows_affected > 0)
        })
        .await
    }

    pub async fn delete_highlights_for_score(&self, score_id: &str) -> Result<usize> {
        let score_id = score_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "DELETE FROM highlights WHERE score_id = ?1",
                params![score_id],
            )?;
            Ok(rows_affected)
        })
        .await
    }
}
