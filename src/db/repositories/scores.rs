use anyhow::{bail, Result};
use chrono::Utc;
use rusqlite::{params, Row};
use uuid::Uuid;

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, to_i64, to_u32},
    models::{ScoreInput, ScoreRecord},
};

fn row_to_score(row: &Row) -> Result<ScoreRecord> {
    let page_count: i64 = row.get("page_count")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(ScoreRecord {
        id: row.get("id")?,
        title: row.get("title")?,
        page_count: to_u32(page_count, "page_count")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

impl Database {
    /// Inserts a score, or refreshes title/page count when the id is known.
    pub async fn upsert_score(&self, input: ScoreInput) -> Result<ScoreRecord> {
        self.execute(move |conn| {
            let title = input.title.trim().to_string();
            if title.is_empty() {
                bail!("Score title must not be empty");
            }

            let now = Utc::now().to_rfc3339();
            let id = input.id.unwrap_or_else(|| Uuid::new_v4().to_string());

            conn.execute(
                "INSERT INTO scores (id, title, page_count, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                     title = excluded.title,
                     page_count = excluded.page_count,
                     updated_at = excluded.updated_at",
                params![id, title, to_i64(input.page_count), now],
            )?;

            let score = conn.query_row(
                "SELECT id, title, page_count, created_at, updated_at FROM scores WHERE id = ?1",
                params![id],
                |row| Ok(row_to_score(row)),
            )??;
            Ok(score)
        })
        .await
    }

    /// Most recently touched first.
    pub async fn list_scores(&self) -> Result<Vec<ScoreRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, page_count, created_at, updated_at
                 FROM scores
                 ORDER BY updated_at DESC",
            )?;

            let mut rows = stmt.query([])?;
            let mut scores = Vec::new();
            while let Some(row) = rows.next()? {
                scores.push(row_to_score(row)?);
            }
            Ok(scores)
        })
        .await
    }

    /// Removes the score record. Its highlights go through the highlight store.
    pub async fn delete_score(&self, score_id: &str) -> Result<bool> {
        let score_id = score_id.to_string();
        self.execute(move |conn| {
            let removed = conn.execute("DELETE FROM scores WHERE id = ?1", params![score_id])?;
            Ok(removed > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(id: Option<&str>, title: &str, pages: u32) -> ScoreInput {
        ScoreInput {
            id: id.map(str::to_string),
            title: title.to_string(),
            page_count: pages,
        }
    }

    #[tokio::test]
    async fn upsert_assigns_id_and_updates_existing() {
        let db = Database::open_in_memory().unwrap();
        let created = db.upsert_score(input(None, "Etude", 3)).await.unwrap();
        assert!(!created.id.is_empty());

        let renamed = db
            .upsert_score(input(Some(&created.id), "Etude Op. 10", 4))
            .await
            .unwrap();
        assert_eq!(renamed.id, created.id);
        assert_eq!(renamed.title, "Etude Op. 10");
        assert_eq!(renamed.page_count, 4);
        assert_eq!(renamed.created_at, created.created_at);
        assert_eq!(db.list_scores().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blank_title_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.upsert_score(input(None, "   ", 1)).await.is_err());
    }

    #[tokio::test]
    async fn deleting_score_removes_only_that_record() {
        let db = Database::open_in_memory().unwrap();
        let a = db.upsert_score(input(Some("a"), "A", 2)).await.unwrap();
        db.upsert_score(input(Some("b"), "B", 2)).await.unwrap();

        assert!(db.delete_score(&a.id).await.unwrap());
        assert!(!db.delete_score(&a.id).await.unwrap());

        let remaining = db.list_scores().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "b");
    }
}
