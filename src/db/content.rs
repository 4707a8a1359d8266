//! Announcements and site settings.
//!
//! Settings are a flat key → JSON map. `PUT /api/admin/settings` upserts the
//! provided keys and leaves the others untouched.

use super::Database;
use crate::models::{new_id, Announcement, NewAnnouncement};
use anyhow::Result;
use serde_json::{Map, Value};

impl Database {
    /// All announcements, newest first.
    pub async fn list_announcements(&self) -> Result<Vec<Announcement>> {
        let rows = sqlx::query_as::<_, Announcement>(
            "SELECT id, title, message, priority, created_by, created_at
             FROM announcements ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn create_announcement(
        &self,
        a: &NewAnnouncement,
        created_by: &str,
    ) -> Result<Announcement> {
        let row = sqlx::query_as::<_, Announcement>(
            "INSERT INTO announcements (id, title, message, priority, created_by)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, title, message, priority, created_by, created_at",
        )
        .bind(new_id())
        .bind(a.title.trim())
        .bind(&a.message)
        .bind(a.priority.as_str())
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Delete an announcement by ID. Returns true if a row was deleted.
    pub async fn delete_announcement(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM announcements WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All settings as one JSON object.
    pub async fn get_settings(&self) -> Result<Map<String, Value>> {
        let rows = sqlx::query_as::<_, (String, Value)>(
            "SELECT key, value FROM settings ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    /// Upsert each provided key in one transaction, then return the full map.
    pub async fn update_settings(&self, updates: &Map<String, Value>) -> Result<Map<String, Value>> {
        let mut tx = self.pool.begin().await?;
        for (key, value) in updates {
            sqlx::query(
                "INSERT INTO settings (key, value) VALUES ($1, $2)
                 ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        self.get_settings().await
    }
}
