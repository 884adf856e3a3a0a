//! Summary storage and retrieval operations.

use crate::store::schema::*;
use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Row};
use std::sync::Arc;
use tracing::debug;

pub struct SummaryStore {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl SummaryStore {
    pub fn new(pool: Arc<Pool<SqliteConnectionManager>>) -> Self {
        Self { pool }
    }

    fn get_conn(&self) -> anyhow::Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| anyhow::anyhow!("Failed to get connection from pool: {}", e))
    }

    pub fn create(
        &self,
        id: &str,
        memory_id: &str,
        summary_type: &str,
        summary_text: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<SummaryRecord> {
        let conn = self.get_conn()?;
        let now_str = now.to_rfc3339();

        conn.execute(
            "INSERT INTO summaries (id, memory_id, summary_type, summary_text, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, memory_id, summary_type, summary_text, &now_str, &now_str],
        )?;

        debug!("Stored {} summary {} for memory {}", summary_type, id, memory_id);
        Ok(SummaryRecord {
            id: id.to_string(),
            memory_id: memory_id.to_string(),
            summary_type: summary_type.to_string(),
            summary_text: summary_text.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn get_by_id(&self, id: &str) -> anyhow::Result<Option<SummaryRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, memory_id, summary_type, summary_text, created_at, updated_at
             FROM summaries WHERE id = ?1",
        )?;
        let mut rows = stmt.query([id])?;

        if let Some(row) = rows.next()? {
            Ok(Some(row_to_summary(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn get_for_memory(&self, memory_id: &str, summary_type: &str) -> anyhow::Result<Option<SummaryRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, memory_id, summary_type, summary_text, created_at, updated_at
             FROM summaries WHERE memory_id = ?1 AND summary_type = ?2",
        )?;
        let mut rows = stmt.query(params![memory_id, summary_type])?;

        if let Some(row) = rows.next()? {
            Ok(Some(row_to_summary(row)?))
        } else {
            Ok(None)
        }
    }

    /// All summaries attached to a memory. The service keeps at most one
    /// current summary per memory, but deletion still sweeps whatever exists.
    pub fn list_for_memory(&self, memory_id: &str) -> anyhow::Result<Vec<SummaryRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, memory_id, summary_type, summary_text, created_at, updated_at
             FROM summaries WHERE memory_id = ?1 ORDER BY created_at",
        )?;
        let mut rows = stmt.query([memory_id])?;
        let mut summaries = Vec::new();

        while let Some(row) = rows.next()? {
            summaries.push(row_to_summary(row)?);
        }

        Ok(summaries)
    }

    /// Overwrite an existing summary row in place, re-tiering it if the
    /// content moved across a size threshold since it was first generated.
    pub fn update(
        &self,
        id: &str,
        summary_type: &str,
        summary_text: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let conn = self.get_conn()?;
        let updated = conn.execute(
            "UPDATE summaries SET summary_type = ?2, summary_text = ?3, updated_at = ?4 WHERE id = ?1",
            params![id, summary_type, summary_text, now.to_rfc3339()],
        )?;
        Ok(updated > 0)
    }

    pub fn delete_for_memory(&self, memory_id: &str) -> anyhow::Result<usize> {
        let conn = self.get_conn()?;
        let deleted = conn.execute("DELETE FROM summaries WHERE memory_id = ?1", [memory_id])?;
        debug!("Deleted {} summaries for memory {}", deleted, memory_id);
        Ok(deleted)
    }
}

fn row_to_summary(row: &Row) -> anyhow::Result<SummaryRecord> {
    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;

    Ok(SummaryRecord {
        id: row.get(0)?,
        memory_id: row.get(1)?,
        summary_type: row.get(2)?,
        summary_text: row.get(3)?,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}
