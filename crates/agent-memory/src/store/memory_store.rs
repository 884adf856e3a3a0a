//! Memory item CRUD plus the topic counter bookkeeping that rides along with
//! every create/update/delete.

use crate::store::schema::*;
use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};
use std::sync::Arc;
use tracing::{debug, info};

pub struct MemoryItemStore {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl MemoryItemStore {
    pub fn new(pool: Arc<Pool<SqliteConnectionManager>>) -> Self {
        Self { pool }
    }

    fn get_conn(&self) -> anyhow::Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| anyhow::anyhow!("Failed to get connection from pool: {}", e))
    }

    /// Insert a new memory item and bump (or create) its topic counter in one
    /// transaction. This is the durability boundary of a store operation.
    pub fn create(
        &self,
        id: &str,
        content: &str,
        topic: &str,
        tags: &[String],
        now: DateTime<Utc>,
    ) -> anyhow::Result<MemoryItem> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let now_str = now.to_rfc3339();

        // The topic row must exist before the memory row can reference it.
        tx.execute(
            "INSERT INTO topics (name, created_at, item_count) VALUES (?1, ?2, 1)
             ON CONFLICT(name) DO UPDATE SET item_count = item_count + 1",
            params![topic, &now_str],
        )?;

        let content_size = content.chars().count();
        tx.execute(
            "INSERT INTO memory_items
             (id, content, topic, tags, content_size, created_at, updated_at, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1)",
            params![id, content, topic, encode_tags(tags), content_size as i64, &now_str, &now_str],
        )?;

        tx.commit()?;
        debug!("Stored memory {} in topic {}", id, topic);

        Ok(MemoryItem {
            id: id.to_string(),
            content: content.to_string(),
            topic: topic.to_string(),
            tags: tags.to_vec(),
            content_size,
            created_at: now,
            updated_at: now,
            version: 1,
        })
    }

    pub fn get(&self, id: &str) -> anyhow::Result<Option<MemoryItem>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, content, topic, tags, content_size, created_at, updated_at, version
             FROM memory_items WHERE id = ?1",
        )?;
        let mut rows = stmt.query([id])?;

        if let Some(row) = rows.next()? {
            Ok(Some(row_to_memory_item(row)?))
        } else {
            Ok(None)
        }
    }

    /// Apply a partial update to a memory item.
    ///
    /// Write order inside the transaction is what keeps the item alive when it
    /// is the last member of its old topic: the new topic row is created
    /// first, then the memory row is repointed, and only then is the old
    /// (now unreferenced) topic row decremented and possibly removed. Removing
    /// the old topic earlier would cascade-delete the memory row itself.
    ///
    /// Returns `false` when no item with the given id exists.
    pub fn update(
        &self,
        id: &str,
        content: Option<&str>,
        topic: Option<&str>,
        tags: Option<&[String]>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let now_str = now.to_rfc3339();

        let current: Option<(String, String, String)> = tx
            .query_row(
                "SELECT content, topic, tags FROM memory_items WHERE id = ?1",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let Some((current_content, current_topic, current_tags)) = current else {
            return Ok(false);
        };

        let new_content = content.unwrap_or(&current_content);
        let new_topic = topic.unwrap_or(&current_topic);
        let new_tags = tags.map(encode_tags).unwrap_or(current_tags);
        let topic_changed = new_topic != current_topic;

        if topic_changed {
            tx.execute(
                "INSERT INTO topics (name, created_at, item_count) VALUES (?1, ?2, 0)
                 ON CONFLICT(name) DO NOTHING",
                params![new_topic, &now_str],
            )?;
        }

        tx.execute(
            "UPDATE memory_items
             SET content = ?2, topic = ?3, tags = ?4, content_size = ?5,
                 updated_at = ?6, version = version + 1
             WHERE id = ?1",
            params![
                id,
                new_content,
                new_topic,
                new_tags,
                new_content.chars().count() as i64,
                &now_str
            ],
        )?;

        if topic_changed {
            tx.execute(
                "UPDATE topics SET item_count = item_count + 1 WHERE name = ?1",
                [new_topic],
            )?;
            decrement_topic(&tx, &current_topic)?;
            tx.execute(
                "DELETE FROM topics WHERE name = ?1 AND item_count = 0",
                [&current_topic],
            )?;
        }

        tx.commit()?;
        debug!("Updated memory {} (topic change: {})", id, topic_changed);
        Ok(true)
    }

    /// Delete a memory item. Cascades to its summaries via the schema FK and
    /// decrements the topic counter, removing the topic row once empty.
    ///
    /// Returns `false` when no item with the given id exists.
    pub fn delete(&self, id: &str) -> anyhow::Result<bool> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let topic: Option<String> = tx
            .query_row("SELECT topic FROM memory_items WHERE id = ?1", [id], |row| row.get(0))
            .optional()?;
        let Some(topic) = topic else {
            return Ok(false);
        };

        tx.execute("DELETE FROM memory_items WHERE id = ?1", [id])?;
        decrement_topic(&tx, &topic)?;
        tx.execute("DELETE FROM topics WHERE name = ?1 AND item_count = 0", [&topic])?;

        tx.commit()?;
        info!("Deleted memory {} from topic {}", id, topic);
        Ok(true)
    }
}

/// Counter decrements are floored at zero rather than erroring; a negative
/// count would only mean the counter had already drifted.
fn decrement_topic(conn: &rusqlite::Connection, topic: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE topics
         SET item_count = CASE WHEN item_count > 0 THEN item_count - 1 ELSE 0 END
         WHERE name = ?1",
        [topic],
    )
}

fn row_to_memory_item(row: &Row) -> anyhow::Result<MemoryItem> {
    let tags_raw: String = row.get(3)?;
    let content_size: i64 = row.get(4)?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;

    Ok(MemoryItem {
        id: row.get(0)?,
        content: row.get(1)?,
        topic: row.get(2)?,
        tags: decode_tags(&tags_raw),
        content_size: content_size as usize,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
        version: row.get(7)?,
    })
}
