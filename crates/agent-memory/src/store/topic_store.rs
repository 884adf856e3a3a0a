//! Topic listing and explicit empty-topic cleanup.
//!
//! Topic rows are created and counted as a side effect of memory writes in
//! [`crate::store::memory_store`]; this store only reads them and handles the
//! one deliberate destructive operation, removing a topic that is already
//! empty.

use crate::store::schema::*;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OptionalExtension;
use std::sync::Arc;
use tracing::info;

/// Outcome of an explicit empty-topic deletion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmptyTopicDeletion {
    Deleted,
    NotEmpty(i64),
    NotFound,
}

pub struct TopicStore {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl TopicStore {
    pub fn new(pool: Arc<Pool<SqliteConnectionManager>>) -> Self {
        Self { pool }
    }

    fn get_conn(&self) -> anyhow::Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| anyhow::anyhow!("Failed to get connection from pool: {}", e))
    }

    pub fn get(&self, name: &str) -> anyhow::Result<Option<Topic>> {
        let conn = self.get_conn()?;
        let topic = conn
            .query_row(
                "SELECT name, description, item_count, created_at FROM topics WHERE name = ?1",
                [name],
                |row| {
                    let created_at: String = row.get(3)?;
                    Ok(Topic {
                        name: row.get(0)?,
                        description: row.get(1)?,
                        item_count: row.get(2)?,
                        created_at: parse_timestamp(&created_at),
                    })
                },
            )
            .optional()?;
        Ok(topic)
    }

    pub fn list(&self) -> anyhow::Result<Vec<Topic>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT name, description, item_count, created_at FROM topics ORDER BY item_count DESC",
        )?;
        let mut rows = stmt.query([])?;
        let mut topics = Vec::new();

        while let Some(row) = rows.next()? {
            let created_at: String = row.get(3)?;
            topics.push(Topic {
                name: row.get(0)?,
                description: row.get(1)?,
                item_count: row.get(2)?,
                created_at: parse_timestamp(&created_at),
            });
        }

        Ok(topics)
    }

    /// Delete a topic row only when its counter is already zero. Non-empty
    /// topics are left untouched so cleanup can never take memories with it.
    pub fn delete_if_empty(&self, name: &str) -> anyhow::Result<EmptyTopicDeletion> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let item_count: Option<i64> = tx
            .query_row("SELECT item_count FROM topics WHERE name = ?1", [name], |row| row.get(0))
            .optional()?;

        let outcome = match item_count {
            None => EmptyTopicDeletion::NotFound,
            Some(count) if count > 0 => EmptyTopicDeletion::NotEmpty(count),
            Some(_) => {
                tx.execute("DELETE FROM topics WHERE name = ?1", [name])?;
                info!("Deleted empty topic {}", name);
                EmptyTopicDeletion::Deleted
            }
        };

        tx.commit()?;
        Ok(outcome)
    }
}
