//! A named collection inside the vector index.

use crate::index::embedding::{cosine_similarity, TextEmbedder};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

pub struct VectorCollection {
    pool: Arc<Pool<SqliteConnectionManager>>,
    name: String,
    embedder: Arc<TextEmbedder>,
}

impl VectorCollection {
    pub fn new(
        pool: Arc<Pool<SqliteConnectionManager>>,
        name: impl Into<String>,
        embedder: Arc<TextEmbedder>,
    ) -> Self {
        Self {
            pool,
            name: name.into(),
            embedder,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn get_conn(&self) -> anyhow::Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| anyhow::anyhow!("Failed to get connection from pool: {}", e))
    }

    /// Add-or-replace an entry. The document and its embedding are always
    /// replaced; metadata is merged over whatever is already stored, so a
    /// partial update cannot clobber fields the caller did not pass.
    pub fn upsert(&self, id: &str, document: &str, metadata: Map<String, Value>) -> anyhow::Result<()> {
        let merged = match self.get(id)? {
            Some((_, mut existing)) => {
                for (key, value) in metadata {
                    existing.insert(key, value);
                }
                existing
            }
            None => metadata,
        };

        let embedding = bincode::serialize(&self.embedder.embed(document))?;
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO vectors (collection, id, document, embedding, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(collection, id) DO UPDATE SET
                 document = excluded.document,
                 embedding = excluded.embedding,
                 metadata = excluded.metadata",
            params![&self.name, id, document, embedding, serde_json::to_string(&merged)?],
        )?;

        debug!("Upserted vector {} into collection {}", id, self.name);
        Ok(())
    }

    /// Rank entries against a query text, optionally filtered by exact
    /// equality on one metadata field. Linear scan over the collection; these
    /// are candidate filters over modest row counts, not a search engine.
    pub fn query(
        &self,
        text: &str,
        max_results: usize,
        filter: Option<(&str, &str)>,
    ) -> anyhow::Result<Vec<(String, f32)>> {
        let query_embedding = self.embedder.embed(text);
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT id, embedding, metadata FROM vectors WHERE collection = ?1")?;
        let mut rows = stmt.query([&self.name])?;

        let mut matches = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let embedding_bytes: Vec<u8> = row.get(1)?;

            if let Some((key, expected)) = filter {
                let metadata_raw: String = row.get(2)?;
                let metadata: Map<String, Value> =
                    serde_json::from_str(&metadata_raw).unwrap_or_default();
                if metadata.get(key).and_then(Value::as_str) != Some(expected) {
                    continue;
                }
            }

            let embedding: Vec<f32> = bincode::deserialize(&embedding_bytes)
                .map_err(|e| anyhow::anyhow!("Embedding deserialization error: {}", e))?;
            matches.push((id, cosine_similarity(&query_embedding, &embedding)));
        }

        matches.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(max_results);
        Ok(matches)
    }

    pub fn get(&self, id: &str) -> anyhow::Result<Option<(String, Map<String, Value>)>> {
        let conn = self.get_conn()?;
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT document, metadata FROM vectors WHERE collection = ?1 AND id = ?2",
                params![&self.name, id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((document, metadata_raw)) => {
                let metadata = serde_json::from_str(&metadata_raw)
                    .map_err(|e| anyhow::anyhow!("Metadata JSON error: {}", e))?;
                Ok(Some((document, metadata)))
            }
            None => Ok(None),
        }
    }

    pub fn delete(&self, id: &str) -> anyhow::Result<bool> {
        let conn = self.get_conn()?;
        let deleted = conn.execute(
            "DELETE FROM vectors WHERE collection = ?1 AND id = ?2",
            params![&self.name, id],
        )?;
        Ok(deleted > 0)
    }

    pub fn count(&self) -> anyhow::Result<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM vectors WHERE collection = ?1",
            [&self.name],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
