//! Vector index module - derived semantic index over memory content, summary
//! text, and topic descriptions.
//!
//! Nothing here is authoritative. Entries are best-effort shadows of record
//! store rows, safe to drop and rebuild, and callers must re-resolve every
//! returned id through the record store before trusting it.

pub mod collection;
pub mod embedding;

pub use collection::VectorCollection;
pub use embedding::{TextEmbedder, EMBEDDING_DIM};

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub const MEMORY_COLLECTION: &str = "memory_items";
pub const SUMMARY_COLLECTION: &str = "summaries";
pub const TOPIC_COLLECTION: &str = "topics";

const VECTOR_SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS vectors (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    document TEXT NOT NULL,
    embedding BLOB NOT NULL,
    metadata TEXT NOT NULL,
    PRIMARY KEY (collection, id)
);
";

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub memory_vectors: i64,
    pub summary_vectors: i64,
    pub topic_vectors: i64,
}

pub struct VectorIndex {
    pool: Arc<Pool<SqliteConnectionManager>>,
    memories: VectorCollection,
    summaries: VectorCollection,
    topics: VectorCollection,
}

impl VectorIndex {
    pub fn open(db_path: &Path) -> anyhow::Result<Self> {
        info!("Opening vector index at: {}", db_path.display());
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(db_path)
            .with_flags(
                rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                    | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                    | rusqlite::OpenFlags::SQLITE_OPEN_FULL_MUTEX,
            )
            .with_init(|conn| conn.execute_batch("PRAGMA busy_timeout = 5000;"));

        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| anyhow::anyhow!("Failed to create connection pool: {}", e))?;

        {
            let conn = pool.get()?;
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            conn.execute_batch(VECTOR_SCHEMA_SQL)?;
        }

        Ok(Self::from_pool(Arc::new(pool)))
    }

    /// In-memory index for tests; a single pooled connection, same reasoning
    /// as the record store's in-memory constructor.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager)?;
        {
            let conn = pool.get()?;
            conn.execute_batch(VECTOR_SCHEMA_SQL)?;
        }
        Ok(Self::from_pool(Arc::new(pool)))
    }

    fn from_pool(pool: Arc<Pool<SqliteConnectionManager>>) -> Self {
        let embedder = Arc::new(TextEmbedder::new());
        Self {
            memories: VectorCollection::new(Arc::clone(&pool), MEMORY_COLLECTION, Arc::clone(&embedder)),
            summaries: VectorCollection::new(Arc::clone(&pool), SUMMARY_COLLECTION, Arc::clone(&embedder)),
            topics: VectorCollection::new(Arc::clone(&pool), TOPIC_COLLECTION, embedder),
            pool,
        }
    }

    /// Idempotent setup; with `reset`, drop-and-recreate as an administrative
    /// operation distinct from normal writes.
    pub fn initialize(&self, reset: bool) -> anyhow::Result<()> {
        let conn = self.pool.get()?;
        if reset {
            info!("Resetting vector index");
            conn.execute_batch("DROP TABLE IF EXISTS vectors;")?;
        }
        conn.execute_batch(VECTOR_SCHEMA_SQL)?;
        Ok(())
    }

    pub fn memories(&self) -> &VectorCollection {
        &self.memories
    }

    pub fn summaries(&self) -> &VectorCollection {
        &self.summaries
    }

    pub fn topics(&self) -> &VectorCollection {
        &self.topics
    }

    pub fn stats(&self) -> anyhow::Result<IndexStats> {
        Ok(IndexStats {
            memory_vectors: self.memories.count()?,
            summary_vectors: self.summaries.count()?,
            topic_vectors: self.topics.count()?,
        })
    }
}
