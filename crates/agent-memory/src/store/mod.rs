//! Record store module - SQLite-backed, authoritative storage for memory
//! items, topics, and summaries.

pub mod memory_store;
pub mod schema;
pub mod summary_store;
pub mod topic_store;

pub use memory_store::MemoryItemStore;
pub use schema::*;
pub use summary_store::SummaryStore;
pub use topic_store::{EmptyTopicDeletion, TopicStore};

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OptionalExtension;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// The single source of truth. Every logical write here is one durable
/// transaction; multi-step consistency across stores is the orchestrator's
/// job, not this one's.
pub struct RecordStore {
    pub memories: MemoryItemStore,
    pub summaries: SummaryStore,
    pub topics: TopicStore,
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl RecordStore {
    pub fn open(db_path: &Path) -> anyhow::Result<Self> {
        info!("Opening record store at: {}", db_path.display());
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(db_path)
            .with_flags(
                rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                    | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                    | rusqlite::OpenFlags::SQLITE_OPEN_FULL_MUTEX,
            )
            .with_init(|conn| {
                // Foreign keys are per-connection in SQLite; every pooled
                // connection needs them on for the cascades to hold.
                conn.execute_batch(
                    "PRAGMA foreign_keys = ON;
                     PRAGMA synchronous = NORMAL;
                     PRAGMA busy_timeout = 5000;",
                )
            });

        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| anyhow::anyhow!("Failed to create connection pool: {}", e))?;

        {
            let conn = pool.get()?;
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            conn.execute_batch(schema::SCHEMA_SQL)?;
        }

        let pool = Arc::new(pool);
        info!("Record store initialized successfully");
        Ok(Self::from_pool(pool))
    }

    /// In-memory store for tests. A single pooled connection, since each
    /// SQLite `:memory:` connection is its own database.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder().max_size(1).build(manager)?;
        {
            let conn = pool.get()?;
            conn.execute_batch(schema::SCHEMA_SQL)?;
        }
        Ok(Self::from_pool(Arc::new(pool)))
    }

    fn from_pool(pool: Arc<Pool<SqliteConnectionManager>>) -> Self {
        Self {
            memories: MemoryItemStore::new(Arc::clone(&pool)),
            summaries: SummaryStore::new(Arc::clone(&pool)),
            topics: TopicStore::new(Arc::clone(&pool)),
            pool,
        }
    }

    /// Idempotent schema setup. With `reset`, drops and recreates all tables.
    pub fn initialize(&self, reset: bool) -> anyhow::Result<()> {
        let conn = self.pool.get()?;
        if reset {
            info!("Resetting record store");
            conn.execute_batch(schema::DROP_SQL)?;
        }
        conn.execute_batch(schema::SCHEMA_SQL)?;
        Ok(())
    }

    pub fn stats(&self) -> anyhow::Result<StoreStats> {
        let conn = self.pool.get()?;

        let total_memories: i64 =
            conn.query_row("SELECT COUNT(*) FROM memory_items", [], |row| row.get(0))?;
        let total_topics: i64 = conn.query_row("SELECT COUNT(*) FROM topics", [], |row| row.get(0))?;
        let total_summaries: i64 =
            conn.query_row("SELECT COUNT(*) FROM summaries", [], |row| row.get(0))?;

        let mut stmt =
            conn.prepare("SELECT name, item_count FROM topics ORDER BY item_count DESC LIMIT 5")?;
        let mut rows = stmt.query([])?;
        let mut top_topics = Vec::new();
        while let Some(row) = rows.next()? {
            top_topics.push(TopicCount {
                name: row.get(0)?,
                count: row.get(1)?,
            });
        }

        let latest_item_at: Option<String> = conn
            .query_row(
                "SELECT created_at FROM memory_items ORDER BY created_at DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        Ok(StoreStats {
            total_memories,
            total_topics,
            total_summaries,
            top_topics,
            latest_item_at: latest_item_at.as_deref().map(parse_timestamp),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn test_store() -> RecordStore {
        RecordStore::open_in_memory().expect("in-memory store")
    }

    fn store_item(store: &RecordStore, content: &str, topic: &str) -> String {
        let id = Uuid::new_v4().to_string();
        store
            .memories
            .create(&id, content, topic, &[], Utc::now())
            .expect("create");
        id
    }

    fn topic_count(store: &RecordStore, name: &str) -> Option<i64> {
        store.topics.get(name).unwrap().map(|t| t.item_count)
    }

    // ===== Topic Counter Tests =====

    #[test]
    fn test_topic_counter_increments_and_decrements() {
        let store = test_store();
        let a = store_item(&store, "content one", "topicA");
        let b = store_item(&store, "content two", "topicA");
        assert_eq!(topic_count(&store, "topicA"), Some(2));

        assert!(store.memories.delete(&a).unwrap());
        assert_eq!(topic_count(&store, "topicA"), Some(1));

        // Last item removed: the topic row goes with it
        assert!(store.memories.delete(&b).unwrap());
        assert_eq!(topic_count(&store, "topicA"), None);
    }

    #[test]
    fn test_delete_missing_item_reports_false() {
        let store = test_store();
        assert!(!store.memories.delete("no-such-id").unwrap());
    }

    // ===== Cascade Tests =====

    #[test]
    fn test_summary_cascade_on_memory_delete() {
        let store = test_store();
        let memory_id = store_item(&store, "content base", "topicB");
        let summary_id = Uuid::new_v4().to_string();
        store
            .summaries
            .create(&summary_id, &memory_id, "abstractive_medium", "summary here", Utc::now())
            .unwrap();

        assert!(store.memories.delete(&memory_id).unwrap());
        assert!(store.summaries.get_by_id(&summary_id).unwrap().is_none());
        assert!(store
            .summaries
            .get_for_memory(&memory_id, "abstractive_medium")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_update_topic_on_last_item_keeps_memory() {
        // Moving the only item out of a topic deletes the old topic row; the
        // write order must not let that cascade take the memory with it.
        let store = test_store();
        let id = store_item(&store, "survivor content", "old_topic");

        assert!(store
            .memories
            .update(&id, None, Some("new_topic"), None, Utc::now())
            .unwrap());

        let item = store.memories.get(&id).unwrap().expect("memory survived");
        assert_eq!(item.topic, "new_topic");
        assert_eq!(item.version, 2);
        assert_eq!(topic_count(&store, "old_topic"), None);
        assert_eq!(topic_count(&store, "new_topic"), Some(1));
    }

    // ===== Update Tests =====

    #[test]
    fn test_partial_update_preserves_other_fields() {
        let store = test_store();
        let id = store_item(&store, "original content", "topicC");
        let before = store.memories.get(&id).unwrap().unwrap();

        store
            .memories
            .update(&id, None, None, Some(&["a".to_string(), "b".to_string()]), Utc::now())
            .unwrap();

        let after = store.memories.get(&id).unwrap().unwrap();
        assert_eq!(after.content, before.content);
        assert_eq!(after.topic, before.topic);
        assert_eq!(after.tags, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(after.version, before.version + 1);
        assert_eq!(after.created_at, before.created_at);
    }

    #[test]
    fn test_content_update_refreshes_size() {
        let store = test_store();
        let id = store_item(&store, "short", "topicD");
        store
            .memories
            .update(&id, Some("a much longer replacement body"), None, None, Utc::now())
            .unwrap();
        let item = store.memories.get(&id).unwrap().unwrap();
        assert_eq!(item.content_size, "a much longer replacement body".chars().count());
    }

    #[test]
    fn test_update_missing_item_reports_false() {
        let store = test_store();
        assert!(!store
            .memories
            .update("ghost", Some("x"), None, None, Utc::now())
            .unwrap());
    }

    // ===== Empty Topic Cleanup Tests =====

    #[test]
    fn test_delete_if_empty_outcomes() {
        let store = test_store();
        let id = store_item(&store, "held content", "held");

        assert_eq!(
            store.topics.delete_if_empty("held").unwrap(),
            EmptyTopicDeletion::NotEmpty(1)
        );
        assert_eq!(
            store.topics.delete_if_empty("missing").unwrap(),
            EmptyTopicDeletion::NotFound
        );

        // Moving the item away already removes the emptied topic row, so the
        // explicit cleanup then reports it as gone.
        store
            .memories
            .update(&id, None, Some("elsewhere"), None, Utc::now())
            .unwrap();
        assert_eq!(
            store.topics.delete_if_empty("held").unwrap(),
            EmptyTopicDeletion::NotFound
        );
    }

    // ===== Stats Tests =====

    #[test]
    fn test_stats_counts() {
        let store = test_store();
        store_item(&store, "one", "t1");
        store_item(&store, "two", "t1");
        store_item(&store, "three", "t2");

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_memories, 3);
        assert_eq!(stats.total_topics, 2);
        assert_eq!(stats.top_topics[0].name, "t1");
        assert_eq!(stats.top_topics[0].count, 2);
        assert!(stats.latest_item_at.is_some());
    }

    #[test]
    fn test_reset_clears_everything() {
        let store = test_store();
        store_item(&store, "doomed", "t");
        store.initialize(true).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.total_memories, 0);
        assert_eq!(stats.total_topics, 0);
        assert_eq!(stats.total_summaries, 0);
    }

    // ===== Counter Invariant (property) =====

    #[derive(Debug, Clone)]
    enum Op {
        Store(usize),
        Delete(usize),
        Retopic(usize, usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..3).prop_map(Op::Store),
            (0usize..64).prop_map(Op::Delete),
            ((0usize..64), (0usize..3)).prop_map(|(i, t)| Op::Retopic(i, t)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn topic_counts_always_match_live_items(ops in proptest::collection::vec(op_strategy(), 1..32)) {
            const TOPICS: [&str; 3] = ["alpha", "beta", "gamma"];
            let store = test_store();
            let mut live: Vec<(String, &str)> = Vec::new();

            for op in ops {
                match op {
                    Op::Store(t) => {
                        let id = store_item(&store, "generated content", TOPICS[t]);
                        live.push((id, TOPICS[t]));
                    }
                    Op::Delete(i) if !live.is_empty() => {
                        let (id, _) = live.remove(i % live.len());
                        prop_assert!(store.memories.delete(&id).unwrap());
                    }
                    Op::Retopic(i, t) if !live.is_empty() => {
                        let idx = i % live.len();
                        let id = live[idx].0.clone();
                        prop_assert!(store.memories.update(&id, None, Some(TOPICS[t]), None, Utc::now()).unwrap());
                        live[idx].1 = TOPICS[t];
                    }
                    _ => {}
                }

                let mut expected: HashMap<&str, i64> = HashMap::new();
                for (_, topic) in &live {
                    *expected.entry(*topic).or_default() += 1;
                }
                for topic in store.topics.list().unwrap() {
                    prop_assert!(topic.item_count >= 0);
                    let want = expected.get(topic.name.as_str()).copied().unwrap_or(0);
                    prop_assert_eq!(topic.item_count, want);
                }
                // Every live item's topic has a row
                for (_, topic) in &live {
                    prop_assert!(expected[topic] > 0);
                    prop_assert!(store.topics.get(topic).unwrap().is_some());
                }
            }
        }
    }
}
