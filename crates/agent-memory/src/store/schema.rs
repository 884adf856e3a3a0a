//! Row types and schema for the authoritative record store.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A stored unit of knowledge. The record store owns the truth for these rows;
/// the vector index only carries a derived shadow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    pub id: String,
    pub content: String,
    pub topic: String,
    pub tags: Vec<String>,
    pub content_size: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

/// Aggregate counter for a topic name. `item_count` tracks live memory items
/// referencing the topic and is floored at zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    pub description: Option<String>,
    pub item_count: i64,
    pub created_at: DateTime<Utc>,
}

/// A derived, size-tiered condensation of a memory item's content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub id: String,
    pub memory_id: String,
    pub summary_type: String,
    pub summary_text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicCount {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_memories: i64,
    pub total_topics: i64,
    pub total_summaries: i64,
    pub top_topics: Vec<TopicCount>,
    pub latest_item_at: Option<DateTime<Utc>>,
}

/// The topic→memory cascade is load-bearing: it is why memory rows must be
/// repointed to their new topic before an emptied old topic row is removed.
pub const SCHEMA_SQL: &str = "
-- Topics table
CREATE TABLE IF NOT EXISTS topics (
    name TEXT PRIMARY KEY,
    description TEXT,
    created_at TEXT NOT NULL,
    item_count INTEGER NOT NULL DEFAULT 0
);
-- Memory items table
CREATE TABLE IF NOT EXISTS memory_items (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    topic TEXT NOT NULL,
    tags TEXT NOT NULL,
    content_size INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 1,
    FOREIGN KEY (topic) REFERENCES topics(name) ON DELETE CASCADE
);
-- Summaries table
CREATE TABLE IF NOT EXISTS summaries (
    id TEXT PRIMARY KEY,
    memory_id TEXT NOT NULL,
    summary_type TEXT NOT NULL,
    summary_text TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (memory_id) REFERENCES memory_items(id) ON DELETE CASCADE
);
-- Indexes for lookups
CREATE INDEX IF NOT EXISTS idx_memory_items_topic ON memory_items (topic);
CREATE INDEX IF NOT EXISTS idx_summaries_memory ON summaries (memory_id);
";

pub const DROP_SQL: &str = "
DROP TABLE IF EXISTS summaries;
DROP TABLE IF EXISTS memory_items;
DROP TABLE IF EXISTS topics;
";

/// Parse a stored timestamp, tolerating the couple of formats older rows may
/// carry. Falls back to now rather than failing a whole read.
pub fn parse_timestamp(value: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return DateTime::from_naive_utc_and_offset(dt, Utc);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        return DateTime::from_naive_utc_and_offset(dt, Utc);
    }
    warn!("Failed to parse stored timestamp: {}", value);
    Utc::now()
}

pub fn encode_tags(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

pub fn decode_tags(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_else(|_| {
        warn!("Failed to parse stored tags: {}", raw);
        Vec::new()
    })
}
