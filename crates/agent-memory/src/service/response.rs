//! Structured operation results.
//!
//! Store/update/delete report one flag per sub-step instead of a single
//! boolean: best-effort failures (vector indexing, summary generation) are
//! expected and recoverable, so callers need to see "stored but not
//! searchable" and "stored but not summarized" as distinct degraded states
//! rather than as hard failures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::summarize::{SummaryLength, SummaryStyle};

/// What retrieve should put into each result record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnType {
    #[default]
    FullText,
    Summary,
    Both,
}

impl ReturnType {
    pub fn includes_content(&self) -> bool {
        matches!(self, ReturnType::FullText | ReturnType::Both)
    }

    pub fn includes_summary(&self) -> bool {
        matches!(self, ReturnType::Summary | ReturnType::Both)
    }
}

/// Outcome of the automatic tiered summarization attached to store/update.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SummaryInfo {
    pub summary_id: Option<String>,
    pub summary_type: Option<String>,
    pub summary_generated: bool,
    pub summary_stored: bool,
    pub summary_indexed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreReceipt {
    pub memory_id: String,
    pub topic: String,
    pub tags: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub content_size: usize,
    /// Durability boundary; always true on the success path since a failed
    /// record write fails the whole operation.
    pub record_stored: bool,
    pub memory_indexed: bool,
    pub topic_indexed: bool,
    pub summary: SummaryInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateReceipt {
    pub memory_id: String,
    pub updated_content: bool,
    pub updated_topic: bool,
    pub updated_tags: bool,
    pub version: i64,
    pub timestamp: DateTime<Utc>,
    pub memory_indexed: bool,
    pub topic_indexed: bool,
    /// Present only when the content changed and the summary was regenerated.
    pub summary: Option<SummaryInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteReceipt {
    pub memory_id: String,
    pub record_deleted: bool,
    pub memory_vector_deleted: bool,
    pub summary_vectors_deleted: usize,
    pub summary_vectors_total: usize,
}

/// One retrieval hit, assembled from the authoritative record store.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedMemory {
    pub id: String,
    pub topic: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub total_memories: i64,
    pub total_topics: i64,
    pub total_summaries: i64,
    pub top_topics: Vec<crate::store::TopicCount>,
    pub latest_item_at: Option<DateTime<Utc>>,
    pub memory_vectors: i64,
    pub summary_vectors: i64,
    pub topic_vectors: i64,
    pub storage_root: String,
    pub system_time: DateTime<Utc>,
}

/// Ad-hoc summarization request, distinct from automatic tiered summaries.
/// At least one of `memory_id`/`query`/`topic` must select the content.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummarizeRequest {
    pub memory_id: Option<String>,
    pub query: Option<String>,
    pub topic: Option<String>,
    pub style: Option<SummaryStyle>,
    pub length: Option<SummaryLength>,
}
