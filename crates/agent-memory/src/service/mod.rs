//! Memory lifecycle orchestration.
//!
//! The service coordinates the authoritative record store, the derived vector
//! index, the summarizer, and the backup scheduler. The record store write is
//! the transaction boundary of every mutating operation; everything that
//! follows it is an idempotent, replayable, best-effort side effect that is
//! reported in the receipt but never rolled back and never allowed to fail
//! the operation.

pub mod response;

pub use response::*;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backup::BackupScheduler;
use crate::config::Config;
use crate::index::VectorIndex;
use crate::store::{encode_tags, MemoryItem, RecordStore, Topic};
use crate::store::topic_store::EmptyTopicDeletion;
use crate::summarize::{
    select_tier, Summarizer, SummaryLength, SummaryStyle, SummaryTier, TierThresholds,
};

/// How many memory-content candidates an ad-hoc query/topic summarization
/// pulls before joining their contents.
const SUMMARIZE_CANDIDATES: usize = 10;

pub struct MemoryService {
    records: RecordStore,
    index: VectorIndex,
    summarizer: Arc<dyn Summarizer>,
    backups: Arc<BackupScheduler>,
    thresholds: TierThresholds,
    default_max_results: usize,
    storage_root: PathBuf,
}

impl MemoryService {
    pub fn open(config: &Config, summarizer: Arc<dyn Summarizer>) -> Result<Self> {
        let records = RecordStore::open(&config.record_db_path())?;
        let index = VectorIndex::open(&config.vector_db_path())?;
        let backups = Arc::new(BackupScheduler::new(
            config.storage_root.clone(),
            config.backup_dir.clone(),
            chrono::Duration::hours(config.backup_interval_hours as i64),
            config.backup_retention_count,
        ));

        Ok(Self::new(
            records,
            index,
            summarizer,
            backups,
            config.thresholds(),
            config.default_max_results,
            config.storage_root.clone(),
        ))
    }

    pub fn new(
        records: RecordStore,
        index: VectorIndex,
        summarizer: Arc<dyn Summarizer>,
        backups: Arc<BackupScheduler>,
        thresholds: TierThresholds,
        default_max_results: usize,
        storage_root: PathBuf,
    ) -> Self {
        Self {
            records,
            index,
            summarizer,
            backups,
            thresholds,
            default_max_results,
            storage_root,
        }
    }

    pub fn backups(&self) -> &BackupScheduler {
        &self.backups
    }

    /// Initialize both stores. Safe to call repeatedly; `reset` drops and
    /// recreates everything in the record store and the vector index.
    pub fn initialize(&self, reset: bool) -> Result<()> {
        self.records.initialize(reset)?;
        self.index.initialize(reset)?;
        info!("Memory system initialized (reset: {})", reset);
        Ok(())
    }

    /// Store a new memory item.
    ///
    /// The record store write (memory row + topic counter) is the durability
    /// boundary: if it fails, the whole operation fails. Vector indexing and
    /// summarization afterwards are best-effort and only flip flags in the
    /// receipt.
    pub async fn store(&self, content: &str, topic: &str, tags: Vec<String>) -> Result<StoreReceipt> {
        if content.trim().is_empty() {
            anyhow::bail!("Content must not be empty");
        }
        if topic.trim().is_empty() {
            anyhow::bail!("Topic must not be empty");
        }

        self.spawn_backup_check();

        let memory_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let item = self
            .records
            .memories
            .create(&memory_id, content, topic, &tags, now)?;

        let memory_indexed = self.index_memory(&item);
        let topic_indexed = self.index_topic(topic, &tags, now);

        let tier = select_tier(item.content_size, &self.thresholds);
        let summary_text = self.tiered_summary_text(content, tier).await;
        let summary = self.persist_new_summary(&memory_id, topic, tier, summary_text, now);

        Ok(StoreReceipt {
            memory_id,
            topic: topic.to_string(),
            tags,
            timestamp: now,
            content_size: item.content_size,
            record_stored: true,
            memory_indexed,
            topic_indexed,
            summary,
        })
    }

    /// Semantic retrieval over the summary collection.
    ///
    /// Summaries are queried rather than full content: they are shorter and
    /// cheaper to match, and each memory has at most one, so a memory cannot
    /// crowd the result list with duplicate hits. Every candidate is then
    /// resolved through the record store; hits whose rows have vanished in
    /// the meantime are expected index staleness and are skipped, not errors.
    ///
    /// Returns an empty list, never an error, when nothing matches.
    pub async fn retrieve(
        &self,
        query: &str,
        max_results: Option<usize>,
        topic: Option<&str>,
        return_type: ReturnType,
    ) -> Result<Vec<RetrievedMemory>> {
        let limit = max_results.unwrap_or(self.default_max_results);
        let filter = topic.map(|t| ("topic", t));
        let hits = self.index.summaries().query(query, limit, filter)?;

        let mut results = Vec::new();
        for (summary_id, score) in hits {
            let Some(summary) = self.records.summaries.get_by_id(&summary_id)? else {
                warn!("Skipping orphaned summary vector {}", summary_id);
                continue;
            };
            let Some(item) = self.records.memories.get(&summary.memory_id)? else {
                warn!(
                    "Skipping summary {} whose memory {} no longer exists",
                    summary_id, summary.memory_id
                );
                continue;
            };

            results.push(RetrievedMemory {
                id: item.id,
                topic: item.topic,
                tags: item.tags,
                created_at: item.created_at,
                updated_at: item.updated_at,
                content: return_type.includes_content().then_some(item.content),
                summary: return_type.includes_summary().then_some(summary.summary_text),
                score,
            });
        }

        debug!("Retrieved {} memories for query", results.len());
        Ok(results)
    }

    /// Update content, topic, and/or tags of an existing memory item.
    ///
    /// The record row is updated (and durable) before any topic bookkeeping
    /// resolves, so an emptied old topic's removal can never cascade onto the
    /// item being moved. Re-indexing and summary regeneration afterwards are
    /// best-effort, exactly as in [`MemoryService::store`].
    pub async fn update(
        &self,
        memory_id: &str,
        content: Option<&str>,
        topic: Option<&str>,
        tags: Option<Vec<String>>,
    ) -> Result<UpdateReceipt> {
        if content.is_none() && topic.is_none() && tags.is_none() {
            anyhow::bail!("At least one of content, topic, or tags must be provided");
        }

        let current = self
            .records
            .memories
            .get(memory_id)?
            .with_context(|| format!("Memory item {} not found", memory_id))?;

        let now = Utc::now();
        let applied = self
            .records
            .memories
            .update(memory_id, content, topic, tags.as_deref(), now)?;
        if !applied {
            anyhow::bail!("Memory item {} not found", memory_id);
        }

        // Re-fetch so the index push carries the merged row, including the
        // fields this update did not touch.
        let updated = self
            .records
            .memories
            .get(memory_id)?
            .with_context(|| format!("Memory item {} disappeared during update", memory_id))?;

        let memory_indexed = self.index_memory(&updated);
        let topic_changed = updated.topic != current.topic;
        let topic_indexed = if topic_changed {
            self.index_topic(&updated.topic, &updated.tags, now)
        } else {
            true
        };

        let summary = if content.is_some() {
            let tier = select_tier(updated.content_size, &self.thresholds);
            let summary_text = self.tiered_summary_text(&updated.content, tier).await;
            Some(self.refresh_summary(&updated, tier, summary_text, now)?)
        } else {
            None
        };

        Ok(UpdateReceipt {
            memory_id: memory_id.to_string(),
            updated_content: content.is_some(),
            updated_topic: topic.is_some(),
            updated_tags: tags.is_some(),
            version: updated.version,
            timestamp: now,
            memory_indexed,
            topic_indexed,
            summary,
        })
    }

    /// Delete a memory item, its summaries, and their vectors.
    ///
    /// Summary ids are collected before anything is removed, because the
    /// relational cascade would otherwise erase the only mapping from the
    /// memory to its summary vectors. Deleting an id that does not exist is a
    /// reported failure, distinguishing "nothing to delete" from "deleted".
    pub async fn delete(&self, memory_id: &str) -> Result<DeleteReceipt> {
        if self.records.memories.get(memory_id)?.is_none() {
            anyhow::bail!("Memory item {} not found", memory_id);
        }

        let summaries = self.records.summaries.list_for_memory(memory_id)?;
        let mut summary_vectors_deleted = 0;
        for summary in &summaries {
            match self.index.summaries().delete(&summary.id) {
                Ok(true) => summary_vectors_deleted += 1,
                Ok(false) => debug!("Summary {} had no vector to delete", summary.id),
                Err(e) => warn!("Failed to delete summary vector {}: {:#}", summary.id, e),
            }
        }

        let record_deleted = self.records.memories.delete(memory_id)?;
        if !record_deleted {
            anyhow::bail!("Memory item {} not found", memory_id);
        }

        let memory_vector_deleted = match self.index.memories().delete(memory_id) {
            Ok(deleted) => deleted,
            Err(e) => {
                warn!("Failed to delete memory vector {}: {:#}", memory_id, e);
                false
            }
        };

        Ok(DeleteReceipt {
            memory_id: memory_id.to_string(),
            record_deleted,
            memory_vector_deleted,
            summary_vectors_deleted,
            summary_vectors_total: summaries.len(),
        })
    }

    pub fn list_topics(&self) -> Result<Vec<Topic>> {
        self.records.topics.list()
    }

    pub fn get_status(&self) -> Result<SystemStatus> {
        let store_stats = self.records.stats()?;
        let index_stats = self.index.stats()?;

        Ok(SystemStatus {
            total_memories: store_stats.total_memories,
            total_topics: store_stats.total_topics,
            total_summaries: store_stats.total_summaries,
            top_topics: store_stats.top_topics,
            latest_item_at: store_stats.latest_item_at,
            memory_vectors: index_stats.memory_vectors,
            summary_vectors: index_stats.summary_vectors,
            topic_vectors: index_stats.topic_vectors,
            storage_root: self.storage_root.display().to_string(),
            system_time: Utc::now(),
        })
    }

    /// Explicitly delete a topic that no longer holds any memory items.
    pub fn delete_empty_topic(&self, name: &str) -> Result<()> {
        match self.records.topics.delete_if_empty(name)? {
            EmptyTopicDeletion::Deleted => {
                if let Err(e) = self.index.topics().delete(name) {
                    warn!("Failed to delete topic vector {}: {:#}", name, e);
                }
                Ok(())
            }
            EmptyTopicDeletion::NotEmpty(count) => anyhow::bail!(
                "Topic '{}' could not be deleted because it is not empty ({} items)",
                name,
                count
            ),
            EmptyTopicDeletion::NotFound => anyhow::bail!("Topic '{}' not found", name),
        }
    }

    /// Ad-hoc summarization of one memory, or of the memories matching a
    /// query/topic. Returns `Ok(None)` when the search found nothing to
    /// summarize, which is not a failure.
    pub async fn summarize(&self, request: SummarizeRequest) -> Result<Option<String>> {
        let style = request.style.unwrap_or(SummaryStyle::Abstractive);
        let length = request.length.unwrap_or(SummaryLength::Medium);

        if request.memory_id.is_none() && request.query.is_none() && request.topic.is_none() {
            anyhow::bail!("At least one of memory_id, query, or topic must be provided");
        }
        if style == SummaryStyle::QueryFocused && request.query.is_none() {
            anyhow::bail!("A query must be provided for query_focused summaries");
        }

        let content = if let Some(memory_id) = &request.memory_id {
            self.records
                .memories
                .get(memory_id)?
                .with_context(|| format!("Memory item {} not found", memory_id))?
                .content
        } else {
            // Broad search over full content, not summaries: the joined text
            // feeds a fresh summarization pass, so recall beats precision.
            let query_text = request.query.clone().unwrap_or_default();
            let filter = request.topic.as_deref().map(|t| ("topic", t));
            let hits = self
                .index
                .memories()
                .query(&query_text, SUMMARIZE_CANDIDATES, filter)?;

            let mut contents = Vec::new();
            for (memory_id, _) in hits {
                match self.records.memories.get(&memory_id)? {
                    Some(item) => contents.push(item.content),
                    None => warn!("Skipping orphaned memory vector {}", memory_id),
                }
            }
            if contents.is_empty() {
                return Ok(None);
            }
            contents.join("\n\n")
        };

        let query = if style == SummaryStyle::QueryFocused {
            request.query.as_deref()
        } else {
            None
        };
        let summary = self
            .summarizer
            .generate(&content, style, length, query)
            .await
            .context("Failed to generate summary")?;
        Ok(Some(summary))
    }

    // ----- best-effort side effects -----

    /// Kick the backup scheduler without waiting on it. A failed or skipped
    /// backup never affects the triggering operation.
    fn spawn_backup_check(&self) {
        let backups = Arc::clone(&self.backups);
        tokio::task::spawn_blocking(move || match backups.create_backup_if_due() {
            Ok(Some(path)) => info!("Created backup {}", path.display()),
            Ok(None) => {}
            Err(e) => warn!("Opportunistic backup failed: {:#}", e),
        });
    }

    fn index_memory(&self, item: &MemoryItem) -> bool {
        match self
            .index
            .memories()
            .upsert(&item.id, &item.content, memory_metadata(item))
        {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to index memory {}: {:#}", item.id, e);
                false
            }
        }
    }

    fn index_topic(&self, name: &str, tags: &[String], now: DateTime<Utc>) -> bool {
        match self
            .index
            .topics()
            .upsert(name, &topic_document(name, tags), topic_metadata(name, tags, now))
        {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to index topic {}: {:#}", name, e);
                false
            }
        }
    }

    /// Produce the summary text for a tier: the content itself for the direct
    /// tier, otherwise one bounded generator call whose failure degrades to
    /// "no summary".
    async fn tiered_summary_text(&self, content: &str, tier: SummaryTier) -> Option<String> {
        match tier.generation_params() {
            None => Some(content.to_string()),
            Some((style, length)) => {
                match self.summarizer.generate(content, style, length, None).await {
                    Ok(text) => Some(text),
                    Err(e) => {
                        warn!("Summary generation failed: {:#}", e);
                        None
                    }
                }
            }
        }
    }

    fn persist_new_summary(
        &self,
        memory_id: &str,
        topic: &str,
        tier: SummaryTier,
        summary_text: Option<String>,
        now: DateTime<Utc>,
    ) -> SummaryInfo {
        let mut info = SummaryInfo {
            summary_type: Some(tier.label().to_string()),
            ..SummaryInfo::default()
        };
        let Some(text) = summary_text else {
            return info;
        };
        info.summary_generated = true;

        let summary_id = Uuid::new_v4().to_string();
        match self
            .records
            .summaries
            .create(&summary_id, memory_id, tier.label(), &text, now)
        {
            Ok(_) => {
                info.summary_stored = true;
                info.summary_id = Some(summary_id.clone());
                info.summary_indexed =
                    self.index_summary(&summary_id, memory_id, tier, topic, &text);
            }
            Err(e) => {
                warn!("Failed to store summary for memory {}: {:#}", memory_id, e);
            }
        }

        info
    }

    /// Overwrite the memory's existing summary row in place, whatever tier it
    /// was generated at, or create one if the memory has none (generation may
    /// have failed at store time). Single current summary per memory.
    fn refresh_summary(
        &self,
        item: &MemoryItem,
        tier: SummaryTier,
        summary_text: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<SummaryInfo> {
        let Some(text) = summary_text else {
            return Ok(SummaryInfo {
                summary_type: Some(tier.label().to_string()),
                ..SummaryInfo::default()
            });
        };

        let existing = self.records.summaries.list_for_memory(&item.id)?.into_iter().next();
        let mut info = SummaryInfo {
            summary_type: Some(tier.label().to_string()),
            summary_generated: true,
            ..SummaryInfo::default()
        };

        match existing {
            Some(summary) => {
                info.summary_stored = self
                    .records
                    .summaries
                    .update(&summary.id, tier.label(), &text, now)?;
                info.summary_id = Some(summary.id.clone());
                info.summary_indexed =
                    self.index_summary(&summary.id, &item.id, tier, &item.topic, &text);
            }
            None => {
                debug!("Creating summary for memory {} on content update", item.id);
                let summary_id = Uuid::new_v4().to_string();
                match self
                    .records
                    .summaries
                    .create(&summary_id, &item.id, tier.label(), &text, now)
                {
                    Ok(_) => {
                        info.summary_stored = true;
                        info.summary_id = Some(summary_id.clone());
                        info.summary_indexed =
                            self.index_summary(&summary_id, &item.id, tier, &item.topic, &text);
                    }
                    Err(e) => {
                        warn!("Failed to store summary for memory {}: {:#}", item.id, e);
                    }
                }
            }
        }

        Ok(info)
    }

    fn index_summary(
        &self,
        summary_id: &str,
        memory_id: &str,
        tier: SummaryTier,
        topic: &str,
        text: &str,
    ) -> bool {
        match self.index.summaries().upsert(
            summary_id,
            text,
            summary_metadata(memory_id, tier, topic),
        ) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to index summary {}: {:#}", summary_id, e);
                false
            }
        }
    }
}

fn memory_metadata(item: &MemoryItem) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("id".to_string(), json!(item.id));
    metadata.insert("topic".to_string(), json!(item.topic));
    metadata.insert("tags".to_string(), json!(encode_tags(&item.tags)));
    metadata.insert("created_at".to_string(), json!(item.created_at.to_rfc3339()));
    metadata.insert("updated_at".to_string(), json!(item.updated_at.to_rfc3339()));
    metadata.insert("content_size".to_string(), json!(item.content_size));
    metadata
}

fn summary_metadata(memory_id: &str, tier: SummaryTier, topic: &str) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("memory_id".to_string(), json!(memory_id));
    metadata.insert("summary_type".to_string(), json!(tier.label()));
    metadata.insert("topic".to_string(), json!(topic));
    metadata
}

fn topic_document(name: &str, tags: &[String]) -> String {
    let about = if tags.is_empty() {
        name.to_string()
    } else {
        tags.join(", ")
    };
    format!("Topic {} containing information about {}", name, about)
}

fn topic_metadata(name: &str, tags: &[String], now: DateTime<Utc>) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("name".to_string(), json!(name));
    metadata.insert("tags".to_string(), json!(encode_tags(tags)));
    metadata.insert("updated_at".to_string(), json!(now.to_rfc3339()));
    metadata
}
