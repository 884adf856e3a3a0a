//! Persistent memory store for LLM agents.
//!
//! An authoritative SQLite record store holds memory items, topics, and
//! derived summaries; a best-effort vector index over content and summaries
//! provides semantic candidate retrieval; a size-tiered summarization
//! strategy keeps retrieval cheap without paying LLM cost for trivial
//! content. The [`service::MemoryService`] orchestrator ties them together
//! and defines the partial-failure behavior across the two stores.

pub mod backup;
pub mod config;
pub mod index;
pub mod service;
pub mod store;
pub mod summarize;
pub mod telemetry;

// Public API exports
pub use backup::{BackupEntry, BackupScheduler};
pub use config::Config;
pub use service::{
    DeleteReceipt, MemoryService, RetrievedMemory, ReturnType, StoreReceipt, SummarizeRequest,
    SummaryInfo, SystemStatus, UpdateReceipt,
};
pub use store::{MemoryItem, RecordStore, SummaryRecord, Topic};
pub use summarize::{
    select_tier, LlmSummarizer, Summarizer, SummaryLength, SummaryStyle, SummaryTier,
    TierThresholds,
};
