//! Environment-driven configuration for the memory service.

use anyhow::Result;
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::summarize::TierThresholds;

/// Runtime configuration, loaded from the environment with sensible defaults.
///
/// The record store and the vector index live under the same storage root so
/// a single backup archive captures both.
#[derive(Debug, Clone)]
pub struct Config {
    pub storage_root: PathBuf,
    pub backup_dir: PathBuf,
    pub backup_interval_hours: u64,
    pub backup_retention_count: usize,
    pub tiny_threshold: usize,
    pub small_threshold: usize,
    pub default_max_results: usize,
    pub openrouter_api_key: Option<String>,
    pub openrouter_endpoint: String,
    pub summarizer_model: String,
    pub summarizer_timeout_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            warn!("Failed to load .env file: {}. Using system environment variables.", e);
        } else {
            info!("Loaded environment variables from .env file");
        }

        let storage_root = PathBuf::from(
            env::var("MEMORY_DB_PATH").unwrap_or_else(|_| "./memory_db".into()),
        );
        let backup_dir = PathBuf::from(
            env::var("MEMORY_BACKUP_PATH").unwrap_or_else(|_| "./memory_backups".into()),
        );

        let config = Self {
            storage_root,
            backup_dir,
            backup_interval_hours: env::var("BACKUP_INTERVAL_HOURS")
                .unwrap_or_else(|_| "6".into())
                .parse()?,
            backup_retention_count: env::var("BACKUP_RETENTION_COUNT")
                .unwrap_or_else(|_| "5".into())
                .parse()?,
            tiny_threshold: env::var("SUMMARY_TINY_THRESHOLD")
                .unwrap_or_else(|_| "500".into())
                .parse()?,
            small_threshold: env::var("SUMMARY_SMALL_THRESHOLD")
                .unwrap_or_else(|_| "2000".into())
                .parse()?,
            default_max_results: env::var("DEFAULT_MAX_RESULTS")
                .unwrap_or_else(|_| "5".into())
                .parse()?,
            openrouter_api_key: env::var("OPENROUTER_API_KEY").ok(),
            openrouter_endpoint: env::var("OPENROUTER_ENDPOINT")
                .unwrap_or_else(|_| "https://openrouter.ai/api/v1".into()),
            summarizer_model: env::var("SUMMARIZER_MODEL")
                .unwrap_or_else(|_| "openai/gpt-4o-mini".into()),
            summarizer_timeout_seconds: env::var("SUMMARIZER_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "60".into())
                .parse()?,
        };

        config.validate()?;

        info!(
            "Memory configuration: storage root {}, backups every {}h (keep {}), summary tiers at {}/{} chars",
            config.storage_root.display(),
            config.backup_interval_hours,
            config.backup_retention_count,
            config.tiny_threshold,
            config.small_threshold,
        );

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.tiny_threshold >= self.small_threshold {
            anyhow::bail!(
                "SUMMARY_TINY_THRESHOLD ({}) must be smaller than SUMMARY_SMALL_THRESHOLD ({})",
                self.tiny_threshold,
                self.small_threshold
            );
        }
        if self.backup_retention_count == 0 {
            anyhow::bail!("BACKUP_RETENTION_COUNT must be at least 1");
        }
        if self.default_max_results == 0 {
            anyhow::bail!("DEFAULT_MAX_RESULTS must be at least 1");
        }
        if self.summarizer_timeout_seconds == 0 {
            anyhow::bail!("SUMMARIZER_TIMEOUT_SECONDS must be at least 1");
        }
        Ok(())
    }

    /// Path of the authoritative SQLite record store.
    pub fn record_db_path(&self) -> PathBuf {
        self.storage_root.join("memory.sqlite")
    }

    /// Path of the derived vector index, co-located under the storage root.
    pub fn vector_db_path(&self) -> PathBuf {
        self.storage_root.join("vectors.sqlite")
    }

    pub fn thresholds(&self) -> TierThresholds {
        TierThresholds {
            tiny: self.tiny_threshold,
            small: self.small_threshold,
        }
    }
}
