//! Opportunistic backups of the storage root.
//!
//! The scheduler keeps an in-memory cache of the last backup time behind a
//! single mutex; the due-check and the archive creation happen under the same
//! lock so concurrent store operations can never both decide a backup is due.
//! Timestamps are parsed from archive filenames, never from file mtimes,
//! which do not survive copy/restore.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

const BACKUP_PREFIX: &str = "memory_backup_";
const BACKUP_SUFFIX: &str = ".tar.gz";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Debug, Clone, Serialize)]
pub struct BackupEntry {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub created: String,
}

#[derive(Debug, Default)]
struct BackupState {
    initialized: bool,
    last_backup: Option<NaiveDateTime>,
}

pub struct BackupScheduler {
    storage_root: PathBuf,
    backup_dir: PathBuf,
    interval: Duration,
    retention: usize,
    state: Mutex<BackupState>,
}

impl BackupScheduler {
    pub fn new(
        storage_root: PathBuf,
        backup_dir: PathBuf,
        interval: Duration,
        retention: usize,
    ) -> Self {
        Self {
            storage_root,
            backup_dir,
            interval,
            retention,
            state: Mutex::new(BackupState::default()),
        }
    }

    /// Whether the interval has elapsed since the last known backup.
    pub fn should_create_backup(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.due_unlocked(&mut state)
    }

    /// Unconditionally create a backup archive.
    pub fn create_backup(&self) -> Result<PathBuf> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.create_unlocked(&mut state)
    }

    /// Atomically check whether a backup is due and create one if so. Holding
    /// the lock across both halves closes the check-then-act race.
    pub fn create_backup_if_due(&self) -> Result<Option<PathBuf>> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !self.due_unlocked(&mut state) {
            return Ok(None);
        }
        self.create_unlocked(&mut state).map(Some)
    }

    /// Drop the cached timestamp so the next check re-scans the filesystem.
    /// Needed after a manual restore, and for test isolation.
    pub fn invalidate_cache(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *state = BackupState::default();
        info!("Backup cache invalidated");
    }

    fn due_unlocked(&self, state: &mut BackupState) -> bool {
        if !state.initialized {
            state.last_backup = self.scan_latest_backup();
            state.initialized = true;
        }

        match state.last_backup {
            None => true,
            Some(last) => Utc::now().naive_utc().signed_duration_since(last) >= self.interval,
        }
    }

    fn create_unlocked(&self, state: &mut BackupState) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.backup_dir)
            .with_context(|| format!("Failed to create backup dir {}", self.backup_dir.display()))?;
        if !self.storage_root.exists() {
            anyhow::bail!("Storage root {} does not exist", self.storage_root.display());
        }

        let backup_time = Utc::now().naive_utc();
        let name = format!(
            "{}{}{}",
            BACKUP_PREFIX,
            backup_time.format(TIMESTAMP_FORMAT),
            BACKUP_SUFFIX
        );
        let path = self.backup_dir.join(&name);
        info!("Creating backup: {}", name);

        let file = File::create(&path)
            .with_context(|| format!("Failed to create backup file {}", path.display()))?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let base = self
            .storage_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "memory_db".to_string());
        builder
            .append_dir_all(&base, &self.storage_root)
            .context("Failed to archive storage root")?;
        builder
            .into_inner()
            .and_then(|encoder| encoder.finish())
            .context("Failed to finalize backup archive")?;

        // The cache is updated synchronously at creation so a concurrent
        // caller waiting on the lock sees this backup immediately.
        state.last_backup = Some(backup_time);
        state.initialized = true;

        if let Err(e) = self.cleanup_old_backups() {
            warn!("Failed to cleanup old backups: {}", e);
        }

        info!("Backup created successfully: {}", path.display());
        Ok(path)
    }

    fn scan_latest_backup(&self) -> Option<NaiveDateTime> {
        self.collect_backups().into_iter().map(|(ts, _)| ts).max()
    }

    fn collect_backups(&self) -> Vec<(NaiveDateTime, PathBuf)> {
        let Ok(entries) = std::fs::read_dir(&self.backup_dir) else {
            return Vec::new();
        };

        entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                parse_backup_timestamp(&path).map(|ts| (ts, path))
            })
            .collect()
    }

    /// Remove old backups, keeping only the most recent N by filename
    /// timestamp.
    pub fn cleanup_old_backups(&self) -> Result<usize> {
        let mut backups = self.collect_backups();
        backups.sort_by(|a, b| b.0.cmp(&a.0));

        let mut deleted = 0;
        for (_, path) in backups.into_iter().skip(self.retention) {
            info!("Deleting old backup: {}", path.display());
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to delete old backup {}", path.display()))?;
            deleted += 1;
        }

        Ok(deleted)
    }

    /// All available backups, newest first.
    pub fn list_backups(&self) -> Vec<BackupEntry> {
        let mut backups = self.collect_backups();
        backups.sort_by(|a, b| b.0.cmp(&a.0));

        backups
            .into_iter()
            .filter_map(|(ts, path)| {
                let name = path.file_name()?.to_string_lossy().into_owned();
                let size_bytes = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                Some(BackupEntry {
                    name,
                    path,
                    size_bytes,
                    created: ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                })
            })
            .collect()
    }
}

fn parse_backup_timestamp(path: &Path) -> Option<NaiveDateTime> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_prefix(BACKUP_PREFIX)?.strip_suffix(BACKUP_SUFFIX)?;
    match NaiveDateTime::parse_from_str(stem, TIMESTAMP_FORMAT) {
        Ok(ts) => Some(ts),
        Err(_) => {
            warn!("Skipping backup with invalid filename: {}", name);
            None
        }
    }
}
