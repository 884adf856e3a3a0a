//! Backup scheduling behavior: archive naming, retention by parsed filename,
//! cache invalidation, and freedom from the check-then-create race.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};
use std::thread;

use agent_memory::backup::BackupScheduler;
use chrono::{Duration, Utc};
use tempfile::TempDir;

fn storage_with_data(root: &Path) -> PathBuf {
    let storage = root.join("memory_db");
    fs::create_dir_all(&storage).unwrap();
    fs::write(storage.join("memory.sqlite"), b"not really a database").unwrap();
    storage
}

fn backup_files(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .flatten()
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("memory_backup_") && name.ends_with(".tar.gz"))
        .collect();
    names.sort();
    names
}

#[test]
fn create_backup_produces_parseable_archive() {
    let dir = TempDir::new().unwrap();
    let storage = storage_with_data(dir.path());
    let backup_dir = dir.path().join("backups");
    let scheduler = BackupScheduler::new(storage, backup_dir.clone(), Duration::hours(6), 5);

    let path = scheduler.create_backup().unwrap();
    assert!(path.exists());

    let names = backup_files(&backup_dir);
    assert_eq!(names.len(), 1);

    let listed = scheduler.list_backups();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, names[0]);
    assert!(listed[0].size_bytes > 0);
}

#[test]
fn backup_is_not_due_again_within_the_interval() {
    let dir = TempDir::new().unwrap();
    let storage = storage_with_data(dir.path());
    let scheduler = BackupScheduler::new(
        storage,
        dir.path().join("backups"),
        Duration::hours(1),
        5,
    );

    assert!(scheduler.should_create_backup());
    scheduler.create_backup().unwrap();
    assert!(!scheduler.should_create_backup());
    assert!(scheduler.create_backup_if_due().unwrap().is_none());
}

#[test]
fn concurrent_due_checks_produce_exactly_one_backup() {
    let dir = TempDir::new().unwrap();
    let storage = storage_with_data(dir.path());
    let backup_dir = dir.path().join("backups");
    let scheduler = Arc::new(BackupScheduler::new(
        storage,
        backup_dir.clone(),
        Duration::hours(1),
        5,
    ));

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let scheduler = Arc::clone(&scheduler);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                scheduler.create_backup_if_due().unwrap()
            })
        })
        .collect();

    let created: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(Option::is_some)
        .collect();

    assert_eq!(created.len(), 1, "exactly one thread should have created a backup");
    assert_eq!(backup_files(&backup_dir).len(), 1);
}

#[test]
fn retention_prunes_oldest_archives_by_name() {
    let dir = TempDir::new().unwrap();
    let storage = storage_with_data(dir.path());
    let backup_dir = dir.path().join("backups");
    fs::create_dir_all(&backup_dir).unwrap();

    for day in 1..=5 {
        fs::write(
            backup_dir.join(format!("memory_backup_2025-01-0{}_12-00-00.tar.gz", day)),
            b"archive",
        )
        .unwrap();
    }
    // Files that do not parse are ignored rather than deleted
    fs::write(backup_dir.join("memory_backup_invalid.tar.gz"), b"junk").unwrap();
    fs::write(backup_dir.join("notes.txt"), b"junk").unwrap();

    let scheduler = BackupScheduler::new(storage, backup_dir.clone(), Duration::hours(6), 2);
    let deleted = scheduler.cleanup_old_backups().unwrap();
    assert_eq!(deleted, 3);

    let names = backup_files(&backup_dir);
    assert!(names.contains(&"memory_backup_2025-01-04_12-00-00.tar.gz".to_string()));
    assert!(names.contains(&"memory_backup_2025-01-05_12-00-00.tar.gz".to_string()));
    assert!(names.contains(&"memory_backup_invalid.tar.gz".to_string()));
    assert!(!names.contains(&"memory_backup_2025-01-01_12-00-00.tar.gz".to_string()));
}

#[test]
fn last_backup_time_comes_from_filenames_not_mtimes() {
    let dir = TempDir::new().unwrap();
    let storage = storage_with_data(dir.path());
    let backup_dir = dir.path().join("backups");
    fs::create_dir_all(&backup_dir).unwrap();

    // A backup stamped just now, regardless of when the file was written
    let fresh = Utc::now().naive_utc().format("%Y-%m-%d_%H-%M-%S");
    fs::write(
        backup_dir.join(format!("memory_backup_{}.tar.gz", fresh)),
        b"archive",
    )
    .unwrap();

    let scheduler = BackupScheduler::new(storage, backup_dir, Duration::hours(1), 5);
    assert!(!scheduler.should_create_backup());
}

#[test]
fn invalidate_cache_forces_a_rescan() {
    let dir = TempDir::new().unwrap();
    let storage = storage_with_data(dir.path());
    let backup_dir = dir.path().join("backups");
    let scheduler = BackupScheduler::new(storage, backup_dir.clone(), Duration::hours(1), 5);

    scheduler.create_backup().unwrap();
    assert!(!scheduler.should_create_backup());

    // Simulate a manual restore that wiped the backup directory
    fs::remove_dir_all(&backup_dir).unwrap();

    // The cached timestamp still says a backup exists until invalidated
    assert!(!scheduler.should_create_backup());
    scheduler.invalidate_cache();
    assert!(scheduler.should_create_backup());
}

#[test]
fn list_backups_is_sorted_newest_first() {
    let dir = TempDir::new().unwrap();
    let storage = storage_with_data(dir.path());
    let backup_dir = dir.path().join("backups");
    fs::create_dir_all(&backup_dir).unwrap();

    for name in [
        "memory_backup_2025-03-01_00-00-00.tar.gz",
        "memory_backup_2025-03-03_00-00-00.tar.gz",
        "memory_backup_2025-03-02_00-00-00.tar.gz",
    ] {
        fs::write(backup_dir.join(name), b"archive").unwrap();
    }

    let scheduler = BackupScheduler::new(storage, backup_dir, Duration::hours(6), 10);
    let listed = scheduler.list_backups();
    let names: Vec<_> = listed.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "memory_backup_2025-03-03_00-00-00.tar.gz",
            "memory_backup_2025-03-02_00-00-00.tar.gz",
            "memory_backup_2025-03-01_00-00-00.tar.gz",
        ]
    );
}
