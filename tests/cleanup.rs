//! Cleanup Integration Tests
//!
//! Retention semantics over a real directory tree, with mtimes backdated
//! via filetime.

use std::path::Path;

use filetime::FileTime;
use tempfile::TempDir;

use testsmith::core::FileCleanup;

const DAY_SECS: i64 = 24 * 60 * 60;

fn backdate(path: &Path, days: i64) {
    let mtime = FileTime::from_unix_time(
        FileTime::now().unix_seconds() - days * DAY_SECS,
        0,
    );
    filetime::set_file_mtime(path, mtime).unwrap();
}

#[tokio::test]
async fn test_old_files_removed_fresh_files_kept() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("generated");
    let item_dir = root.join("2026-07-01T00-00-00").join("QA-1");
    std::fs::create_dir_all(&item_dir).unwrap();

    let old = item_dir.join("old.test.ts");
    let fresh = item_dir.join("fresh.test.ts");
    std::fs::write(&old, "// old").unwrap();
    std::fs::write(&fresh, "// fresh").unwrap();
    backdate(&old, 10);

    let cleanup = FileCleanup::new(root, 7);
    let stats = cleanup.sweep().await.unwrap();

    assert_eq!(stats.files_removed, 1);
    assert!(!old.exists());
    assert!(fresh.exists());
}

#[tokio::test]
async fn test_stale_empty_directories_pruned() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("generated");
    let stale_dir = root.join("2026-06-01T00-00-00").join("QA-2");
    std::fs::create_dir_all(&stale_dir).unwrap();
    backdate(&stale_dir, 30);
    backdate(&stale_dir.parent().unwrap(), 30);

    let cleanup = FileCleanup::new(root, 7);
    let stats = cleanup.sweep().await.unwrap();

    assert_eq!(stats.dirs_removed, 2);
    assert!(!stale_dir.exists());
}

#[tokio::test]
async fn test_fresh_directories_survive() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("generated");
    let fresh_dir = root.join("2026-08-01T00-00-00").join("QA-3");
    std::fs::create_dir_all(&fresh_dir).unwrap();

    let cleanup = FileCleanup::new(root, 7);
    let stats = cleanup.sweep().await.unwrap();

    assert_eq!(stats.dirs_removed, 0);
    assert!(fresh_dir.exists());
}

#[tokio::test]
async fn test_missing_root_is_a_clean_no_op() {
    let temp = TempDir::new().unwrap();
    let cleanup = FileCleanup::new(temp.path().join("does-not-exist"), 7);

    let stats = cleanup.sweep().await.unwrap();
    assert_eq!(stats.files_removed, 0);
    assert_eq!(stats.dirs_removed, 0);
}

#[tokio::test]
async fn test_nested_old_tree_fully_cleared() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("generated");

    for (run, key) in [("2026-05-01T08-00-00", "QA-4"), ("2026-05-02T08-00-00", "QA-5")] {
        let dir = root.join(run).join(key);
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("a.test.ts");
        std::fs::write(&file, "// old").unwrap();
        backdate(&file, 60);
        backdate(&dir, 60);
        backdate(&dir.parent().unwrap(), 60);
    }

    let cleanup = FileCleanup::new(root.clone(), 7);
    let stats = cleanup.sweep().await.unwrap();

    assert_eq!(stats.files_removed, 2);
    // Run dirs and key dirs can all be pruned once their files are gone...
    assert!(stats.dirs_removed >= 2);
    // ...but the root itself stays
    assert!(root.exists());
}
