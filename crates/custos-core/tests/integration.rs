//! End-to-end behavior over a real filesystem: backup round-trips,
//! integrity classification, repair, retention, and the safety-backup gate.

use std::fs;
use std::path::Path;

use custos_core::commands::{backup, cleanup, repair, restore, schedule, verify};
use custos_core::config::{self, ProjectConfig};
use custos_core::store::{format_timestamp, BackupKind, IssueKind, NewBackup};
use custos_core::Project;
use tempfile::TempDir;

const BINARY_CONTENT: [u8; 6] = [0u8, 159, 146, 150, 255, 1];

/// A project tree containing the seeded manifest files plus sample sources,
/// with the data directory outside the tree.
fn sample_project() -> (TempDir, Project) {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("project");
    let data = temp.path().join("data");
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(root.join("config.toml"), "[app]\nname = \"sample\"\n").unwrap();
    fs::write(root.join("schema.sql"), "CREATE TABLE items (id INTEGER);\n").unwrap();
    fs::write(root.join("run.sh"), "#!/bin/sh\nexec ./app\n").unwrap();
    fs::write(root.join("src/main.rs"), "fn main() {}\n").unwrap();
    fs::write(root.join("notes.md"), "# notes\n").unwrap();
    fs::write(root.join("blob.db"), BINARY_CONTENT).unwrap();

    let project = Project::open(ProjectConfig::new(&root, &data)).unwrap();
    (temp, project)
}

fn read(root: &Path, rel: &str) -> Vec<u8> {
    fs::read(root.join(rel)).unwrap()
}

#[test]
fn backup_restore_round_trip_is_byte_identical() {
    let (temp, project) = sample_project();

    let report = backup::run(&project, BackupKind::Manual, "baseline");
    assert!(report.success, "{}", report.message);
    assert_eq!(report.files_included, 6);
    assert_eq!(report.archive_digest.len(), 64);
    let archive = report.archive_path.clone().unwrap();
    assert!(archive.exists());
    assert!(report.size_bytes > 0);

    // Restore into an empty directory via a second project handle sharing
    // the same data directory.
    let restored_root = temp.path().join("restored");
    fs::create_dir_all(&restored_root).unwrap();
    let target = Project::open(ProjectConfig::new(
        &restored_root,
        temp.path().join("data"),
    ))
    .unwrap();

    let restore_report = restore::run(&target, report.backup_id.unwrap());
    assert!(restore_report.success, "{}", restore_report.message);
    assert_eq!(restore_report.files_restored, 6);
    assert!(restore_report.safety_backup_id.is_some());

    for rel in [
        "config.toml",
        "schema.sql",
        "run.sh",
        "src/main.rs",
        "notes.md",
        "blob.db",
    ] {
        assert_eq!(
            read(&restored_root, rel),
            read(&project.root().to_path_buf(), rel),
            "content mismatch for {rel}"
        );
    }

    // The restore left an audit entry in the issue log.
    let issues = target.open_issues().unwrap();
    assert!(issues
        .iter()
        .any(|i| i.kind == IssueKind::ProjectRestore.as_str()));
}

#[test]
fn restore_of_unknown_backup_fails_without_touching_anything() {
    let (_temp, project) = sample_project();
    let report = restore::run(&project, 4242);
    assert!(!report.success);
    assert!(report.message.contains("not found"));
}

#[test]
fn verification_classifies_corruption_exactly() {
    let (_temp, project) = sample_project();
    assert!(backup::run(&project, BackupKind::Manual, "baseline").success);

    fs::write(project.root().join("src/main.rs"), "fn main() { panic!() }\n").unwrap();

    let report = verify::run(&project);
    assert!(report.success);
    assert_eq!(report.corrupted, vec!["src/main.rs".to_string()]);
    assert!(report.missing.is_empty());
    assert_eq!(report.files_ok, report.files_total - 1);

    let issues = project.open_issues().unwrap();
    assert!(issues
        .iter()
        .any(|i| i.kind == IssueKind::CorruptedFile.as_str() && i.file_path == "src/main.rs"));
}

#[test]
fn verification_classifies_missing_exactly() {
    let (_temp, project) = sample_project();
    assert!(backup::run(&project, BackupKind::Manual, "baseline").success);

    fs::remove_file(project.root().join("config.toml")).unwrap();

    let report = verify::run(&project);
    assert_eq!(report.missing, vec!["config.toml".to_string()]);
    assert!(report.corrupted.is_empty());
}

#[test]
fn auto_repair_recreates_deleted_files_byte_identical() {
    let (_temp, project) = sample_project();
    let original_text = read(&project.root().to_path_buf(), "notes.md");
    assert!(backup::run(&project, BackupKind::Manual, "baseline").success);

    fs::remove_file(project.root().join("notes.md")).unwrap();
    fs::remove_file(project.root().join("blob.db")).unwrap();

    let report = repair::run(&project);
    assert!(report.success, "{}", report.message);
    assert!(report.repaired.contains(&"notes.md".to_string()));
    assert!(report.repaired.contains(&"blob.db".to_string()));
    assert!(report.failed.is_empty());

    assert_eq!(read(&project.root().to_path_buf(), "notes.md"), original_text);
    assert_eq!(
        read(&project.root().to_path_buf(), "blob.db"),
        BINARY_CONTENT
    );
}

#[test]
fn auto_repair_overwrites_corrupted_files_from_snapshot() {
    let (_temp, project) = sample_project();
    assert!(backup::run(&project, BackupKind::Manual, "baseline").success);

    fs::write(project.root().join("notes.md"), "tampered\n").unwrap();

    let report = repair::run(&project);
    assert!(report.repaired.contains(&"notes.md".to_string()));
    assert_eq!(read(&project.root().to_path_buf(), "notes.md"), b"# notes\n");

    // The repaired tree verifies clean.
    let after = verify::run(&project);
    assert!(after.missing.is_empty() && after.corrupted.is_empty());
}

#[test]
fn auto_repair_honors_disabled_flag() {
    let (_temp, project) = sample_project();
    project
        .set_config(config::KEY_AUTO_REPAIR, "false", "", "repair")
        .unwrap();
    let report = repair::run(&project);
    assert!(!report.success);
    assert!(report.message.contains("disabled"));
}

#[test]
fn automatic_backup_honors_disabled_flag() {
    let (_temp, project) = sample_project();
    project
        .set_config(config::KEY_AUTO_BACKUP, "false", "", "backup")
        .unwrap();
    let report = backup::run(&project, BackupKind::Automatic, "");
    assert!(!report.success);
    assert!(report.message.contains("disabled"));

    // Manual backups are unaffected by the flag.
    assert!(backup::run(&project, BackupKind::Manual, "").success);
}

#[test]
fn retention_prunes_old_automatic_backups_only() {
    let (_temp, project) = sample_project();
    let old = format_timestamp(chrono::Utc::now() - chrono::Duration::days(45));
    for kind in [BackupKind::Automatic, BackupKind::Manual] {
        project
            .store()
            .insert_backup(&NewBackup {
                name: format!("project_{}_old.zip", kind.as_str()),
                archive_path: "/tmp/gone.zip".into(),
                size_bytes: 10,
                kind,
                description: "aged".into(),
                included_files: Vec::new(),
                archive_digest: String::new(),
                project_version: "0.3.0".into(),
                created_at: old.clone(),
            })
            .unwrap();
    }

    // A fresh backup triggers retention pruning as its final step.
    assert!(backup::run(&project, BackupKind::Manual, "trigger").success);

    let remaining = project.recent_backups(10).unwrap();
    assert_eq!(remaining.len(), 2);
    assert!(!remaining
        .iter()
        .any(|b| b.kind == BackupKind::Automatic.as_str() && b.created_at == old));
    assert!(remaining
        .iter()
        .any(|b| b.kind == BackupKind::Manual.as_str() && b.created_at == old));
}

#[test]
fn scheduled_backup_runs_only_when_due() {
    let (_temp, project) = sample_project();

    // No automatic backup yet: one is due immediately.
    let first = schedule::run(&project);
    assert!(first.success, "{}", first.message);

    // Immediately afterwards: not due.
    let second = schedule::run(&project);
    assert!(!second.success);
    assert!(second.message.contains("not due"));
}

#[test]
fn scheduled_backup_is_due_after_the_frequency_window() {
    let (_temp, project) = sample_project();
    project
        .store()
        .insert_backup(&NewBackup {
            name: "project_automatic_old.zip".into(),
            archive_path: "/tmp/gone.zip".into(),
            size_bytes: 10,
            kind: BackupKind::Automatic,
            description: String::new(),
            included_files: Vec::new(),
            archive_digest: String::new(),
            project_version: "0.3.0".into(),
            created_at: format_timestamp(chrono::Utc::now() - chrono::Duration::days(2)),
        })
        .unwrap();

    let report = schedule::run(&project);
    assert!(report.success, "{}", report.message);
}

#[test]
fn cleanup_removes_duplicates_temp_and_dev_files() {
    let (_temp, project) = sample_project();
    let root = project.root().to_path_buf();
    fs::write(root.join("alpha.txt"), "same content\n").unwrap();
    fs::write(root.join("beta.txt"), "same content\n").unwrap();
    fs::write(root.join("junk.tmp"), "scratch\n").unwrap();
    fs::write(root.join("debug_dump.txt"), "dump\n").unwrap();

    let report = cleanup::run(&project);
    assert!(report.success, "{}", report.message);

    // First duplicate by name order survives; the later one is gone.
    assert!(root.join("alpha.txt").exists());
    assert!(!root.join("beta.txt").exists());
    assert!(!root.join("junk.tmp").exists());
    assert!(!root.join("debug_dump.txt").exists());

    // Critical files are exempt.
    assert!(root.join("config.toml").exists());
    assert!(root.join("schema.sql").exists());
    assert!(report.files_removed.len() >= 3);
}

#[test]
fn cleanup_dedups_auxiliary_database_rows() {
    let (_temp, project) = sample_project();
    let aux = project.data_dir().join("shop.db");
    let conn = rusqlite::Connection::open(&aux).unwrap();
    conn.execute_batch(
        "CREATE TABLE products (id INTEGER PRIMARY KEY, sku TEXT);
         INSERT INTO products (sku) VALUES ('SKU-1');
         INSERT INTO products (sku) VALUES ('SKU-1');
         INSERT INTO products (sku) VALUES ('SKU-2');",
    )
    .unwrap();
    drop(conn);

    let report = cleanup::run(&project);
    assert!(report.success);
    assert_eq!(report.duplicate_rows_removed, 1);
}

#[test]
fn failed_safety_backup_blocks_cleanup_entirely() {
    let (_temp, project) = sample_project();
    let root = project.root().to_path_buf();
    fs::write(root.join("alpha.txt"), "same content\n").unwrap();
    fs::write(root.join("beta.txt"), "same content\n").unwrap();
    fs::write(root.join("junk.tmp"), "scratch\n").unwrap();

    // Make archive creation impossible: a plain file where the backup
    // directory must go.
    fs::write(project.data_dir().join("backups"), "not a directory").unwrap();

    let report = cleanup::run(&project);
    assert!(!report.success);
    assert!(report.message.contains("safety backup"));

    // Zero destructive changes.
    assert!(root.join("alpha.txt").exists());
    assert!(root.join("beta.txt").exists());
    assert!(root.join("junk.tmp").exists());
    assert!(report.files_removed.is_empty());
}

#[test]
fn failed_safety_backup_blocks_restore_entirely() {
    let (temp, project) = sample_project();
    let report = backup::run(&project, BackupKind::Manual, "baseline");
    assert!(report.success);
    let marker = project.root().join("src/main.rs");
    fs::write(&marker, "fn main() { /* edited after backup */ }\n").unwrap();
    let edited = fs::read(&marker).unwrap();

    // Second data directory sharing the same database, but with a plain file
    // where new archives would have to go. The target archive still exists
    // under the original data directory, so only the safety backup fails.
    let broken_data = temp.path().join("broken-data");
    fs::create_dir_all(&broken_data).unwrap();
    fs::copy(
        project.data_dir().join("project_backup.db"),
        broken_data.join("project_backup.db"),
    )
    .unwrap();
    fs::write(broken_data.join("backups"), "not a directory").unwrap();

    let gated = Project::open(ProjectConfig::new(project.root(), &broken_data)).unwrap();
    let restore_report = restore::run(&gated, report.backup_id.unwrap());
    assert!(!restore_report.success);
    assert!(restore_report.message.contains("safety backup"));

    // The edited file was not rolled back.
    assert_eq!(fs::read(&marker).unwrap(), edited);
}
