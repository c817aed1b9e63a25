//! Duplicate and excess-file cleanup, gated by a mandatory safety backup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rusqlite::{Connection, OptionalExtension};
use tracing::{error, info, warn};

use super::{backup, walk};
use crate::error::{CustosError, Result};
use crate::hash;
use crate::project::Project;
use crate::store::BackupKind;

/// Directory names additionally excluded from destructive cleanup walks.
const CLEANUP_EXCLUDED_DIRS: &[&str] = &["backups", "logs"];

/// Paths exempt from every destructive step.
const CRITICAL_PATHS: &[&str] = &[
    "Cargo.toml",
    "Cargo.lock",
    "config.toml",
    "schema.sql",
    "run.sh",
];

/// Extensions that mark a file as critical (databases and configuration).
const CRITICAL_EXTENSIONS: &[&str] = &[
    ".db", ".sqlite", ".json", ".toml", ".ini", ".cfg", ".conf",
];

// Name patterns identifying temp/cache files.
const TEMP_EXTENSIONS: &[&str] = &[".tmp", ".temp", ".cache", ".swp", ".swo", ".pyc", ".orig"];
const TEMP_PREFIXES: &[&str] = &["tmp_", "temp_"];
const TEMP_SUFFIX: &str = "~";

/// Ad-hoc backup copies, pruned once older than the retention window.
const BACKUP_COPY_EXTENSIONS: &[&str] = &[".bak", ".backup", ".old"];

// Name patterns identifying test/development scratch files.
const DEV_PATTERNS: &[&str] = &["test_", "_test", "debug_", "scratch_"];
const DEV_EXTENSIONS: &[&str] = &[".test", ".debug", ".dev"];

/// (table, unique column) pairs deduplicated in auxiliary databases, keeping
/// the row with the smallest id.
const DEDUP_TABLES: &[(&str, &str)] = &[
    ("customers", "email"),
    ("products", "sku"),
    ("suppliers", "name"),
    ("categories", "name"),
];

#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    pub success: bool,
    pub message: String,
    pub files_removed: Vec<String>,
    pub duplicate_rows_removed: usize,
    pub elapsed_secs: f64,
}

/// Remove duplicate and excess files across the project tree. A manual
/// safety backup gates the whole operation: when it fails, nothing is
/// deleted.
pub fn run(project: &Project) -> CleanupReport {
    match clean(project) {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "cleanup aborted");
            CleanupReport {
                success: false,
                message: e.to_string(),
                ..Default::default()
            }
        }
    }
}

fn clean(project: &Project) -> Result<CleanupReport> {
    let safety = backup::run(
        project,
        BackupKind::Manual,
        "safety backup before duplicate cleanup",
    );
    if !safety.success {
        return Err(CustosError::SafetyBackupFailed(safety.message));
    }

    let started = Instant::now();
    let mut removed = Vec::new();

    removed.extend(remove_duplicates(project));
    removed.extend(remove_temp_files(project));
    removed.extend(remove_stale_logs(project));
    removed.extend(remove_stale_backup_copies(project));
    removed.extend(remove_dev_files(project));
    let duplicate_rows_removed = dedup_database_rows(project);

    let elapsed_secs = started.elapsed().as_secs_f64();
    info!(
        files = removed.len(),
        rows = duplicate_rows_removed,
        elapsed_secs,
        "cleanup finished"
    );

    Ok(CleanupReport {
        success: true,
        message: format!("cleanup finished: {} files removed", removed.len()),
        files_removed: removed,
        duplicate_rows_removed,
        elapsed_secs,
    })
}

/// Regular files eligible for cleanup (cleanup exclusions applied).
fn cleanup_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in walk::build_walker(root, CLEANUP_EXCLUDED_DIRS).build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping entry (walk error)");
                continue;
            }
        };
        if entry.file_type().is_some_and(|ft| ft.is_file()) {
            files.push(entry.into_path());
        }
    }
    files
}

/// Content-hash duplicate detection; the first occurrence of a hash wins and
/// later ones are deleted.
fn remove_duplicates(project: &Project) -> Vec<String> {
    let mut removed = Vec::new();
    let mut seen: HashMap<String, PathBuf> = HashMap::new();
    for path in cleanup_files(project.root()) {
        if is_critical_path(project.root(), &path) {
            continue;
        }
        let digest = match hash::sha256_file(&path) {
            Ok(digest) => digest,
            Err(_) => continue, // unreadable files are left alone
        };
        if seen.contains_key(&digest) {
            removed.extend(remove_file(project.root(), &path, "duplicate"));
        } else {
            seen.insert(digest, path);
        }
    }
    removed
}

fn remove_temp_files(project: &Project) -> Vec<String> {
    let mut removed = Vec::new();
    for path in cleanup_files(project.root()) {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if is_temp_name(name) && !is_critical_path(project.root(), &path) {
            removed.extend(remove_file(project.root(), &path, "temp"));
        }
    }
    removed
}

fn remove_stale_logs(project: &Project) -> Vec<String> {
    remove_older_than(project, &[".log"], project.log_cleanup_days(), "stale log")
}

fn remove_stale_backup_copies(project: &Project) -> Vec<String> {
    remove_older_than(
        project,
        BACKUP_COPY_EXTENSIONS,
        project.keep_backup_days(),
        "stale backup copy",
    )
}

fn remove_dev_files(project: &Project) -> Vec<String> {
    let mut removed = Vec::new();
    for path in cleanup_files(project.root()) {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if is_dev_name(name) && !is_critical_path(project.root(), &path) {
            removed.extend(remove_file(project.root(), &path, "dev scratch"));
        }
    }
    removed
}

/// Delete files carrying one of `extensions` whose mtime is older than
/// `keep_days` days.
fn remove_older_than(
    project: &Project,
    extensions: &[&str],
    keep_days: i64,
    label: &str,
) -> Vec<String> {
    let mut removed = Vec::new();
    for path in cleanup_files(project.root()) {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !extensions.iter().any(|ext| name.ends_with(ext)) {
            continue;
        }
        if is_critical_path(project.root(), &path) {
            continue;
        }
        match file_age_days(&path) {
            Ok(age) if age > keep_days as f64 => {
                removed.extend(remove_file(project.root(), &path, label));
            }
            Ok(_) => {}
            Err(e) => warn!(path = %path.display(), error = %e, "could not stat file"),
        }
    }
    removed
}

fn file_age_days(path: &Path) -> Result<f64> {
    let modified = std::fs::metadata(path)?.modified()?;
    // Future mtimes count as age zero.
    let age = modified.elapsed().unwrap_or_default();
    Ok(age.as_secs_f64() / 86_400.0)
}

/// Delete one file, returning its report label on success.
fn remove_file(root: &Path, path: &Path, label: &str) -> Option<String> {
    let rel = path
        .strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned();
    match std::fs::remove_file(path) {
        Ok(()) => {
            info!(path = %rel, label, "file removed");
            Some(format!("{label}: {rel}"))
        }
        Err(e) => {
            warn!(path = %rel, error = %e, "could not remove file");
            None
        }
    }
}

/// Duplicate-row removal in auxiliary SQLite databases found in the data
/// directory. The backup store's own database is skipped.
fn dedup_database_rows(project: &Project) -> usize {
    let own_db = project.store().db_path().to_path_buf();
    let entries = match std::fs::read_dir(project.data_dir()) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "could not list data directory");
            return 0;
        }
    };

    let mut total = 0usize;
    for entry in entries.flatten() {
        let path = entry.path();
        if path == own_db {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some("db") {
            continue;
        }
        match dedup_one_database(&path) {
            Ok(rows) => total += rows,
            Err(e) => warn!(path = %path.display(), error = %e, "database dedup failed"),
        }
    }
    total
}

fn dedup_one_database(path: &Path) -> Result<usize> {
    let conn = Connection::open(path)?;
    let mut removed = 0usize;
    for &(table, column) in DEDUP_TABLES {
        let exists: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                rusqlite::params![table],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            continue;
        }
        removed += conn.execute(
            &format!(
                "DELETE FROM {table}
                 WHERE id NOT IN (SELECT MIN(id) FROM {table} GROUP BY {column})"
            ),
            [],
        )?;
    }
    Ok(removed)
}

/// A path is critical (exempt from every destructive step) when it matches a
/// core filename or relative path, or carries a database or configuration
/// extension. Undecodable names classify as critical.
pub(crate) fn is_critical_path(root: &Path, path: &Path) -> bool {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let rel_str = rel.to_string_lossy().replace('\\', "/");
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return true;
    };

    if CRITICAL_PATHS
        .iter()
        .any(|critical| rel_str == *critical || name == *critical)
    {
        return true;
    }
    CRITICAL_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

pub(crate) fn is_temp_name(name: &str) -> bool {
    TEMP_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
        || TEMP_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
        || name.ends_with(TEMP_SUFFIX)
}

pub(crate) fn is_dev_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    DEV_PATTERNS.iter().any(|pattern| lower.contains(pattern))
        || DEV_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}
