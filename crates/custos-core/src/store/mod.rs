//! SQLite persistence for backup records, the critical-file manifest, the
//! recovery-issue log, and durable configuration.
//!
//! Every method opens its own connection and commits independently. Callers
//! must not assume atomicity across calls.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::config;
use crate::error::Result;

/// Timestamp format stored in the database. Sorts lexicographically.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Backup kind. Automatic backups are retention-pruned; manual backups are
/// kept indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupKind {
    Automatic,
    Manual,
}

impl BackupKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackupKind::Automatic => "automatic",
            BackupKind::Manual => "manual",
        }
    }
}

/// Issue categories recorded in the recovery log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    MissingFile,
    CorruptedFile,
    /// Restores are logged here too, as an audit trail.
    ProjectRestore,
}

impl IssueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueKind::MissingFile => "missing_file",
            IssueKind::CorruptedFile => "corrupted_file",
            IssueKind::ProjectRestore => "project_restore",
        }
    }
}

pub const ISSUE_PENDING: &str = "pending";
pub const ISSUE_RESOLVED: &str = "resolved";

/// A completed backup, immutable once written.
#[derive(Debug, Clone)]
pub struct BackupRecord {
    pub id: i64,
    pub name: String,
    pub archive_path: String,
    pub size_bytes: u64,
    pub kind: String,
    pub status: String,
    pub created_at: String,
    pub description: String,
    pub included_files: Vec<String>,
    pub archive_digest: String,
    pub project_version: String,
}

/// Parameters for inserting a new backup row.
#[derive(Debug, Clone)]
pub struct NewBackup {
    pub name: String,
    pub archive_path: String,
    pub size_bytes: u64,
    pub kind: BackupKind,
    pub description: String,
    pub included_files: Vec<String>,
    pub archive_digest: String,
    pub project_version: String,
    pub created_at: String,
}

/// One tracked critical file with its embedded content snapshot.
#[derive(Debug, Clone)]
pub struct CriticalFileRecord {
    pub path: String,
    pub hash: Option<String>,
    pub size_bytes: u64,
    pub kind: Option<String>,
    pub critical: bool,
    pub description: Option<String>,
    pub last_backup_at: Option<String>,
    pub modified_at: Option<String>,
    pub content: Option<String>,
    pub encoding: Option<String>,
}

/// One entry in the recovery-issue log.
#[derive(Debug, Clone)]
pub struct IssueRecord {
    pub id: i64,
    pub kind: String,
    pub file_path: String,
    pub description: String,
    pub status: String,
    pub created_at: String,
    pub resolved_at: Option<String>,
    pub action_taken: Option<String>,
    pub backup_used: Option<String>,
}

/// One durable configuration row.
#[derive(Debug, Clone)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub description: String,
    pub category: String,
}

/// Configuration rows seeded on first run: (key, value, description, category).
pub const DEFAULT_CONFIG: &[(&str, &str, &str, &str)] = &[
    (
        config::KEY_AUTO_BACKUP,
        "true",
        "Enable automatic project backups",
        "backup",
    ),
    (
        config::KEY_BACKUP_FREQUENCY,
        "daily",
        "Automatic backup frequency (daily/weekly/monthly)",
        "backup",
    ),
    (
        config::KEY_KEEP_BACKUP_DAYS,
        "30",
        "Days to retain automatic backups",
        "backup",
    ),
    (
        config::KEY_AUTO_REPAIR,
        "true",
        "Enable auto-repair of missing critical files",
        "repair",
    ),
    (
        config::KEY_LOG_CLEANUP_DAYS,
        "90",
        "Days to retain log files during cleanup",
        "cleanup",
    ),
    (
        config::KEY_AUTO_DUPLICATE_CLEANUP,
        "false",
        "Run duplicate cleanup automatically at startup",
        "cleanup",
    ),
];

/// Critical files seeded into an empty manifest: (path, type, critical, description).
const DEFAULT_CRITICAL_FILES: &[(&str, &str, bool, &str)] = &[
    ("config.toml", "config", true, "Application configuration"),
    ("schema.sql", "sql", true, "Database schema definition"),
    ("run.sh", "script", false, "Launch script"),
];

/// Handle to the backup database.
#[derive(Debug, Clone)]
pub struct BackupStore {
    db_path: PathBuf,
}

const BACKUP_COLUMNS: &str = "id, name, archive_path, size_bytes, kind, status, created_at, \
                              description, included_files, archive_digest, project_version";

const CRITICAL_COLUMNS: &str = "path, hash, size_bytes, kind, critical, description, \
                                last_backup_at, modified_at, content, encoding";

const ISSUE_COLUMNS: &str =
    "id, kind, file_path, description, status, created_at, resolved_at, action_taken, backup_used";

impl BackupStore {
    /// Open the store under `data_dir`, creating, migrating, and seeding the
    /// database as needed. All three steps are idempotent.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let store = Self {
            db_path: data_dir.join("project_backup.db"),
        };
        let conn = store.connect()?;
        init_schema(&conn)?;
        migrate(&conn)?;
        seed_defaults(&conn)?;
        info!(path = %store.db_path.display(), "backup store ready");
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        Ok(Connection::open(&self.db_path)?)
    }

    // --- configuration -----------------------------------------------------

    /// Fetch a configuration value, or `default` when the key is absent or
    /// the lookup fails.
    pub fn config_value_or(&self, key: &str, default: &str) -> String {
        match self.config_value(key) {
            Ok(Some(value)) => value,
            Ok(None) => default.to_string(),
            Err(e) => {
                warn!(key, error = %e, "configuration lookup failed; using default");
                default.to_string()
            }
        }
    }

    pub fn config_value(&self, key: &str) -> Result<Option<String>> {
        let conn = self.connect()?;
        let value = conn
            .query_row(
                "SELECT value FROM backup_config WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Insert or update a configuration entry.
    pub fn set_config(
        &self,
        key: &str,
        value: &str,
        description: &str,
        category: &str,
    ) -> Result<()> {
        let conn = self.connect()?;
        let now = now_timestamp();
        conn.execute(
            "INSERT INTO backup_config (key, value, description, category, created_at, modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(key) DO UPDATE SET
                 value = ?2, description = ?3, category = ?4, modified_at = ?5",
            params![key, value, description, category, now],
        )?;
        debug!(key, value, "configuration updated");
        Ok(())
    }

    pub fn config_entries(&self) -> Result<Vec<ConfigEntry>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare("SELECT key, value, description, category FROM backup_config ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok(ConfigEntry {
                key: row.get(0)?,
                value: row.get(1)?,
                description: row.get(2)?,
                category: row.get(3)?,
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    // --- backups -----------------------------------------------------------

    /// Persist a completed backup. Returns the new row id.
    pub fn insert_backup(&self, backup: &NewBackup) -> Result<i64> {
        let conn = self.connect()?;
        let included = serde_json::to_string(&backup.included_files)?;
        conn.execute(
            "INSERT INTO project_backups
                 (name, archive_path, size_bytes, kind, created_at, description,
                  included_files, archive_digest, project_version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                backup.name,
                backup.archive_path,
                backup.size_bytes as i64,
                backup.kind.as_str(),
                backup.created_at,
                backup.description,
                included,
                backup.archive_digest,
                backup.project_version,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Newest-first listing of backups.
    pub fn recent_backups(&self, limit: usize) -> Result<Vec<BackupRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {BACKUP_COLUMNS} FROM project_backups
             ORDER BY created_at DESC, id DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit as i64], backup_from_row)?;
        let mut backups = Vec::new();
        for row in rows {
            backups.push(row?);
        }
        Ok(backups)
    }

    pub fn backup_by_id(&self, id: i64) -> Result<Option<BackupRecord>> {
        let conn = self.connect()?;
        let record = conn
            .query_row(
                &format!("SELECT {BACKUP_COLUMNS} FROM project_backups WHERE id = ?1"),
                params![id],
                backup_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Newest backup of the given kind, if any.
    pub fn latest_backup_of_kind(&self, kind: BackupKind) -> Result<Option<BackupRecord>> {
        let conn = self.connect()?;
        let record = conn
            .query_row(
                &format!(
                    "SELECT {BACKUP_COLUMNS} FROM project_backups
                     WHERE kind = ?1 ORDER BY created_at DESC, id DESC LIMIT 1"
                ),
                params![kind.as_str()],
                backup_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Delete automatic backup rows older than `keep_days`. Manual backups
    /// are never pruned. Returns the number of rows removed.
    pub fn prune_old_automatic(&self, keep_days: i64) -> Result<usize> {
        let conn = self.connect()?;
        let cutoff = format_timestamp(Utc::now() - chrono::Duration::days(keep_days));
        let removed = conn.execute(
            "DELETE FROM project_backups WHERE kind = ?1 AND created_at < ?2",
            params![BackupKind::Automatic.as_str(), cutoff],
        )?;
        if removed > 0 {
            info!(removed, keep_days, "pruned old automatic backups");
        }
        Ok(removed)
    }

    // --- critical files ----------------------------------------------------

    /// Insert or refresh a manifest entry. Existing kind/critical/description
    /// values are preserved on update; only hash, size, snapshot, and
    /// timestamps change when a file is re-backed-up.
    pub fn upsert_critical_file(
        &self,
        path: &str,
        hash: &str,
        size_bytes: u64,
        content: &str,
        encoding: &str,
    ) -> Result<()> {
        let conn = self.connect()?;
        let now = now_timestamp();
        conn.execute(
            "INSERT INTO critical_files
                 (path, hash, size_bytes, last_backup_at, modified_at, content, encoding)
             VALUES (?1, ?2, ?3, ?4, ?4, ?5, ?6)
             ON CONFLICT(path) DO UPDATE SET
                 hash = ?2, size_bytes = ?3, last_backup_at = ?4,
                 modified_at = ?4, content = ?5, encoding = ?6",
            params![path, hash, size_bytes as i64, now, content, encoding],
        )?;
        Ok(())
    }

    /// Every manifest entry, critical files first, then by path.
    pub fn critical_files(&self) -> Result<Vec<CriticalFileRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CRITICAL_COLUMNS} FROM critical_files ORDER BY critical DESC, path"
        ))?;
        let rows = stmt.query_map([], critical_from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    pub fn critical_file(&self, path: &str) -> Result<Option<CriticalFileRecord>> {
        let conn = self.connect()?;
        let record = conn
            .query_row(
                &format!("SELECT {CRITICAL_COLUMNS} FROM critical_files WHERE path = ?1"),
                params![path],
                critical_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Rename a tracked path. Returns `true` when a row was updated.
    pub fn update_critical_file_path(&self, old_path: &str, new_path: &str) -> Result<bool> {
        let conn = self.connect()?;
        let updated = conn.execute(
            "UPDATE critical_files SET path = ?1 WHERE path = ?2",
            params![new_path, old_path],
        )?;
        Ok(updated > 0)
    }

    // --- issues ------------------------------------------------------------

    /// Record a new issue. Returns its id.
    pub fn record_issue(
        &self,
        kind: IssueKind,
        file_path: &str,
        description: &str,
        action_taken: &str,
        backup_used: &str,
    ) -> Result<i64> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO recovery_issues
                 (kind, file_path, description, status, created_at, action_taken, backup_used)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                kind.as_str(),
                file_path,
                description,
                ISSUE_PENDING,
                now_timestamp(),
                action_taken,
                backup_used,
            ],
        )?;
        info!(kind = kind.as_str(), file = file_path, "issue recorded");
        Ok(conn.last_insert_rowid())
    }

    /// Mark an issue resolved with the action that fixed it. Returns `true`
    /// when a row was updated.
    pub fn resolve_issue(&self, id: i64, action_taken: &str) -> Result<bool> {
        let conn = self.connect()?;
        let updated = conn.execute(
            "UPDATE recovery_issues
             SET status = ?1, resolved_at = ?2, action_taken = ?3
             WHERE id = ?4",
            params![ISSUE_RESOLVED, now_timestamp(), action_taken, id],
        )?;
        Ok(updated > 0)
    }

    /// Unresolved issues, newest first.
    pub fn open_issues(&self) -> Result<Vec<IssueRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ISSUE_COLUMNS} FROM recovery_issues
             WHERE status = ?1 ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![ISSUE_PENDING], issue_from_row)?;
        let mut issues = Vec::new();
        for row in rows {
            issues.push(row?);
        }
        Ok(issues)
    }
}

fn backup_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BackupRecord> {
    let size: i64 = row.get(3)?;
    let included: String = row.get(8)?;
    Ok(BackupRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        archive_path: row.get(2)?,
        size_bytes: size.max(0) as u64,
        kind: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
        description: row.get(7)?,
        included_files: serde_json::from_str(&included).unwrap_or_default(),
        archive_digest: row.get(9)?,
        project_version: row.get(10)?,
    })
}

fn critical_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CriticalFileRecord> {
    let size: i64 = row.get(2)?;
    Ok(CriticalFileRecord {
        path: row.get(0)?,
        hash: row.get(1)?,
        size_bytes: size.max(0) as u64,
        kind: row.get(3)?,
        critical: row.get(4)?,
        description: row.get(5)?,
        last_backup_at: row.get(6)?,
        modified_at: row.get(7)?,
        content: row.get(8)?,
        encoding: row.get(9)?,
    })
}

fn issue_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<IssueRecord> {
    Ok(IssueRecord {
        id: row.get(0)?,
        kind: row.get(1)?,
        file_path: row.get(2)?,
        description: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
        resolved_at: row.get(6)?,
        action_taken: row.get(7)?,
        backup_used: row.get(8)?,
    })
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS project_backups (
             id              INTEGER PRIMARY KEY AUTOINCREMENT,
             name            TEXT NOT NULL,
             archive_path    TEXT NOT NULL,
             size_bytes      INTEGER NOT NULL DEFAULT 0,
             kind            TEXT NOT NULL DEFAULT 'automatic',
             status          TEXT NOT NULL DEFAULT 'completed',
             created_at      TEXT NOT NULL,
             description     TEXT NOT NULL DEFAULT '',
             included_files  TEXT NOT NULL DEFAULT '[]',
             archive_digest  TEXT NOT NULL DEFAULT '',
             project_version TEXT NOT NULL DEFAULT ''
         );
         CREATE TABLE IF NOT EXISTS critical_files (
             id             INTEGER PRIMARY KEY AUTOINCREMENT,
             path           TEXT UNIQUE NOT NULL,
             hash           TEXT,
             size_bytes     INTEGER NOT NULL DEFAULT 0,
             kind           TEXT,
             critical       INTEGER NOT NULL DEFAULT 1,
             description    TEXT,
             last_backup_at TEXT,
             modified_at    TEXT,
             content        TEXT
         );
         CREATE TABLE IF NOT EXISTS recovery_issues (
             id           INTEGER PRIMARY KEY AUTOINCREMENT,
             kind         TEXT NOT NULL,
             file_path    TEXT NOT NULL DEFAULT '',
             description  TEXT NOT NULL DEFAULT '',
             status       TEXT NOT NULL DEFAULT 'pending',
             created_at   TEXT NOT NULL,
             resolved_at  TEXT,
             action_taken TEXT,
             backup_used  TEXT
         );
         CREATE TABLE IF NOT EXISTS backup_config (
             id          INTEGER PRIMARY KEY AUTOINCREMENT,
             key         TEXT UNIQUE NOT NULL,
             value       TEXT NOT NULL,
             description TEXT NOT NULL DEFAULT '',
             category    TEXT NOT NULL DEFAULT 'backup',
             created_at  TEXT NOT NULL,
             modified_at TEXT NOT NULL
         );",
    )?;
    Ok(())
}

/// Add columns introduced after the initial schema without data loss.
fn migrate(conn: &Connection) -> Result<()> {
    if !column_exists(conn, "critical_files", "encoding")? {
        conn.execute("ALTER TABLE critical_files ADD COLUMN encoding TEXT", [])?;
        info!("added critical_files.encoding column");
    }
    Ok(())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Seed default configuration rows and the default critical-file manifest,
/// each only when the respective table is empty.
fn seed_defaults(conn: &Connection) -> Result<()> {
    let now = now_timestamp();
    let config_rows: i64 = conn.query_row("SELECT COUNT(*) FROM backup_config", [], |r| r.get(0))?;
    if config_rows == 0 {
        for &(key, value, description, category) in DEFAULT_CONFIG {
            conn.execute(
                "INSERT INTO backup_config (key, value, description, category, created_at, modified_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![key, value, description, category, now],
            )?;
        }
        debug!(rows = DEFAULT_CONFIG.len(), "seeded default configuration");
    }

    let manifest_rows: i64 =
        conn.query_row("SELECT COUNT(*) FROM critical_files", [], |r| r.get(0))?;
    if manifest_rows == 0 {
        for &(path, kind, critical, description) in DEFAULT_CRITICAL_FILES {
            conn.execute(
                "INSERT INTO critical_files (path, kind, critical, description)
                 VALUES (?1, ?2, ?3, ?4)",
                params![path, kind, critical, description],
            )?;
        }
        debug!(
            rows = DEFAULT_CRITICAL_FILES.len(),
            "seeded critical-file manifest"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, BackupStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = BackupStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn sample_backup(kind: BackupKind, created_at: String) -> NewBackup {
        NewBackup {
            name: format!("project_{}_test.zip", kind.as_str()),
            archive_path: "/tmp/none.zip".into(),
            size_bytes: 1024,
            kind,
            description: "test".into(),
            included_files: vec!["config.toml".into()],
            archive_digest: "ab".repeat(32),
            project_version: "0.3.0".into(),
            created_at,
        }
    }

    #[test]
    fn open_is_idempotent_and_seeds_defaults() {
        let (dir, store) = test_store();
        assert_eq!(store.config_value_or(config::KEY_KEEP_BACKUP_DAYS, ""), "30");
        assert_eq!(store.critical_files().unwrap().len(), 3);

        // Reopening must not re-seed or lose custom values.
        store
            .set_config(config::KEY_KEEP_BACKUP_DAYS, "7", "", "backup")
            .unwrap();
        let reopened = BackupStore::open(dir.path()).unwrap();
        assert_eq!(
            reopened.config_value_or(config::KEY_KEEP_BACKUP_DAYS, ""),
            "7"
        );
        assert_eq!(reopened.config_entries().unwrap().len(), DEFAULT_CONFIG.len());
    }

    #[test]
    fn migration_adds_encoding_column_once() {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open(dir.path().join("project_backup.db")).unwrap();
        init_schema(&conn).unwrap();
        assert!(!column_exists(&conn, "critical_files", "encoding").unwrap());
        migrate(&conn).unwrap();
        assert!(column_exists(&conn, "critical_files", "encoding").unwrap());
        migrate(&conn).unwrap();
        assert!(column_exists(&conn, "critical_files", "encoding").unwrap());
    }

    #[test]
    fn config_defaults_and_overrides() {
        let (_dir, store) = test_store();
        assert_eq!(store.config_value_or("unknown_key", "fallback"), "fallback");
        store.set_config("unknown_key", "set", "", "misc").unwrap();
        assert_eq!(store.config_value_or("unknown_key", "fallback"), "set");
    }

    #[test]
    fn backup_round_trip_and_lookup() {
        let (_dir, store) = test_store();
        let id = store
            .insert_backup(&sample_backup(BackupKind::Manual, now_timestamp()))
            .unwrap();
        let record = store.backup_by_id(id).unwrap().unwrap();
        assert_eq!(record.kind, BackupKind::Manual.as_str());
        assert_eq!(record.included_files, vec!["config.toml".to_string()]);
        assert!(store.backup_by_id(id + 999).unwrap().is_none());
    }

    #[test]
    fn latest_backup_of_kind_filters() {
        let (_dir, store) = test_store();
        store
            .insert_backup(&sample_backup(BackupKind::Manual, "2026-01-02 00:00:00".into()))
            .unwrap();
        store
            .insert_backup(&sample_backup(
                BackupKind::Automatic,
                "2026-01-01 00:00:00".into(),
            ))
            .unwrap();
        let latest = store
            .latest_backup_of_kind(BackupKind::Automatic)
            .unwrap()
            .unwrap();
        assert_eq!(latest.created_at, "2026-01-01 00:00:00");
    }

    #[test]
    fn pruning_spares_manual_and_recent_backups() {
        let (_dir, store) = test_store();
        let old = format_timestamp(Utc::now() - chrono::Duration::days(40));
        store
            .insert_backup(&sample_backup(BackupKind::Automatic, old.clone()))
            .unwrap();
        store
            .insert_backup(&sample_backup(BackupKind::Manual, old))
            .unwrap();
        store
            .insert_backup(&sample_backup(BackupKind::Automatic, now_timestamp()))
            .unwrap();

        assert_eq!(store.prune_old_automatic(30).unwrap(), 1);
        let remaining = store.recent_backups(10).unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(remaining
            .iter()
            .any(|b| b.kind == BackupKind::Manual.as_str()));
    }

    #[test]
    fn upsert_preserves_seeded_metadata() {
        let (_dir, store) = test_store();
        store
            .upsert_critical_file("config.toml", "deadbeef", 42, "[app]", "text")
            .unwrap();
        let record = store.critical_file("config.toml").unwrap().unwrap();
        assert_eq!(record.hash.as_deref(), Some("deadbeef"));
        assert_eq!(record.size_bytes, 42);
        assert_eq!(record.encoding.as_deref(), Some("text"));
        // Seeded columns survive the refresh.
        assert_eq!(record.kind.as_deref(), Some("config"));
        assert!(record.critical);
        assert_eq!(record.description.as_deref(), Some("Application configuration"));
        // Still exactly one row for the path.
        assert_eq!(store.critical_files().unwrap().len(), 3);
    }

    #[test]
    fn critical_file_path_migration() {
        let (_dir, store) = test_store();
        assert!(store
            .update_critical_file_path("run.sh", "scripts/run.sh")
            .unwrap());
        assert!(store.critical_file("run.sh").unwrap().is_none());
        assert!(store.critical_file("scripts/run.sh").unwrap().is_some());
        assert!(!store.update_critical_file_path("gone", "anywhere").unwrap());
    }

    #[test]
    fn issue_lifecycle() {
        let (_dir, store) = test_store();
        let id = store
            .record_issue(IssueKind::MissingFile, "src/main.rs", "gone", "", "")
            .unwrap();
        let open = store.open_issues().unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].kind, IssueKind::MissingFile.as_str());
        assert_eq!(open[0].status, ISSUE_PENDING);

        assert!(store.resolve_issue(id, "restored from snapshot").unwrap());
        assert!(store.open_issues().unwrap().is_empty());
        assert!(!store.resolve_issue(id + 999, "nothing").unwrap());
    }

    #[test]
    fn timestamps_parse_and_sort() {
        let formatted = now_timestamp();
        assert!(parse_timestamp(&formatted).is_some());
        assert!(parse_timestamp("not a timestamp").is_none());
        assert!("2026-01-01 00:00:00" < "2026-01-02 00:00:00");
    }
}
