//! The handle every operation works against: project paths, the backup
//! store, and typed accessors over durable configuration.

use std::path::{Path, PathBuf};

use crate::config::{self, Frequency, ProjectConfig};
use crate::error::Result;
use crate::store::{BackupRecord, BackupStore, IssueRecord};

/// A project under management. Constructed once by the application's
/// composition root and passed by reference to every operation.
pub struct Project {
    config: ProjectConfig,
    store: BackupStore,
}

impl Project {
    /// Open the project, creating the backup store on first use.
    pub fn open(config: ProjectConfig) -> Result<Self> {
        let store = BackupStore::open(&config.data_dir)?;
        Ok(Self { config, store })
    }

    pub fn root(&self) -> &Path {
        &self.config.project_root
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.config.backup_dir()
    }

    pub fn store(&self) -> &BackupStore {
        &self.store
    }

    // --- typed configuration accessors -------------------------------------

    pub fn config_value(&self, key: &str, default: &str) -> String {
        self.store.config_value_or(key, default)
    }

    pub fn set_config(&self, key: &str, value: &str, description: &str, category: &str) -> Result<()> {
        self.store.set_config(key, value, description, category)
    }

    pub fn auto_backup_enabled(&self) -> bool {
        self.config_value(config::KEY_AUTO_BACKUP, "true") == "true"
    }

    pub fn auto_repair_enabled(&self) -> bool {
        self.config_value(config::KEY_AUTO_REPAIR, "true") == "true"
    }

    pub fn auto_duplicate_cleanup(&self) -> bool {
        self.config_value(config::KEY_AUTO_DUPLICATE_CLEANUP, "false") == "true"
    }

    pub fn keep_backup_days(&self) -> i64 {
        self.config_value(config::KEY_KEEP_BACKUP_DAYS, "30")
            .parse()
            .unwrap_or(30)
    }

    pub fn log_cleanup_days(&self) -> i64 {
        self.config_value(config::KEY_LOG_CLEANUP_DAYS, "90")
            .parse()
            .unwrap_or(90)
    }

    pub fn backup_frequency(&self) -> Frequency {
        Frequency::parse(&self.config_value(config::KEY_BACKUP_FREQUENCY, "daily"))
            .unwrap_or(Frequency::Daily)
    }

    // --- passthroughs used by operator frontends ----------------------------

    pub fn recent_backups(&self, limit: usize) -> Result<Vec<BackupRecord>> {
        self.store.recent_backups(limit)
    }

    pub fn open_issues(&self) -> Result<Vec<IssueRecord>> {
        self.store.open_issues()
    }

    pub fn resolve_issue(&self, id: i64, action: &str) -> Result<bool> {
        self.store.resolve_issue(id, action)
    }

    /// Rename a tracked manifest path after a file moved inside the project.
    pub fn migrate_critical_file_path(&self, old_path: &str, new_path: &str) -> Result<bool> {
        self.store.update_critical_file_path(old_path, new_path)
    }
}
