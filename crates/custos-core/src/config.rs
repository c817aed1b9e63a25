use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{CustosError, Result};

// Keys of the durable configuration rows in the backup store.
pub const KEY_AUTO_BACKUP: &str = "auto_backup_enabled";
pub const KEY_BACKUP_FREQUENCY: &str = "backup_frequency";
pub const KEY_KEEP_BACKUP_DAYS: &str = "keep_backup_days";
pub const KEY_AUTO_REPAIR: &str = "auto_repair_enabled";
pub const KEY_LOG_CLEANUP_DAYS: &str = "log_cleanup_days";
pub const KEY_AUTO_DUPLICATE_CLEANUP: &str = "auto_duplicate_cleanup";

/// Where the managed project lives and where its backup data goes.
///
/// Constructed once by the application and passed explicitly; nothing in the
/// engine reads paths from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Root of the project tree to back up.
    pub project_root: PathBuf,
    /// Directory holding the backup database and archive files.
    pub data_dir: PathBuf,
}

impl ProjectConfig {
    pub fn new(project_root: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            data_dir: data_dir.into(),
        }
    }

    /// Directory where backup archives are written.
    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }
}

/// How often automatic backups are due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            other => Err(CustosError::Config(format!(
                "unknown backup frequency '{other}' (expected daily, weekly, or monthly)"
            ))),
        }
    }

    /// Minimum number of days between automatic backups.
    pub fn days(self) -> i64 {
        match self {
            Frequency::Daily => 1,
            Frequency::Weekly => 7,
            Frequency::Monthly => 30,
        }
    }
}
