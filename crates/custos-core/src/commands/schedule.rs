//! Frequency gate for automatic backups.

use chrono::Utc;
use tracing::error;

use super::backup::{self, BackupReport};
use crate::error::Result;
use crate::project::Project;
use crate::store::{parse_timestamp, BackupKind};

/// Run an automatic backup when one is due according to the configured
/// frequency, measured against the newest automatic backup. A "not due"
/// outcome is a report with `success = false`, not an error.
pub fn run(project: &Project) -> BackupReport {
    match run_if_due(project) {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "scheduled backup failed");
            BackupReport::failure(format!("scheduled backup failed: {e}"))
        }
    }
}

fn run_if_due(project: &Project) -> Result<BackupReport> {
    if !project.auto_backup_enabled() {
        return Ok(BackupReport::failure("automatic backups are disabled"));
    }

    if let Some(last) = project.store().latest_backup_of_kind(BackupKind::Automatic)? {
        if let Some(created) = parse_timestamp(&last.created_at) {
            let elapsed_days = (Utc::now() - created).num_days();
            let due_after = project.backup_frequency().days();
            if elapsed_days < due_after {
                return Ok(BackupReport::failure(format!(
                    "automatic backup not due yet (last one {elapsed_days} day(s) ago, due every {due_after})"
                )));
            }
        }
    }

    Ok(backup::run(
        project,
        BackupKind::Automatic,
        "scheduled automatic backup",
    ))
}
