//! Aggregate backup statistics.

use tracing::error;

use crate::error::Result;
use crate::project::Project;
use crate::store::BackupKind;

#[derive(Debug, Clone, Default)]
pub struct BackupStats {
    pub success: bool,
    pub message: String,
    pub backups_total: usize,
    pub backups_automatic: usize,
    pub backups_manual: usize,
    pub total_size_bytes: u64,
    pub critical_files: usize,
    pub open_issues: usize,
    pub auto_backup_enabled: bool,
    pub auto_repair_enabled: bool,
}

pub fn run(project: &Project) -> BackupStats {
    match collect(project) {
        Ok(stats) => stats,
        Err(e) => {
            error!(error = %e, "statistics collection failed");
            BackupStats {
                success: false,
                message: format!("statistics collection failed: {e}"),
                ..Default::default()
            }
        }
    }
}

fn collect(project: &Project) -> Result<BackupStats> {
    let backups = project.store().recent_backups(50)?;
    let critical = project.store().critical_files()?;
    let issues = project.store().open_issues()?;

    let automatic = backups
        .iter()
        .filter(|b| b.kind == BackupKind::Automatic.as_str())
        .count();
    let manual = backups
        .iter()
        .filter(|b| b.kind == BackupKind::Manual.as_str())
        .count();

    Ok(BackupStats {
        success: true,
        message: format!("{} backups on record", backups.len()),
        backups_total: backups.len(),
        backups_automatic: automatic,
        backups_manual: manual,
        total_size_bytes: backups.iter().map(|b| b.size_bytes).sum(),
        critical_files: critical.len(),
        open_issues: issues.len(),
        auto_backup_enabled: project.auto_backup_enabled(),
        auto_repair_enabled: project.auto_repair_enabled(),
    })
}
