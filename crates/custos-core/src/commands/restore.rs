//! Restore the project tree from a stored backup archive.

use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{error, info, warn};
use zip::ZipArchive;

use super::backup;
use crate::error::{CustosError, Result};
use crate::project::Project;
use crate::store::{BackupKind, IssueKind};

#[derive(Debug, Clone)]
pub struct RestoreReport {
    pub success: bool,
    pub message: String,
    pub files_restored: usize,
    pub safety_backup_id: Option<i64>,
}

impl RestoreReport {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            files_restored: 0,
            safety_backup_id: None,
        }
    }
}

/// Restore from the backup with the given id. A fresh manual safety backup
/// gates the restore: when it cannot be created, nothing is extracted.
pub fn run(project: &Project, backup_id: i64) -> RestoreReport {
    match restore(project, backup_id) {
        Ok(report) => report,
        Err(e) => {
            error!(backup_id, error = %e, "restore aborted");
            RestoreReport::failure(e.to_string())
        }
    }
}

fn restore(project: &Project, backup_id: i64) -> Result<RestoreReport> {
    let record = project
        .store()
        .backup_by_id(backup_id)?
        .ok_or(CustosError::BackupNotFound(backup_id))?;
    if !Path::new(&record.archive_path).exists() {
        return Err(CustosError::ArchiveMissing(record.archive_path.clone()));
    }

    let safety = backup::run(
        project,
        BackupKind::Manual,
        &format!("safety backup before restoring backup {backup_id}"),
    );
    if !safety.success {
        return Err(CustosError::SafetyBackupFailed(safety.message));
    }

    let file = File::open(&record.archive_path)?;
    let mut archive = ZipArchive::new(file)?;

    let mut restored = 0usize;
    for index in 0..archive.len() {
        match extract_entry(&mut archive, index, project.root()) {
            Ok(true) => restored += 1,
            Ok(false) => {}
            Err(e) => warn!(index, error = %e, "skipping archive entry"),
        }
    }

    // The restore itself goes into the issue log as an audit entry.
    project.store().record_issue(
        IssueKind::ProjectRestore,
        "",
        &format!("project restored from backup {backup_id}"),
        &format!("restored from {}", record.name),
        &record.name,
    )?;

    info!(backup = %record.name, restored, "project restored");

    Ok(RestoreReport {
        success: true,
        message: format!("project restored from {}", record.name),
        files_restored: restored,
        safety_backup_id: safety.backup_id,
    })
}

/// Extract one archive entry under `root`, creating missing directories.
/// Returns `Ok(false)` for directory entries.
fn extract_entry(archive: &mut ZipArchive<File>, index: usize, root: &Path) -> Result<bool> {
    let mut entry = archive.by_index(index)?;
    let Some(rel) = entry.enclosed_name() else {
        return Err(CustosError::Other(format!(
            "refusing unsafe archive path: {}",
            entry.name()
        )));
    };
    let target = root.join(sanitize_relative(&rel)?);
    if entry.is_dir() {
        std::fs::create_dir_all(&target)?;
        return Ok(false);
    }
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = File::create(&target)?;
    io::copy(&mut entry, &mut out)?;
    Ok(true)
}

/// Reject absolute paths and parent-directory components.
fn sanitize_relative(path: &Path) -> Result<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(CustosError::Other(format!(
                    "refusing to restore unsafe path: {}",
                    path.display()
                )));
            }
        }
    }
    if out.as_os_str().is_empty() {
        return Err(CustosError::Other("refusing to restore empty path".into()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_accepts_plain_relative_paths() {
        assert_eq!(
            sanitize_relative(Path::new("src/main.rs")).unwrap(),
            PathBuf::from("src/main.rs")
        );
    }

    #[test]
    fn sanitize_rejects_parent_traversal() {
        let err = sanitize_relative(Path::new("../etc/passwd"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("unsafe path"));
    }

    #[test]
    fn sanitize_rejects_absolute_paths() {
        assert!(sanitize_relative(Path::new("/etc/passwd")).is_err());
    }

    #[test]
    fn sanitize_rejects_empty_paths() {
        assert!(sanitize_relative(Path::new("")).is_err());
        assert!(sanitize_relative(Path::new(".")).is_err());
    }
}
