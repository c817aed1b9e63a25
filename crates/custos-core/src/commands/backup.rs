//! Project backup creation.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{error, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::walk;
use crate::error::Result;
use crate::hash;
use crate::project::Project;
use crate::snapshot;
use crate::store::{self, BackupKind, NewBackup};

/// Version tag stamped on every backup record.
const PROJECT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result of a backup run.
#[derive(Debug, Clone)]
pub struct BackupReport {
    pub success: bool,
    pub message: String,
    pub backup_id: Option<i64>,
    pub archive_path: Option<PathBuf>,
    pub size_bytes: u64,
    pub files_included: usize,
    pub archive_digest: String,
}

impl BackupReport {
    pub(crate) fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            backup_id: None,
            archive_path: None,
            size_bytes: 0,
            files_included: 0,
            archive_digest: String::new(),
        }
    }
}

/// Create a project backup. Never returns an error to the caller: failures
/// come back as a report with `success = false`.
pub fn run(project: &Project, kind: BackupKind, description: &str) -> BackupReport {
    match create(project, kind, description) {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "backup creation failed");
            BackupReport::failure(format!("backup creation failed: {e}"))
        }
    }
}

fn create(project: &Project, kind: BackupKind, description: &str) -> Result<BackupReport> {
    if kind == BackupKind::Automatic && !project.auto_backup_enabled() {
        return Ok(BackupReport::failure("automatic backups are disabled"));
    }

    let backup_dir = project.backup_dir();
    std::fs::create_dir_all(&backup_dir)?;

    let name = format!(
        "project_{}_{}.zip",
        kind.as_str(),
        Utc::now().format("%Y%m%d_%H%M%S")
    );
    let archive_path = backup_dir.join(&name);

    let candidates = walk::collect_candidates(project.root());

    let file = File::create(&archive_path)?;
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    // A single unreadable file never aborts the whole backup.
    let mut included = Vec::new();
    for path in &candidates {
        match archive_file(project, &mut writer, path, &options) {
            Ok(entry_name) => included.push(entry_name),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping file"),
        }
    }
    writer.finish()?.flush()?;

    let size_bytes = std::fs::metadata(&archive_path)?.len();
    let archive_digest = hash::sha256_file(&archive_path)?;

    let backup_id = project.store().insert_backup(&NewBackup {
        name: name.clone(),
        archive_path: archive_path.to_string_lossy().into_owned(),
        size_bytes,
        kind,
        description: description.to_string(),
        included_files: included.clone(),
        archive_digest: archive_digest.clone(),
        project_version: PROJECT_VERSION.to_string(),
        created_at: store::now_timestamp(),
    })?;

    if let Err(e) = project.store().prune_old_automatic(project.keep_backup_days()) {
        warn!(error = %e, "retention pruning failed");
    }

    info!(backup = %name, files = included.len(), size_bytes, "project backup created");

    Ok(BackupReport {
        success: true,
        message: format!("backup created: {name}"),
        backup_id: Some(backup_id),
        archive_path: Some(archive_path),
        size_bytes,
        files_included: included.len(),
        archive_digest,
    })
}

/// Add one file to the archive and refresh its manifest snapshot. Returns
/// the project-relative entry name.
fn archive_file(
    project: &Project,
    writer: &mut ZipWriter<BufWriter<File>>,
    path: &Path,
    options: &SimpleFileOptions,
) -> Result<String> {
    let rel = path.strip_prefix(project.root()).unwrap_or(path);
    let entry_name = rel.to_string_lossy().replace('\\', "/");

    let mut contents = Vec::new();
    File::open(path)?.read_to_end(&mut contents)?;

    writer.start_file(entry_name.as_str(), options.clone())?;
    writer.write_all(&contents)?;

    // Manifest refresh failures are soft: the file is still in the archive.
    if let Err(e) = record_snapshot(project, &entry_name, &contents) {
        warn!(path = %entry_name, error = %e, "manifest refresh failed");
    }

    Ok(entry_name)
}

/// Refresh a file's critical-file record: hash, size, and content snapshot.
pub(crate) fn record_snapshot(project: &Project, rel_path: &str, contents: &[u8]) -> Result<()> {
    let digest = hash::sha256_bytes(contents);
    let (stored, encoding) = snapshot::capture(contents);
    project.store().upsert_critical_file(
        rel_path,
        &digest,
        contents.len() as u64,
        &stored,
        encoding,
    )
}
