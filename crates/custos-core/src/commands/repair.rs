//! Automatic repair of missing or corrupted critical files.

use tracing::{error, info, warn};

use super::{backup, verify};
use crate::error::Result;
use crate::project::Project;
use crate::snapshot;

#[derive(Debug, Clone, Default)]
pub struct RepairReport {
    pub success: bool,
    pub message: String,
    pub repaired: Vec<String>,
    pub failed: Vec<String>,
}

/// Rewrite every missing or corrupted critical file from its stored
/// snapshot. Gated by the auto-repair configuration flag.
pub fn run(project: &Project) -> RepairReport {
    match repair(project) {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "auto-repair failed");
            RepairReport {
                success: false,
                message: format!("auto-repair failed: {e}"),
                ..Default::default()
            }
        }
    }
}

fn repair(project: &Project) -> Result<RepairReport> {
    if !project.auto_repair_enabled() {
        return Ok(RepairReport {
            success: false,
            message: "auto-repair is disabled".into(),
            ..Default::default()
        });
    }

    let verification = verify::run(project);
    if !verification.success {
        return Ok(RepairReport {
            success: false,
            message: verification.message,
            ..Default::default()
        });
    }

    let mut report = RepairReport {
        success: true,
        ..Default::default()
    };

    // Corrupted files take the same path as missing ones: overwrite from the
    // stored snapshot, no reconciliation with whatever is on disk.
    for path in verification
        .missing
        .iter()
        .chain(verification.corrupted.iter())
    {
        match restore_from_snapshot(project, path) {
            Ok(true) => report.repaired.push(path.clone()),
            Ok(false) => {
                warn!(path = %path, "no snapshot available; cannot repair");
                report.failed.push(path.clone());
            }
            Err(e) => {
                warn!(path = %path, error = %e, "repair failed");
                report.failed.push(path.clone());
            }
        }
    }

    report.message = format!(
        "{} repaired, {} failed",
        report.repaired.len(),
        report.failed.len()
    );
    Ok(report)
}

/// Rewrite one file from its manifest snapshot, recreating parent
/// directories. Returns `Ok(false)` when no usable snapshot exists.
fn restore_from_snapshot(project: &Project, rel_path: &str) -> Result<bool> {
    let Some(record) = project.store().critical_file(rel_path)? else {
        return Ok(false);
    };
    let Some(stored) = record.content.as_deref().filter(|c| !c.is_empty()) else {
        return Ok(false);
    };
    let encoding = record.encoding.as_deref().unwrap_or(snapshot::ENCODING_TEXT);
    let bytes = snapshot::materialize(stored, encoding)?;

    let target = project.root().join(rel_path);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&target, &bytes)?;

    backup::record_snapshot(project, rel_path, &bytes)?;
    info!(path = %rel_path, "file repaired from snapshot");
    Ok(true)
}
