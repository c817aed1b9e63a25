//! Integrity verification of the critical-file manifest.

use tracing::{error, warn};

use crate::error::Result;
use crate::hash;
use crate::project::Project;
use crate::store::IssueKind;

/// Outcome of an integrity check over every tracked file.
#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    pub success: bool,
    pub message: String,
    pub files_total: usize,
    pub files_ok: usize,
    pub missing: Vec<String>,
    pub corrupted: Vec<String>,
}

/// Check every manifest entry against the live tree. Each missing or
/// corrupted file produces a new issue record.
pub fn run(project: &Project) -> VerifyReport {
    match verify(project) {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "integrity verification failed");
            VerifyReport {
                success: false,
                message: format!("integrity verification failed: {e}"),
                ..Default::default()
            }
        }
    }
}

fn verify(project: &Project) -> Result<VerifyReport> {
    let records = project.store().critical_files()?;
    let mut report = VerifyReport {
        success: true,
        files_total: records.len(),
        ..Default::default()
    };

    for record in &records {
        let path = project.root().join(&record.path);
        if !path.exists() {
            report.missing.push(record.path.clone());
            continue;
        }
        match record.hash.as_deref() {
            // Entries without a stored hash (e.g. freshly seeded) pass on
            // existence alone.
            None | Some("") => report.files_ok += 1,
            Some(expected) => match hash::sha256_file(&path) {
                Ok(actual) if actual == expected => report.files_ok += 1,
                Ok(_) => report.corrupted.push(record.path.clone()),
                Err(e) => {
                    warn!(path = %record.path, error = %e, "could not hash file; treating as corrupted");
                    report.corrupted.push(record.path.clone());
                }
            },
        }
    }

    for path in &report.missing {
        if let Err(e) = project.store().record_issue(
            IssueKind::MissingFile,
            path,
            &format!("critical file missing: {path}"),
            "",
            "",
        ) {
            warn!(path = %path, error = %e, "could not record missing-file issue");
        }
    }
    for path in &report.corrupted {
        if let Err(e) = project.store().record_issue(
            IssueKind::CorruptedFile,
            path,
            &format!("critical file corrupted: {path}"),
            "",
            "",
        ) {
            warn!(path = %path, error = %e, "could not record corrupted-file issue");
        }
    }

    report.message = format!(
        "{} files checked: {} ok, {} missing, {} corrupted",
        report.files_total,
        report.files_ok,
        report.missing.len(),
        report.corrupted.len()
    );
    Ok(report)
}
