//! Candidate-file enumeration for project backups.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::warn;

/// Directories never descended into: version control, virtualenvs, caches,
/// package metadata, build output.
pub const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "target",
    "node_modules",
    "__pycache__",
    "venv",
    ".venv",
    "env",
    ".cache",
    "dist",
];

/// Extensions included in a project backup.
pub const INCLUDED_EXTENSIONS: &[&str] = &[
    ".rs", ".toml", ".md", ".txt", ".json", ".sql", ".sh", ".db",
];

/// Filenames always included regardless of extension.
pub const CORE_FILENAMES: &[&str] = &["Makefile", "Dockerfile", "LICENSE", "run.sh"];

/// Returns `true` when a file name matches the backup allow-lists.
pub fn is_backup_candidate(file_name: &str) -> bool {
    INCLUDED_EXTENSIONS.iter().any(|ext| file_name.ends_with(ext))
        || CORE_FILENAMES.contains(&file_name)
}

/// Configure a walker rooted at `root` that skips the standard excluded
/// directories plus any additional directory names in `extra_excluded`.
pub fn build_walker(root: &Path, extra_excluded: &[&str]) -> WalkBuilder {
    let mut builder = WalkBuilder::new(root);
    builder.follow_links(false);
    builder.hidden(false);
    builder.ignore(false);
    builder.git_global(false);
    builder.git_ignore(false);
    builder.git_exclude(false);
    builder.require_git(false);
    builder.sort_by_file_name(std::ffi::OsStr::cmp);

    let excluded: Vec<String> = EXCLUDED_DIRS
        .iter()
        .chain(extra_excluded.iter())
        .map(|dir| dir.to_string())
        .collect();
    let root_owned = root.to_path_buf();
    builder.filter_entry(move |entry| {
        if entry.path() == root_owned {
            return true;
        }
        let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
        if !is_dir {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        !excluded.iter().any(|dir| dir == name.as_ref())
    });
    builder
}

/// Enumerate backup candidates under `root`. Walk errors are logged and the
/// affected entries skipped; the walk itself never fails.
pub fn collect_candidates(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in build_walker(root, &[]).build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping entry (walk error)");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if is_backup_candidate(&name) {
            files.push(entry.into_path());
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_matching() {
        assert!(is_backup_candidate("main.rs"));
        assert!(is_backup_candidate("Cargo.toml"));
        assert!(is_backup_candidate("notes.md"));
        assert!(is_backup_candidate("Makefile"));
        assert!(!is_backup_candidate("photo.png"));
        assert!(!is_backup_candidate("binary.bin"));
    }

    #[test]
    fn walk_skips_excluded_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::create_dir_all(root.join("target/debug")).unwrap();
        std::fs::write(root.join("Cargo.toml"), "[package]\n").unwrap();
        std::fs::write(root.join("src/main.rs"), "fn main() {}\n").unwrap();
        std::fs::write(root.join(".git/config"), "[core]\n").unwrap();
        std::fs::write(root.join("target/debug/build.rs"), "// generated\n").unwrap();
        std::fs::write(root.join("image.png"), [0u8; 4]).unwrap();

        let candidates = collect_candidates(root);
        let names: Vec<String> = candidates
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().into_owned())
            .collect();

        assert!(names.contains(&"Cargo.toml".to_string()));
        assert!(names.contains(&"src/main.rs".to_string()));
        assert!(!names.iter().any(|n| n.starts_with(".git")));
        assert!(!names.iter().any(|n| n.starts_with("target")));
        assert!(!names.contains(&"image.png".to_string()));
    }

    #[test]
    fn extra_exclusions_apply() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("logs")).unwrap();
        std::fs::write(root.join("logs/app.txt"), "log line\n").unwrap();
        std::fs::write(root.join("kept.txt"), "kept\n").unwrap();

        let mut seen = Vec::new();
        for entry in build_walker(root, &["logs"]).build().flatten() {
            if entry.file_type().is_some_and(|ft| ft.is_file()) {
                seen.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        assert!(seen.contains(&"kept.txt".to_string()));
        assert!(!seen.contains(&"app.txt".to_string()));
    }
}
