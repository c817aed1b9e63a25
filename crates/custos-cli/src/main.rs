mod cli;
mod format;
mod table;

use clap::Parser;

use custos_core::commands::{backup, cleanup, info, repair, restore, schedule, verify};
use custos_core::store::BackupKind;
use custos_core::{Project, ProjectConfig};

use cli::{Cli, Commands};
use format::format_bytes;

fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = ProjectConfig::new(&cli.project_root, &cli.data_dir);
    let project = match Project::open(config) {
        Ok(project) => project,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    // Opt-in startup cleanup, skipped when the invoked command is already a
    // cleanup to avoid running it twice.
    if project.auto_duplicate_cleanup() && !matches!(cli.command, Commands::Cleanup) {
        let report = cleanup::run(&project);
        println!("startup cleanup: {}", report.message);
    }

    if !run_command(&project, &cli.command) {
        std::process::exit(1);
    }
}

fn run_command(project: &Project, command: &Commands) -> bool {
    match command {
        Commands::Backup {
            automatic,
            description,
        } => {
            let kind = if *automatic {
                BackupKind::Automatic
            } else {
                BackupKind::Manual
            };
            let report = backup::run(project, kind, description);
            println!("{}", report.message);
            if let Some(path) = &report.archive_path {
                println!(
                    "  archive: {} ({}, {} files)",
                    path.display(),
                    format_bytes(report.size_bytes),
                    report.files_included
                );
            }
            report.success
        }

        Commands::Restore { backup_id } => {
            let report = restore::run(project, *backup_id);
            println!("{}", report.message);
            report.success
        }

        Commands::Verify => {
            let report = verify::run(project);
            println!("{}", report.message);
            for path in &report.missing {
                println!("  missing:   {path}");
            }
            for path in &report.corrupted {
                println!("  corrupted: {path}");
            }
            report.success && report.missing.is_empty() && report.corrupted.is_empty()
        }

        Commands::Repair => {
            let report = repair::run(project);
            println!("{}", report.message);
            for path in &report.repaired {
                println!("  repaired: {path}");
            }
            for path in &report.failed {
                println!("  failed:   {path}");
            }
            report.success && report.failed.is_empty()
        }

        Commands::List { last } => match project.recent_backups(*last) {
            Ok(backups) if backups.is_empty() => {
                println!("no backups on record");
                true
            }
            Ok(backups) => {
                println!("{}", table::backup_table(&backups));
                true
            }
            Err(e) => {
                eprintln!("Error: {e}");
                false
            }
        },

        Commands::Info => {
            let stats = info::run(project);
            if !stats.success {
                eprintln!("Error: {}", stats.message);
                return false;
            }
            println!(
                "Backups:        {} ({} automatic, {} manual)",
                stats.backups_total, stats.backups_automatic, stats.backups_manual
            );
            println!("Archive bytes:  {}", format_bytes(stats.total_size_bytes));
            println!("Critical files: {}", stats.critical_files);
            println!("Open issues:    {}", stats.open_issues);
            println!("Auto backup:    {}", enabled(stats.auto_backup_enabled));
            println!("Auto repair:    {}", enabled(stats.auto_repair_enabled));
            true
        }

        Commands::Cleanup => {
            let report = cleanup::run(project);
            println!("{}", report.message);
            for label in &report.files_removed {
                println!("  {label}");
            }
            if report.duplicate_rows_removed > 0 {
                println!("  duplicate rows removed: {}", report.duplicate_rows_removed);
            }
            report.success
        }

        // "not due" is a normal outcome for a cron-driven schedule check.
        Commands::Schedule => {
            let report = schedule::run(project);
            println!("{}", report.message);
            true
        }

        Commands::Config { key, value } => run_config(project, key.as_deref(), value.as_deref()),

        Commands::Issues => match project.open_issues() {
            Ok(issues) if issues.is_empty() => {
                println!("no open issues");
                true
            }
            Ok(issues) => {
                for issue in &issues {
                    println!(
                        "#{} [{}] {}: {}",
                        issue.id, issue.kind, issue.file_path, issue.description
                    );
                }
                true
            }
            Err(e) => {
                eprintln!("Error: {e}");
                false
            }
        },

        Commands::Resolve { issue_id, action } => match project.resolve_issue(*issue_id, action) {
            Ok(true) => {
                println!("issue {issue_id} resolved");
                true
            }
            Ok(false) => {
                eprintln!("no open issue with id {issue_id}");
                false
            }
            Err(e) => {
                eprintln!("Error: {e}");
                false
            }
        },
    }
}

fn run_config(project: &Project, key: Option<&str>, value: Option<&str>) -> bool {
    match (key, value) {
        (Some(key), Some(value)) => match project.set_config(key, value, "", "backup") {
            Ok(()) => {
                println!("{key} = {value}");
                true
            }
            Err(e) => {
                eprintln!("Error: {e}");
                false
            }
        },
        (Some(key), None) => {
            println!("{key} = {}", project.config_value(key, ""));
            true
        }
        (None, _) => match project.store().config_entries() {
            Ok(entries) => {
                for entry in &entries {
                    println!("{} = {}", entry.key, entry.value);
                }
                true
            }
            Err(e) => {
                eprintln!("Error: {e}");
                false
            }
        },
    }
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}
