use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "custos",
    version,
    about = "Project self-backup, integrity checks, and auto-repair"
)]
pub(crate) struct Cli {
    /// Root of the project tree to manage
    #[arg(short = 'p', long, default_value = ".")]
    pub project_root: String,

    /// Directory holding the backup database and archives
    #[arg(short = 'd', long, default_value = "./custos-data")]
    pub data_dir: String,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Create a project backup
    Backup {
        /// Record the backup as automatic instead of manual
        #[arg(long)]
        automatic: bool,

        /// Free-text description stored with the backup
        #[arg(short = 'm', long, default_value = "")]
        description: String,
    },

    /// Restore the project from a stored backup
    Restore {
        /// Backup id (see `custos list`)
        backup_id: i64,
    },

    /// Verify critical-file integrity
    Verify,

    /// Repair missing or corrupted critical files from snapshots
    Repair,

    /// List recent backups
    List {
        /// Show only the N most recent backups
        #[arg(long, default_value_t = 10)]
        last: usize,
    },

    /// Show aggregate backup statistics
    Info,

    /// Remove duplicate and excess files (takes a safety backup first)
    Cleanup,

    /// Run an automatic backup if one is due
    Schedule,

    /// Show or change stored configuration
    Config {
        /// Configuration key to read or write
        key: Option<String>,

        /// New value for the key
        value: Option<String>,
    },

    /// List unresolved issues
    Issues,

    /// Mark an issue as resolved
    Resolve {
        issue_id: i64,

        /// Action note recorded with the resolution
        #[arg(short = 'm', long, default_value = "resolved by operator")]
        action: String,
    },
}
