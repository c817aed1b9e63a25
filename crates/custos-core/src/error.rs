use thiserror::Error;

pub type Result<T> = std::result::Result<T, CustosError>;

#[derive(Debug, Error)]
pub enum CustosError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("backup not found: {0}")]
    BackupNotFound(i64),

    #[error("backup archive missing on disk: '{0}'")]
    ArchiveMissing(String),

    #[error("safety backup failed: {0}")]
    SafetyBackupFailed(String),

    #[error("{0}")]
    Other(String),
}
