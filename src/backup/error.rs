use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("backup file {0} not found")]
    FileNotFound(String),

    #[error("invalid backup format: {0}")]
    InvalidFormat(String),

    #[error("backup contains no user rows")]
    EmptyInput,

    /// Existing records were already deleted when an insert failed.
    #[error(
        "restore failed after clearing existing users: {restored} of {total} rows restored, \
         insert of user {failed_id} failed: {reason}"
    )]
    PartialRestoreFailure {
        restored: usize,
        total: usize,
        failed_id: i32,
        reason: String,
    },

    /// Transactional restore rejected by the store; prior data is intact.
    #[error("restore rolled back, existing users kept: {0}")]
    RestoreAborted(String),

    #[error("backup file IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackupError {
    pub(crate) fn from_store(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => BackupError::StoreUnavailable(msg),
            other => BackupError::StoreUnavailable(other.to_string()),
        }
    }

    pub(crate) fn from_csv(err: csv::Error) -> Self {
        match err.kind() {
            csv::ErrorKind::Io(_) => BackupError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                err.to_string(),
            )),
            _ => BackupError::InvalidFormat(err.to_string()),
        }
    }

    /// Stable identifier used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            BackupError::StoreUnavailable(_) => "store_unavailable",
            BackupError::FileNotFound(_) => "file_not_found",
            BackupError::InvalidFormat(_) => "invalid_format",
            BackupError::EmptyInput => "empty_input",
            BackupError::PartialRestoreFailure { .. } => "partial_restore_failure",
            BackupError::RestoreAborted(_) => "restore_aborted",
            BackupError::Io(_) => "io",
        }
    }
}
