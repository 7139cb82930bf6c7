//! CSV backup and restore of the whole user table.

pub mod csv_file;
pub mod error;
pub mod restore;
pub mod service;

pub use error::BackupError;
pub use restore::{RestoreMode, RestorePlan};
pub use service::{backup_filename, BackupService, CsvUpload, MAX_UPLOAD_BYTES};
