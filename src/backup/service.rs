use chrono::{DateTime, SecondsFormat, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::restore::{RestoreMode, RestorePlan};
use super::{csv_file, BackupError};
use crate::store::SharedStore;

/// Largest CSV upload accepted by the restore-by-upload path.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// `backup-<ISO 8601 timestamp>.csv` with ':' and '.' replaced by '-'.
pub fn backup_filename(now: DateTime<Utc>) -> String {
    let stamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("backup-{}.csv", stamp)
}

/// A CSV file received over HTTP.
#[derive(Debug, Clone, Default)]
pub struct CsvUpload {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl CsvUpload {
    /// Accepts the upload when either the content type is `text/csv` or the
    /// filename ends in `.csv`, and the payload fits [`MAX_UPLOAD_BYTES`].
    pub fn validate(&self) -> Result<(), BackupError> {
        let csv_type = self
            .content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("text/csv"));
        let csv_name = self
            .filename
            .as_deref()
            .is_some_and(|name| name.to_ascii_lowercase().ends_with(".csv"));

        if !csv_type && !csv_name {
            return Err(BackupError::InvalidFormat(
                "only CSV files are accepted (text/csv or a .csv filename)".to_string(),
            ));
        }
        if self.data.len() > MAX_UPLOAD_BYTES {
            return Err(BackupError::InvalidFormat(format!(
                "upload exceeds the {} byte limit",
                MAX_UPLOAD_BYTES
            )));
        }
        Ok(())
    }
}

/// Creates, lists and restores CSV backups kept in one flat directory.
///
/// Backup creation and restores take the same lock, so at most one of
/// them runs at a time.
pub struct BackupService {
    store: SharedStore,
    dir: PathBuf,
    mode: RestoreMode,
    lock: Mutex<()>,
}

impl BackupService {
    pub fn new(store: SharedStore, dir: impl Into<PathBuf>, mode: RestoreMode) -> Self {
        Self {
            store,
            dir: dir.into(),
            mode,
            lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn mode(&self) -> RestoreMode {
        self.mode
    }

    pub async fn create_backup(&self) -> Result<String, BackupError> {
        self.create_backup_at(Utc::now()).await
    }

    /// Writes every record to `backup-<now>.csv` and returns the filename.
    pub async fn create_backup_at(&self, now: DateTime<Utc>) -> Result<String, BackupError> {
        let _guard = self.lock.lock().await;

        let records = self.store.list_all().await.map_err(BackupError::from_store)?;
        let bytes = csv_file::write_records(&records)?;

        fs::create_dir_all(&self.dir).await?;
        let filename = backup_filename(now);
        let target = self.dir.join(&filename);
        let partial = self
            .dir
            .join(format!(".{}.{}.partial", filename, Uuid::new_v4()));

        if let Err(err) = write_then_rename(&partial, &target, &bytes).await {
            if let Err(cleanup) = fs::remove_file(&partial).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    tracing::warn!(path = %partial.display(), error = %cleanup, "could not remove partial backup");
                }
            }
            return Err(err.into());
        }

        tracing::info!(%filename, users = records.len(), "backup created");
        Ok(filename)
    }

    /// Names of `.csv` files in the backup directory, sorted (which is also
    /// chronological). A missing or unreadable directory yields no backups.
    pub async fn list_backups(&self) -> Vec<String> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    tracing::warn!(dir = %self.dir.display(), error = %err, "cannot read backup directory");
                }
                return Vec::new();
            }
        };

        let mut names = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
                    if let Some(name) = entry.file_name().to_str() {
                        if is_file && name.ends_with(".csv") {
                            names.push(name.to_string());
                        }
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(dir = %self.dir.display(), error = %err, "backup listing interrupted");
                    break;
                }
            }
        }

        names.sort();
        names
    }

    /// Location of a named backup inside the backup directory. Names that
    /// could point elsewhere never resolve.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf, BackupError> {
        let plain = !filename.is_empty()
            && !filename.contains(['/', '\\', '"'])
            && !filename.starts_with('.')
            && filename.ends_with(".csv");
        if !plain {
            return Err(BackupError::FileNotFound(filename.to_string()));
        }
        Ok(self.dir.join(filename))
    }

    /// Opens a backup for streaming to a client.
    pub async fn open_backup(&self, filename: &str) -> Result<fs::File, BackupError> {
        let path = self.resolve(filename)?;
        fs::File::open(&path).await.map_err(|err| match err.kind() {
            ErrorKind::NotFound => BackupError::FileNotFound(filename.to_string()),
            _ => BackupError::Io(err),
        })
    }

    pub async fn restore_from_file(&self, filename: &str) -> Result<usize, BackupError> {
        let path = self.resolve(filename)?;
        let data = fs::read(&path).await.map_err(|err| match err.kind() {
            ErrorKind::NotFound => BackupError::FileNotFound(filename.to_string()),
            _ => BackupError::Io(err),
        })?;

        let restored = self.restore_bytes(&data).await?;
        tracing::info!(%filename, restored, "users restored from backup");
        Ok(restored)
    }

    pub async fn restore_from_upload(&self, upload: &CsvUpload) -> Result<usize, BackupError> {
        upload.validate()?;

        let restored = self.restore_bytes(&upload.data).await?;
        tracing::info!(
            filename = upload.filename.as_deref().unwrap_or("<unnamed>"),
            restored,
            "users restored from upload"
        );
        Ok(restored)
    }

    async fn restore_bytes(&self, data: &[u8]) -> Result<usize, BackupError> {
        // Parsing needs no lock: nothing is mutated until commit
        let plan = RestorePlan::parse(data)?;

        let _guard = self.lock.lock().await;
        plan.commit(self.store.as_ref(), self.mode).await
    }
}

async fn write_then_rename(partial: &Path, target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    fs::write(partial, bytes).await?;
    fs::rename(partial, target).await
}
