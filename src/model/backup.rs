use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct BackupCreatedResponse {
    pub message: String,
    pub filename: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResponse {
    pub message: String,
    pub users_restored: usize,
    pub filename: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct BackupListResponse {
    pub backups: Vec<String>,
    pub count: usize,
}

impl BackupListResponse {
    pub fn new(backups: Vec<String>) -> Self {
        let count = backups.len();
        Self { backups, count }
    }
}
