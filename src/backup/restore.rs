//! Two-phase restore: parse everything into a [`RestorePlan`], then commit
//! it against the store in one of two modes.

use std::fmt;
use std::str::FromStr;

use super::{csv_file, BackupError};
use crate::model::user::UserRecord;
use crate::store::{StoreCapability, StoreError, UserStore};

/// How the delete+insert sequence of a restore is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestoreMode {
    /// Delete, then insert row by row. The first failing insert stops the
    /// restore and rows inserted before it stay in the store.
    #[default]
    BestEffort,
    /// Replace the dataset inside a single store transaction.
    Transactional,
}

impl FromStr for RestoreMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best-effort" | "best_effort" | "besteffort" => Ok(RestoreMode::BestEffort),
            "transactional" => Ok(RestoreMode::Transactional),
            other => Err(format!(
                "unknown restore mode {:?} (expected best-effort or transactional)",
                other
            )),
        }
    }
}

impl fmt::Display for RestoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreMode::BestEffort => f.write_str("best-effort"),
            RestoreMode::Transactional => f.write_str("transactional"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RestorePhase {
    Parsing,
    Clearing,
    Inserting,
}

impl fmt::Display for RestorePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestorePhase::Parsing => f.write_str("parsing"),
            RestorePhase::Clearing => f.write_str("clearing"),
            RestorePhase::Inserting => f.write_str("inserting"),
        }
    }
}

/// Fully parsed, non-empty set of records ready to replace the store.
#[derive(Debug, Clone)]
pub struct RestorePlan {
    records: Vec<UserRecord>,
}

impl RestorePlan {
    pub fn parse(input: &[u8]) -> Result<Self, BackupError> {
        tracing::debug!(phase = %RestorePhase::Parsing, bytes = input.len(), "restore started");
        let records = csv_file::parse_records(input)?;
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[UserRecord] {
        &self.records
    }

    /// Replaces the store's contents with the plan and returns the number
    /// of restored records.
    pub async fn commit(
        self,
        store: &dyn UserStore,
        mode: RestoreMode,
    ) -> Result<usize, BackupError> {
        if self.records.is_empty() {
            return Err(BackupError::EmptyInput);
        }

        match mode {
            RestoreMode::Transactional if store.capability() == StoreCapability::Transactional => {
                self.commit_transactional(store).await
            }
            RestoreMode::Transactional => {
                tracing::warn!(
                    "record store cannot replace atomically, falling back to best-effort restore"
                );
                self.commit_best_effort(store).await
            }
            RestoreMode::BestEffort => self.commit_best_effort(store).await,
        }
    }

    async fn commit_transactional(self, store: &dyn UserStore) -> Result<usize, BackupError> {
        let total = self.records.len();
        tracing::debug!(phase = %RestorePhase::Inserting, total, "replacing users in one transaction");

        match store.replace_all(&self.records).await {
            Ok(()) => Ok(total),
            Err(StoreError::Unavailable(msg)) => Err(BackupError::StoreUnavailable(msg)),
            Err(err) => Err(BackupError::RestoreAborted(err.to_string())),
        }
    }

    async fn commit_best_effort(self, store: &dyn UserStore) -> Result<usize, BackupError> {
        let total = self.records.len();

        tracing::debug!(phase = %RestorePhase::Clearing, "deleting existing users");
        let removed = store.delete_all().await.map_err(BackupError::from_store)?;
        tracing::debug!(phase = %RestorePhase::Inserting, removed, total, "inserting restored users");

        for (restored, record) in self.records.iter().enumerate() {
            if let Err(err) = store.insert_with_id(record).await {
                tracing::error!(
                    restored,
                    total,
                    failed_id = record.id,
                    error = %err,
                    "restore stopped after existing users were deleted; store holds a partial dataset"
                );
                return Err(BackupError::PartialRestoreFailure {
                    restored,
                    total,
                    failed_id: record.id,
                    reason: err.to_string(),
                });
            }
        }

        Ok(total)
    }
}
