//! Persistence seam for employee records.
//!
//! HTTP handlers and the backup subsystem only talk to [`UserStore`]; the
//! PostgreSQL and in-memory implementations live in the submodules.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

use crate::model::user::{UserQuery, UserRecord};

pub mod memory;
pub mod postgres;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

pub type SharedStore = Arc<dyn UserStore>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),

    #[error("user with ID {0} not found")]
    NotFound(i32),

    #[error("record store rejected the operation: {0}")]
    Rejected(String),

    #[error("operation not supported by this record store")]
    Unsupported,
}

/// Whether a store can replace its whole dataset atomically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreCapability {
    Transactional,
    BestEffort,
}

/// Validated input for a new record; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub patronymic: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub position: String,
    pub department: String,
    pub group_name: Option<String>,
    pub hire_date: DateTime<Utc>,
    pub birth_date: Option<DateTime<Utc>>,
    pub status: String,
    pub notes: Option<String>,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub patronymic: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position: Option<String>,
    pub department: Option<String>,
    pub group_name: Option<String>,
    pub hire_date: Option<DateTime<Utc>>,
    pub birth_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.patronymic.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.position.is_none()
            && self.department.is_none()
            && self.group_name.is_none()
            && self.hire_date.is_none()
            && self.birth_date.is_none()
            && self.status.is_none()
            && self.notes.is_none()
    }

    pub(crate) fn apply(&self, record: &mut UserRecord) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }
        fn set_opt<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
            if let Some(value) = value {
                *target = Some(value.clone());
            }
        }

        set(&mut record.first_name, &self.first_name);
        set(&mut record.last_name, &self.last_name);
        set_opt(&mut record.patronymic, &self.patronymic);
        set(&mut record.email, &self.email);
        set_opt(&mut record.phone, &self.phone);
        set(&mut record.position, &self.position);
        set(&mut record.department, &self.department);
        set_opt(&mut record.group_name, &self.group_name);
        set(&mut record.hire_date, &self.hire_date);
        set_opt(&mut record.birth_date, &self.birth_date);
        set(&mut record.status, &self.status);
        set_opt(&mut record.notes, &self.notes);
    }
}

#[derive(Debug, Clone)]
pub struct UserPage {
    pub users: Vec<UserRecord>,
    pub total: i64,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Filtered page ordered by creation time, newest first.
    async fn list_page(&self, query: &UserQuery) -> Result<UserPage, StoreError>;

    async fn get(&self, id: i32) -> Result<Option<UserRecord>, StoreError>;

    async fn create(&self, user: NewUser) -> Result<UserRecord, StoreError>;

    async fn update(&self, id: i32, patch: UserPatch) -> Result<Option<UserRecord>, StoreError>;

    async fn delete(&self, id: i32) -> Result<bool, StoreError>;

    /// Every record, ascending by id.
    async fn list_all(&self) -> Result<Vec<UserRecord>, StoreError>;

    async fn delete_all(&self) -> Result<u64, StoreError>;

    /// Inserts a record keeping its id and timestamps. Later `create` calls
    /// must be assigned ids above every explicitly inserted one.
    async fn insert_with_id(&self, record: &UserRecord) -> Result<(), StoreError>;

    fn capability(&self) -> StoreCapability {
        StoreCapability::BestEffort
    }

    /// Atomically replaces the whole dataset. Only called when
    /// [`UserStore::capability`] reports [`StoreCapability::Transactional`].
    async fn replace_all(&self, _records: &[UserRecord]) -> Result<(), StoreError> {
        Err(StoreError::Unsupported)
    }
}

/// Case-insensitive substring match over the searchable text columns.
pub(crate) fn matches_search(record: &UserRecord, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    let contains = |value: &str| value.to_lowercase().contains(&needle);
    contains(&record.first_name)
        || contains(&record.last_name)
        || record.patronymic.as_deref().is_some_and(contains)
        || contains(&record.email)
        || record.phone.as_deref().is_some_and(contains)
        || contains(&record.position)
        || contains(&record.department)
        || record.group_name.as_deref().is_some_and(contains)
}
