use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{matches_search, NewUser, StoreCapability, StoreError, UserPage, UserPatch, UserStore};
use crate::model::user::{UserQuery, UserRecord};

#[derive(Debug)]
struct Table {
    rows: BTreeMap<i32, UserRecord>,
    next_id: i32,
}

impl Table {
    fn bump_next_id(&mut self) {
        let highest = self.rows.keys().next_back().copied().unwrap_or(0);
        self.next_id = self.next_id.max(highest.saturating_add(1));
    }
}

/// In-process record store. Used by the test suite and when the service is
/// started without `DATABASE_URL`.
#[derive(Debug)]
pub struct MemoryUserStore {
    table: RwLock<Table>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(Table {
                rows: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn list_page(&self, query: &UserQuery) -> Result<UserPage, StoreError> {
        let table = self.table.read().await;
        let mut matching: Vec<&UserRecord> = table
            .rows
            .values()
            .filter(|record| query.search_term().map_or(true, |s| matches_search(record, s)))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        let users = matching
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(query.limit() as usize)
            .cloned()
            .collect();

        Ok(UserPage { users, total })
    }

    async fn get(&self, id: i32) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut table = self.table.write().await;
        let id = table.next_id;
        if table.rows.contains_key(&id) {
            return Err(StoreError::Rejected(format!(
                "no user ID left above {}",
                table.rows.keys().next_back().copied().unwrap_or(id)
            )));
        }
        let now = Utc::now();
        let record = UserRecord {
            id,
            first_name: user.first_name,
            last_name: user.last_name,
            patronymic: user.patronymic,
            email: user.email,
            phone: user.phone,
            position: user.position,
            department: user.department,
            group_name: user.group_name,
            hire_date: user.hire_date,
            birth_date: user.birth_date,
            status: user.status,
            notes: user.notes,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(id, record.clone());
        table.bump_next_id();
        Ok(record)
    }

    async fn update(&self, id: i32, patch: UserPatch) -> Result<Option<UserRecord>, StoreError> {
        let mut table = self.table.write().await;
        let Some(record) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        patch.apply(record);
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }

    async fn delete(&self, id: i32) -> Result<bool, StoreError> {
        Ok(self.table.write().await.rows.remove(&id).is_some())
    }

    async fn list_all(&self) -> Result<Vec<UserRecord>, StoreError> {
        Ok(self.table.read().await.rows.values().cloned().collect())
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        let mut table = self.table.write().await;
        let removed = table.rows.len() as u64;
        table.rows.clear();
        Ok(removed)
    }

    async fn insert_with_id(&self, record: &UserRecord) -> Result<(), StoreError> {
        let mut table = self.table.write().await;
        if table.rows.contains_key(&record.id) {
            return Err(StoreError::Rejected(format!(
                "duplicate key: user with ID {} already exists",
                record.id
            )));
        }
        table.rows.insert(record.id, record.clone());
        table.bump_next_id();
        Ok(())
    }

    fn capability(&self) -> StoreCapability {
        StoreCapability::Transactional
    }

    async fn replace_all(&self, records: &[UserRecord]) -> Result<(), StoreError> {
        let mut rows = BTreeMap::new();
        for record in records {
            if rows.insert(record.id, record.clone()).is_some() {
                return Err(StoreError::Rejected(format!(
                    "duplicate key: user with ID {} already exists",
                    record.id
                )));
            }
        }

        let mut table = self.table.write().await;
        table.rows = rows;
        table.bump_next_id();
        Ok(())
    }
}
