//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response, Router};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use staff_directory::{
    app,
    model::user::{UserQuery, UserRecord},
    store::{NewUser, StoreCapability, StoreError, UserPage, UserPatch, UserStore},
    BackupService, MemoryUserStore, RestoreMode,
};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub const HEADER: &str = "ID,First Name,Last Name,Patronymic,Email,Phone,Position,Department,\
                          Group Name,Hire Date,Birth Date,Status,Notes,Created At,Updated At";

pub fn new_user(first_name: &str) -> NewUser {
    NewUser {
        first_name: first_name.to_string(),
        last_name: "Ivanov".to_string(),
        patronymic: Some("Ivanovich".to_string()),
        email: format!("{}@mail.com", first_name.to_lowercase()),
        phone: Some("+79211234567".to_string()),
        position: "DEVELOPER".to_string(),
        department: "TECHNICAL".to_string(),
        group_name: Some("IT".to_string()),
        hire_date: Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
        birth_date: Some(Utc.with_ymd_and_hms(1990, 5, 20, 0, 0, 0).unwrap()),
        status: "active".to_string(),
        notes: Some("Team lead, \"backend\"".to_string()),
    }
}

/// Creates Anna, Boris and Vera (ids 1, 2, 3).
pub async fn seed(store: &dyn UserStore) -> Vec<UserRecord> {
    let mut created = Vec::new();
    for name in ["Anna", "Boris", "Vera"] {
        created.push(store.create(new_user(name)).await.unwrap());
    }
    created
}

/// One CSV data row with the given raw ID column.
pub fn csv_row(id: &str) -> String {
    format!(
        "{id},Oleg,Sidorov,,oleg{id}@mail.com,,TESTER,TECHNICAL,,2023-03-01T00:00:00.000Z,,active,,\
         2023-03-01T09:00:00.000Z,2023-03-02T09:00:00.000Z"
    )
}

pub fn csv_with_ids(ids: &[&str]) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    for id in ids {
        out.push_str(&csv_row(id));
        out.push('\n');
    }
    out
}

pub async fn ids(store: &dyn UserStore) -> Vec<i32> {
    store
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.id)
        .collect()
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryUserStore>,
    pub backups: Arc<BackupService>,
    pub dir: TempDir,
}

pub fn create_test_app() -> TestApp {
    build_test_app(false)
}

/// Same as [`create_test_app`], also serving `<dir>/dist` with an
/// `index.html` that reads `frontend`.
pub fn create_test_app_with_frontend() -> TestApp {
    build_test_app(true)
}

fn build_test_app(frontend: bool) -> TestApp {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryUserStore::new());
    let backups = Arc::new(BackupService::new(
        store.clone(),
        dir.path().join("backups"),
        RestoreMode::BestEffort,
    ));
    let router = if frontend {
        let dist = dir.path().join("dist");
        std::fs::create_dir_all(&dist).unwrap();
        std::fs::write(dist.join("index.html"), "frontend").unwrap();
        app::router_with_frontend(store.clone(), backups.clone(), &dist)
    } else {
        app::router(store.clone(), backups.clone())
    };
    TestApp {
        router,
        store,
        backups,
        dir,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub const BOUNDARY: &str = "staff-directory-test-boundary";

/// multipart/form-data body with a single part.
pub fn multipart_body(field: &str, filename: &str, content_type: &str, data: &str) -> String {
    format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
         Content-Type: {content_type}\r\n\
         \r\n\
         {data}\r\n\
         --{BOUNDARY}--\r\n"
    )
}

/// Wraps the in-memory store with injectable failures.
pub struct FaultyStore {
    pub inner: MemoryUserStore,
    pub capability: StoreCapability,
    /// `insert_with_id` and `replace_all` fail when they meet this id.
    pub fail_on_id: Option<i32>,
    /// Every read and delete fails as if the database were down.
    pub unavailable: bool,
}

impl FaultyStore {
    pub fn new(capability: StoreCapability) -> Self {
        Self {
            inner: MemoryUserStore::new(),
            capability,
            fail_on_id: None,
            unavailable: false,
        }
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for FaultyStore {
    async fn list_page(&self, query: &UserQuery) -> Result<UserPage, StoreError> {
        self.check_available()?;
        self.inner.list_page(query).await
    }

    async fn get(&self, id: i32) -> Result<Option<UserRecord>, StoreError> {
        self.check_available()?;
        self.inner.get(id).await
    }

    async fn create(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        self.inner.create(user).await
    }

    async fn update(&self, id: i32, patch: UserPatch) -> Result<Option<UserRecord>, StoreError> {
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: i32) -> Result<bool, StoreError> {
        self.inner.delete(id).await
    }

    async fn list_all(&self) -> Result<Vec<UserRecord>, StoreError> {
        self.check_available()?;
        self.inner.list_all().await
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        self.check_available()?;
        self.inner.delete_all().await
    }

    async fn insert_with_id(&self, record: &UserRecord) -> Result<(), StoreError> {
        if self.fail_on_id == Some(record.id) {
            return Err(StoreError::Rejected(format!("value too long for user {}", record.id)));
        }
        self.inner.insert_with_id(record).await
    }

    fn capability(&self) -> StoreCapability {
        self.capability
    }

    async fn replace_all(&self, records: &[UserRecord]) -> Result<(), StoreError> {
        if self.capability != StoreCapability::Transactional {
            return Err(StoreError::Unsupported);
        }
        if records.iter().any(|r| Some(r.id) == self.fail_on_id) {
            return Err(StoreError::Rejected("transaction rolled back".to_string()));
        }
        self.inner.replace_all(records).await
    }
}
