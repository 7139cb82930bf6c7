//! Employee directory backend: user CRUD over REST plus CSV backup and
//! restore of the whole user table.

pub mod app;
pub mod backup;
pub mod config;
pub mod error;
pub mod model;
pub mod routes;
pub mod store;

pub use backup::{BackupError, BackupService, RestoreMode};
pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use store::{MemoryUserStore, PgUserStore, SharedStore, StoreError, UserStore};
