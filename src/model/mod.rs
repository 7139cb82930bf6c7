pub mod backup;
pub mod user;
