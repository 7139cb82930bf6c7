pub mod backup;
pub mod users;
