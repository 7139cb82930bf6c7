use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

// Employee row as stored in the `users` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub patronymic: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    // Kept as plain strings: restored rows are carried through unvalidated
    pub position: String,
    pub department: String,
    pub group_name: Option<String>,
    pub hire_date: DateTime<Utc>,
    pub birth_date: Option<DateTime<Utc>>,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Position {
    Manager,
    Developer,
    Designer,
    Analyst,
    Tester,
    Accountant,
    Hr,
}

impl Position {
    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Manager => "MANAGER",
            Position::Developer => "DEVELOPER",
            Position::Designer => "DESIGNER",
            Position::Analyst => "ANALYST",
            Position::Tester => "TESTER",
            Position::Accountant => "ACCOUNTANT",
            Position::Hr => "HR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Department {
    Sales,
    Technical,
    Finance,
    Personnel,
}

impl Department {
    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Sales => "SALES",
            Department::Technical => "TECHNICAL",
            Department::Finance => "FINANCE",
            Department::Personnel => "PERSONNEL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Request body for creating a user
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub first_name: String,
    pub last_name: String,
    pub patronymic: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub position: Position,
    pub department: Department,
    pub group_name: Option<String>,
    pub hire_date: String,
    pub birth_date: Option<String>,
    pub status: Option<UserStatus>,
    pub notes: Option<String>,
}

// Request body for updating a user; every field optional
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub patronymic: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position: Option<Position>,
    pub department: Option<Department>,
    pub group_name: Option<String>,
    pub hire_date: Option<String>,
    pub birth_date: Option<String>,
    pub status: Option<UserStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl UserQuery {
    pub const DEFAULT_LIMIT: i64 = 10;
    pub const MAX_LIMIT: i64 = 100;

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }

    /// Search term with surrounding whitespace removed; blank means no filter.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub pages: i64,
}

// Paged list response
#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserRecord>,
    pub pagination: Pagination,
}

impl UserListResponse {
    pub fn new(users: Vec<UserRecord>, total: i64, page: i64, limit: i64) -> Self {
        let pages = if total == 0 { 0 } else { (total + limit - 1) / limit };
        Self {
            users,
            pagination: Pagination {
                total,
                page,
                limit,
                pages,
            },
        }
    }
}

/// Parses either a full RFC 3339 timestamp or a bare `YYYY-MM-DD` date
/// (taken as midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::from_str(raw)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// RFC 3339 with a `Z` suffix and millisecond precision
/// (`2024-01-15T10:30:00.000Z`). Values with a sub-millisecond part keep
/// all the digits they need.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    let format = if ts.timestamp_subsec_nanos() % 1_000_000 == 0 {
        SecondsFormat::Millis
    } else {
        SecondsFormat::AutoSi
    };
    ts.to_rfc3339_opts(format, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_plain_dates_as_utc_midnight() {
        let ts = parse_timestamp("2024-01-15").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn parses_rfc3339_with_offset() {
        let ts = parse_timestamp("2024-01-15T13:30:00+03:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap());
    }

    #[test]
    fn rejects_garbage_dates() {
        assert!(parse_timestamp("15/01/2024").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn formatted_timestamps_parse_back_exactly() {
        let ts = Utc.timestamp_opt(1_705_314_600, 123_456_789).unwrap();
        let text = format_timestamp(&ts);
        assert!(text.ends_with('Z'));
        assert_eq!(parse_timestamp(&text), Some(ts));
    }

    #[test]
    fn whole_milliseconds_are_written_with_three_digits() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(format_timestamp(&ts), "2024-01-15T10:30:00.000Z");
        let ts = Utc.timestamp_opt(1_705_314_600, 250_000_000).unwrap();
        assert_eq!(format_timestamp(&ts), "2024-01-15T10:30:00.250Z");
    }

    #[test]
    fn query_clamps_paging() {
        let query = UserQuery {
            search: Some("  ".into()),
            page: Some(0),
            limit: Some(500),
        };
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), 100);
        assert_eq!(query.offset(), 0);
        assert_eq!(query.search_term(), None);
    }

    #[test]
    fn huge_page_saturates_the_offset() {
        let query = UserQuery {
            search: None,
            page: Some(i64::MAX),
            limit: Some(100),
        };
        assert_eq!(query.offset(), i64::MAX);
    }

    #[test]
    fn pages_round_up() {
        let response = UserListResponse::new(Vec::new(), 21, 1, 10);
        assert_eq!(response.pagination.pages, 3);
    }

    #[test]
    fn enums_use_wire_labels() {
        let position: Position = serde_json::from_str("\"DEVELOPER\"").unwrap();
        assert_eq!(position.as_str(), "DEVELOPER");
        let department: Department = serde_json::from_str("\"PERSONNEL\"").unwrap();
        assert_eq!(department.as_str(), "PERSONNEL");
        assert_eq!(serde_json::to_string(&Position::Hr).unwrap(), "\"HR\"");
        let status: UserStatus = serde_json::from_str("\"inactive\"").unwrap();
        assert_eq!(status, UserStatus::Inactive);
    }
}
