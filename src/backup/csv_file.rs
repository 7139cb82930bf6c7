//! CSV layout of a backup file and the conversions in both directions.

use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::BackupError;
use crate::model::user::{format_timestamp, parse_timestamp, UserRecord};

/// Header row of every backup file, in column order.
pub const COLUMNS: [&str; 15] = [
    "ID",
    "First Name",
    "Last Name",
    "Patronymic",
    "Email",
    "Phone",
    "Position",
    "Department",
    "Group Name",
    "Hire Date",
    "Birth Date",
    "Status",
    "Notes",
    "Created At",
    "Updated At",
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

// Field order must match COLUMNS; rows are written without serde's own header
#[derive(Debug, Serialize, Deserialize)]
struct BackupRow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "First Name")]
    first_name: String,
    #[serde(rename = "Last Name")]
    last_name: String,
    #[serde(rename = "Patronymic")]
    patronymic: String,
    #[serde(rename = "Email")]
    email: String,
    #[serde(rename = "Phone")]
    phone: String,
    #[serde(rename = "Position")]
    position: String,
    #[serde(rename = "Department")]
    department: String,
    #[serde(rename = "Group Name")]
    group_name: String,
    #[serde(rename = "Hire Date")]
    hire_date: String,
    #[serde(rename = "Birth Date")]
    birth_date: String,
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "Notes")]
    notes: String,
    #[serde(rename = "Created At")]
    created_at: String,
    #[serde(rename = "Updated At")]
    updated_at: String,
}

impl From<&UserRecord> for BackupRow {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id.to_string(),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            patronymic: record.patronymic.clone().unwrap_or_default(),
            email: record.email.clone(),
            phone: record.phone.clone().unwrap_or_default(),
            position: record.position.clone(),
            department: record.department.clone(),
            group_name: record.group_name.clone().unwrap_or_default(),
            hire_date: format_timestamp(&record.hire_date),
            birth_date: record
                .birth_date
                .as_ref()
                .map(format_timestamp)
                .unwrap_or_default(),
            status: record.status.clone(),
            notes: record.notes.clone().unwrap_or_default(),
            created_at: format_timestamp(&record.created_at),
            updated_at: format_timestamp(&record.updated_at),
        }
    }
}

impl BackupRow {
    fn into_record(self) -> Result<UserRecord, String> {
        let id = self
            .id
            .trim()
            .parse::<i32>()
            .map_err(|_| format!("ID {:?} is not an integer", self.id))?;
        // SERIAL ids are positive and the generator must be able to move past them
        if id <= 0 || id == i32::MAX {
            return Err(format!("ID {} is outside the accepted range", id));
        }

        Ok(UserRecord {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            patronymic: non_empty(self.patronymic),
            email: self.email,
            phone: non_empty(self.phone),
            position: self.position,
            department: self.department,
            group_name: non_empty(self.group_name),
            hire_date: required_date("Hire Date", &self.hire_date)?,
            birth_date: optional_date("Birth Date", &self.birth_date)?,
            status: self.status,
            notes: non_empty(self.notes),
            created_at: required_date("Created At", &self.created_at)?,
            updated_at: required_date("Updated At", &self.updated_at)?,
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn required_date(column: &str, raw: &str) -> Result<DateTime<Utc>, String> {
    if raw.trim().is_empty() {
        return Err(format!("{} is required", column));
    }
    parse_timestamp(raw).ok_or_else(|| format!("{} {:?} is not a valid date", column, raw))
}

fn optional_date(column: &str, raw: &str) -> Result<Option<DateTime<Utc>>, String> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    required_date(column, raw).map(Some)
}

/// Serializes records, in the order given, under the fixed header row.
pub fn write_records(records: &[UserRecord]) -> Result<Vec<u8>, BackupError> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(COLUMNS).map_err(BackupError::from_csv)?;
    for record in records {
        writer
            .serialize(BackupRow::from(record))
            .map_err(BackupError::from_csv)?;
    }

    writer
        .into_inner()
        .map_err(|e| BackupError::Io(e.into_error()))
}

/// Parses a whole backup into typed records without touching any store.
///
/// Rows whose fields are all empty are skipped. A file whose remaining
/// rows all fail to parse has no valid rows and is [`BackupError::EmptyInput`].
/// A mix of valid and malformed rows fails with the first malformed row, as
/// does an ID that appears twice.
pub fn parse_records(input: &[u8]) -> Result<Vec<UserRecord>, BackupError> {
    let input = input.strip_prefix(UTF8_BOM).unwrap_or(input);
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(input);

    let headers = reader.headers().map_err(BackupError::from_csv)?.clone();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(BackupError::EmptyInput);
    }

    let missing: Vec<&str> = COLUMNS
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|h| h == *column))
        .collect();
    if !missing.is_empty() {
        return Err(BackupError::InvalidFormat(format!(
            "missing columns: {}",
            missing.join(", ")
        )));
    }

    let mut records = Vec::new();
    let mut seen = HashSet::new();
    let mut first_bad: Option<String> = None;
    let mut bad_rows = 0usize;

    for row in reader.records() {
        let row = row.map_err(BackupError::from_csv)?;
        if row.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let line = row.position().map_or(0, |pos| pos.line());

        let parsed = row
            .deserialize::<BackupRow>(Some(&headers))
            .map_err(|e| e.to_string())
            .and_then(BackupRow::into_record);
        let record = match parsed {
            Ok(record) => record,
            Err(msg) => {
                bad_rows += 1;
                first_bad.get_or_insert_with(|| format!("line {}: {}", line, msg));
                continue;
            }
        };

        if !seen.insert(record.id) {
            return Err(BackupError::InvalidFormat(format!(
                "line {}: duplicate ID {}",
                line, record.id
            )));
        }
        records.push(record);
    }

    if records.is_empty() {
        if bad_rows > 0 {
            tracing::debug!(bad_rows, "no row of the backup could be parsed");
        }
        return Err(BackupError::EmptyInput);
    }
    if let Some(msg) = first_bad {
        return Err(BackupError::InvalidFormat(msg));
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const HEADER: &str = "ID,First Name,Last Name,Patronymic,Email,Phone,Position,Department,\
                          Group Name,Hire Date,Birth Date,Status,Notes,Created At,Updated At";

    fn record(id: i32) -> UserRecord {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        UserRecord {
            id,
            first_name: "Иван".to_string(),
            last_name: "Иванов".to_string(),
            patronymic: Some("Иванович".to_string()),
            email: format!("user{}@mail.com", id),
            phone: None,
            position: "DEVELOPER".to_string(),
            department: "TECHNICAL".to_string(),
            group_name: None,
            hire_date: Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
            birth_date: Some(Utc.with_ymd_and_hms(1990, 5, 20, 0, 0, 0).unwrap()),
            status: "active".to_string(),
            notes: Some("Notes, with a comma\nand a newline".to_string()),
            created_at: ts,
            updated_at: ts,
        }
    }

    fn row(id: &str) -> String {
        format!(
            "{id},Anna,Petrova,,anna@mail.com,,MANAGER,SALES,,2024-01-15T00:00:00.000Z,,inactive,,\
             2024-01-15T10:30:00.000Z,2024-01-15T10:30:00.000Z"
        )
    }

    #[test]
    fn header_row_is_fixed() {
        let bytes = write_records(&[]).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap().trim_end(), HEADER);
    }

    #[test]
    fn absent_optionals_are_written_as_empty_fields() {
        let mut rec = record(3);
        rec.patronymic = None;
        rec.birth_date = None;
        rec.notes = None;
        let text = String::from_utf8(write_records(&[rec]).unwrap()).unwrap();
        let line = text.lines().nth(1).unwrap();
        assert_eq!(
            line,
            "3,Иван,Иванов,,user3@mail.com,,DEVELOPER,TECHNICAL,,2024-01-15T00:00:00.000Z,,active,,\
             2024-01-15T10:30:00.000Z,2024-01-15T10:30:00.000Z"
        );
    }

    #[test]
    fn written_backup_parses_back_to_the_same_records() {
        let records = vec![record(1), record(2)];
        let bytes = write_records(&records).unwrap();
        assert_eq!(parse_records(&bytes).unwrap(), records);
    }

    #[test]
    fn empty_optional_columns_become_absent() {
        let input = format!("{HEADER}\n{}\n", row("5"));
        let parsed = parse_records(input.as_bytes()).unwrap();
        let user = &parsed[0];
        assert_eq!(user.id, 5);
        assert_eq!(user.patronymic, None);
        assert_eq!(user.phone, None);
        assert_eq!(user.group_name, None);
        assert_eq!(user.notes, None);
        assert_eq!(user.birth_date, None);
        assert_eq!(user.status, "inactive");
    }

    #[test]
    fn non_numeric_id_fails_the_whole_parse() {
        let input = format!("{HEADER}\n{}\n{}\nabc,{}\n", row("1"), row("2"), &row("x")[2..]);
        let err = parse_records(input.as_bytes()).unwrap_err();
        match err {
            BackupError::InvalidFormat(msg) => assert!(msg.contains("\"abc\""), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn header_only_is_empty_input() {
        let input = format!("{HEADER}\n");
        assert!(matches!(
            parse_records(input.as_bytes()),
            Err(BackupError::EmptyInput)
        ));
        assert!(matches!(parse_records(b""), Err(BackupError::EmptyInput)));
    }

    #[test]
    fn blank_rows_do_not_count() {
        let input = format!("{HEADER}\n,,,,,,,,,,,,,,\n\n");
        assert!(matches!(
            parse_records(input.as_bytes()),
            Err(BackupError::EmptyInput)
        ));
    }

    #[test]
    fn all_rows_malformed_is_empty_input() {
        let input = format!("{HEADER}\nabc,{}\nxyz,{}\n", &row("x")[2..], &row("x")[2..]);
        assert!(matches!(
            parse_records(input.as_bytes()),
            Err(BackupError::EmptyInput)
        ));
    }

    #[test]
    fn ids_the_generator_cannot_follow_are_rejected() {
        for id in ["0", "-4", "2147483647"] {
            let input = format!("{HEADER}\n{}\n{}\n", row("1"), row(id));
            match parse_records(input.as_bytes()) {
                Err(BackupError::InvalidFormat(msg)) => assert!(msg.contains("range"), "{msg}"),
                other => panic!("unexpected result for {id}: {other:?}"),
            }
        }
        let input = format!("{HEADER}\n{}\n", row("2147483646"));
        assert_eq!(parse_records(input.as_bytes()).unwrap()[0].id, 2_147_483_646);
    }

    #[test]
    fn missing_columns_are_reported() {
        let input = "ID,First Name\n1,Anna\n";
        match parse_records(input.as_bytes()) {
            Err(BackupError::InvalidFormat(msg)) => {
                assert!(msg.contains("Last Name"));
                assert!(msg.contains("Updated At"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let input = format!("{HEADER}\n{}\n{}\n", row("1"), row("1"));
        assert!(matches!(
            parse_records(input.as_bytes()),
            Err(BackupError::InvalidFormat(_))
        ));
    }

    #[test]
    fn unparsable_required_date_is_rejected() {
        let bad = row("2").replace("2024-01-15T00:00:00.000Z", "soon");
        let input = format!("{HEADER}\n{}\n{bad}\n", row("1"));
        match parse_records(input.as_bytes()) {
            Err(BackupError::InvalidFormat(msg)) => assert!(msg.contains("Hire Date"), "{msg}"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn leading_bom_and_plain_dates_are_accepted() {
        let body = row("9").replace("2024-01-15T00:00:00.000Z", "2024-01-15");
        let input = format!("\u{feff}{HEADER}\n{body}\n");
        let parsed = parse_records(input.as_bytes()).unwrap();
        assert_eq!(
            parsed[0].hire_date,
            Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()
        );
    }
}
