use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPool};
use sqlx::query::QueryAs;
use sqlx::{Postgres, Row};

use super::{NewUser, StoreCapability, StoreError, UserPage, UserPatch, UserStore};
use crate::model::user::{UserQuery, UserRecord};

const COLUMNS: &str = "id, first_name, last_name, patronymic, email, phone, position, department, \
                       group_name, hire_date, birth_date, status, notes, created_at, updated_at";

const SEARCH_CLAUSE: &str = "WHERE first_name ILIKE $1 OR last_name ILIKE $1 OR patronymic ILIKE $1 \
                             OR email ILIKE $1 OR phone ILIKE $1 OR position ILIKE $1 \
                             OR department ILIKE $1 OR group_name ILIKE $1";

// Keeps the SERIAL generator above ids inserted explicitly by a restore:
// the sequence is marked as having produced MAX(id), next value MAX(id) + 1
const RESET_ID_SEQUENCE: &str = "SELECT setval(pg_get_serial_sequence('users', 'id'), \
                                 COALESCE((SELECT MAX(id) FROM users), 1), \
                                 EXISTS (SELECT 1 FROM users))";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => StoreError::Rejected(db.to_string()),
            sqlx::Error::RowNotFound
            | sqlx::Error::TypeNotFound { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_) => StoreError::Rejected(err.to_string()),
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

/// `users` table in PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Applies the SQL files under `migrations/`.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migration failed: {}", e)))
    }
}

fn bind_record<'q>(
    query: QueryAs<'q, Postgres, UserRecord, PgArguments>,
    record: &'q UserRecord,
) -> QueryAs<'q, Postgres, UserRecord, PgArguments> {
    query
        .bind(record.id)
        .bind(&record.first_name)
        .bind(&record.last_name)
        .bind(&record.patronymic)
        .bind(&record.email)
        .bind(&record.phone)
        .bind(&record.position)
        .bind(&record.department)
        .bind(&record.group_name)
        .bind(record.hire_date)
        .bind(record.birth_date)
        .bind(&record.status)
        .bind(&record.notes)
        .bind(record.created_at)
        .bind(record.updated_at)
}

fn insert_with_id_sql() -> String {
    format!(
        "INSERT INTO users ({COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
         RETURNING {COLUMNS}"
    )
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn list_page(&self, query: &UserQuery) -> Result<UserPage, StoreError> {
        let pattern = query.search_term().map(|s| format!("%{}%", s));

        let (total, users) = match &pattern {
            Some(pattern) => {
                let count_sql = format!("SELECT COUNT(*) AS total FROM users {SEARCH_CLAUSE}");
                let total: i64 = sqlx::query(&count_sql)
                    .bind(pattern)
                    .fetch_one(&self.pool)
                    .await?
                    .try_get("total")?;

                let fetch_sql = format!(
                    "SELECT {COLUMNS} FROM users {SEARCH_CLAUSE} \
                     ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
                );
                let users = sqlx::query_as::<_, UserRecord>(&fetch_sql)
                    .bind(pattern)
                    .bind(query.limit())
                    .bind(query.offset())
                    .fetch_all(&self.pool)
                    .await?;
                (total, users)
            }
            None => {
                let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM users")
                    .fetch_one(&self.pool)
                    .await?
                    .try_get("total")?;

                let fetch_sql = format!(
                    "SELECT {COLUMNS} FROM users ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
                );
                let users = sqlx::query_as::<_, UserRecord>(&fetch_sql)
                    .bind(query.limit())
                    .bind(query.offset())
                    .fetch_all(&self.pool)
                    .await?;
                (total, users)
            }
        };

        Ok(UserPage { users, total })
    }

    async fn get(&self, id: i32) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let sql = format!(
            "INSERT INTO users (first_name, last_name, patronymic, email, phone, position, department, \
                                group_name, hire_date, birth_date, status, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {COLUMNS}"
        );
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.patronymic)
            .bind(&user.email)
            .bind(&user.phone)
            .bind(&user.position)
            .bind(&user.department)
            .bind(&user.group_name)
            .bind(user.hire_date)
            .bind(user.birth_date)
            .bind(&user.status)
            .bind(&user.notes)
            .fetch_one(&self.pool)
            .await?;
        Ok(record)
    }

    async fn update(&self, id: i32, patch: UserPatch) -> Result<Option<UserRecord>, StoreError> {
        // Build dynamic update query; placeholders follow the order of `sets`
        let mut sets = Vec::new();
        let mut param_count = 1;
        let mut push = |column: &str, present: bool| {
            if present {
                sets.push(format!("{} = ${}", column, param_count));
                param_count += 1;
            }
        };

        push("first_name", patch.first_name.is_some());
        push("last_name", patch.last_name.is_some());
        push("patronymic", patch.patronymic.is_some());
        push("email", patch.email.is_some());
        push("phone", patch.phone.is_some());
        push("position", patch.position.is_some());
        push("department", patch.department.is_some());
        push("group_name", patch.group_name.is_some());
        push("hire_date", patch.hire_date.is_some());
        push("birth_date", patch.birth_date.is_some());
        push("status", patch.status.is_some());
        push("notes", patch.notes.is_some());

        if sets.is_empty() {
            return self.get(id).await;
        }
        sets.push("updated_at = NOW()".to_string());

        let sql = format!(
            "UPDATE users SET {} WHERE id = ${} RETURNING {COLUMNS}",
            sets.join(", "),
            param_count
        );

        let mut query = sqlx::query_as::<_, UserRecord>(&sql);
        for value in [
            &patch.first_name,
            &patch.last_name,
            &patch.patronymic,
            &patch.email,
            &patch.phone,
            &patch.position,
            &patch.department,
            &patch.group_name,
        ]
        .into_iter()
        .flatten()
        {
            query = query.bind(value);
        }
        if let Some(hire_date) = patch.hire_date {
            query = query.bind(hire_date);
        }
        if let Some(birth_date) = patch.birth_date {
            query = query.bind(birth_date);
        }
        if let Some(status) = &patch.status {
            query = query.bind(status);
        }
        if let Some(notes) = &patch.notes {
            query = query.bind(notes);
        }

        let record = query.bind(id).fetch_optional(&self.pool).await?;
        Ok(record)
    }

    async fn delete(&self, id: i32) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_all(&self) -> Result<Vec<UserRecord>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM users ORDER BY id ASC");
        let users = sqlx::query_as::<_, UserRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM users").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn insert_with_id(&self, record: &UserRecord) -> Result<(), StoreError> {
        let sql = insert_with_id_sql();
        bind_record(sqlx::query_as::<_, UserRecord>(&sql), record)
            .fetch_one(&self.pool)
            .await?;
        sqlx::query(RESET_ID_SEQUENCE).execute(&self.pool).await?;
        Ok(())
    }

    fn capability(&self) -> StoreCapability {
        StoreCapability::Transactional
    }

    async fn replace_all(&self, records: &[UserRecord]) -> Result<(), StoreError> {
        let sql = insert_with_id_sql();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM users").execute(&mut tx).await?;
        for record in records {
            bind_record(sqlx::query_as::<_, UserRecord>(&sql), record)
                .fetch_one(&mut tx)
                .await?;
        }
        sqlx::query(RESET_ID_SEQUENCE).execute(&mut tx).await?;

        // Dropping `tx` on any early return above rolls the delete back
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_reset_never_adds_to_the_largest_id() {
        assert!(!RESET_ID_SEQUENCE.contains("+ 1"));
        assert!(RESET_ID_SEQUENCE.contains("COALESCE((SELECT MAX(id) FROM users), 1)"));
        assert!(RESET_ID_SEQUENCE.contains("EXISTS (SELECT 1 FROM users)"));
    }

    #[test]
    fn explicit_insert_lists_every_column() {
        let sql = insert_with_id_sql();
        assert_eq!(sql.matches('$').count(), 15);
        assert!(sql.starts_with("INSERT INTO users (id, first_name,"));
    }
}
