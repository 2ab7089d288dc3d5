//! SQL access to the `msdss_users` table.
//!
//! Flags are read back as `INTEGER`, which both Postgres and SQLite can cast
//! a boolean to. Postgres hands the value over as `int4` and SQLite as a
//! 64-bit integer, so either width decodes.

use sqlx::{FromRow, Row, any::AnyRow};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use super::UserRecord;
use crate::database::Database;

const SELECT_COLUMNS: &str = "SELECT id, email, hashed_password, \
    CAST(is_active AS INTEGER) AS is_active, \
    CAST(is_superuser AS INTEGER) AS is_superuser, \
    CAST(is_verified AS INTEGER) AS is_verified \
    FROM msdss_users";

impl<'r> FromRow<'r, AnyRow> for UserRecord {
    fn from_row(row: &'r AnyRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        Ok(Self {
            id: Uuid::parse_str(&id).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            email: row.try_get("email")?,
            hashed_password: row.try_get("hashed_password")?,
            is_active: flag(row, "is_active")?,
            is_superuser: flag(row, "is_superuser")?,
            is_verified: flag(row, "is_verified")?,
        })
    }
}

fn flag(row: &AnyRow, name: &str) -> Result<bool, sqlx::Error> {
    match row.try_get::<i32, _>(name) {
        Ok(value) => Ok(value != 0),
        Err(_) => row.try_get::<i64, _>(name).map(|value| value != 0),
    }
}

#[derive(Clone, Debug)]
pub struct UserStore {
    db: Database,
}

impl UserStore {
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.db
    }

    fn span(&self, operation: &'static str, statement: &str) -> tracing::Span {
        info_span!(
            "db.query",
            db.system = self.db.driver().as_str(),
            db.operation = operation,
            db.statement = statement
        )
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get(&self, id: Uuid) -> Result<Option<UserRecord>, sqlx::Error> {
        let query = format!("{SELECT_COLUMNS} WHERE id = $1");
        sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(self.db.pool())
            .instrument(self.span("SELECT", &query))
            .await?
            .map(|row| UserRecord::from_row(&row))
            .transpose()
    }

    /// `email` must already be normalized.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>, sqlx::Error> {
        let query = format!("{SELECT_COLUMNS} WHERE email = $1");
        sqlx::query(&query)
            .bind(email.to_string())
            .fetch_optional(self.db.pool())
            .instrument(self.span("SELECT", &query))
            .await?
            .map(|row| UserRecord::from_row(&row))
            .transpose()
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let query = "SELECT COUNT(*) AS total FROM msdss_users";
        let row = sqlx::query(query)
            .fetch_one(self.db.pool())
            .instrument(self.span("SELECT", query))
            .await?;
        row.try_get("total")
    }

    /// # Errors
    /// Returns an error if the insert fails, including unique violations.
    pub async fn insert(&self, user: &UserRecord) -> Result<(), sqlx::Error> {
        let query = "INSERT INTO msdss_users \
            (id, email, hashed_password, is_active, is_superuser, is_verified) \
            VALUES ($1, $2, $3, $4, $5, $6)";
        sqlx::query(query)
            .bind(user.id.to_string())
            .bind(user.email.clone())
            .bind(user.hashed_password.clone())
            .bind(user.is_active)
            .bind(user.is_superuser)
            .bind(user.is_verified)
            .execute(self.db.pool())
            .instrument(self.span("INSERT", query))
            .await?;
        Ok(())
    }

    /// Overwrite every column of an existing row. Returns whether it existed.
    ///
    /// # Errors
    /// Returns an error if the update fails, including unique violations.
    pub async fn update(&self, user: &UserRecord) -> Result<bool, sqlx::Error> {
        let query = "UPDATE msdss_users SET email = $1, hashed_password = $2, \
            is_active = $3, is_superuser = $4, is_verified = $5 WHERE id = $6";
        let result = sqlx::query(query)
            .bind(user.email.clone())
            .bind(user.hashed_password.clone())
            .bind(user.is_active)
            .bind(user.is_superuser)
            .bind(user.is_verified)
            .bind(user.id.to_string())
            .execute(self.db.pool())
            .instrument(self.span("UPDATE", query))
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns whether a row was removed.
    ///
    /// # Errors
    /// Returns an error if the delete fails.
    pub async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let query = "DELETE FROM msdss_users WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id.to_string())
            .execute(self.db.pool())
            .instrument(self.span("DELETE", query))
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
