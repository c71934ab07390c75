//! CRUD operations for [`UserAccount`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;

use classdesk_shared::{Role, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::UserAccount;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new user.  A duplicate email surfaces as [`StoreError::Conflict`].
    pub fn insert_user(&self, user: &UserAccount) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO users (id, email, role, created_at, blocked, password_hash, email_verified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user.id.to_string(),
                    user.email,
                    user.role.as_str(),
                    user.created_at.to_rfc3339(),
                    user.blocked as i64,
                    user.password_hash,
                    user.email_verified as i64,
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    StoreError::Conflict(user.email.clone())
                }
                other => StoreError::Sqlite(other),
            })?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single user by id.
    pub fn get_user(&self, id: UserId) -> Result<UserAccount> {
        self.conn()
            .query_row(
                "SELECT id, email, role, created_at, blocked, password_hash, email_verified
                 FROM users
                 WHERE id = ?1",
                params![id.to_string()],
                row_to_user,
            )
            .map_err(not_found)
    }

    /// Fetch a single user by email (used at login).
    pub fn get_user_by_email(&self, email: &str) -> Result<UserAccount> {
        self.conn()
            .query_row(
                "SELECT id, email, role, created_at, blocked, password_hash, email_verified
                 FROM users
                 WHERE email = ?1",
                params![email],
                row_to_user,
            )
            .map_err(not_found)
    }

    /// List all users, newest registrations first.
    pub fn list_users(&self) -> Result<Vec<UserAccount>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, email, role, created_at, blocked, password_hash, email_verified
             FROM users
             ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map([], row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Set a user's role.  Mutates exactly that one field.
    pub fn update_user_role(&self, id: UserId, role: Role) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE users SET role = ?2 WHERE id = ?1",
            params![id.to_string(), role.as_str()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Set or clear a user's blocked flag.  Mutates exactly that one field.
    pub fn set_user_blocked(&self, id: UserId, blocked: bool) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE users SET blocked = ?2 WHERE id = ?1",
            params![id.to_string(), blocked as i64],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Replace a user's password hash (password-reset confirmation).
    pub fn set_user_password(&self, id: UserId, password_hash: &str) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE users SET password_hash = ?2 WHERE id = ?1",
            params![id.to_string(), password_hash],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn not_found(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    }
}

/// Map a `rusqlite::Row` to a [`UserAccount`].
fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserAccount> {
    let id_str: String = row.get(0)?;
    let email: String = row.get(1)?;
    let role_str: String = row.get(2)?;
    let created_str: String = row.get(3)?;
    let blocked: i64 = row.get(4)?;
    let password_hash: String = row.get(5)?;
    let email_verified: i64 = row.get(6)?;

    let id = UserId::parse(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let role = Role::from_str(&role_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown role: {role_str}").into(),
        )
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(UserAccount {
        id,
        email,
        role,
        created_at,
        blocked: blocked != 0,
        password_hash,
        email_verified: email_verified != 0,
    })
}
