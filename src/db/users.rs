//! Credential store: user records with hashed secrets and reset-token state.
//!
//! Every read carries an explicit `active = TRUE` predicate; soft-deleted
//! users stay on disk but are invisible to lookups. Uniqueness of email and
//! name is enforced by the DB indexes and spans inactive rows.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::Role;

const USER_COLUMNS: &str = "id, name, email, password_hash, role, password_changed_at, \
     password_reset_token, password_reset_expires, active, created_at, updated_at";

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub password_reset_token: Option<String>,
    pub password_reset_expires: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    /// True if the password changed after a token was issued at `iat`
    /// (unix seconds). Tokens from before the change are stale.
    pub fn changed_password_after(&self, iat: i64) -> bool {
        match self.password_changed_at {
            Some(changed_at) => iat < changed_at.timestamp(),
            None => false,
        }
    }
}

/// Map unique-index violations onto the auth error taxonomy.
fn map_unique_violation(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(ref db_err) = e {
        match db_err.constraint() {
            Some("users_email_key") => return AppError::DuplicateEmail,
            Some("users_name_key") => {
                return AppError::Validation("Name already taken".to_string())
            }
            _ => {}
        }
    }
    AppError::Db(e)
}

pub async fn user_create(
    pool: &DbPool,
    name: &str,
    email: &str,
    password_hash: &str,
) -> AppResult<UserRow> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        r#"
        INSERT INTO users (name, email, password_hash)
        VALUES ($1, $2, $3)
        RETURNING {USER_COLUMNS}
        "#,
    ))
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await
    .map_err(map_unique_violation)?;
    Ok(row)
}

/// Pre-flight duplicate check for registration. Deliberately ignores the
/// active flag: a soft-deleted user still owns their email.
pub async fn user_email_taken(pool: &DbPool, email: &str) -> AppResult<bool> {
    let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

pub async fn user_find_by_email(pool: &DbPool, email: &str) -> AppResult<Option<UserRow>> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND active = TRUE",
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn user_get_by_id(pool: &DbPool, id: Uuid) -> AppResult<Option<UserRow>> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND active = TRUE",
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Look up a user by the stored reset-token digest, requiring the token
/// window to still be open.
pub async fn user_find_by_reset_token(
    pool: &DbPool,
    hashed_token: &str,
) -> AppResult<Option<UserRow>> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        r#"
        SELECT {USER_COLUMNS}
        FROM users
        WHERE password_reset_token = $1
          AND password_reset_expires > NOW()
          AND active = TRUE
        "#,
    ))
    .bind(hashed_token)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Store the reset-token digest and its expiry. Both fields move together.
pub async fn user_set_reset_token(
    pool: &DbPool,
    id: Uuid,
    hashed_token: &str,
    expires_at: DateTime<Utc>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET password_reset_token = $2,
            password_reset_expires = $3,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(hashed_token)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn user_clear_reset_token(pool: &DbPool, id: Uuid) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET password_reset_token = NULL,
            password_reset_expires = NULL,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Replace the hashed secret. Bumps `password_changed_at` to one second in
/// the past so a session token issued in the same instant stays valid, and
/// clears any outstanding reset token in the same statement.
pub async fn user_update_password(
    pool: &DbPool,
    id: Uuid,
    password_hash: &str,
) -> AppResult<UserRow> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        r#"
        UPDATE users
        SET password_hash = $2,
            password_changed_at = NOW() - INTERVAL '1 second',
            password_reset_token = NULL,
            password_reset_expires = NULL,
            updated_at = NOW()
        WHERE id = $1 AND active = TRUE
        RETURNING {USER_COLUMNS}
        "#,
    ))
    .bind(id)
    .bind(password_hash)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn users_list_active(pool: &DbPool) -> AppResult<Vec<UserRow>> {
    let rows = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE active = TRUE ORDER BY created_at DESC",
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Soft delete: mark inactive, keep the row.
pub async fn user_deactivate(pool: &DbPool, id: Uuid) -> AppResult<()> {
    let r = sqlx::query(
        "UPDATE users SET active = FALSE, updated_at = NOW() WHERE id = $1 AND active = TRUE",
    )
    .bind(id)
    .execute(pool)
    .await?;
    if r.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user_with_changed_at(changed_at: Option<DateTime<Utc>>) -> UserRow {
        let now = Utc::now();
        UserRow {
            id: Uuid::new_v4(),
            name: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "hash".to_string(),
            role: Role::User,
            password_changed_at: changed_at,
            password_reset_token: None,
            password_reset_expires: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn never_changed_password_is_never_stale() {
        let user = user_with_changed_at(None);
        assert!(!user.changed_password_after(0));
        assert!(!user.changed_password_after(Utc::now().timestamp()));
    }

    #[test]
    fn token_issued_before_change_is_stale() {
        let changed = Utc::now();
        let user = user_with_changed_at(Some(changed));
        let iat_before = (changed - Duration::minutes(5)).timestamp();
        assert!(user.changed_password_after(iat_before));
    }

    #[test]
    fn token_issued_after_change_is_fresh() {
        let changed = Utc::now() - Duration::hours(1);
        let user = user_with_changed_at(Some(changed));
        let iat_after = Utc::now().timestamp();
        assert!(!user.changed_password_after(iat_after));
    }
}
