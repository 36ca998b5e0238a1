//! Auth flows: registration, login, password reset and update.
//!
//! Handlers stay thin; every state machine from the auth design lives here.
//! Argon2 work is CPU-bound, so hashing and verification run on the blocking
//! pool instead of the async reactor.

use tracing::{info, warn};

use crate::auth::{password, reset};
use crate::db::{self, UserRow};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

async fn hash_on_blocking_pool(plain: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || password::hash_password(&plain))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("hash task: {}", e)))?
}

async fn verify_on_blocking_pool(plain: String, hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || password::verify_password(&plain, &hash))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("verify task: {}", e)))
}

/// Register a new user and log them in. The email must be free across both
/// active and soft-deleted users.
pub async fn register(
    state: &AppState,
    name: &str,
    email: &str,
    password: &str,
) -> AppResult<(String, UserRow)> {
    if db::user_email_taken(state.db(), email).await? {
        warn!(email = %email, "registration with taken email");
        return Err(AppError::DuplicateEmail);
    }

    let hash = hash_on_blocking_pool(password.to_string()).await?;
    // The unique index backstops a concurrent registration racing past the
    // pre-flight check; user_create maps that onto DuplicateEmail too.
    let user = db::user_create(state.db(), name, email, &hash).await?;
    let token = state.token_keys().issue(user.id)?;

    info!(user_id = %user.id, "user registered");
    Ok((token, user))
}

/// Log in with email and password. Unknown email and wrong password are
/// indistinguishable to the caller.
pub async fn login(state: &AppState, email: &str, password: &str) -> AppResult<(String, UserRow)> {
    let user = match db::user_find_by_email(state.db(), email).await? {
        Some(u) => u,
        None => {
            warn!(email = %email, "login with unknown email");
            return Err(AppError::InvalidCredentials);
        }
    };

    if !verify_on_blocking_pool(password.to_string(), user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "login with wrong password");
        return Err(AppError::InvalidCredentials);
    }

    let token = state.token_keys().issue(user.id)?;
    info!(user_id = %user.id, "user logged in");
    Ok((token, user))
}

/// Start a password reset. Returns the plain token for the delivery channel,
/// or `None` when the email matches no active user; the HTTP response is the
/// same either way.
pub async fn forgot_password(state: &AppState, email: &str) -> AppResult<Option<String>> {
    let user = match db::user_find_by_email(state.db(), email).await? {
        Some(u) => u,
        None => return Ok(None),
    };

    let token = reset::generate();
    if let Err(e) =
        db::user_set_reset_token(state.db(), user.id, &token.hashed, token.expires_at).await
    {
        // Roll back any partially written reset state on the record we
        // already hold before surfacing the failure.
        if let Err(cleanup) = db::user_clear_reset_token(state.db(), user.id).await {
            warn!(user_id = %user.id, error = %cleanup, "reset-token cleanup failed");
        }
        return Err(e);
    }

    info!(user_id = %user.id, "password reset token issued");
    Ok(Some(token.plain))
}

/// Complete a password reset with the raw token from the reset link. The
/// stored digest is cleared on success, so a token can be spent only once.
pub async fn reset_password(
    state: &AppState,
    raw_token: &str,
    new_password: &str,
) -> AppResult<(String, UserRow)> {
    let hashed = reset::hash_token(raw_token);
    let user = db::user_find_by_reset_token(state.db(), &hashed)
        .await?
        .ok_or(AppError::InvalidOrExpiredToken)?;

    let hash = hash_on_blocking_pool(new_password.to_string()).await?;
    let user = db::user_update_password(state.db(), user.id, &hash).await?;
    let token = state.token_keys().issue(user.id)?;

    info!(user_id = %user.id, "password reset completed");
    Ok((token, user))
}

/// Change the password of an authenticated user. Session tokens issued
/// before this call go stale through the password-changed-at check.
pub async fn update_password(
    state: &AppState,
    user: &UserRow,
    current_password: &str,
    new_password: &str,
) -> AppResult<(String, UserRow)> {
    if !verify_on_blocking_pool(current_password.to_string(), user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "password update with wrong current password");
        return Err(AppError::InvalidCredentials);
    }

    let hash = hash_on_blocking_pool(new_password.to_string()).await?;
    let user = db::user_update_password(state.db(), user.id, &hash).await?;
    let token = state.token_keys().issue(user.id)?;

    info!(user_id = %user.id, "password updated");
    Ok((token, user))
}
