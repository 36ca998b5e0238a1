//! Admin user handlers. Routes in this module sit behind the admin role
//! gate; the gate has already authenticated the request and attached the
//! caller.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::db;
use crate::error::AppError;
use crate::middleware::auth::CurrentUser;
use crate::models::PublicUser;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<PublicUser>,
}

/// GET /admin/users — all active users.
pub async fn list_users(State(state): State<AppState>) -> Result<Json<UsersResponse>, AppError> {
    let users = db::users_list_active(state.db()).await?;
    Ok(Json(UsersResponse {
        users: users.into_iter().map(Into::into).collect(),
    }))
}

/// DELETE /admin/users/:id — soft delete: the record stays, every read path
/// stops seeing it.
pub async fn deactivate_user(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    db::user_deactivate(state.db(), id).await?;
    tracing::info!(user_id = %id, admin_id = %admin.id, "user deactivated");
    Ok(Json(serde_json::json!({ "message": "User deactivated" })))
}
