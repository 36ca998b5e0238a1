//! Study-planning API: authentication and authorization service.
//!
//! Registration, login, password-reset token lifecycle, JWT sessions and
//! role-based access control over a PostgreSQL credential store.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod state;
pub mod users;

pub use config::Config;
pub use error::AppError;
pub use state::AppState;

use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::Json;
use serde_json::json;

use crate::middleware::auth::{require_role, RolePolicy};
use crate::models::Role;

/// Build the API router. Used by main and by integration tests.
pub fn create_app(state: AppState) -> axum::Router {
    let auth_routes = axum::Router::new()
        .route("/register", post(auth::handlers::register))
        .route("/login", post(auth::handlers::login))
        .route("/logout", get(auth::handlers::logout))
        .route("/forgotPassword", post(auth::handlers::forgot_password))
        .route("/resetPassword/:token", post(auth::handlers::reset_password))
        .route("/me", get(auth::handlers::me))
        .route("/session", get(auth::handlers::session))
        .route("/updatePassword", put(auth::handlers::update_password));

    let admin_routes = axum::Router::new()
        .route("/users", get(users::handlers::list_users))
        .route("/users/:id", delete(users::handlers::deactivate_user))
        .route_layer(axum::middleware::from_fn_with_state(
            (state.clone(), RolePolicy::allow(&[Role::Admin])),
            require_role,
        ));

    axum::Router::new()
        .route("/health", get(health))
        .nest("/auth", auth_routes)
        .nest("/admin", admin_routes)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(state)
}

/// GET /health — liveness probe.
async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "service": "studyplan" })),
    )
}
