//! Auth HTTP handlers: register, login, logout, password reset and update.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::{service, SESSION_COOKIE};
use crate::config::Config;
use crate::error::AppError;
use crate::middleware::auth::{CurrentUser, MaybeUser};
use crate::models::PublicUser;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

/// Response for every flow that logs the user in.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct ForgotPasswordResponse {
    pub message: String,
    /// Echoed outside production so the reset flow can be exercised without
    /// a delivery channel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: Option<PublicUser>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn session_cookie(config: &Config, token: &str) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .secure(config.is_production())
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(config.jwt_ttl_minutes))
        .build()
}

/// Replacement cookie handed out on logout: a dummy value that dies almost
/// immediately, overwriting the real token on the client.
fn logout_cookie(config: &Config) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "loggedout"))
        .path("/")
        .http_only(true)
        .secure(config.is_production())
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(10))
        .build()
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>), AppError> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let email = normalize_email(&body.email);

    let (token, user) = service::register(&state, body.name.trim(), &email, &body.password).await?;

    let jar = jar.add(session_cookie(&state.config, &token));
    Ok((
        StatusCode::CREATED,
        jar,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let email = normalize_email(&body.email);
    let (token, user) = service::login(&state, &email, &body.password).await?;

    let jar = jar.add(session_cookie(&state.config, &token));
    Ok((
        jar,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

/// GET /auth/logout — stateless: the server keeps no revocation list, it
/// just tells the client to drop the token.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<serde_json::Value>) {
    let jar = jar.add(logout_cookie(&state.config));
    (jar, Json(serde_json::json!({ "message": "Logged out" })))
}

/// POST /auth/forgotPassword — same response whether or not the email is
/// known, to keep account enumeration off the table.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<Json<ForgotPasswordResponse>, AppError> {
    let email = normalize_email(&body.email);
    let plain_token = service::forgot_password(&state, &email).await?;

    // TODO: hand plain_token to the mail sender once the delivery channel
    // service is wired up.
    let reset_token = match plain_token {
        Some(t) if !state.config.is_production() => Some(t),
        _ => None,
    };

    Ok(Json(ForgotPasswordResponse {
        message: "If that email is registered, a reset token has been sent".to_string(),
        reset_token,
    }))
}

/// POST /auth/resetPassword/:token
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    jar: CookieJar,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let (token, user) = service::reset_password(&state, &token, &body.password).await?;

    let jar = jar.add(session_cookie(&state.config, &token));
    Ok((
        jar,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

/// GET /auth/me
pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse { user: user.into() })
}

/// GET /auth/session — login-state probe for the mobile client; never fails,
/// reports `user: null` for anonymous requests.
pub async fn session(MaybeUser(user): MaybeUser) -> Json<SessionResponse> {
    Json(SessionResponse {
        user: user.map(Into::into),
    })
}

/// PUT /auth/updatePassword
pub async fn update_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
    Json(body): Json<UpdatePasswordRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let (token, user) =
        service::update_password(&state, &user, &body.current_password, &body.new_password).await?;

    let jar = jar.add(session_cookie(&state.config, &token));
    Ok((
        jar,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev_config() -> Config {
        Config {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            database_url: "postgres://localhost/test".to_string(),
            jwt_secret: "test-jwt-secret-min-32-chars!!!!".to_string(),
            jwt_ttl_minutes: 60,
            environment: "development".to_string(),
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn session_cookie_is_http_only_and_scoped() {
        let cookie = session_cookie(&dev_config(), "tok");
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::minutes(60)));
    }

    #[test]
    fn session_cookie_is_secure_in_production() {
        let mut config = dev_config();
        config.environment = "production".to_string();
        assert_eq!(session_cookie(&config, "tok").secure(), Some(true));
    }

    #[test]
    fn logout_cookie_overwrites_and_expires_fast() {
        let cookie = logout_cookie(&dev_config());
        assert_eq!(cookie.value(), "loggedout");
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(10)));
    }

    #[test]
    fn email_normalization_lowercases_and_trims() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }
}
