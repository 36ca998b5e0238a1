//! Access control: session-token extractors and the role gate.
//!
//! A request is authenticated by (1) pulling the token from the bearer
//! header or the session cookie, (2) verifying it, (3) loading the still-
//! active user it names, and (4) rejecting tokens issued before the user's
//! last password change. `CurrentUser` enforces all four; `MaybeUser` is the
//! soft variant for endpoints that personalize output without requiring
//! login.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::auth::{jwt::TokenError, SESSION_COOKIE};
use crate::db::{self, UserRow};
use crate::error::{AppError, AppResult};
use crate::models::Role;
use crate::state::AppState;

const BEARER_PREFIX: &str = "Bearer ";

/// Pull the session token from the Authorization header, falling back to
/// the session cookie.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix(BEARER_PREFIX))
    {
        return Some(token.to_string());
    }
    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
}

/// Resolve the authenticated user for a request, or say why there is none.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> AppResult<UserRow> {
    let token = extract_token(headers).ok_or_else(|| {
        AppError::Unauthenticated("You are not logged in. Please log in to get access".to_string())
    })?;

    let claims = state.token_keys().verify(&token).map_err(|e| match e {
        TokenError::Expired => {
            AppError::Unauthenticated("Your session has expired. Please log in again".to_string())
        }
        TokenError::Invalid => AppError::Unauthenticated("Invalid session token".to_string()),
    })?;

    let user = db::user_get_by_id(state.db(), claims.sub)
        .await?
        .ok_or_else(|| {
            AppError::Unauthenticated("The user for this token no longer exists".to_string())
        })?;

    if user.changed_password_after(claims.iat) {
        return Err(AppError::Unauthenticated(
            "Password was changed recently. Please log in again".to_string(),
        ));
    }

    Ok(user)
}

/// Extractor: the authenticated user. Rejects with 401 when any step of
/// authentication fails.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRow);

#[async_trait::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // The role gate authenticates before the handler runs; reuse its
        // result instead of hitting the store twice.
        if let Some(cached) = parts.extensions.get::<CurrentUser>() {
            return Ok(cached.clone());
        }
        let user = authenticate(state, &parts.headers).await?;
        Ok(CurrentUser(user))
    }
}

/// Extractor: the authenticated user if there is one. Any failure, including
/// a malformed token, yields an anonymous request instead of an error.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<UserRow>);

#[async_trait::async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(cached) = parts.extensions.get::<CurrentUser>() {
            return Ok(MaybeUser(Some(cached.0.clone())));
        }
        Ok(MaybeUser(authenticate(state, &parts.headers).await.ok()))
    }
}

/// The set of roles a route admits. Built once per route and handed to the
/// gate as explicit state.
#[derive(Debug, Clone)]
pub struct RolePolicy {
    allowed: Vec<Role>,
}

impl RolePolicy {
    pub fn allow(roles: &[Role]) -> Self {
        Self {
            allowed: roles.to_vec(),
        }
    }

    pub fn permits(&self, role: Role) -> bool {
        self.allowed.contains(&role)
    }
}

/// Middleware: authenticate the request and enforce the role policy, then
/// attach the resolved user for downstream extractors.
pub async fn require_role(
    State((state, policy)): State<(AppState, RolePolicy)>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&state, req.headers()).await?;
    if !policy.permits(user.role) {
        tracing::warn!(user_id = %user.id, role = ?user.role, "role gate rejected request");
        return Err(AppError::Forbidden);
    }
    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("session=from-cookie"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn falls_back_to_session_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("theme=dark; session=tok123"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("tok123"));
    }

    #[test]
    fn no_token_yields_none() {
        let headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(extract_token(&headers), None);
    }

    #[test]
    fn role_policy_permits_listed_roles_only() {
        let admin_only = RolePolicy::allow(&[Role::Admin]);
        assert!(admin_only.permits(Role::Admin));
        assert!(!admin_only.permits(Role::User));

        let everyone = RolePolicy::allow(&[Role::User, Role::Admin]);
        assert!(everyone.permits(Role::User));
    }
}
