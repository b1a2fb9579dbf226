//! Session extractors. A request is authenticated by a session token sent as
//! `Authorization: Bearer <token>` or in the `session` cookie.

use crate::api::AppState;
use crate::api::error::ApiError;
use crate::core::models::User;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

pub const SESSION_COOKIE: &str = "session";

fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

/// The user owning the request's session.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = extract_token(&parts.headers) else {
            debug!("Request without session token");
            return Err(ApiError::Unauthorized);
        };
        let Some(mut user) = state.store.resolve_session(&token)? else {
            debug!("Unknown session token");
            return Err(ApiError::Unauthorized);
        };

        user.last_access_at = Some(Utc::now());
        if let Err(e) = state.store.save_user(&user) {
            warn!(user_id = %user.id, "Failed to record last access: {}", e);
        }
        Ok(AuthUser(user))
    }
}

/// An authenticated user listed in `admin_emails`.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !state.config.is_admin(&user.email) {
            warn!(user_id = %user.id, "Non-admin access to admin route");
            return Err(ApiError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_token_from_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        headers.insert(header::COOKIE, HeaderValue::from_static("session=fromcookie"));
        assert_eq!(extract_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; session=xyz"));
        assert_eq!(extract_token(&headers).as_deref(), Some("xyz"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(extract_token(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn test_no_token() {
        assert!(extract_token(&HeaderMap::new()).is_none());
    }
}
