//! Request authentication.
//!
//! `AuthUser` is an extractor: any handler that takes one only runs with a
//! valid session token, presented either as a bearer header or a `token`
//! cookie.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::auth::verify_token;
use crate::error::AuthError;
use crate::http::{ApiError, AppState};
use crate::users::Role;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }

    pub fn require_owner(&self) -> Result<(), ApiError> {
        if self.is_owner() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Forbidden".to_string()))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .or_else(|| cookie_token(&parts.headers))
            .ok_or(AuthError::TokenMissing)?;

        let claims = verify_token(&token, state.config.jwt_secret.as_bytes())
            .map_err(|_| AuthError::TokenInvalid)?;

        Ok(AuthUser {
            username: claims.sub,
            role: claims.role,
        })
    }
}

fn bearer_token(headers: &header::HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn cookie_token(headers: &header::HeaderMap) -> Option<String> {
    headers
        .get(header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix("token="))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_bearer_token() {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn extracts_token_cookie_among_others() {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; token=abc.def.ghi; lang=en"),
        );
        assert_eq!(cookie_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn missing_credentials_yield_none() {
        let headers = header::HeaderMap::new();
        assert!(bearer_token(&headers).is_none());
        assert!(cookie_token(&headers).is_none());
    }
}
