//! Signed session tokens.
//!
//! HS256 JWTs carrying `{username, role, issuedAt, expiry}`. Nothing is
//! stored server side; revocation takes effect when the token expires.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::users::Role;

/// Tokens are valid for one day after issue.
pub const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue_token(username: &str, role: Role, secret: &[u8]) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = Claims {
        sub: username.to_string(),
        role,
        iat: now.timestamp(),
        exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|_| AuthError::TokenInvalid)
}

pub fn verify_token(token: &str, secret: &[u8]) -> Result<Claims, AuthError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AuthError::TokenInvalid)
}
