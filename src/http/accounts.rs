//! Account lifecycle endpoints: registration, verification, login, and the
//! quota and ban status queries.

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use log::info;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::auth::issue_token;
use crate::error::AuthError;
use crate::http::auth::AuthUser;
use crate::http::{ApiError, AppState};
use crate::storage::{disk_usage, tenant_root};
use crate::users::GIB;
use crate::users::account::format_remaining;

#[derive(Deserialize)]
pub struct RegisterRequest {
    username: String,
    password: String,
    email: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<Value>, ApiError> {
    let (allow_register, default_limit_gb) = {
        let settings = state.settings.read().await;
        (settings.allow_register, settings.default_limit_gb)
    };
    if !allow_register {
        return Err(ApiError::Forbidden("Registration disabled".to_string()));
    }
    if req.password.is_empty() {
        return Err(ApiError::BadRequest("Password required".to_string()));
    }

    let code = state
        .store
        .create_account(&req.username, &req.password, &req.email, default_limit_gb)?;
    // No outbound mail; the code goes to the log and the admin listing.
    info!("Verification code for '{}': {}", req.username.trim(), code);

    Ok(Json(json!({
        "success": true,
        "message": "Account created. Verify it with the code issued to you.",
    })))
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    username: String,
    code: String,
}

pub async fn verify(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<Value>, ApiError> {
    verify_inner(&state, &req.username, &req.code)
}

/// GET variant so a verification link can be clicked instead of posted.
pub async fn verify_link(
    State(state): State<AppState>,
    Query(req): Query<VerifyRequest>,
) -> Result<Json<Value>, ApiError> {
    verify_inner(&state, &req.username, &req.code)
}

fn verify_inner(state: &AppState, username: &str, code: &str) -> Result<Json<Value>, ApiError> {
    state.store.verify_account(username, code)?;
    Ok(Json(json!({
        "success": true,
        "message": "Account verified. Awaiting approval by the owner.",
    })))
}

#[derive(Deserialize)]
pub struct ResendRequest {
    username: String,
}

pub async fn resend_verification(
    State(state): State<AppState>,
    Json(req): Json<ResendRequest>,
) -> Result<Json<Value>, ApiError> {
    let code = state.store.reissue_code(&req.username)?;
    info!("Reissued verification code for '{}': {}", req.username, code);
    Ok(Json(json!({
        "success": true,
        "message": "A new verification code has been issued.",
    })))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let allow_login = state.settings.read().await.allow_login;

    let account = state.store.authenticate(&req.username, &req.password)?;
    // The owner can still get in to flip the switch back.
    if !allow_login && !account.is_owner() {
        return Err(AuthError::LoginDisabled.into());
    }

    let token = issue_token(
        &account.username,
        account.role,
        state.config.jwt_secret.as_bytes(),
    )?;
    info!("User '{}' logged in over HTTP", account.username);
    Ok(Json(json!({ "token": token, "role": account.role })))
}

pub async fn quota(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Value>, ApiError> {
    let account = state
        .store
        .get(&user.username)
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(usage_report(&state, &account)))
}

pub async fn public_limit(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let account = state
        .store
        .get(&username)
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(usage_report(&state, &account)))
}

fn usage_report(state: &AppState, account: &crate::users::Account) -> Value {
    let root = tenant_root(
        &state.config.storage_root(),
        account.role,
        &account.username,
    );
    let used = disk_usage(&root);
    json!({
        "usedGB": round2(used as f64 / GIB as f64),
        "limitGB": account.limit_gb,
    })
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub async fn ban_status(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Value>, ApiError> {
    let account = state
        .store
        .get(&user.username)
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(ban_report(&account)))
}

pub async fn public_ban(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let account = state
        .store
        .get(&username)
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(ban_report(&account)))
}

fn ban_report(account: &crate::users::Account) -> Value {
    match account.ban_at(Utc::now()) {
        Some((until, reason)) => json!({
            "banned": true,
            "bannedUntil": until.timestamp_millis(),
            "banReason": reason,
            "timeLeft": format_remaining(Utc::now(), until),
        }),
        None => json!({ "banned": false }),
    }
}
