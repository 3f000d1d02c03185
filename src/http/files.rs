//! File endpoints.
//!
//! Every path a handler touches goes through `resolve` against the caller's
//! tenant root first; quota and upload gates run before any bytes land.

use axum::Json;
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::{Value, json};
use std::fs;
use std::path::PathBuf;

use crate::http::auth::AuthUser;
use crate::http::{ApiError, AppState};
use crate::storage::quota::{check_upload_size, check_write, parse_size_limit};
use crate::storage::{
    EntryInfo, delete_entry, disk_usage, list_directory, read_file, resolve, tenant_root,
    write_file,
};
use crate::users::Account;

fn caller_root(state: &AppState, user: &AuthUser) -> PathBuf {
    tenant_root(&state.config.storage_root(), user.role, &user.username)
}

fn caller_account(state: &AppState, user: &AuthUser) -> Result<Account, ApiError> {
    state
        .store
        .get(&user.username)
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// Write operations are refused while the account is paused; reads go on.
fn check_not_paused(account: &Account) -> Result<(), ApiError> {
    if account.paused && !account.is_owner() {
        return Err(ApiError::Forbidden("Account paused".to_string()));
    }
    Ok(())
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    path: String,
}

pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<EntryInfo>>, ApiError> {
    let root = caller_root(&state, &user);
    let target = resolve(&root, &query.path)?;
    Ok(Json(list_directory(&target)?))
}

#[derive(Deserialize)]
pub struct FileQuery {
    path: String,
}

/// Reads a file as JSON. UTF-8 content comes back as text, anything else is
/// base64 with the encoding flagged so clients know which they got.
pub async fn read(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<FileQuery>,
) -> Result<Json<Value>, ApiError> {
    let root = caller_root(&state, &user);
    let target = resolve(&root, &query.path)?;
    let bytes = read_file(&target)?;

    Ok(Json(match String::from_utf8(bytes) {
        Ok(text) => json!({ "content": text, "encoding": "utf-8" }),
        Err(e) => json!({
            "content": BASE64.encode(e.into_bytes()),
            "encoding": "base64",
        }),
    }))
}

#[derive(Deserialize)]
pub struct WriteRequest {
    path: String,
    content: String,
    /// `"base64"` for binary payloads; anything else is taken as text.
    encoding: Option<String>,
}

pub async fn write(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<WriteRequest>,
) -> Result<Json<Value>, ApiError> {
    let account = caller_account(&state, &user)?;
    check_not_paused(&account)?;

    let (allow_upload, upload_limit) = {
        let settings = state.settings.read().await;
        (settings.allow_upload, settings.upload_limit.clone())
    };
    if !allow_upload && !account.is_owner() {
        return Err(ApiError::Forbidden("Uploads disabled".to_string()));
    }

    let content = match req.encoding.as_deref() {
        Some("base64") => BASE64
            .decode(req.content.as_bytes())
            .map_err(|_| ApiError::BadRequest("Invalid base64 content".to_string()))?,
        _ => req.content.into_bytes(),
    };

    let root = caller_root(&state, &user);
    let target = resolve(&root, &req.path)?;

    if !account.is_owner() {
        let incoming = content.len() as u64;
        check_upload_size(incoming, parse_size_limit(&upload_limit))?;

        let existing = fs::metadata(&target)
            .map(|m| if m.is_file() { m.len() } else { 0 })
            .unwrap_or(0);
        check_write(disk_usage(&root), existing, account.quota_bytes(), incoming)?;
    }

    write_file(&target, &content)?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
pub struct DeleteRequest {
    path: String,
}

pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<DeleteRequest>,
) -> Result<Json<Value>, ApiError> {
    let account = caller_account(&state, &user)?;
    check_not_paused(&account)?;

    if req.path.trim().is_empty() {
        return Err(ApiError::BadRequest("File path required".to_string()));
    }

    let root = caller_root(&state, &user);
    let target = resolve(&root, &req.path)?;
    // The tenant root itself is not deletable through the API.
    if target == root {
        return Err(ApiError::BadRequest("File path required".to_string()));
    }

    delete_entry(&target)?;
    Ok(Json(json!({ "success": true })))
}

/// Raw download of a file from any tenant's tree. Callers may only read
/// their own tree unless they are the owner.
pub async fn raw(
    State(state): State<AppState>,
    user: AuthUser,
    UrlPath((username, path)): UrlPath<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    if !user.is_owner() && !user.username.eq_ignore_ascii_case(&username) {
        return Err(ApiError::Forbidden("Forbidden".to_string()));
    }

    let account = state
        .store
        .get(&username)
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    let root = tenant_root(
        &state.config.storage_root(),
        account.role,
        &account.username,
    );
    let target = resolve(&root, &path)?;
    let bytes = read_file(&target)?;

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        bytes,
    ))
}
