//! Owner-only administration endpoints.

use axum::Json;
use axum::extract::State;
use chrono::DateTime;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::RuntimeSettings;
use crate::http::auth::AuthUser;
use crate::http::{ApiError, AppState};
use crate::users::{Account, Role};

pub async fn verify_owner(user: AuthUser) -> Result<Json<Value>, ApiError> {
    user.require_owner()?;
    Ok(Json(json!({ "isOwner": true })))
}

/// Admin view of an account. Sensitive only to the owner, who already holds
/// the store file; the password hash is included, the password never exists.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    username: String,
    password_hash: String,
    role: Role,
    disabled: bool,
    verified: bool,
    approval: bool,
    paused: bool,
    limit_gb: Option<u64>,
    email: Option<String>,
    verification_code: Option<String>,
    banned_until: Option<i64>,
    ban_reason: Option<String>,
}

impl From<Account> for UserView {
    fn from(account: Account) -> Self {
        Self {
            username: account.username,
            password_hash: account.password_hash,
            role: account.role,
            disabled: !account.enabled,
            verified: account.verified,
            approval: account.approved,
            paused: account.paused,
            limit_gb: account.limit_gb,
            email: account.email,
            verification_code: account.verification_code,
            banned_until: account.banned_until.map(|t| t.timestamp_millis()),
            ban_reason: account.ban_reason,
        }
    }
}

pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<UserView>>, ApiError> {
    user.require_owner()?;
    let users = state
        .store
        .list()
        .into_iter()
        .map(UserView::from)
        .collect();
    Ok(Json(users))
}

#[derive(Deserialize)]
pub struct PasswordRequest {
    username: String,
    password: String,
}

pub async fn user_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<PasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    user.require_owner()?;
    if req.password.is_empty() {
        return Err(ApiError::BadRequest("Password required".to_string()));
    }
    state.store.set_password(&req.username, &req.password)?;
    info!("Owner reset password for '{}'", req.username);
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
pub struct DisableRequest {
    username: String,
    disable: bool,
}

pub async fn user_disable(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<DisableRequest>,
) -> Result<Json<Value>, ApiError> {
    user.require_owner()?;
    state.store.set_enabled(&req.username, !req.disable)?;
    info!(
        "Owner {} account '{}'",
        if req.disable { "disabled" } else { "enabled" },
        req.username
    );
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
pub struct DeleteRequest {
    username: String,
}

pub async fn user_delete(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<DeleteRequest>,
) -> Result<Json<Value>, ApiError> {
    user.require_owner()?;
    state.store.delete_account(&req.username)?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitRequest {
    username: String,
    limit_gb: u64,
}

pub async fn user_limit(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<LimitRequest>,
) -> Result<Json<Value>, ApiError> {
    user.require_owner()?;
    state.store.set_limit(&req.username, req.limit_gb)?;
    info!("Owner set quota of '{}' to {} GB", req.username, req.limit_gb);
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BanRequest {
    username: String,
    /// Milliseconds since the epoch; omit to lift the ban.
    banned_until: Option<i64>,
    ban_reason: Option<String>,
}

pub async fn user_ban(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<BanRequest>,
) -> Result<Json<Value>, ApiError> {
    user.require_owner()?;

    let until = match req.banned_until {
        Some(millis) => Some(
            DateTime::from_timestamp_millis(millis)
                .ok_or_else(|| ApiError::BadRequest("Invalid ban timestamp".to_string()))?,
        ),
        None => None,
    };

    state.store.set_ban(&req.username, until, req.ban_reason)?;
    match until {
        Some(until) => info!("Owner banned '{}' until {}", req.username, until),
        None => info!("Owner lifted ban on '{}'", req.username),
    }
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    username: String,
    verified: bool,
}

pub async fn user_verify(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<Value>, ApiError> {
    user.require_owner()?;
    state.store.set_verified(&req.username, req.verified)?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
pub struct ApproveRequest {
    username: String,
    approval: bool,
}

pub async fn user_approve(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ApproveRequest>,
) -> Result<Json<Value>, ApiError> {
    user.require_owner()?;
    state.store.set_approved(&req.username, req.approval)?;
    info!(
        "Owner {} account '{}'",
        if req.approval { "approved" } else { "unapproved" },
        req.username
    );
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
pub struct PauseRequest {
    username: String,
    paused: bool,
}

pub async fn user_pause(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<PauseRequest>,
) -> Result<Json<Value>, ApiError> {
    user.require_owner()?;
    state.store.set_paused(&req.username, req.paused)?;
    Ok(Json(json!({ "success": true })))
}

pub async fn get_settings(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<RuntimeSettings>, ApiError> {
    user.require_owner()?;
    Ok(Json(state.settings.read().await.clone()))
}

/// Accepts either a `{key, value}` patch of a single setting or a full
/// settings object. The new settings are swapped in wholesale and persisted.
pub async fn update_settings(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    user.require_owner()?;

    let mut guard = state.settings.write().await;
    let mut next = guard.clone();

    if let Some(key) = body.get("key").and_then(Value::as_str) {
        let value = body
            .get("value")
            .ok_or_else(|| ApiError::BadRequest("Missing value".to_string()))?;
        apply_setting(&mut next, key, value)?;
    } else {
        next = serde_json::from_value(body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid settings: {}", e)))?;
    }

    next.save(std::path::Path::new(&state.config.settings_file))
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    *guard = next;
    info!("Runtime settings updated");
    Ok(Json(json!({ "success": true })))
}

fn apply_setting(
    settings: &mut RuntimeSettings,
    key: &str,
    value: &Value,
) -> Result<(), ApiError> {
    let bad = |key: &str| ApiError::BadRequest(format!("Invalid value for {}", key));

    match key {
        "allowRegister" => settings.allow_register = value.as_bool().ok_or_else(|| bad(key))?,
        "allowLogin" => settings.allow_login = value.as_bool().ok_or_else(|| bad(key))?,
        "allowUpload" => settings.allow_upload = value.as_bool().ok_or_else(|| bad(key))?,
        "uploadLimit" => {
            // A bare number means megabytes.
            settings.upload_limit = match value {
                Value::Number(n) => format!("{}MB", n),
                Value::String(s) => s.trim().to_string(),
                _ => return Err(bad(key)),
            };
        }
        "defaultLimitGb" => {
            settings.default_limit_gb = value.as_u64().ok_or_else(|| bad(key))?;
        }
        "welcomeMessage" => {
            settings.welcome_message = value.as_str().ok_or_else(|| bad(key))?.to_string();
        }
        _ => return Err(ApiError::BadRequest(format!("Unknown setting {}", key))),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_applies_known_keys() {
        let mut settings = RuntimeSettings::default();

        apply_setting(&mut settings, "allowUpload", &json!(false)).unwrap();
        assert!(!settings.allow_upload);

        apply_setting(&mut settings, "uploadLimit", &json!(200)).unwrap();
        assert_eq!(settings.upload_limit, "200MB");

        apply_setting(&mut settings, "uploadLimit", &json!("2GB")).unwrap();
        assert_eq!(settings.upload_limit, "2GB");

        apply_setting(&mut settings, "defaultLimitGb", &json!(10)).unwrap();
        assert_eq!(settings.default_limit_gb, 10);
    }

    #[test]
    fn patch_rejects_unknown_keys_and_bad_types() {
        let mut settings = RuntimeSettings::default();
        assert!(apply_setting(&mut settings, "jwtSecret", &json!("x")).is_err());
        assert!(apply_setting(&mut settings, "allowLogin", &json!("yes")).is_err());
        assert!(apply_setting(&mut settings, "defaultLimitGb", &json!(-1)).is_err());
    }

    #[test]
    fn admin_view_flips_enabled_to_disabled() {
        let account = Account {
            username: "alice".to_string(),
            password_hash: "$argon2id$...".to_string(),
            role: Role::User,
            enabled: false,
            verified: true,
            approved: false,
            paused: false,
            limit_gb: Some(5),
            email: Some("a@x.com".to_string()),
            verification_code: None,
            verification_sent: None,
            banned_until: None,
            ban_reason: None,
        };
        let view = UserView::from(account);
        assert!(view.disabled);
        assert!(view.verified);
        assert!(!view.approval);
    }
}
