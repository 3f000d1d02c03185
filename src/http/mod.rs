//! HTTP file API
//!
//! An axum router exposing account lifecycle, file operations, and the
//! owner-only admin surface. Both front ends share the same store, settings,
//! and storage modules; this one speaks JSON over HTTP(S).

pub mod accounts;
pub mod admin;
pub mod auth;
pub mod error;
pub mod files;

pub use error::ApiError;

use axum::Router;
use axum::routing::{get, post};
use axum_server::tls_rustls::RustlsConfig;
use log::{info, warn};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::{SharedSettings, StartupConfig};
use crate::users::UserStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<UserStore>,
    pub settings: SharedSettings,
    pub config: Arc<StartupConfig>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/register", post(accounts::register))
        .route(
            "/api/verify-account",
            post(accounts::verify).get(accounts::verify_link),
        )
        .route("/api/resend-verification", post(accounts::resend_verification))
        .route("/api/login", post(accounts::login))
        .route("/api/user/quota", get(accounts::quota))
        .route("/api/user/ban-status", get(accounts::ban_status))
        .route("/api/limit/:username", get(accounts::public_limit))
        .route("/api/ban/:username", get(accounts::public_ban))
        .route("/api/files", get(files::list))
        .route(
            "/api/file",
            get(files::read).post(files::write).delete(files::delete),
        )
        .route("/api/storage/:username/*path", get(files::raw))
        .route("/api/admin/verify-owner", post(admin::verify_owner))
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/user-password", post(admin::user_password))
        .route("/api/admin/user-disable", post(admin::user_disable))
        .route("/api/admin/user-delete", post(admin::user_delete))
        .route("/api/admin/user-limit", post(admin::user_limit))
        .route("/api/admin/user-ban", post(admin::user_ban))
        .route("/api/admin/user-verify", post(admin::user_verify))
        .route("/api/admin/user-approve", post(admin::user_approve))
        .route("/api/admin/user-pause", post(admin::user_pause))
        .route(
            "/api/admin/settings",
            get(admin::get_settings).post(admin::update_settings),
        )
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(state)
}

/// Serves the API, over TLS when certificate material is configured and
/// present on disk, plain HTTP otherwise.
pub async fn serve(state: AppState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: SocketAddr = state.config.http_socket().parse()?;
    let config = state.config.clone();
    let app = router(state);

    match (&config.tls_cert, &config.tls_key) {
        (Some(cert), Some(key)) if Path::new(cert).exists() && Path::new(key).exists() => {
            let tls = RustlsConfig::from_pem_file(cert, key).await?;
            info!("HTTPS API listening on {}", addr);
            axum_server::bind_rustls(addr, tls)
                .serve(app.into_make_service())
                .await?;
        }
        (Some(_), Some(_)) => {
            warn!("Configured TLS certificate or key not found, serving plain HTTP");
            serve_plain(addr, app).await?;
        }
        _ => serve_plain(addr, app).await?,
    }
    Ok(())
}

async fn serve_plain(
    addr: SocketAddr,
    app: Router,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP API listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
