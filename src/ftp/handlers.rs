//! FTP command handlers.
//!
//! One async handler per command, all writing their numeric replies to the
//! control connection directly. Transfer commands consume the session's
//! negotiated data channel.

use chrono::Utc;
use log::{error, info};
use std::net::SocketAddr;
use std::str::FromStr;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{AuthError, QuotaError, TransferError};
use crate::ftp::FtpContext;
use crate::ftp::commands::Command;
use crate::ftp::session::{DataChannel, Session};
use crate::ftp::transfer::{
    UploadBudget, bind_pasv_listener, open_data_stream, receive_file, send_file, send_listing,
};
use crate::storage::quota::parse_size_limit;
use crate::storage::{disk_usage, list_directory, resolve, tenant_root};
use crate::users::account::format_remaining;

pub async fn reply<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\r\n").await?;
    writer.flush().await
}

/// Dispatches one parsed command. Returns false when the control connection
/// should close.
pub async fn handle_command<W: AsyncWrite + Unpin>(
    ctx: &FtpContext,
    session: &mut Session,
    writer: &mut W,
    command: Command,
) -> std::io::Result<bool> {
    match command {
        Command::USER(username) => handle_user(session, writer, username).await?,
        Command::PASS(password) => handle_pass(ctx, session, writer, &password).await?,
        Command::QUIT => {
            reply(writer, "221 Goodbye").await?;
            return Ok(false);
        }
        Command::LOGOUT => handle_logout(session, writer).await?,
        Command::PWD => handle_pwd(session, writer).await?,
        Command::CWD(path) => handle_cwd(session, writer, &path).await?,
        Command::LIST => handle_list(ctx, session, writer).await?,
        Command::RETR(name) => handle_retr(ctx, session, writer, &name).await?,
        Command::STOR(name) => handle_stor(ctx, session, writer, &name).await?,
        Command::DELE(name) => handle_dele(session, writer, &name).await?,
        Command::PASV => handle_pasv(ctx, session, writer).await?,
        Command::PORT(addr) => handle_port(session, writer, &addr).await?,
        Command::TYPE(_) => reply(writer, "200 Type set to I").await?,
        Command::SYST => reply(writer, "215 UNIX Type: L8").await?,
        Command::NOOP => reply(writer, "200 NOOP ok").await?,
        Command::UNKNOWN => reply(writer, "500 Syntax error, command unrecognized").await?,
    }
    Ok(true)
}

/// Single gate used by every command that needs a logged-in session.
async fn require_login<W: AsyncWrite + Unpin>(
    session: &Session,
    writer: &mut W,
) -> std::io::Result<bool> {
    if session.is_logged_in() {
        return Ok(true);
    }
    reply(writer, "530 Please login with USER and PASS").await?;
    Ok(false)
}

async fn handle_user<W: AsyncWrite + Unpin>(
    session: &mut Session,
    writer: &mut W,
    username: String,
) -> std::io::Result<()> {
    if username.is_empty() {
        return reply(writer, "501 Syntax error in parameters or arguments").await;
    }
    // A fresh USER always restarts the login sequence.
    session.logout();
    session.pending_user = Some(username);
    reply(writer, "331 Password required").await
}

async fn handle_pass<W: AsyncWrite + Unpin>(
    ctx: &FtpContext,
    session: &mut Session,
    writer: &mut W,
    password: &str,
) -> std::io::Result<()> {
    let Some(username) = session.pending_user.clone() else {
        return reply(writer, "503 Login with USER first").await;
    };

    let account = match ctx.store.authenticate(&username, password) {
        Ok(account) => account,
        Err(AuthError::Banned { reason, until }) => {
            info!("Banned user '{}' rejected on FTP", username);
            return reply(
                writer,
                &format!(
                    "530 You are banned for {}. Reason: {}",
                    format_remaining(Utc::now(), until),
                    reason
                ),
            )
            .await;
        }
        Err(AuthError::InvalidCredentials) => {
            info!("Failed FTP login for '{}' from {}", username, session.peer);
            return reply(writer, "530 Login incorrect").await;
        }
        Err(e) => return reply(writer, &format!("530 {}", e)).await,
    };

    if !ctx.settings.read().await.allow_login && !account.is_owner() {
        return reply(writer, "530 Login disabled").await;
    }

    let root = tenant_root(&ctx.config.storage_root(), account.role, &account.username);
    if let Err(e) = tokio::fs::create_dir_all(&root).await {
        error!("Failed to create tenant root {}: {}", root.display(), e);
        return reply(writer, "421 Service not available").await;
    }

    info!("User '{}' logged in over FTP from {}", account.username, session.peer);
    session.login(account, root);
    reply(writer, "230 Login successful").await
}

async fn handle_logout<W: AsyncWrite + Unpin>(
    session: &mut Session,
    writer: &mut W,
) -> std::io::Result<()> {
    if session.is_logged_in() {
        session.logout();
        reply(writer, "221 Logout successful").await
    } else {
        reply(writer, "530 Not logged in").await
    }
}

async fn handle_pwd<W: AsyncWrite + Unpin>(
    session: &Session,
    writer: &mut W,
) -> std::io::Result<()> {
    if !require_login(session, writer).await? {
        return Ok(());
    }
    reply(writer, &format!("257 \"{}\"", session.cwd)).await
}

async fn handle_cwd<W: AsyncWrite + Unpin>(
    session: &mut Session,
    writer: &mut W,
    path: &str,
) -> std::io::Result<()> {
    if !require_login(session, writer).await? {
        return Ok(());
    }
    if path.is_empty() {
        return reply(writer, "501 Syntax error in parameters or arguments").await;
    }

    let root = session.tenant_root.clone().expect("logged in");
    let target = match resolve(&root, &session.relative_path(path)) {
        Ok(target) => target,
        Err(_) => return reply(writer, "550 Failed to change directory").await,
    };

    if target.is_dir() {
        session.cwd = session.virtual_path(path);
        reply(writer, "250 Directory changed successfully").await
    } else {
        reply(writer, "550 Failed to change directory").await
    }
}

async fn handle_list<W: AsyncWrite + Unpin>(
    ctx: &FtpContext,
    session: &mut Session,
    writer: &mut W,
) -> std::io::Result<()> {
    if !require_login(session, writer).await? {
        return Ok(());
    }

    let root = session.tenant_root.clone().expect("logged in");
    let target = match resolve(&root, &session.relative_path("")) {
        Ok(target) => target,
        Err(_) => return reply(writer, "550 Failed to list directory").await,
    };
    let entries = match list_directory(&target) {
        Ok(entries) => entries,
        Err(e) => {
            error!("LIST failed for {}: {}", session.peer, e);
            return reply(writer, "550 Failed to list directory").await;
        }
    };

    let channel = session.take_data_channel();
    if matches!(channel, DataChannel::None) {
        return reply(writer, "425 Use PASV or PORT first").await;
    }
    reply(writer, "150 Opening data connection").await?;

    let stream = match open_data_stream(channel, ctx.config.data_timeout()).await {
        Ok(stream) => stream,
        Err(_) => return reply(writer, "425 Can't open data connection").await,
    };
    match send_listing(stream, &entries).await {
        Ok(()) => reply(writer, "226 Directory listing successful").await,
        Err(e) => {
            error!("LIST transfer failed for {}: {}", session.peer, e);
            reply(writer, "426 Transfer aborted").await
        }
    }
}

async fn handle_retr<W: AsyncWrite + Unpin>(
    ctx: &FtpContext,
    session: &mut Session,
    writer: &mut W,
    name: &str,
) -> std::io::Result<()> {
    if !require_login(session, writer).await? {
        return Ok(());
    }
    if name.is_empty() {
        return reply(writer, "501 Syntax error in parameters or arguments").await;
    }

    let root = session.tenant_root.clone().expect("logged in");
    let target = match resolve(&root, &session.relative_path(name)) {
        Ok(target) => target,
        Err(_) => return reply(writer, "550 Filename invalid").await,
    };
    if !target.is_file() {
        return reply(writer, "550 File not found").await;
    }

    let channel = session.take_data_channel();
    if matches!(channel, DataChannel::None) {
        return reply(writer, "425 Use PASV or PORT first").await;
    }
    reply(writer, "150 Opening data connection").await?;

    let stream = match open_data_stream(channel, ctx.config.data_timeout()).await {
        Ok(stream) => stream,
        Err(_) => return reply(writer, "425 Can't open data connection").await,
    };
    match send_file(stream, &target).await {
        Ok(_) => reply(writer, "226 Transfer complete").await,
        Err(e) => {
            error!("RETR failed for {}: {}", session.peer, e);
            reply(writer, "426 Transfer aborted").await
        }
    }
}

async fn handle_stor<W: AsyncWrite + Unpin>(
    ctx: &FtpContext,
    session: &mut Session,
    writer: &mut W,
    name: &str,
) -> std::io::Result<()> {
    if !require_login(session, writer).await? {
        return Ok(());
    }
    if name.is_empty() {
        return reply(writer, "501 Syntax error in parameters or arguments").await;
    }

    let account = session.account.clone().expect("logged in");
    if account.paused && !account.is_owner() {
        return reply(writer, "550 Account paused").await;
    }

    let (allow_upload, upload_limit) = {
        let settings = ctx.settings.read().await;
        (settings.allow_upload, settings.upload_limit.clone())
    };
    if !allow_upload && !account.is_owner() {
        return reply(writer, "550 Uploads disabled").await;
    }

    let root = session.tenant_root.clone().expect("logged in");
    let target = match resolve(&root, &session.relative_path(name)) {
        Ok(target) => target,
        Err(_) => return reply(writer, "550 Filename invalid").await,
    };
    if target.exists() {
        return reply(writer, "550 File already exists").await;
    }
    if !target.parent().map(|p| p.is_dir()).unwrap_or(false) {
        return reply(writer, "550 Directory not found").await;
    }

    // The client never declares a size, so the budget is enforced on the
    // stream as bytes arrive.
    let budget = if account.is_owner() {
        None
    } else {
        Some(UploadBudget {
            ceiling: parse_size_limit(&upload_limit),
            quota_room: account
                .quota_bytes()
                .map(|quota| quota.saturating_sub(disk_usage(&root))),
        })
    };

    let channel = session.take_data_channel();
    if matches!(channel, DataChannel::None) {
        return reply(writer, "425 Use PASV or PORT first").await;
    }
    reply(writer, "150 Ok to send data").await?;

    let stream = match open_data_stream(channel, ctx.config.data_timeout()).await {
        Ok(stream) => stream,
        Err(_) => return reply(writer, "425 Can't open data connection").await,
    };
    match receive_file(stream, &target, budget).await {
        Ok(_) => reply(writer, "226 Transfer complete").await,
        Err(TransferError::LimitExceeded(QuotaError::FileTooLarge { .. })) => {
            reply(writer, "552 File too large").await
        }
        Err(TransferError::LimitExceeded(QuotaError::QuotaExceeded { .. })) => {
            reply(writer, "552 Storage quota exceeded").await
        }
        Err(e) => {
            error!("STOR failed for {}: {}", session.peer, e);
            reply(writer, "426 Transfer aborted").await
        }
    }
}

async fn handle_dele<W: AsyncWrite + Unpin>(
    session: &mut Session,
    writer: &mut W,
    name: &str,
) -> std::io::Result<()> {
    if !require_login(session, writer).await? {
        return Ok(());
    }
    if name.is_empty() {
        return reply(writer, "501 Syntax error in parameters or arguments").await;
    }

    let account = session.account.as_ref().expect("logged in");
    if account.paused && !account.is_owner() {
        return reply(writer, "550 Account paused").await;
    }

    let root = session.tenant_root.clone().expect("logged in");
    let target = match resolve(&root, &session.relative_path(name)) {
        Ok(target) if target != root => target,
        _ => return reply(writer, "550 Filename invalid").await,
    };

    match crate::storage::delete_entry(&target) {
        Ok(()) => reply(writer, "250 File deleted successfully").await,
        Err(e) => {
            error!("DELE failed for {}: {}", session.peer, e);
            reply(writer, "550 Failed to delete file").await
        }
    }
}

async fn handle_pasv<W: AsyncWrite + Unpin>(
    ctx: &FtpContext,
    session: &mut Session,
    writer: &mut W,
) -> std::io::Result<()> {
    if !require_login(session, writer).await? {
        return Ok(());
    }

    match bind_pasv_listener(&ctx.config.bind_address, ctx.config.pasv_port_range()).await {
        Ok((listener, addr)) => {
            info!("Client {} bound to data socket {} in PASV mode", session.peer, addr);
            session.data = DataChannel::Pasv(listener);
            reply(writer, &format!("227 Entering Passive Mode ({})", addr)).await
        }
        Err(e) => {
            error!("PASV setup failed for {}: {}", session.peer, e);
            reply(writer, "425 Can't open data connection").await
        }
    }
}

async fn handle_port<W: AsyncWrite + Unpin>(
    session: &mut Session,
    writer: &mut W,
    addr: &str,
) -> std::io::Result<()> {
    if !require_login(session, writer).await? {
        return Ok(());
    }

    let parsed = match SocketAddr::from_str(addr) {
        Ok(parsed) => parsed,
        Err(_) => return reply(writer, "501 Invalid address format. Use IP:PORT").await,
    };
    // The data connection must go back to the host the control connection
    // came from.
    if parsed.ip() != session.peer.ip() {
        return reply(writer, "501 IP address in PORT must match control connection").await;
    }
    if parsed.port() < 1024 {
        return reply(writer, "501 Port must be between 1024 and 65535").await;
    }

    info!("Client {} registered data socket {} in PORT mode", session.peer, parsed);
    session.data = DataChannel::Port(parsed);
    reply(writer, "200 PORT command successful").await
}
