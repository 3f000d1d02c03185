//! FTP front end
//!
//! Control connection loop, command parsing and handlers, and PASV/PORT
//! data transfers. Sessions are confined to the same tenant trees and pass
//! the same quota gates as the HTTP API.

pub mod commands;
pub mod handlers;
pub mod server;
pub mod session;
pub mod transfer;

pub use server::FtpServer;

use std::sync::Arc;

use crate::config::{SharedSettings, StartupConfig};
use crate::users::UserStore;

/// Shared handles every FTP connection task gets a clone of.
#[derive(Clone)]
pub struct FtpContext {
    pub store: Arc<UserStore>,
    pub settings: SharedSettings,
    pub config: Arc<StartupConfig>,
}
