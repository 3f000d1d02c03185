//! Per-connection session state.
//!
//! Each control connection owns its own session, including its data channel,
//! so no state is shared between clients. The working directory is virtual:
//! "/" is the session's tenant root, never the process cwd.

use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;

use crate::users::Account;

/// Data connection negotiated by PASV or PORT, consumed by the next
/// transfer command.
#[derive(Default)]
pub enum DataChannel {
    #[default]
    None,
    /// We listen, the client connects (PASV).
    Pasv(TcpListener),
    /// The client listens, we connect (PORT).
    Port(SocketAddr),
}

pub struct Session {
    pub peer: SocketAddr,
    /// Username given by USER, awaiting PASS.
    pub pending_user: Option<String>,
    pub account: Option<Account>,
    pub tenant_root: Option<PathBuf>,
    /// Virtual working directory, always absolute within the tenant tree.
    pub cwd: String,
    pub data: DataChannel,
}

impl Session {
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            peer,
            pending_user: None,
            account: None,
            tenant_root: None,
            cwd: "/".to_string(),
            data: DataChannel::None,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.account.is_some()
    }

    pub fn login(&mut self, account: Account, tenant_root: PathBuf) {
        self.pending_user = None;
        self.account = Some(account);
        self.tenant_root = Some(tenant_root);
        self.cwd = "/".to_string();
    }

    pub fn logout(&mut self) {
        self.pending_user = None;
        self.account = None;
        self.tenant_root = None;
        self.cwd = "/".to_string();
        self.data = DataChannel::None;
    }

    /// Takes the negotiated data channel, leaving none behind; a channel is
    /// good for exactly one transfer.
    pub fn take_data_channel(&mut self) -> DataChannel {
        std::mem::take(&mut self.data)
    }

    /// Joins `arg` onto the working directory in virtual space. ".." at the
    /// top stays at "/" rather than erroring, matching what FTP clients
    /// expect when they walk up too far.
    pub fn virtual_path(&self, arg: &str) -> String {
        let base = if arg.starts_with('/') { "/" } else { &self.cwd };

        let mut segments: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
        for segment in arg.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }

        if segments.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", segments.join("/"))
        }
    }

    /// The same path relative to the tenant root, suitable for `resolve`.
    pub fn relative_path(&self, arg: &str) -> String {
        self.virtual_path(arg).trim_start_matches('/').to_string()
    }
}
