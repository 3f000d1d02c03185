//! Configuration management
//!
//! Separates startup configuration (requires restart) from runtime settings
//! (admin-editable while the server is running, persisted to a JSON file).

use config::{Config, Environment, File};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Configuration that requires a server restart to take effect.
/// Loaded once during initialization from an optional `ftpvault.toml`
/// plus `FTPVAULT_*` environment overrides.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StartupConfig {
    /// IP address both front ends bind to
    pub bind_address: String,

    /// Port for the HTTP file API
    pub http_port: u16,

    /// Port for the FTP control connection
    pub ftp_port: u16,

    /// Port range for PASV data connections
    pub pasv_port_min: u16,
    pub pasv_port_max: u16,

    /// Root directory of the per-tenant storage tree
    pub storage_dir: String,

    /// Credential store file
    pub users_file: String,

    /// Runtime settings file
    pub settings_file: String,

    /// HS256 signing secret for session tokens
    pub jwt_secret: String,

    /// Bootstrap credentials for the single owner account
    pub owner_username: String,
    pub owner_password: String,

    /// Maximum number of accounts
    pub max_users: usize,

    /// Maximum FTP command line length
    pub max_command_length: usize,

    /// Timeout for establishing FTP data connections
    pub data_timeout_secs: u64,

    /// Optional TLS material for the HTTP API
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            http_port: 3000,
            ftp_port: 2121,
            pasv_port_min: 30000,
            pasv_port_max: 31000,
            storage_dir: "storage".to_string(),
            users_file: "users.json".to_string(),
            settings_file: "settings.json".to_string(),
            jwt_secret: "supersecretkey".to_string(),
            owner_username: "owner".to_string(),
            owner_password: "ownerpassword".to_string(),
            max_users: 100,
            max_command_length: 512,
            data_timeout_secs: 30,
            tls_cert: None,
            tls_key: None,
        }
    }
}

impl StartupConfig {
    /// Load configuration with environment overrides. A missing config file
    /// falls back to defaults rather than failing startup.
    pub fn load() -> Result<Self, config::ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("ftpvault").required(false))
            .add_source(Environment::with_prefix("FTPVAULT"))
            .build()?;

        let config: StartupConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all startup values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.http_port == 0 || self.ftp_port == 0 {
            return Err(config::ConfigError::Message(
                "Ports cannot be 0".into(),
            ));
        }

        if self.pasv_port_min >= self.pasv_port_max {
            return Err(config::ConfigError::Message(
                "pasv_port_min must be less than pasv_port_max".into(),
            ));
        }

        if self.storage_dir.is_empty() {
            return Err(config::ConfigError::Message(
                "storage_dir cannot be empty".into(),
            ));
        }

        if self.max_users == 0 {
            return Err(config::ConfigError::Message(
                "max_users must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Bind address and HTTP port as a socket address string
    pub fn http_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.http_port)
    }

    /// Bind address and FTP control port as a socket address string
    pub fn ftp_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.ftp_port)
    }

    /// Port range to scan for PASV data listeners
    pub fn pasv_port_range(&self) -> std::ops::Range<u16> {
        self.pasv_port_min..self.pasv_port_max
    }

    /// Storage tree root as a path
    pub fn storage_root(&self) -> PathBuf {
        PathBuf::from(&self.storage_dir)
    }

    /// Data connection timeout as a Duration
    pub fn data_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.data_timeout_secs)
    }
}

/// Settings the owner can change while the server is running.
/// Kept behind a lock and swapped wholesale on update.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeSettings {
    pub allow_register: bool,
    pub allow_login: bool,
    pub allow_upload: bool,

    /// Single-write ceiling, human readable ("150MB", "2GB", bare number = MiB)
    pub upload_limit: String,

    /// Quota assigned to new accounts, in GiB
    pub default_limit_gb: u64,

    /// FTP greeting line
    pub welcome_message: String,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            allow_register: true,
            allow_login: true,
            allow_upload: true,
            upload_limit: "150MB".to_string(),
            default_limit_gb: 5,
            welcome_message: "Welcome to the ftpvault server!".to_string(),
        }
    }
}

/// Thread-safe runtime settings wrapper
pub type SharedSettings = Arc<RwLock<RuntimeSettings>>;

impl RuntimeSettings {
    /// Read the settings file, falling back to defaults when it is missing
    /// or unreadable. A bad settings file must not take the server down.
    pub fn load_or_default(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!(
                        "Settings file {} is invalid ({}), using defaults",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Persist the settings with a temp-file-then-rename write.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, path)
    }

    pub fn shared(self) -> SharedSettings {
        Arc::new(RwLock::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_startup_config_is_valid() {
        assert!(StartupConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_pasv_range() {
        let config = StartupConfig {
            pasv_port_min: 31000,
            pasv_port_max: 30000,
            ..StartupConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn settings_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = RuntimeSettings::default();
        settings.allow_upload = false;
        settings.upload_limit = "2GB".to_string();
        settings.save(&path).unwrap();

        let reloaded = RuntimeSettings::load_or_default(&path);
        assert!(!reloaded.allow_upload);
        assert_eq!(reloaded.upload_limit, "2GB");
    }

    #[test]
    fn missing_settings_file_yields_defaults() {
        let settings = RuntimeSettings::load_or_default(Path::new("no-such-settings.json"));
        assert!(settings.allow_register);
        assert_eq!(settings.default_limit_gb, 5);
    }
}
