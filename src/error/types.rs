//! Error types
//!
//! Defines domain-specific error types for each module of the storage daemon.

use chrono::{DateTime, Utc};
use std::fmt;
use std::io;

/// Credential store errors
#[derive(Debug)]
pub enum StoreError {
    UsernameTaken(String),
    UsernameInvalid(String),
    InvalidEmail(String),
    CapacityReached(usize),
    UserNotFound(String),
    AlreadyVerified(String),
    InvalidCode(String),
    CodeExpired(String),
    OwnerImmutable,
    HashingFailed(String),
    Corrupt(String),
    IoError(io::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::UsernameTaken(u) => write!(f, "User already exists: {}", u),
            StoreError::UsernameInvalid(u) => write!(
                f,
                "Invalid username (lowercase letters and numbers only): {}",
                u
            ),
            StoreError::InvalidEmail(e) => write!(f, "Invalid email address: {}", e),
            StoreError::CapacityReached(max) => write!(f, "User limit reached ({})", max),
            StoreError::UserNotFound(u) => write!(f, "User not found: {}", u),
            StoreError::AlreadyVerified(u) => write!(f, "Account already verified: {}", u),
            StoreError::InvalidCode(u) => write!(f, "Invalid verification code for: {}", u),
            StoreError::CodeExpired(u) => {
                write!(f, "Verification expired, account removed: {}", u)
            }
            StoreError::OwnerImmutable => write!(f, "Operation not permitted on owner account"),
            StoreError::HashingFailed(e) => write!(f, "Password hashing failed: {}", e),
            StoreError::Corrupt(e) => write!(f, "Credential store corrupt: {}", e),
            StoreError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<io::Error> for StoreError {
    fn from(error: io::Error) -> Self {
        StoreError::IoError(error)
    }
}

/// Authentication and session errors
#[derive(Debug)]
pub enum AuthError {
    InvalidCredentials,
    Banned {
        reason: String,
        until: DateTime<Utc>,
    },
    NotVerified,
    NotApproved,
    Disabled,
    LoginDisabled,
    TokenMissing,
    TokenInvalid,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid credentials"),
            AuthError::Banned { reason, until } => {
                write!(f, "Banned until {}. Reason: {}", until, reason)
            }
            AuthError::NotVerified => write!(f, "Account not verified"),
            AuthError::NotApproved => write!(f, "Account not approved yet"),
            AuthError::Disabled => write!(f, "User disabled"),
            AuthError::LoginDisabled => write!(f, "Login disabled"),
            AuthError::TokenMissing => write!(f, "No token"),
            AuthError::TokenInvalid => write!(f, "Invalid token"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Path resolution errors
#[derive(Debug)]
pub enum PathError {
    Escape(String),
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::Escape(p) => write!(f, "Path escapes tenant root: {}", p),
        }
    }
}

impl std::error::Error for PathError {}

/// Quota enforcement errors
#[derive(Debug)]
pub enum QuotaError {
    QuotaExceeded { attempted: u64, limit: u64 },
    FileTooLarge { attempted: u64, limit: u64 },
}

impl fmt::Display for QuotaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaError::QuotaExceeded { attempted, limit } => {
                write!(
                    f,
                    "Storage quota exceeded: {} bytes attempted, {} bytes allowed",
                    attempted, limit
                )
            }
            QuotaError::FileTooLarge { attempted, limit } => {
                write!(
                    f,
                    "File too large: {} bytes attempted, limit is {} bytes",
                    attempted, limit
                )
            }
        }
    }
}

impl std::error::Error for QuotaError {}

/// File system storage errors
#[derive(Debug)]
pub enum StorageError {
    NotFound(String),
    NotADirectory(String),
    NotAFile(String),
    IoError(io::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound(p) => write!(f, "Not found: {}", p),
            StorageError::NotADirectory(p) => write!(f, "Not a directory: {}", p),
            StorageError::NotAFile(p) => write!(f, "Not a file: {}", p),
            StorageError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<io::Error> for StorageError {
    fn from(error: io::Error) -> Self {
        StorageError::IoError(error)
    }
}

/// FTP data transfer errors
#[derive(Debug)]
pub enum TransferError {
    DataChannelNotInitialized,
    NoAvailablePort,
    ConnectionTimeout,
    IpMismatch { expected: String, provided: String },
    InvalidPortCommand(String),
    InvalidPortRange(u16),
    LimitExceeded(QuotaError),
    TransferFailed(io::Error),
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::DataChannelNotInitialized => write!(f, "Data channel not initialized"),
            TransferError::NoAvailablePort => write!(f, "No available port for data connection"),
            TransferError::ConnectionTimeout => write!(f, "Timeout waiting for data connection"),
            TransferError::IpMismatch { expected, provided } => {
                write!(f, "IP mismatch: expected {}, got {}", expected, provided)
            }
            TransferError::InvalidPortCommand(msg) => write!(f, "Invalid PORT command: {}", msg),
            TransferError::InvalidPortRange(port) => {
                write!(f, "Invalid port {}: must be 1024 or above", port)
            }
            TransferError::LimitExceeded(e) => write!(f, "{}", e),
            TransferError::TransferFailed(e) => write!(f, "Transfer failed: {}", e),
        }
    }
}

impl std::error::Error for TransferError {}

impl From<io::Error> for TransferError {
    fn from(error: io::Error) -> Self {
        TransferError::TransferFailed(error)
    }
}

impl From<QuotaError> for TransferError {
    fn from(error: QuotaError) -> Self {
        TransferError::LimitExceeded(error)
    }
}
