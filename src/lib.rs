//! ftpvault: a multi-tenant file storage daemon.
//!
//! One credential store and one storage tree, exposed through two front
//! ends: a JSON HTTP API and an FTP server. Every tenant is confined to its
//! own subtree and accounted against its quota on both.

pub mod auth;
pub mod config;
pub mod error;
pub mod ftp;
pub mod http;
pub mod storage;
pub mod users;
