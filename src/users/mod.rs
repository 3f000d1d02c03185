//! Credential store
//!
//! Persistent mapping of username to account record, with the lifecycle
//! rules (verification, approval, bans, pauses) both front ends share.

pub mod account;
pub mod store;

pub use account::{Account, GIB, Role};
pub use store::UserStore;
