//! Session tokens
//!
//! Stateless signed tokens carrying identity and role, shared by the HTTP
//! and FTP front ends.

pub mod token;

pub use token::{Claims, TOKEN_TTL_HOURS, issue_token, verify_token};
