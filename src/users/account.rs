//! Account record
//!
//! One entry of the credential store. Field names mirror the on-disk JSON;
//! only the password hash is ever stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const GIB: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub paused: bool,
    /// Quota ceiling in GiB; `None` means unlimited (owner only)
    #[serde(default)]
    pub limit_gb: Option<u64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub verification_code: Option<String>,
    #[serde(default)]
    pub verification_sent: Option<DateTime<Utc>>,
    #[serde(default)]
    pub banned_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ban_reason: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl Account {
    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }

    /// Quota ceiling in bytes; `None` means unlimited.
    pub fn quota_bytes(&self) -> Option<u64> {
        self.limit_gb.map(|gb| gb * GIB)
    }

    /// Returns the active ban, if any, at the given instant.
    pub fn ban_at(&self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, String)> {
        match self.banned_until {
            Some(until) if now < until => Some((
                until,
                self.ban_reason
                    .clone()
                    .unwrap_or_else(|| "No reason given.".to_string()),
            )),
            _ => None,
        }
    }
}

/// Formats remaining ban time the way clients display it, e.g. "1d 2h 3m 4s".
pub fn format_remaining(now: DateTime<Utc>, until: DateTime<Utc>) -> String {
    let secs_left = (until - now).num_seconds().max(0);
    let days = secs_left / 86400;
    let hours = (secs_left / 3600) % 24;
    let mins = (secs_left / 60) % 60;
    let secs = secs_left % 60;

    let mut out = String::new();
    if days > 0 {
        out.push_str(&format!("{}d ", days));
    }
    if hours > 0 {
        out.push_str(&format!("{}h ", hours));
    }
    if mins > 0 {
        out.push_str(&format!("{}m ", mins));
    }
    if secs > 0 {
        out.push_str(&format!("{}s", secs));
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn account(role: Role) -> Account {
        Account {
            username: "alice".to_string(),
            password_hash: String::new(),
            role,
            enabled: true,
            verified: true,
            approved: true,
            paused: false,
            limit_gb: Some(5),
            email: None,
            verification_code: None,
            verification_sent: None,
            banned_until: None,
            ban_reason: None,
        }
    }

    #[test]
    fn quota_bytes_scales_gib() {
        assert_eq!(account(Role::User).quota_bytes(), Some(5 * GIB));

        let mut owner = account(Role::Owner);
        owner.limit_gb = None;
        assert_eq!(owner.quota_bytes(), None);
    }

    #[test]
    fn ban_expires() {
        let now = Utc::now();
        let mut acct = account(Role::User);
        acct.banned_until = Some(now + Duration::hours(1));
        acct.ban_reason = Some("spam".to_string());

        let (until, reason) = acct.ban_at(now).unwrap();
        assert_eq!(reason, "spam");
        assert!(acct.ban_at(until + Duration::seconds(1)).is_none());
    }

    #[test]
    fn remaining_time_formatting() {
        let now = Utc::now();
        let until = now + Duration::days(1) + Duration::hours(2) + Duration::seconds(5);
        assert_eq!(format_remaining(now, until), "1d 2h 5s");
    }
}
