//! Credential store backed by a single JSON file.
//!
//! All mutations are read-modify-write under one lock and flushed with a
//! temp-file-then-rename so concurrent admin actions cannot lose updates
//! and a crash never leaves a half-written store behind.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use rand::Rng;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{AuthError, StoreError};
use crate::users::account::{Account, Role};

/// Unverified accounts are deleted once their code is this old.
pub const VERIFICATION_WINDOW_HOURS: i64 = 72;

pub struct UserStore {
    path: PathBuf,
    storage_root: PathBuf,
    max_users: usize,
    users: Mutex<HashMap<String, Account>>,
}

impl UserStore {
    /// Opens the store file, creating an empty store when it does not exist.
    pub fn open(path: &Path, storage_root: &Path, max_users: usize) -> Result<Self, StoreError> {
        let users = if path.exists() {
            let raw = fs::read_to_string(path)?;
            serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt(e.to_string()))?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            storage_root: storage_root.to_path_buf(),
            max_users,
            users: Mutex::new(users),
        })
    }

    fn persist(&self, users: &HashMap<String, Account>) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(users)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Case-insensitive lookup returning the canonical key.
    fn canonical_key(users: &HashMap<String, Account>, username: &str) -> Option<String> {
        users
            .keys()
            .find(|k| k.eq_ignore_ascii_case(username))
            .cloned()
    }

    /// Creates the single owner account at first startup if absent.
    pub fn ensure_owner(&self, username: &str, password: &str) -> Result<(), StoreError> {
        let mut users = self.users.lock().unwrap();
        if Self::canonical_key(&users, username).is_some() {
            return Ok(());
        }

        let account = Account {
            username: username.to_string(),
            password_hash: hash_password(password)?,
            role: Role::Owner,
            enabled: true,
            verified: true,
            approved: true,
            paused: false,
            limit_gb: None,
            email: None,
            verification_code: None,
            verification_sent: None,
            banned_until: None,
            ban_reason: None,
        };
        users.insert(username.to_string(), account);
        self.persist(&users)?;
        info!("Created owner account '{}'", username);
        Ok(())
    }

    /// Registers a new pending account and returns its verification code.
    pub fn create_account(
        &self,
        username: &str,
        password: &str,
        email: &str,
        default_limit_gb: u64,
    ) -> Result<String, StoreError> {
        let username = username.trim();
        if username.is_empty()
            || !username
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(StoreError::UsernameInvalid(username.to_string()));
        }
        if !is_valid_email(email) {
            return Err(StoreError::InvalidEmail(email.to_string()));
        }

        let mut users = self.users.lock().unwrap();
        if Self::canonical_key(&users, username).is_some() {
            return Err(StoreError::UsernameTaken(username.to_string()));
        }
        if users.len() >= self.max_users {
            return Err(StoreError::CapacityReached(self.max_users));
        }

        let code = generate_code();
        let account = Account {
            username: username.to_string(),
            password_hash: hash_password(password)?,
            role: Role::User,
            enabled: true,
            verified: false,
            approved: false,
            paused: false,
            limit_gb: Some(default_limit_gb),
            email: Some(email.to_string()),
            verification_code: Some(code.clone()),
            verification_sent: Some(Utc::now()),
            banned_until: None,
            ban_reason: None,
        };
        users.insert(username.to_string(), account);
        self.persist(&users)?;

        fs::create_dir_all(self.storage_root.join(username))?;
        info!("Registered account '{}' (pending verification)", username);
        Ok(code)
    }

    /// Confirms a verification code. An expired code deletes the account
    /// outright, storage directory included.
    pub fn verify_account(&self, username: &str, code: &str) -> Result<(), StoreError> {
        let mut users = self.users.lock().unwrap();
        let key = Self::canonical_key(&users, username)
            .ok_or_else(|| StoreError::UserNotFound(username.to_string()))?;

        let account = users.get(&key).expect("key came from the map");
        if account.verified {
            return Err(StoreError::AlreadyVerified(key));
        }

        let (stored_code, sent) = match (&account.verification_code, account.verification_sent) {
            (Some(c), Some(s)) => (c.clone(), s),
            _ => return Err(StoreError::InvalidCode(key)),
        };

        if Utc::now() - sent > Duration::hours(VERIFICATION_WINDOW_HOURS) {
            users.remove(&key);
            self.persist(&users)?;
            self.remove_tenant_dir(&key);
            return Err(StoreError::CodeExpired(key));
        }

        if stored_code != code {
            return Err(StoreError::InvalidCode(key));
        }

        let account = users.get_mut(&key).expect("key came from the map");
        account.verified = true;
        account.approved = false;
        account.verification_code = None;
        account.verification_sent = None;
        self.persist(&users)?;
        info!("Account '{}' verified, awaiting approval", key);
        Ok(())
    }

    /// Issues a fresh verification code for an unverified account.
    pub fn reissue_code(&self, username: &str) -> Result<String, StoreError> {
        let mut users = self.users.lock().unwrap();
        let key = Self::canonical_key(&users, username)
            .ok_or_else(|| StoreError::UserNotFound(username.to_string()))?;

        let account = users.get_mut(&key).expect("key came from the map");
        if account.verified {
            return Err(StoreError::AlreadyVerified(key));
        }
        let code = generate_code();
        account.verification_code = Some(code.clone());
        account.verification_sent = Some(Utc::now());
        self.persist(&users)?;
        Ok(code)
    }

    /// Verifies credentials and lifecycle gates. Paused accounts pass; the
    /// flag travels with the returned record and write paths refuse it.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Account, AuthError> {
        let account = {
            let users = self.users.lock().unwrap();
            Self::canonical_key(&users, username.trim())
                .and_then(|key| users.get(&key).cloned())
        };

        // Same rejection for unknown user and wrong password.
        let account = account.ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(password, &account.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        if let Some((until, reason)) = account.ban_at(Utc::now()) {
            return Err(AuthError::Banned { reason, until });
        }

        if !account.is_owner() {
            if !account.verified {
                return Err(AuthError::NotVerified);
            }
            if !account.approved {
                return Err(AuthError::NotApproved);
            }
            if !account.enabled {
                return Err(AuthError::Disabled);
            }
        }

        Ok(account)
    }

    pub fn get(&self, username: &str) -> Option<Account> {
        let users = self.users.lock().unwrap();
        Self::canonical_key(&users, username).and_then(|key| users.get(&key).cloned())
    }

    pub fn list(&self) -> Vec<Account> {
        let users = self.users.lock().unwrap();
        let mut accounts: Vec<Account> = users.values().cloned().collect();
        accounts.sort_by(|a, b| a.username.cmp(&b.username));
        accounts
    }

    pub fn count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    fn update<F>(&self, username: &str, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Account),
    {
        let mut users = self.users.lock().unwrap();
        let key = Self::canonical_key(&users, username)
            .ok_or_else(|| StoreError::UserNotFound(username.to_string()))?;
        apply(users.get_mut(&key).expect("key came from the map"));
        self.persist(&users)
    }

    pub fn set_password(&self, username: &str, password: &str) -> Result<(), StoreError> {
        let hash = hash_password(password)?;
        self.update(username, |account| account.password_hash = hash)
    }

    pub fn set_enabled(&self, username: &str, enabled: bool) -> Result<(), StoreError> {
        self.guard_owner(username)?;
        self.update(username, |account| account.enabled = enabled)
    }

    pub fn set_limit(&self, username: &str, limit_gb: u64) -> Result<(), StoreError> {
        self.update(username, |account| account.limit_gb = Some(limit_gb))
    }

    /// `until = None` clears the ban; clearing twice is a no-op.
    pub fn set_ban(
        &self,
        username: &str,
        until: Option<DateTime<Utc>>,
        reason: Option<String>,
    ) -> Result<(), StoreError> {
        self.update(username, |account| match until {
            Some(until) => {
                account.banned_until = Some(until);
                account.ban_reason = reason;
            }
            None => {
                account.banned_until = None;
                account.ban_reason = None;
            }
        })
    }

    pub fn set_verified(&self, username: &str, verified: bool) -> Result<(), StoreError> {
        self.update(username, |account| {
            account.verified = verified;
            if verified {
                account.verification_code = None;
                account.verification_sent = None;
            }
        })
    }

    pub fn set_approved(&self, username: &str, approved: bool) -> Result<(), StoreError> {
        self.update(username, |account| account.approved = approved)
    }

    pub fn set_paused(&self, username: &str, paused: bool) -> Result<(), StoreError> {
        self.update(username, |account| account.paused = paused)
    }

    /// Removes the account record and its entire storage subtree.
    pub fn delete_account(&self, username: &str) -> Result<(), StoreError> {
        self.guard_owner(username)?;
        let mut users = self.users.lock().unwrap();
        let key = Self::canonical_key(&users, username)
            .ok_or_else(|| StoreError::UserNotFound(username.to_string()))?;
        users.remove(&key);
        self.persist(&users)?;
        drop(users);
        self.remove_tenant_dir(&key);
        info!("Deleted account '{}'", key);
        Ok(())
    }

    /// Deletes unverified accounts whose verification window has lapsed.
    /// Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let cutoff = Utc::now() - Duration::hours(VERIFICATION_WINDOW_HOURS);
        let removed: Vec<String> = {
            let mut users = self.users.lock().unwrap();
            let expired: Vec<String> = users
                .iter()
                .filter(|(_, a)| {
                    !a.verified && a.verification_sent.map(|s| s < cutoff).unwrap_or(false)
                })
                .map(|(k, _)| k.clone())
                .collect();
            if expired.is_empty() {
                return 0;
            }
            for key in &expired {
                users.remove(key);
            }
            if let Err(e) = self.persist(&users) {
                warn!("Failed to persist store after sweep: {}", e);
            }
            expired
        };

        for key in &removed {
            self.remove_tenant_dir(key);
            info!("Swept unverified account '{}'", key);
        }
        removed.len()
    }

    fn guard_owner(&self, username: &str) -> Result<(), StoreError> {
        if let Some(account) = self.get(username) {
            if account.is_owner() {
                return Err(StoreError::OwnerImmutable);
            }
        }
        Ok(())
    }

    fn remove_tenant_dir(&self, username: &str) {
        let dir = self.storage_root.join(username);
        if dir.exists() {
            if let Err(e) = fs::remove_dir_all(&dir) {
                warn!("Failed to remove storage for '{}': {}", username, e);
            }
        }
    }
}

pub fn hash_password(password: &str) -> Result<String, StoreError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StoreError::HashingFailed(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !local.contains(char::is_whitespace)
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains(char::is_whitespace)
}

fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> UserStore {
        UserStore::open(&dir.path().join("users.json"), dir.path(), 3).unwrap()
    }

    #[test]
    fn register_verify_approve_login() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);

        let code = s.create_account("alice", "pw123", "a@x.com", 5).unwrap();
        assert!(dir.path().join("alice").is_dir());

        // Unverified accounts cannot log in.
        assert!(matches!(
            s.authenticate("alice", "pw123"),
            Err(AuthError::NotVerified)
        ));

        s.verify_account("alice", &code).unwrap();
        assert!(matches!(
            s.authenticate("alice", "pw123"),
            Err(AuthError::NotApproved)
        ));

        s.set_approved("alice", true).unwrap();
        let account = s.authenticate("alice", "pw123").unwrap();
        assert_eq!(account.limit_gb, Some(5));
        assert!(matches!(
            s.authenticate("alice", "wrong"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn rejects_bad_usernames_and_emails() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);

        assert!(matches!(
            s.create_account("Alice", "pw", "a@x.com", 5),
            Err(StoreError::UsernameInvalid(_))
        ));
        assert!(matches!(
            s.create_account("al ice", "pw", "a@x.com", 5),
            Err(StoreError::UsernameInvalid(_))
        ));
        assert!(matches!(
            s.create_account("alice", "pw", "not-an-email", 5),
            Err(StoreError::InvalidEmail(_))
        ));
    }

    #[test]
    fn duplicate_and_capacity() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);

        s.create_account("a1", "pw", "a@x.com", 5).unwrap();
        assert!(matches!(
            s.create_account("a1", "pw", "a@x.com", 5),
            Err(StoreError::UsernameTaken(_))
        ));

        s.create_account("a2", "pw", "a@x.com", 5).unwrap();
        s.create_account("a3", "pw", "a@x.com", 5).unwrap();
        assert!(matches!(
            s.create_account("a4", "pw", "a@x.com", 5),
            Err(StoreError::CapacityReached(3))
        ));
    }

    #[test]
    fn verification_code_must_match() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);

        s.create_account("bob", "pw", "b@x.com", 5).unwrap();
        assert!(matches!(
            s.verify_account("bob", "000000"),
            Err(StoreError::InvalidCode(_))
        ));
    }

    #[test]
    fn expired_code_deletes_account() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);

        let code = s.create_account("bob", "pw", "b@x.com", 5).unwrap();
        {
            let mut users = s.users.lock().unwrap();
            users.get_mut("bob").unwrap().verification_sent =
                Some(Utc::now() - Duration::hours(VERIFICATION_WINDOW_HOURS + 1));
        }

        assert!(matches!(
            s.verify_account("bob", &code),
            Err(StoreError::CodeExpired(_))
        ));
        assert!(s.get("bob").is_none());
        assert!(!dir.path().join("bob").exists());
    }

    #[test]
    fn sweep_removes_stale_unverified_accounts() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);

        s.create_account("bob", "pw", "b@x.com", 5).unwrap();
        s.create_account("carol", "pw", "c@x.com", 5).unwrap();
        {
            let mut users = s.users.lock().unwrap();
            users.get_mut("bob").unwrap().verification_sent =
                Some(Utc::now() - Duration::hours(VERIFICATION_WINDOW_HOURS + 1));
        }

        assert_eq!(s.sweep_expired(), 1);
        assert!(s.get("bob").is_none());
        assert!(s.get("carol").is_some());
        assert!(matches!(
            s.authenticate("bob", "pw"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn ban_gates_login_and_clearing_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);

        let code = s.create_account("carol", "pw", "c@x.com", 5).unwrap();
        s.verify_account("carol", &code).unwrap();
        s.set_approved("carol", true).unwrap();

        let until = Utc::now() + Duration::hours(1);
        s.set_ban("carol", Some(until), Some("spam".to_string()))
            .unwrap();
        match s.authenticate("carol", "pw") {
            Err(AuthError::Banned { reason, .. }) => assert_eq!(reason, "spam"),
            other => panic!("expected ban, got {:?}", other.map(|a| a.username)),
        }

        s.set_ban("carol", None, None).unwrap();
        s.set_ban("carol", None, None).unwrap();
        let account = s.authenticate("carol", "pw").unwrap();
        assert!(account.banned_until.is_none());
        assert!(account.ban_reason.is_none());
    }

    #[test]
    fn owner_skips_lifecycle_gates_but_cannot_be_deleted() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);

        s.ensure_owner("owner", "ownerpw").unwrap();
        // Second call is a no-op.
        s.ensure_owner("owner", "otherpw").unwrap();

        let account = s.authenticate("owner", "ownerpw").unwrap();
        assert!(account.is_owner());
        assert_eq!(account.quota_bytes(), None);

        assert!(matches!(
            s.delete_account("owner"),
            Err(StoreError::OwnerImmutable)
        ));
        assert!(matches!(
            s.set_enabled("owner", false),
            Err(StoreError::OwnerImmutable)
        ));
    }

    #[test]
    fn lookups_are_case_insensitive_but_keys_canonical() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);

        s.ensure_owner("Owner", "pw").unwrap();
        let account = s.authenticate("oWnEr", "pw").unwrap();
        assert_eq!(account.username, "Owner");
    }

    #[test]
    fn store_survives_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.json");
        {
            let s = UserStore::open(&path, dir.path(), 10).unwrap();
            s.create_account("dave", "pw", "d@x.com", 7).unwrap();
        }
        let s = UserStore::open(&path, dir.path(), 10).unwrap();
        let account = s.get("dave").unwrap();
        assert_eq!(account.limit_gb, Some(7));
        assert!(!account.verified);
    }

    #[test]
    fn delete_account_removes_tree() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);

        s.create_account("erin", "pw", "e@x.com", 5).unwrap();
        fs::write(dir.path().join("erin").join("f.txt"), b"data").unwrap();
        s.delete_account("erin").unwrap();
        assert!(s.get("erin").is_none());
        assert!(!dir.path().join("erin").exists());
    }
}
