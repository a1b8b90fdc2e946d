//! # ds-auth-local
//!
//! Argon2-based, in-process implementation of `AccountService`.
//! Handles account creation, password login and session lookup for local runs.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use anyhow::{anyhow, bail};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ds_core::{Account, AccountService, Session};
use uuid::Uuid;

/// Sessions last a week unless configured otherwise.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone)]
struct StoredAccount {
    account: Account,
    password_hash: String,
}

pub struct LocalAccounts {
    /// Keyed by username so creation can claim a name atomically
    accounts: DashMap<String, StoredAccount>,
    sessions: DashMap<String, Session>,
    session_ttl: i64,
}

impl Default for LocalAccounts {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalAccounts {
    pub fn new() -> Self {
        Self::with_session_ttl(DEFAULT_SESSION_TTL_SECS)
    }

    pub fn with_session_ttl(secs: i64) -> Self {
        Self {
            accounts: DashMap::new(),
            sessions: DashMap::new(),
            session_ttl: secs,
        }
    }
}

fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("failed to hash password: {e}"))
}

/// Verifies if a provided password matches a stored Argon2 hash.
fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(p) => p,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

#[async_trait]
impl AccountService for LocalAccounts {
    async fn create_account(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> anyhow::Result<Account> {
        if username.is_empty() {
            bail!("username is required");
        }
        if password.len() < MIN_PASSWORD_LEN {
            bail!("password must be at least {MIN_PASSWORD_LEN} characters");
        }
        let password_hash = hash_password(password)?;

        match self.accounts.entry(username.to_string()) {
            Entry::Occupied(_) => bail!("username {username} already exists"),
            Entry::Vacant(slot) => {
                let now = Utc::now().timestamp();
                let account = Account {
                    id: Uuid::new_v4().to_string(),
                    username: username.to_string(),
                    email: email.to_string(),
                    created: now,
                    updated: now,
                    ..Account::default()
                };
                slot.insert(StoredAccount {
                    account: account.clone(),
                    password_hash,
                });
                log::info!("registered local account {username}");
                Ok(account)
            }
        }
    }

    async fn read_account_by_id(&self, id: &str) -> anyhow::Result<Account> {
        self.accounts
            .iter()
            .find(|entry| entry.account.id == id)
            .map(|entry| entry.account.clone())
            .ok_or_else(|| anyhow!("account not found"))
    }

    async fn read_account_by_username(&self, username: &str) -> anyhow::Result<Account> {
        self.accounts
            .get(username)
            .map(|entry| entry.account.clone())
            .ok_or_else(|| anyhow!("account not found"))
    }

    async fn login(&self, username: &str, password: &str) -> anyhow::Result<Session> {
        let stored = self
            .accounts
            .get(username)
            .map(|entry| entry.value().clone())
            .filter(|stored| verify_password(password, &stored.password_hash))
            .ok_or_else(|| anyhow!("invalid username or password"))?;

        let now = Utc::now().timestamp();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: stored.account.id,
            created: now,
            expires: now + self.session_ttl,
        };
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn logout(&self, session_id: &str) -> anyhow::Result<()> {
        self.sessions.remove(session_id);
        Ok(())
    }

    async fn read_session(&self, session_id: &str) -> anyhow::Result<Session> {
        let session = self
            .sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| anyhow!("session not found"))?;
        if session.expires <= Utc::now().timestamp() {
            self.sessions.remove(session_id);
            bail!("session expired");
        }
        Ok(session)
    }
}
