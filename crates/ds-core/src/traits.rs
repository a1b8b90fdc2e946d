//! # Core Traits (Ports)
//!
//! The external collaborators the forum talks to. Any plugin must implement
//! these traits to be used by the binary.

use async_trait::async_trait;

use crate::models::{Account, Record, Session, Table};
use crate::query::ReadRequest;

/// Structured record store: read by id or query, create, update.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns the records matching the request, in the requested order.
    async fn read(&self, request: &ReadRequest) -> anyhow::Result<Vec<Record>>;

    /// Stores a new record and returns its id.
    async fn create(&self, table: Table, record: Record) -> anyhow::Result<String>;

    /// Replaces the stored record with the given id.
    async fn update(&self, table: Table, id: &str, record: Record) -> anyhow::Result<()>;
}

/// Account and session service.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AccountService: Send + Sync {
    async fn create_account(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> anyhow::Result<Account>;

    async fn read_account_by_id(&self, id: &str) -> anyhow::Result<Account>;

    async fn read_account_by_username(&self, username: &str) -> anyhow::Result<Account>;

    async fn login(&self, username: &str, password: &str) -> anyhow::Result<Session>;

    async fn logout(&self, session_id: &str) -> anyhow::Result<()>;

    /// Resolves a session id; fails for unknown or expired sessions.
    async fn read_session(&self, session_id: &str) -> anyhow::Result<Session>;
}

/// Source of moderator vote weights.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait VoteWeigher: Send + Sync {
    fn moderator_weight(&self) -> i64;
}
