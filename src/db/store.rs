//! Storage interface shared by the SQLite and in-memory backends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::models::{
    AdminSession, AdminUser, ContactRequest, Document, DocumentPatch, NewAdminUser,
    NewContactRequest, NewDocument,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("{0} already exists")]
    Conflict(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Owner of every persisted collection. Single-record writes are atomic;
/// concurrent updates to the same record are last-write-wins.
#[async_trait]
pub trait Store: Send + Sync {
    // Admin users
    async fn create_admin(&self, admin: NewAdminUser, now: DateTime<Utc>) -> StoreResult<AdminUser>;
    async fn find_admin_by_username(&self, username: &str) -> StoreResult<Option<AdminUser>>;
    async fn find_admin_by_id(&self, id: i64) -> StoreResult<Option<AdminUser>>;
    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()>;

    // Sessions
    async fn create_session(&self, session: &AdminSession) -> StoreResult<()>;
    async fn find_session(&self, token_hash: &str) -> StoreResult<Option<AdminSession>>;
    /// Returns whether a session was removed
    async fn delete_session(&self, token_hash: &str) -> StoreResult<bool>;
    /// Removes every session with `expires_at <= now`, returning the count
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64>;

    // Documents, ordered by display_order then id
    async fn list_documents(&self, active_only: bool) -> StoreResult<Vec<Document>>;
    async fn find_document(&self, id: i64) -> StoreResult<Option<Document>>;
    async fn create_document(&self, doc: NewDocument, now: DateTime<Utc>) -> StoreResult<Document>;
    async fn update_document(
        &self,
        id: i64,
        patch: DocumentPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Document>>;
    async fn delete_document(&self, id: i64) -> StoreResult<bool>;

    // Contact requests, newest first
    async fn create_contact_request(
        &self,
        request: NewContactRequest,
        now: DateTime<Utc>,
    ) -> StoreResult<ContactRequest>;
    async fn list_contact_requests(&self) -> StoreResult<Vec<ContactRequest>>;
}
