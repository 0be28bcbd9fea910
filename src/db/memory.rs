//! In-memory store for tests and throwaway instances.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use super::models::{
    AdminSession, AdminUser, ContactRequest, Document, DocumentPatch, NewAdminUser,
    NewContactRequest, NewDocument,
};
use super::store::{Store, StoreError, StoreResult};

#[derive(Debug, Default)]
pub struct MemoryStore {
    admins: RwLock<BTreeMap<i64, AdminUser>>,
    sessions: DashMap<String, AdminSession>,
    documents: RwLock<BTreeMap<i64, Document>>,
    contact_requests: RwLock<BTreeMap<i64, ContactRequest>>,
    next_admin_id: AtomicI64,
    next_document_id: AtomicI64,
    next_contact_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

fn next_id(counter: &AtomicI64) -> i64 {
    counter.fetch_add(1, Ordering::Relaxed) + 1
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_admin(&self, admin: NewAdminUser, now: DateTime<Utc>) -> StoreResult<AdminUser> {
        let mut admins = self.admins.write();
        if admins.values().any(|a| a.username == admin.username) {
            return Err(StoreError::Conflict(format!("admin '{}'", admin.username)));
        }
        let user = AdminUser {
            id: next_id(&self.next_admin_id),
            username: admin.username,
            password_hash: admin.password_hash,
            email: admin.email,
            role: admin.role,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login: None,
        };
        admins.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_admin_by_username(&self, username: &str) -> StoreResult<Option<AdminUser>> {
        Ok(self
            .admins
            .read()
            .values()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn find_admin_by_id(&self, id: i64) -> StoreResult<Option<AdminUser>> {
        Ok(self.admins.read().get(&id).cloned())
    }

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(admin) = self.admins.write().get_mut(&id) {
            admin.last_login = Some(at);
        }
        Ok(())
    }

    async fn create_session(&self, session: &AdminSession) -> StoreResult<()> {
        self.sessions
            .insert(session.token_hash.clone(), session.clone());
        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> StoreResult<Option<AdminSession>> {
        Ok(self.sessions.get(token_hash).map(|s| s.value().clone()))
    }

    async fn delete_session(&self, token_hash: &str) -> StoreResult<bool> {
        Ok(self.sessions.remove(token_hash).is_some())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.is_live(now));
        Ok(before.saturating_sub(self.sessions.len()) as u64)
    }

    async fn list_documents(&self, active_only: bool) -> StoreResult<Vec<Document>> {
        let mut docs: Vec<Document> = self
            .documents
            .read()
            .values()
            .filter(|d| !active_only || d.is_active)
            .cloned()
            .collect();
        docs.sort_by_key(|d| (d.display_order, d.id));
        Ok(docs)
    }

    async fn find_document(&self, id: i64) -> StoreResult<Option<Document>> {
        Ok(self.documents.read().get(&id).cloned())
    }

    async fn create_document(&self, doc: NewDocument, now: DateTime<Utc>) -> StoreResult<Document> {
        let document = Document {
            id: next_id(&self.next_document_id),
            title: doc.title,
            filename: doc.filename,
            description: doc.description,
            file_data: doc.file_data,
            content_type: doc.content_type,
            file_size: doc.file_size,
            display_order: doc.display_order,
            is_active: doc.is_active,
            created_at: now,
            updated_at: now,
        };
        self.documents.write().insert(document.id, document.clone());
        Ok(document)
    }

    async fn update_document(
        &self,
        id: i64,
        patch: DocumentPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Document>> {
        let mut documents = self.documents.write();
        Ok(documents.get_mut(&id).map(|doc| {
            patch.apply(doc, now);
            doc.clone()
        }))
    }

    async fn delete_document(&self, id: i64) -> StoreResult<bool> {
        Ok(self.documents.write().remove(&id).is_some())
    }

    async fn create_contact_request(
        &self,
        request: NewContactRequest,
        now: DateTime<Utc>,
    ) -> StoreResult<ContactRequest> {
        let contact = ContactRequest {
            id: next_id(&self.next_contact_id),
            first_name: request.first_name,
            last_name: request.last_name,
            email: request.email,
            church_name: request.church_name,
            phone: request.phone,
            church_size: request.church_size,
            message: request.message,
            created_at: now,
        };
        self.contact_requests
            .write()
            .insert(contact.id, contact.clone());
        Ok(contact)
    }

    async fn list_contact_requests(&self) -> StoreResult<Vec<ContactRequest>> {
        Ok(self
            .contact_requests
            .read()
            .values()
            .rev()
            .cloned()
            .collect())
    }
}
