//! SQLite-backed store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::{
    AdminSession, AdminUser, ContactRequest, Document, DocumentPatch, NewAdminUser,
    NewContactRequest, NewDocument,
};
use super::store::{Store, StoreError, StoreResult};
use super::DbPool;

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.message().contains("UNIQUE constraint failed"),
        _ => false,
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_admin(&self, admin: NewAdminUser, now: DateTime<Utc>) -> StoreResult<AdminUser> {
        let result = sqlx::query_as::<_, AdminUser>(
            r#"
            INSERT INTO admin_users (username, password_hash, email, role, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, 1, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&admin.username)
        .bind(&admin.password_hash)
        .bind(&admin.email)
        .bind(&admin.role)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(e) if is_unique_violation(&e) => {
                Err(StoreError::Conflict(format!("admin '{}'", admin.username)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_admin_by_username(&self, username: &str) -> StoreResult<Option<AdminUser>> {
        let user = sqlx::query_as::<_, AdminUser>("SELECT * FROM admin_users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_admin_by_id(&self, id: i64) -> StoreResult<Option<AdminUser>> {
        let user = sqlx::query_as::<_, AdminUser>("SELECT * FROM admin_users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE admin_users SET last_login = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_session(&self, session: &AdminSession) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO admin_sessions (token_hash, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&session.token_hash)
        .bind(session.user_id)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> StoreResult<Option<AdminSession>> {
        let session =
            sqlx::query_as::<_, AdminSession>("SELECT * FROM admin_sessions WHERE token_hash = ?")
                .bind(token_hash)
                .fetch_optional(&self.pool)
                .await?;
        Ok(session)
    }

    async fn delete_session(&self, token_hash: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM admin_sessions WHERE token_hash = ?")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        // julianday() normalizes the differing fractional-second widths
        let result =
            sqlx::query("DELETE FROM admin_sessions WHERE julianday(expires_at) <= julianday(?)")
                .bind(now)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn list_documents(&self, active_only: bool) -> StoreResult<Vec<Document>> {
        let sql = if active_only {
            "SELECT * FROM eciple_documents WHERE is_active = 1 ORDER BY display_order ASC, id ASC"
        } else {
            "SELECT * FROM eciple_documents ORDER BY display_order ASC, id ASC"
        };
        let docs = sqlx::query_as::<_, Document>(sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(docs)
    }

    async fn find_document(&self, id: i64) -> StoreResult<Option<Document>> {
        let doc = sqlx::query_as::<_, Document>("SELECT * FROM eciple_documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(doc)
    }

    async fn create_document(&self, doc: NewDocument, now: DateTime<Utc>) -> StoreResult<Document> {
        let document = sqlx::query_as::<_, Document>(
            r#"
            INSERT INTO eciple_documents
                (title, filename, description, file_data, content_type, file_size,
                 display_order, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&doc.title)
        .bind(&doc.filename)
        .bind(&doc.description)
        .bind(&doc.file_data)
        .bind(&doc.content_type)
        .bind(doc.file_size)
        .bind(doc.display_order)
        .bind(doc.is_active)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(document)
    }

    async fn update_document(
        &self,
        id: i64,
        patch: DocumentPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Document>> {
        let Some(mut doc) = self.find_document(id).await? else {
            return Ok(None);
        };
        patch.apply(&mut doc, now);

        let updated = sqlx::query_as::<_, Document>(
            r#"
            UPDATE eciple_documents SET
                title = ?, filename = ?, description = ?, file_data = ?, content_type = ?,
                file_size = ?, display_order = ?, is_active = ?, updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&doc.title)
        .bind(&doc.filename)
        .bind(&doc.description)
        .bind(&doc.file_data)
        .bind(&doc.content_type)
        .bind(doc.file_size)
        .bind(doc.display_order)
        .bind(doc.is_active)
        .bind(doc.updated_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn delete_document(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM eciple_documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_contact_request(
        &self,
        request: NewContactRequest,
        now: DateTime<Utc>,
    ) -> StoreResult<ContactRequest> {
        let contact = sqlx::query_as::<_, ContactRequest>(
            r#"
            INSERT INTO contact_requests
                (first_name, last_name, email, church_name, phone, church_size, message, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.email)
        .bind(&request.church_name)
        .bind(&request.phone)
        .bind(&request.church_size)
        .bind(&request.message)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(contact)
    }

    async fn list_contact_requests(&self) -> StoreResult<Vec<ContactRequest>> {
        let requests = sqlx::query_as::<_, ContactRequest>(
            "SELECT * FROM contact_requests ORDER BY id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }
}
