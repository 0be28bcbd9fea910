mod memory;
mod models;
mod sqlite;
mod store;

pub use memory::MemoryStore;
pub use models::*;
pub use sqlite::SqliteStore;
pub use store::{Store, StoreError, StoreResult};

use anyhow::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, StorageBackend};

pub type DbPool = SqlitePool;

/// Execute a SQL migration file, properly handling comments
async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in sql.split(';') {
        // Strip SQL comment lines (lines starting with --)
        let cleaned: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let trimmed = cleaned.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
        }
    }
    Ok(())
}

pub async fn init(data_dir: &Path) -> Result<DbPool> {
    let db_path = data_dir.join("eciple.db");
    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    info!("Initializing database at {}", db_path.display());

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    // Enable WAL mode for better concurrency
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

/// Private in-memory SQLite database. A single connection keeps every
/// query on the same database.
pub async fn init_in_memory() -> Result<DbPool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool> {
    let found: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
            .bind(table)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    // Migration 001: Admin users and sessions
    if !table_exists(pool, "admin_sessions").await? {
        execute_sql(pool, include_str!("../../migrations/001_admin.sql")).await?;
    }

    // Migration 002: Investor documents
    if !table_exists(pool, "eciple_documents").await? {
        execute_sql(pool, include_str!("../../migrations/002_documents.sql")).await?;
    }

    // Migration 003: Contact form submissions
    if !table_exists(pool, "contact_requests").await? {
        execute_sql(pool, include_str!("../../migrations/003_contact_requests.sql")).await?;
    }

    info!("Migrations completed");
    Ok(())
}

/// Open the store selected by `[storage] backend`
pub async fn open_store(config: &Config) -> Result<Arc<dyn Store>> {
    match config.storage.backend {
        StorageBackend::Sqlite => {
            std::fs::create_dir_all(&config.server.data_dir)?;
            let pool = init(&config.server.data_dir).await?;
            Ok(Arc::new(SqliteStore::new(pool)))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; all data is lost on shutdown");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tokio_test::assert_ok;

    async fn sqlite_store() -> SqliteStore {
        SqliteStore::new(init_in_memory().await.unwrap())
    }

    fn new_admin(username: &str) -> NewAdminUser {
        NewAdminUser {
            username: username.to_string(),
            password_hash: "$argon2id$stub".to_string(),
            email: None,
            role: DEFAULT_ADMIN_ROLE.to_string(),
        }
    }

    fn new_document(title: &str, order: i64, active: bool) -> NewDocument {
        NewDocument {
            title: title.to_string(),
            filename: format!("{}.pdf", title.to_lowercase()),
            description: None,
            file_data: None,
            content_type: None,
            file_size: None,
            display_order: order,
            is_active: active,
        }
    }

    async fn exercise_admins(store: &dyn Store) {
        let now = Utc::now();
        let admin = store.create_admin(new_admin("admin"), now).await.unwrap();
        assert!(admin.is_active);
        assert_eq!(admin.role, "admin");
        assert!(admin.last_login.is_none());

        let dup = store.create_admin(new_admin("admin"), now).await;
        assert!(matches!(dup, Err(StoreError::Conflict(_))));

        // Case-sensitive exact match
        assert!(store.find_admin_by_username("Admin").await.unwrap().is_none());

        let login_at = now + Duration::seconds(5);
        assert_ok!(store.record_login(admin.id, login_at).await);
        let reloaded = store.find_admin_by_id(admin.id).await.unwrap().unwrap();
        assert_eq!(reloaded.last_login, Some(login_at));
    }

    async fn exercise_sessions(store: &dyn Store) {
        let now = Utc::now();
        let admin = store.create_admin(new_admin("sweeper"), now).await.unwrap();

        let live = AdminSession {
            token_hash: "live".to_string(),
            user_id: admin.id,
            expires_at: now + Duration::hours(24),
            created_at: now,
        };
        let stale = AdminSession {
            token_hash: "stale".to_string(),
            user_id: admin.id,
            expires_at: now - Duration::minutes(1),
            created_at: now - Duration::hours(25),
        };
        assert_ok!(store.create_session(&live).await);
        assert_ok!(store.create_session(&stale).await);

        assert_eq!(store.find_session("live").await.unwrap(), Some(live.clone()));
        assert_eq!(store.delete_expired_sessions(now).await.unwrap(), 1);
        assert!(store.find_session("stale").await.unwrap().is_none());

        assert!(store.delete_session("live").await.unwrap());
        assert!(!store.delete_session("live").await.unwrap());
    }

    async fn exercise_documents(store: &dyn Store) {
        let now = Utc::now();
        let b = store.create_document(new_document("B", 2, true), now).await.unwrap();
        let a = store.create_document(new_document("A", 1, true), now).await.unwrap();
        let hidden = store.create_document(new_document("H", 0, false), now).await.unwrap();

        let all: Vec<i64> = store.list_documents(false).await.unwrap().iter().map(|d| d.id).collect();
        assert_eq!(all, vec![hidden.id, a.id, b.id]);

        let public: Vec<i64> = store.list_documents(true).await.unwrap().iter().map(|d| d.id).collect();
        assert_eq!(public, vec![a.id, b.id]);

        let later = now + Duration::seconds(10);
        let patch = DocumentPatch {
            title: Some("A2".to_string()),
            ..Default::default()
        };
        let updated = store.update_document(a.id, patch, later).await.unwrap().unwrap();
        assert_eq!(updated.title, "A2");
        assert_eq!(updated.filename, a.filename);
        assert_eq!(updated.updated_at, later);
        assert_eq!(updated.created_at, a.created_at);

        let missing = store
            .update_document(9999, DocumentPatch::default(), later)
            .await
            .unwrap();
        assert!(missing.is_none());

        assert!(store.delete_document(b.id).await.unwrap());
        assert!(!store.delete_document(b.id).await.unwrap());
        assert!(store.find_document(b.id).await.unwrap().is_none());
    }

    async fn exercise_contacts(store: &dyn Store) {
        let now = Utc::now();
        for name in ["First", "Second"] {
            store
                .create_contact_request(
                    NewContactRequest {
                        first_name: name.to_string(),
                        last_name: "Doe".to_string(),
                        email: "doe@example.org".to_string(),
                        church_name: "Grace".to_string(),
                        phone: None,
                        church_size: Some("100-250".to_string()),
                        message: None,
                    },
                    now,
                )
                .await
                .unwrap();
        }
        let listed = store.list_contact_requests().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].first_name, "Second");
        assert_eq!(listed[1].church_size.as_deref(), Some("100-250"));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        exercise_admins(&store).await;
        exercise_sessions(&store).await;
        exercise_documents(&store).await;
        exercise_contacts(&store).await;
    }

    #[tokio::test]
    async fn test_sqlite_store() {
        let store = sqlite_store().await;
        exercise_admins(&store).await;
        exercise_sessions(&store).await;
        exercise_documents(&store).await;
        exercise_contacts(&store).await;
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = init_in_memory().await.unwrap();
        assert_ok!(run_migrations(&pool).await);
    }
}
