//! Admin authentication: login, logout and session verification.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::crypto::{self, PasswordError};
use crate::db::{AdminProfile, AdminSession, NewAdminUser, Store, StoreError, DEFAULT_ADMIN_ROLE};

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown user, inactive user and wrong password all map here
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Missing, unknown, expired or orphaned session
    #[error("invalid or expired session")]
    InvalidSession,

    #[error("password verification failed")]
    Password(#[from] PasswordError),

    #[error("password worker failed")]
    Worker(#[from] tokio::task::JoinError),

    #[error("storage error")]
    Store(#[from] StoreError),
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub admin: AdminProfile,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, session_ttl: Duration) -> Self {
        Self { store, session_ttl }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<IssuedSession, AuthError> {
        self.login_at(username, password, Utc::now()).await
    }

    pub(crate) async fn login_at(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedSession, AuthError> {
        let Some(user) = self.store.find_admin_by_username(username).await? else {
            let password = password.to_string();
            tokio::task::spawn_blocking(move || crypto::dummy_verify(&password)).await?;
            return Err(AuthError::InvalidCredentials);
        };

        let matches = {
            let password = password.to_string();
            let hash = user.password_hash.clone();
            tokio::task::spawn_blocking(move || crypto::verify_password(&password, &hash))
                .await??
        };
        if !matches || !user.is_active {
            return Err(AuthError::InvalidCredentials);
        }

        let token = crypto::generate_token();
        let expires_at = now + self.session_ttl;
        self.store
            .create_session(&AdminSession {
                token_hash: crypto::hash_token(&token),
                user_id: user.id,
                expires_at,
                created_at: now,
            })
            .await?;
        self.store.record_login(user.id, now).await?;

        info!(admin_id = user.id, username = %user.username, "Admin logged in");

        let mut admin = AdminProfile::from(user);
        admin.last_login = Some(now);

        Ok(IssuedSession {
            token,
            admin,
            expires_at,
        })
    }

    /// Revoke a session. Unknown tokens are not an error.
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        let removed = self.store.delete_session(&crypto::hash_token(token)).await?;
        if removed {
            info!("Admin session revoked");
        }
        Ok(())
    }

    pub async fn verify(&self, token: &str) -> Result<AdminProfile, AuthError> {
        self.verify_at(token, Utc::now()).await
    }

    pub(crate) async fn verify_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<AdminProfile, AuthError> {
        let session = self
            .store
            .find_session(&crypto::hash_token(token))
            .await?
            .ok_or(AuthError::InvalidSession)?;

        // Expired rows may linger until the next sweep
        if !session.is_live(now) {
            return Err(AuthError::InvalidSession);
        }

        let Some(user) = self.store.find_admin_by_id(session.user_id).await? else {
            warn!(user_id = session.user_id, "Session references a missing admin");
            return Err(AuthError::InvalidSession);
        };
        if !user.is_active {
            return Err(AuthError::InvalidSession);
        }

        Ok(AdminProfile::from(user))
    }

    /// Create the admin account if no account with this username exists.
    /// Returns whether an account was created.
    pub async fn ensure_admin_user(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
    ) -> anyhow::Result<bool> {
        if self.store.find_admin_by_username(username).await?.is_some() {
            return Ok(false);
        }
        self.create_admin(username, password, email).await?;
        Ok(true)
    }

    pub async fn create_admin(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
    ) -> anyhow::Result<AdminProfile> {
        crate::api::validate_username(username).map_err(anyhow::Error::msg)?;
        if password.is_empty() {
            anyhow::bail!("Password is required");
        }

        let password = password.to_string();
        let password_hash =
            tokio::task::spawn_blocking(move || crypto::hash_password(&password)).await??;
        let user = self
            .store
            .create_admin(
                NewAdminUser {
                    username: username.to_string(),
                    password_hash,
                    email: email.map(str::to_string),
                    role: DEFAULT_ADMIN_ROLE.to_string(),
                },
                Utc::now(),
            )
            .await?;

        info!(admin_id = user.id, username = %user.username, "Created admin user");
        Ok(AdminProfile::from(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    async fn service() -> (AuthService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let auth = AuthService::new(store.clone(), Duration::hours(24));
        auth.create_admin("admin", "correct", Some("admin@eciple.test"))
            .await
            .unwrap();
        (auth, store)
    }

    #[tokio::test]
    async fn test_login_then_verify_until_expiry() {
        let (auth, _) = service().await;
        let now = Utc::now();

        let issued = auth.login_at("admin", "correct", now).await.unwrap();
        assert_eq!(issued.token.len(), 64);
        assert_eq!(issued.expires_at, now + Duration::hours(24));
        assert_eq!(issued.admin.username, "admin");
        assert_eq!(issued.admin.last_login, Some(now));

        let admin = auth
            .verify_at(&issued.token, now + Duration::hours(23))
            .await
            .unwrap();
        assert_eq!(admin.id, issued.admin.id);

        // Still physically present, but past expiry
        let expired = auth.verify_at(&issued.token, now + Duration::hours(24)).await;
        assert!(matches!(expired, Err(AuthError::InvalidSession)));
    }

    #[tokio::test]
    async fn test_bad_username_and_bad_password_look_the_same() {
        let (auth, _) = service().await;

        let unknown = auth.login("nobody", "correct").await.unwrap_err();
        let wrong = auth.login("admin", "wrong").await.unwrap_err();

        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_username_is_case_sensitive() {
        let (auth, _) = service().await;
        assert!(matches!(
            auth.login("Admin", "correct").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_logout_revokes_and_is_idempotent() {
        let (auth, _) = service().await;
        let issued = auth.login("admin", "correct").await.unwrap();

        auth.logout(&issued.token).await.unwrap();
        assert!(auth.verify(&issued.token).await.is_err());

        auth.logout(&issued.token).await.unwrap();
        auth.logout("never-issued").await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_logins_are_independent() {
        let (auth, store) = service().await;
        let (a, b) = tokio::join!(
            auth.login("admin", "correct"),
            auth.login("admin", "correct")
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.token, b.token);
        assert_eq!(store.session_count(), 2);

        auth.logout(&a.token).await.unwrap();
        assert!(auth.verify(&a.token).await.is_err());
        assert!(auth.verify(&b.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_orphaned_session_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let auth = AuthService::new(store.clone(), Duration::hours(24));
        let now = Utc::now();
        store
            .create_session(&AdminSession {
                token_hash: crypto::hash_token("orphan"),
                user_id: 42,
                expires_at: now + Duration::hours(1),
                created_at: now,
            })
            .await
            .unwrap();

        assert!(matches!(
            auth.verify("orphan").await,
            Err(AuthError::InvalidSession)
        ));
    }

    #[tokio::test]
    async fn test_malformed_stored_hash_is_internal() {
        let store = Arc::new(MemoryStore::new());
        let auth = AuthService::new(store.clone(), Duration::hours(24));
        store
            .create_admin(
                NewAdminUser {
                    username: "broken".to_string(),
                    password_hash: "garbage".to_string(),
                    email: None,
                    role: DEFAULT_ADMIN_ROLE.to_string(),
                },
                Utc::now(),
            )
            .await
            .unwrap();

        assert!(matches!(
            auth.login("broken", "whatever").await,
            Err(AuthError::Password(PasswordError::MalformedHash(_)))
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_password_checks_leave_the_runtime_free() {
        let (auth, _) = service().await;
        let ticks = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let ticker = {
            let ticks = ticks.clone();
            tokio::spawn(async move {
                loop {
                    ticks.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                }
            })
        };

        // Single-threaded runtime: the ticker only runs while login yields
        assert!(auth.login("admin", "wrong").await.is_err());
        assert!(auth.login("nobody", "wrong").await.is_err());
        assert!(ticks.load(std::sync::atomic::Ordering::SeqCst) > 0);
        ticker.abort();
    }

    #[tokio::test]
    async fn test_ensure_admin_user_only_creates_once() {
        let (auth, _) = service().await;
        assert!(!auth.ensure_admin_user("admin", "other", None).await.unwrap());
        assert!(auth.ensure_admin_user("second", "pw", None).await.unwrap());
        assert!(auth.login("admin", "correct").await.is_ok());
    }
}
