pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod db;
pub mod engine;

pub use db::DbPool;

use config::Config;
use std::sync::Arc;

use crate::api::rate_limit::RateLimiter;
use crate::auth::AuthService;
use crate::db::Store;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub auth: AuthService,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn Store>) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let auth = AuthService::new(store.clone(), config.session_ttl());
        Self {
            config,
            store,
            auth,
            rate_limiter,
        }
    }
}
