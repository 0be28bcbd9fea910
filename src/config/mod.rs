use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Largest request body accepted by the document upload routes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Lifetime of an admin session, counted from login
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
    /// How often expired sessions are swept from the store
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
    /// Admin account created at startup when it does not exist yet
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub admin_email: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: default_session_ttl_hours(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
            admin_username: None,
            admin_password: None,
            admin_email: None,
        }
    }
}

fn default_session_ttl_hours() -> i64 {
    24
}

fn default_sweep_interval_seconds() -> u64 {
    3600
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    /// Login attempts allowed per client per window
    #[serde(default = "default_auth_requests")]
    pub auth_requests_per_window: u32,
    /// Contact form submissions allowed per client per window
    #[serde(default = "default_contact_requests")]
    pub contact_requests_per_window: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    /// Seconds between sweeps of stale limiter entries
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
    /// Key clients on X-Forwarded-For / X-Real-IP instead of the socket
    /// peer. Only enable behind a reverse proxy that overwrites them.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            auth_requests_per_window: default_auth_requests(),
            contact_requests_per_window: default_contact_requests(),
            window_seconds: default_window_seconds(),
            cleanup_interval: default_cleanup_interval(),
            trust_proxy_headers: false,
        }
    }
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_auth_requests() -> u32 {
    20
}

fn default_contact_requests() -> u32 {
    10
}

fn default_window_seconds() -> u64 {
    60
}

fn default_cleanup_interval() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).with_context(|| "Failed to parse configuration file")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.auth.session_ttl_hours <= 0 {
            anyhow::bail!("auth.session_ttl_hours must be positive");
        }
        if self.auth.sweep_interval_seconds == 0 {
            anyhow::bail!("auth.sweep_interval_seconds must be positive");
        }
        if self.rate_limit.window_seconds == 0 {
            anyhow::bail!("rate_limit.window_seconds must be positive");
        }
        if self.auth.admin_username.is_some() != self.auth.admin_password.is_some() {
            anyhow::bail!("auth.admin_username and auth.admin_password must be set together");
        }
        Ok(())
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.auth.session_ttl_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.auth.session_ttl_hours, 24);
        assert_eq!(config.auth.sweep_interval_seconds, 3600);
        assert!(config.rate_limit.enabled);
        assert_eq!(config.session_ttl(), chrono::Duration::hours(24));
    }

    #[test]
    fn test_parse_partial_file() {
        let config = Config::parse(
            r#"
            [server]
            port = 3000

            [storage]
            backend = "memory"

            [auth]
            admin_username = "admin"
            admin_password = "correct horse"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.auth.admin_username.as_deref(), Some("admin"));
        assert_eq!(config.auth.session_ttl_hours, 24);
    }

    #[test]
    fn test_rejects_half_configured_admin() {
        let result = Config::parse(
            r#"
            [auth]
            admin_username = "admin"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_zero_ttl() {
        assert!(Config::parse("[auth]\nsession_ttl_hours = 0").is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load(Path::new("/nonexistent/eciple.toml")).unwrap();
        assert_eq!(config.logging.level, "info");
    }
}
