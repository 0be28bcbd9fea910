//! Command-line interface.
//!
//! With no subcommand the binary starts the server. Subcommands:
//! - `create-admin` - Add an admin account to the configured store
//! - `config check` - Validate configuration file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::auth::AuthService;
use crate::config::{Config, StorageBackend};

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "eciple")]
#[command(author, version, about = "eciple site backend: admin auth, investor documents and contact intake", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "ECIPLE_CONFIG", default_value = "eciple.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an admin account
    CreateAdmin {
        #[arg(short, long)]
        username: String,
        /// Password (can also be set via ECIPLE_ADMIN_PASSWORD env var)
        #[arg(short, long, env = "ECIPLE_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

/// Run a CLI command
pub async fn run_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Some(Commands::CreateAdmin {
            username,
            password,
            email,
        }) => cmd_create_admin(cli, username, password, email.as_deref()).await,
        Some(Commands::Config(ConfigCommands::Check)) => cmd_config_check(cli),
        None => {
            // No subcommand means start the server - this is handled in main.rs
            Ok(())
        }
    }
}

async fn cmd_create_admin(
    cli: &Cli,
    username: &str,
    password: &str,
    email: Option<&str>,
) -> Result<()> {
    let config = Config::load(&cli.config)?;
    if config.storage.backend == StorageBackend::Memory {
        anyhow::bail!("create-admin needs a persistent store; set [storage] backend = \"sqlite\"");
    }

    let store = crate::db::open_store(&config).await?;
    let auth = AuthService::new(store, config.session_ttl());
    let admin = auth
        .create_admin(username, password, email)
        .await
        .with_context(|| format!("Failed to create admin '{}'", username))?;

    println!("[OK] Created admin '{}' (id {})", admin.username, admin.id);
    Ok(())
}

fn cmd_config_check(cli: &Cli) -> Result<()> {
    let config_path = &cli.config;

    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!(
            "[!!] Configuration file not found: {}",
            config_path.display()
        );
        println!();
        println!("A default configuration will be used when starting the server.");
        return Ok(());
    }

    match Config::load(config_path) {
        Ok(config) => {
            println!("[OK] Configuration file is valid!");
            println!();
            println!("=== Configuration Summary ===");
            println!();
            println!("Server:");
            println!("  Host:         {}", config.server.host);
            println!("  Port:         {}", config.server.port);
            println!("  Data Dir:     {}", config.server.data_dir.display());
            println!("  Max Upload:   {} bytes", config.server.max_upload_bytes);
            println!();
            println!("Storage:");
            println!("  Backend:      {:?}", config.storage.backend);
            println!();
            println!("Auth:");
            println!("  Session TTL:  {}h", config.auth.session_ttl_hours);
            println!("  Sweep Every:  {}s", config.auth.sweep_interval_seconds);
            println!(
                "  Bootstrap:    {}",
                config
                    .auth
                    .admin_username
                    .as_deref()
                    .unwrap_or("(none)")
            );
            println!();
            println!("Security:");
            println!(
                "  Rate Limiting: {}",
                if config.rate_limit.enabled {
                    format!(
                        "Enabled (login {}/{}s, contact {}/{}s)",
                        config.rate_limit.auth_requests_per_window,
                        config.rate_limit.window_seconds,
                        config.rate_limit.contact_requests_per_window,
                        config.rate_limit.window_seconds
                    )
                } else {
                    "Disabled".to_string()
                }
            );
            println!(
                "  Proxy Headers: {}",
                if config.rate_limit.trust_proxy_headers {
                    "Trusted"
                } else {
                    "Ignored"
                }
            );
            Ok(())
        }
        Err(e) => {
            println!("[!!] Configuration file is invalid!");
            println!();
            println!("Error: {:#}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_starts_server() {
        let cli = Cli::try_parse_from(["eciple"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("eciple.toml"));
    }

    #[test]
    fn test_create_admin_args() {
        let cli = Cli::try_parse_from([
            "eciple",
            "--config",
            "prod.toml",
            "create-admin",
            "--username",
            "admin",
            "--password",
            "s3cret",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::CreateAdmin {
                username,
                password,
                email,
            }) => {
                assert_eq!(username, "admin");
                assert_eq!(password, "s3cret");
                assert!(email.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_config_check_subcommand() {
        let cli = Cli::try_parse_from(["eciple", "config", "check"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config(ConfigCommands::Check))
        ));
    }
}
