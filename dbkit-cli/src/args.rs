use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use dbkit_core::{Config, Driver, LogLevel};

/// Connection flags. Each one overrides the same field from `--config`.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnArgs {
    /// TOML config file to start from
    #[arg(long, env = "DBKIT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Driver: postgres, mysql, sqlite or test
    #[arg(long, env = "DBKIT_DRIVER", global = true)]
    pub driver: Option<String>,

    #[arg(long, env = "DBKIT_HOST", global = true)]
    pub host: Option<String>,

    #[arg(long, env = "DBKIT_PORT", global = true)]
    pub port: Option<u16>,

    #[arg(long, env = "DBKIT_USER", global = true)]
    pub user: Option<String>,

    #[arg(long, env = "DBKIT_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Database name, or file path for sqlite
    #[arg(long, env = "DBKIT_DATABASE", global = true)]
    pub database: Option<String>,

    #[arg(long, env = "DBKIT_SSLMODE", global = true)]
    pub sslmode: Option<String>,

    #[arg(long, env = "DBKIT_TIMEZONE", global = true)]
    pub timezone: Option<String>,

    #[arg(long, env = "DBKIT_MAX_OPEN_CONNS", global = true)]
    pub max_open_conns: Option<u32>,

    #[arg(long, env = "DBKIT_MAX_IDLE_CONNS", global = true)]
    pub max_idle_conns: Option<u32>,

    /// Maximum connection lifetime in seconds
    #[arg(long, env = "DBKIT_CONN_MAX_LIFETIME", global = true)]
    pub conn_max_lifetime: Option<u64>,

    /// Maximum connection idle time in seconds
    #[arg(long, env = "DBKIT_CONN_MAX_IDLE_TIME", global = true)]
    pub conn_max_idle_time: Option<u64>,

    /// Connection attempts before giving up
    #[arg(long, env = "DBKIT_RETRY_ATTEMPTS", global = true)]
    pub retry_attempts: Option<u32>,

    /// Connect and ping timeout in seconds
    #[arg(long, env = "DBKIT_CONNECT_TIMEOUT", global = true)]
    pub connect_timeout: Option<u64>,

    /// Statement logging: silent, error or info
    #[arg(long, env = "DBKIT_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,
}

impl ConnArgs {
    /// Merge the config file (if any) with explicit flags.
    pub fn to_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => {
                let driver = self
                    .driver
                    .as_deref()
                    .context("--driver is required without --config")?;
                Config::new(driver.parse::<Driver>()?)
            }
        };

        if let Some(driver) = &self.driver {
            config.driver = driver.parse()?;
        }
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(user) = &self.user {
            config.user = user.clone();
        }
        if let Some(password) = &self.password {
            config.password = password.clone();
        }
        if let Some(database) = &self.database {
            config.database = database.clone();
        }
        if let Some(sslmode) = &self.sslmode {
            config.ssl_mode = sslmode.clone();
        }
        if let Some(timezone) = &self.timezone {
            config.timezone = timezone.clone();
        }
        if let Some(n) = self.max_open_conns {
            config.max_open_conns = n;
        }
        if let Some(n) = self.max_idle_conns {
            config.max_idle_conns = n;
        }
        if let Some(secs) = self.conn_max_lifetime {
            config.conn_max_lifetime = Duration::from_secs(secs);
        }
        if let Some(secs) = self.conn_max_idle_time {
            config.conn_max_idle_time = Duration::from_secs(secs);
        }
        if let Some(n) = self.retry_attempts {
            config.retry_attempts = n;
        }
        if let Some(secs) = self.connect_timeout {
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.parse::<LogLevel>().unwrap_or_default();
        }

        Ok(config)
    }
}
