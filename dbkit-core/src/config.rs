//! Manager configuration
//!
//! A `Config` is plain data. Zero-valued tunables mean "use the default";
//! [`Config::with_defaults`] substitutes them and validates the driver-specific
//! fields before any connection is attempted.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DbKitError, Result};

pub const DEFAULT_MAX_OPEN_CONNS: u32 = 25;
pub const DEFAULT_MAX_IDLE_CONNS: u32 = 5;
pub const DEFAULT_CONN_MAX_LIFETIME: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CONN_MAX_IDLE_TIME: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Supported database drivers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    Postgres,
    MySql,
    /// File-backed SQLite; in-memory when no database path is given
    Sqlite,
    /// SQLite for tests; in-memory when no database path is given
    Test,
}

impl Driver {
    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::Postgres => "postgres",
            Driver::MySql => "mysql",
            Driver::Sqlite => "sqlite",
            Driver::Test => "test",
        }
    }

    /// Network drivers need host, port and database coordinates.
    pub fn is_network(&self) -> bool {
        matches!(self, Driver::Postgres | Driver::MySql)
    }

    /// Conventional server port, if the driver talks to a server.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Driver::Postgres => Some(5432),
            Driver::MySql => Some(3306),
            Driver::Sqlite | Driver::Test => None,
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Driver {
    type Err = DbKitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Driver::Postgres),
            "mysql" => Ok(Driver::MySql),
            "sqlite" | "sqlite3" => Ok(Driver::Sqlite),
            "test" => Ok(Driver::Test),
            _ => Err(DbKitError::unsupported_driver(s)),
        }
    }
}

/// Statement logging verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Silent,
    Error,
    #[default]
    Info,
}

impl FromStr for LogLevel {
    type Err = std::convert::Infallible;

    /// Anything other than `silent` or `error` logs at info.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "silent" => LogLevel::Silent,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        })
    }
}

/// Connection and pool configuration
#[derive(Clone, PartialEq, Serialize)]
pub struct Config {
    pub driver: Driver,
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    /// Database name, or file path for SQLite
    pub database: String,
    pub ssl_mode: String,
    pub timezone: String,

    pub max_open_conns: u32,
    pub max_idle_conns: u32,
    pub conn_max_lifetime: Duration,
    pub conn_max_idle_time: Duration,

    pub log_level: LogLevel,
    pub auto_migrate: bool,
    pub retry_attempts: u32,
    pub connect_timeout: Duration,
}

impl Config {
    /// A config for `driver` with every other field empty or zero.
    pub fn new(driver: Driver) -> Self {
        Self {
            driver,
            host: String::new(),
            port: 0,
            user: String::new(),
            password: String::new(),
            database: String::new(),
            ssl_mode: String::new(),
            timezone: String::new(),
            max_open_conns: 0,
            max_idle_conns: 0,
            conn_max_lifetime: Duration::ZERO,
            conn_max_idle_time: Duration::ZERO,
            log_level: LogLevel::default(),
            auto_migrate: false,
            retry_attempts: 0,
            connect_timeout: Duration::ZERO,
        }
    }

    /// Substitute defaults for zero-valued tunables and validate.
    ///
    /// # Errors
    ///
    /// Returns a config error when a network driver lacks a host or database.
    pub fn with_defaults(mut self) -> Result<Self> {
        if self.max_open_conns == 0 {
            self.max_open_conns = DEFAULT_MAX_OPEN_CONNS;
        }
        if self.max_idle_conns == 0 {
            self.max_idle_conns = DEFAULT_MAX_IDLE_CONNS;
        }
        self.max_idle_conns = self.max_idle_conns.min(self.max_open_conns);
        if self.conn_max_lifetime.is_zero() {
            self.conn_max_lifetime = DEFAULT_CONN_MAX_LIFETIME;
        }
        if self.conn_max_idle_time.is_zero() {
            self.conn_max_idle_time = DEFAULT_CONN_MAX_IDLE_TIME;
        }
        if self.retry_attempts == 0 {
            self.retry_attempts = DEFAULT_RETRY_ATTEMPTS;
        }
        if self.connect_timeout.is_zero() {
            self.connect_timeout = DEFAULT_CONNECT_TIMEOUT;
        }

        if self.driver.is_network() {
            if self.port == 0 {
                self.port = self.driver.default_port().unwrap_or_default();
            }
            if self.host.trim().is_empty() {
                return Err(DbKitError::config(format!(
                    "{} driver requires a host",
                    self.driver
                )));
            }
            if self.database.trim().is_empty() {
                return Err(DbKitError::config(format!(
                    "{} driver requires a database name",
                    self.driver
                )));
            }
        }

        Ok(self)
    }

    /// True when the SQLite variants should use an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        !self.driver.is_network()
            && (self.database.is_empty() || self.database == ":memory:")
    }

    /// Parse a TOML config document.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(raw)?;
        file.try_into()
    }

    /// Load a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        tracing::debug!("Loaded dbkit config from {}", path.display());
        Self::from_toml_str(&raw)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = if self.password.is_empty() { "" } else { "***" };
        f.debug_struct("Config")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &password)
            .field("database", &self.database)
            .field("ssl_mode", &self.ssl_mode)
            .field("timezone", &self.timezone)
            .field("max_open_conns", &self.max_open_conns)
            .field("max_idle_conns", &self.max_idle_conns)
            .field("conn_max_lifetime", &self.conn_max_lifetime)
            .field("conn_max_idle_time", &self.conn_max_idle_time)
            .field("log_level", &self.log_level)
            .field("auto_migrate", &self.auto_migrate)
            .field("retry_attempts", &self.retry_attempts)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// On-disk representation. Durations are whole seconds.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    driver: String,
    host: String,
    port: u16,
    user: String,
    password: String,
    database: String,
    ssl_mode: String,
    timezone: String,
    max_open_conns: u32,
    max_idle_conns: u32,
    conn_max_lifetime_secs: u64,
    conn_max_idle_time_secs: u64,
    log_level: String,
    auto_migrate: bool,
    retry_attempts: u32,
    connect_timeout_secs: u64,
}

impl TryFrom<ConfigFile> for Config {
    type Error = DbKitError;

    fn try_from(file: ConfigFile) -> Result<Self> {
        let driver: Driver = file.driver.parse()?;
        let log_level = file.log_level.parse().unwrap_or_default();

        Ok(Config {
            driver,
            host: file.host,
            port: file.port,
            user: file.user,
            password: file.password,
            database: file.database,
            ssl_mode: file.ssl_mode,
            timezone: file.timezone,
            max_open_conns: file.max_open_conns,
            max_idle_conns: file.max_idle_conns,
            conn_max_lifetime: Duration::from_secs(file.conn_max_lifetime_secs),
            conn_max_idle_time: Duration::from_secs(file.conn_max_idle_time_secs),
            log_level,
            auto_migrate: file.auto_migrate,
            retry_attempts: file.retry_attempts,
            connect_timeout: Duration::from_secs(file.connect_timeout_secs),
        })
    }
}
