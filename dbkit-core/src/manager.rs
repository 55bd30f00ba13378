//! Connection manager
//!
//! Opens one sqlx `AnyPool` with bounded fixed-delay retry, applies pool
//! limits, verifies liveness, and exposes pass-through helpers. All query
//! building and pooling behavior belongs to sqlx.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use log::LevelFilter;
use sqlx::any::{AnyConnectOptions, AnyPoolOptions};
use sqlx::{Any, AnyPool, ConnectOptions, Connection, Transaction};
use tracing::{debug, info, warn};

use crate::config::{Config, LogLevel};
use crate::context::Context;
use crate::descriptor::Descriptor;
use crate::error::{DbKitError, Result};
use crate::migrate::{self, Model};
use crate::scoped::ScopedDb;
use crate::stats::{PoolCounters, PoolStats};

/// Fixed pause between connection attempts
pub const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Statements slower than this are logged at warn under the info level
const SLOW_STATEMENT_THRESHOLD: Duration = Duration::from_millis(200);

/// Opens a pool. The seam exists so callers can observe or replace the open
/// step; [`SqlxConnector`] is the real one.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(
        &self,
        options: AnyConnectOptions,
        pool: AnyPoolOptions,
    ) -> std::result::Result<AnyPool, sqlx::Error>;
}

/// Opens pools with `PoolOptions::connect_with`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlxConnector;

#[async_trait]
impl Connector for SqlxConnector {
    async fn open(
        &self,
        options: AnyConnectOptions,
        pool: AnyPoolOptions,
    ) -> std::result::Result<AnyPool, sqlx::Error> {
        pool.connect_with(options).await
    }
}

/// Owns one live connection pool.
///
/// Construct with [`Manager::new`]; release with [`Manager::close`].
#[derive(Debug)]
pub struct Manager {
    pool: AnyPool,
    config: Config,
    descriptor: Descriptor,
    counters: Arc<PoolCounters>,
}

impl Manager {
    /// Connect using the configured driver.
    ///
    /// # Errors
    ///
    /// - `UnsupportedDriver` / `Config` before any I/O
    /// - `Connect` once every attempt has failed
    /// - `Ping` / `PingTimeout` if the opened pool is not alive
    ///
    /// # Example
    ///
    /// ```ignore
    /// let manager = Manager::new(Config {
    ///     log_level: LogLevel::Silent,
    ///     ..Config::new(Driver::Test)
    /// })
    /// .await?;
    /// ```
    pub async fn new(config: Config) -> Result<Self> {
        Self::connect_with(config, &SqlxConnector).await
    }

    /// Connect through a custom [`Connector`].
    pub async fn connect_with(config: Config, connector: &dyn Connector) -> Result<Self> {
        let config = config.with_defaults()?;
        let descriptor = Descriptor::build(&config)?;
        sqlx::any::install_default_drivers();

        let connect_options = connect_options(&config, &descriptor)?;
        let lifetime = (!descriptor.is_in_memory()).then_some(config.conn_max_lifetime);
        let counters = PoolCounters::new(config.max_idle_conns, lifetime);
        let pool_options = pool_options(&config, &descriptor, &counters);

        debug!("Opening {} pool at {}", config.driver, descriptor);
        let pool = open_with_retry(connector, &config, connect_options, pool_options).await?;

        // A pool that fails here is dropped, not closed.
        ping_within(&pool, config.connect_timeout).await?;
        counters.attach(&pool);

        let database = if descriptor.is_in_memory() {
            ":memory:"
        } else {
            config.database.as_str()
        };
        info!(
            driver = %config.driver,
            database,
            "Connected to {} database: {}",
            config.driver,
            database
        );

        Ok(Self {
            pool,
            config,
            descriptor,
            counters,
        })
    }

    /// Raw pool handle, bound to no context.
    pub fn db(&self) -> &AnyPool {
        &self.pool
    }

    /// Effective configuration, defaults applied.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Handle whose operations are bounded by `ctx`.
    pub fn with_context(&self, ctx: Context) -> ScopedDb<'_> {
        ScopedDb::new(&self.pool, &self.counters, ctx)
    }

    /// Create the tables for `models` when `auto_migrate` is enabled.
    pub async fn migrate(&self, models: &[&dyn Model]) -> Result<()> {
        if !self.config.auto_migrate {
            return Ok(());
        }
        migrate::sync_models(&self.pool, self.config.driver, models).await
    }

    /// Run `callback` in a single transaction bound to `ctx`.
    ///
    /// Commits when the callback returns `Ok`, rolls back and returns its
    /// error otherwise. If `ctx` expires first the transaction is dropped,
    /// which rolls it back.
    pub async fn transaction<F, R, E>(&self, ctx: &Context, callback: F) -> std::result::Result<R, E>
    where
        for<'c> F: FnOnce(&'c mut Transaction<'_, Any>) -> BoxFuture<'c, std::result::Result<R, E>>
            + Send
            + Sync,
        R: Send,
        E: From<DbKitError> + From<sqlx::Error> + Send,
    {
        let mut conn = self.with_context(ctx.clone()).acquire().await?;
        ctx.run(conn.transaction(callback)).await?
    }

    /// Ping a pooled connection within `ctx`.
    pub async fn ping(&self, ctx: &Context) -> Result<()> {
        self.with_context(ctx.clone()).ping().await
    }

    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot(&self.pool)
    }

    /// Close every connection and release the pool.
    pub async fn close(self) {
        self.counters.detach();
        self.pool.close().await;
        debug!("Closed {} pool", self.config.driver);
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.counters.detach();
    }
}

fn connect_options(config: &Config, descriptor: &Descriptor) -> Result<AnyConnectOptions> {
    let options = AnyConnectOptions::from_str(descriptor.url())
        .map_err(|e| DbKitError::config(format!("invalid connection descriptor {descriptor}: {e}")))?;

    Ok(match config.log_level {
        LogLevel::Silent => options.disable_statement_logging(),
        // sqlx returns failed statements to the caller; nothing is logged.
        LogLevel::Error => options
            .log_statements(LevelFilter::Off)
            .log_slow_statements(LevelFilter::Off, SLOW_STATEMENT_THRESHOLD),
        LogLevel::Info => options
            .log_statements(LevelFilter::Info)
            .log_slow_statements(LevelFilter::Warn, SLOW_STATEMENT_THRESHOLD),
    })
}

fn pool_options(config: &Config, descriptor: &Descriptor, counters: &Arc<PoolCounters>) -> AnyPoolOptions {
    let hook = Arc::clone(counters);
    let options = AnyPoolOptions::new()
        .max_connections(config.max_open_conns)
        .acquire_timeout(config.connect_timeout)
        .after_release(move |_conn, meta| {
            let keep = hook.keep_on_release(meta.age);
            Box::pin(async move { Ok(keep) })
        });

    if descriptor.is_in_memory() {
        // The shared in-memory database lives only while a connection is open.
        options
            .min_connections(1)
            .max_lifetime(None)
            .idle_timeout(None)
    } else {
        options
            .max_lifetime(config.conn_max_lifetime)
            .idle_timeout(config.conn_max_idle_time)
    }
}

async fn open_with_retry(
    connector: &dyn Connector,
    config: &Config,
    connect_options: AnyConnectOptions,
    pool_options: AnyPoolOptions,
) -> Result<AnyPool> {
    let attempts = config.retry_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match connector
            .open(connect_options.clone(), pool_options.clone())
            .await
        {
            Ok(pool) => return Ok(pool),
            Err(source) if attempt >= attempts => {
                return Err(DbKitError::Connect { attempts, source });
            }
            Err(e) => {
                warn!(
                    attempt,
                    attempts,
                    "Connection attempt to {} failed: {}",
                    config.driver,
                    e
                );
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }
}

async fn ping_within(pool: &AnyPool, timeout: Duration) -> Result<()> {
    let ping = async {
        let mut conn = pool.acquire().await?;
        conn.ping().await
    };

    match tokio::time::timeout(timeout, ping).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(DbKitError::Ping { source }),
        Err(_) => Err(DbKitError::PingTimeout { timeout }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Driver;

    #[test]
    fn in_memory_pool_keeps_a_connection() {
        let config = Config::new(Driver::Test).with_defaults().unwrap();
        let descriptor = Descriptor::build(&config).unwrap();
        let counters = PoolCounters::new(config.max_idle_conns, None);
        let options = pool_options(&config, &descriptor, &counters);

        assert_eq!(options.get_max_connections(), 25);
        assert_eq!(options.get_min_connections(), 1);
        assert_eq!(options.get_max_lifetime(), None);
        assert_eq!(options.get_idle_timeout(), None);
        assert_eq!(options.get_acquire_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn file_pool_applies_limits() {
        let config = Config {
            database: "app.db".into(),
            max_open_conns: 7,
            conn_max_lifetime: Duration::from_secs(30),
            conn_max_idle_time: Duration::from_secs(20),
            ..Config::new(Driver::Sqlite)
        }
        .with_defaults()
        .unwrap();
        let descriptor = Descriptor::build(&config).unwrap();
        let counters = PoolCounters::new(config.max_idle_conns, Some(config.conn_max_lifetime));
        let options = pool_options(&config, &descriptor, &counters);

        assert_eq!(options.get_max_connections(), 7);
        assert_eq!(options.get_min_connections(), 0);
        assert_eq!(options.get_max_lifetime(), Some(Duration::from_secs(30)));
        assert_eq!(options.get_idle_timeout(), Some(Duration::from_secs(20)));
    }

    #[test]
    fn descriptor_parses_as_connect_options() {
        let config = Config::new(Driver::Test).with_defaults().unwrap();
        let descriptor = Descriptor::build(&config).unwrap();
        assert!(connect_options(&config, &descriptor).is_ok());
    }

    fn log_settings_for(level: LogLevel) -> (LevelFilter, LevelFilter) {
        let config = Config {
            log_level: level,
            ..Config::new(Driver::Test)
        }
        .with_defaults()
        .unwrap();
        let descriptor = Descriptor::build(&config).unwrap();
        let options = connect_options(&config, &descriptor).unwrap();
        (
            options.log_settings.statements_level,
            options.log_settings.slow_statements_level,
        )
    }

    #[test]
    fn error_level_logs_no_statements() {
        assert_eq!(log_settings_for(LogLevel::Silent), (LevelFilter::Off, LevelFilter::Off));
        assert_eq!(log_settings_for(LogLevel::Error), (LevelFilter::Off, LevelFilter::Off));
        assert_eq!(log_settings_for(LogLevel::Info), (LevelFilter::Info, LevelFilter::Warn));
    }
}
