//! Context-bound database handle

use std::future::Future;
use std::time::Instant;

use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyPool, Connection};

use crate::context::Context;
use crate::error::Result;
use crate::stats::PoolCounters;

/// Pool handle whose operations end when its [`Context`] does.
///
/// Obtained from `Manager::with_context`. Borrowing the manager keeps the
/// pool alive; creating one changes nothing on the manager.
#[derive(Debug)]
pub struct ScopedDb<'m> {
    pool: &'m AnyPool,
    counters: &'m PoolCounters,
    ctx: Context,
}

impl<'m> ScopedDb<'m> {
    pub(crate) fn new(pool: &'m AnyPool, counters: &'m PoolCounters, ctx: Context) -> Self {
        Self {
            pool,
            counters,
            ctx,
        }
    }

    /// Underlying pool, for building queries.
    pub fn pool(&self) -> &'m AnyPool {
        self.pool
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Check out a connection, waiting no longer than the context allows.
    pub async fn acquire(&self) -> Result<PoolConnection<Any>> {
        let waits = PoolCounters::is_exhausted(self.pool);
        let started = Instant::now();
        let acquired = self.ctx.run(self.pool.acquire()).await;
        if waits {
            self.counters.record_wait(started.elapsed());
        }
        Ok(acquired??)
    }

    /// Run a sqlx future under the context.
    ///
    /// ```ignore
    /// let rows = scoped
    ///     .run(sqlx::query("SELECT id FROM users").fetch_all(scoped.pool()))
    ///     .await?;
    /// ```
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        Ok(self.ctx.run(fut).await??)
    }

    /// Ping one pooled connection.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.acquire().await?;
        self.run(conn.ping()).await
    }
}
