//! Schema synchronization for caller-described models

use sqlx::AnyPool;

use crate::config::Driver;
use crate::error::Result;

/// A table the manager can create on startup.
///
/// Implementations return DDL for the active driver; the statement should be
/// idempotent (`CREATE TABLE IF NOT EXISTS ...`).
pub trait Model: Send + Sync {
    fn table_name(&self) -> &str;

    fn create_table_sql(&self, driver: Driver) -> String;
}

/// Issue each model's DDL in order, stopping at the first failure.
pub(crate) async fn sync_models(pool: &AnyPool, driver: Driver, models: &[&dyn Model]) -> Result<()> {
    for model in models {
        tracing::debug!(table = model.table_name(), "Synchronizing schema");
        sqlx::query(&model.create_table_sql(driver))
            .execute(pool)
            .await?;
    }
    tracing::info!("Synchronized {} model(s)", models.len());
    Ok(())
}
