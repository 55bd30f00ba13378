//! dbkit-core: pooled SQL connections with retry, limits and health checks
//!
//! A thin layer over sqlx's `Any` driver. [`Manager`] opens a pool for
//! PostgreSQL, MySQL or SQLite, retries the initial connect, applies pool
//! limits and pings before handing the pool out. Queries are written with
//! sqlx directly.

pub mod config;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod manager;
pub mod migrate;
pub mod pagination;
pub mod scoped;
pub mod stats;

pub use config::{Config, Driver, LogLevel};
pub use context::Context;
pub use descriptor::Descriptor;
pub use error::{DbKitError, Result};
pub use manager::{Connector, Manager, SqlxConnector, RETRY_DELAY};
pub use migrate::Model;
pub use pagination::{paginate, Paginate, Paginated};
pub use scoped::ScopedDb;
pub use stats::PoolStats;

pub use sqlx;
