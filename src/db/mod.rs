//! Database backend abstraction
//!
//! One backend per SQL dialect profile, selected once at startup from the
//! configured driver. The backend decides the reconciliation strategy: MySQL
//! offers a single-statement atomic upsert, SQL Server requires an existence
//! probe followed by an INSERT or UPDATE. A single connection is opened once
//! and reused for every row of every report.

use async_trait::async_trait;

pub mod mssql;
pub mod mysql;
pub mod query;
pub mod upsert;

pub use mssql::MssqlBackend;
pub use mysql::MySqlBackend;
pub use query::{BindParam, BoundQuery, ParamMarker, bind_name};
pub use upsert::UpsertEngine;

use crate::config::{DatabaseConfig, SqlDriver};
use crate::error::ExportResult;

/// Dialect-specific execution surface consumed by the upsert engine
#[async_trait]
pub trait DatabaseBackend: Send {
    /// Check the connection is alive.
    async fn ping(&mut self) -> ExportResult<()>;

    /// Existence probe: does a row with this primary-key value exist?
    async fn exists(&mut self, table: &str, pk_column: &str, pk_value: &str)
    -> ExportResult<bool>;

    /// Execute a bound statement, returning the affected-row count.
    async fn execute(&mut self, query: &BoundQuery) -> ExportResult<u64>;

    /// Whether the dialect offers a single-statement upsert.
    fn supports_atomic_upsert(&self) -> bool;

    /// Backend type string ("mysql" or "mssql")
    fn backend_type(&self) -> &'static str;
}

/// Open the backend selected by the configuration and verify the connection.
pub async fn connect(config: &DatabaseConfig) -> ExportResult<Box<dyn DatabaseBackend>> {
    config.validate()?;
    let mut backend: Box<dyn DatabaseBackend> = match config.driver {
        SqlDriver::Mysql => Box::new(MySqlBackend::connect(config).await?),
        SqlDriver::Mssql => Box::new(MssqlBackend::connect(config).await?),
    };
    backend.ping().await?;
    Ok(backend)
}
