//! MySQL backend
//!
//! Uses a single-connection sqlx pool. MySQL resolves the whole upsert in one
//! statement, so this backend reports atomic-upsert support and its existence
//! probe is only exercised when a caller asks for it explicitly.

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use tracing::debug;

use super::query::{BoundQuery, ParamMarker};
use super::DatabaseBackend;
use crate::config::DatabaseConfig;
use crate::error::{ExportError, ExportResult};

const DEFAULT_PORT: u16 = 3306;

pub struct MySqlBackend {
    pool: MySqlPool,
}

impl MySqlBackend {
    /// Connect using the configured server, credentials and database.
    pub async fn connect(config: &DatabaseConfig) -> ExportResult<Self> {
        let port = if config.port == 0 { DEFAULT_PORT } else { config.port };
        let mut options = MySqlConnectOptions::new()
            .host(&config.server)
            .port(port)
            .database(&config.database)
            .username(&config.username);
        if !config.password.is_empty() {
            options = options.password(&config.password);
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| ExportError::Database(format!("MySQL connection failed: {}", e)))?;

        debug!(server = %config.server, port, database = %config.database, "Connected to MySQL");
        Ok(Self { pool })
    }
}

#[async_trait]
impl DatabaseBackend for MySqlBackend {
    async fn ping(&mut self) -> ExportResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| ExportError::Database(format!("MySQL ping failed: {}", e)))?;
        Ok(())
    }

    async fn exists(
        &mut self,
        table: &str,
        pk_column: &str,
        pk_value: &str,
    ) -> ExportResult<bool> {
        let sql = format!("SELECT {} FROM {} WHERE {} = ?", pk_column, table, pk_column);
        let row = sqlx::query(&sql)
            .bind(pk_value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ExportError::Database(format!("Existence probe failed: {}", e)))?;
        Ok(row.is_some())
    }

    async fn execute(&mut self, query: &BoundQuery) -> ExportResult<u64> {
        let (sql, values) = query.to_positional(ParamMarker::Question);
        let mut statement = sqlx::query(&sql);
        for value in values {
            statement = statement.bind(value);
        }
        let result = statement
            .execute(&self.pool)
            .await
            .map_err(|e| ExportError::Database(format!("Statement failed: {}", e)))?;
        Ok(result.rows_affected())
    }

    fn supports_atomic_upsert(&self) -> bool {
        true
    }

    fn backend_type(&self) -> &'static str {
        "mysql"
    }
}
