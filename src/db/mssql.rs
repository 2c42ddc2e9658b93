//! SQL Server backend
//!
//! Connects with tiberius over a tokio TCP stream. SQL Server has no
//! single-statement upsert in this tool's dialect profile, so the engine
//! probes for the row first and branches to an INSERT or UPDATE.

use async_trait::async_trait;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

use super::query::{BoundQuery, ParamMarker};
use super::DatabaseBackend;
use crate::config::{AuthMode, DatabaseConfig};
use crate::error::{ExportError, ExportResult};

const DEFAULT_PORT: u16 = 1433;

pub struct MssqlBackend {
    client: Client<Compat<TcpStream>>,
}

impl MssqlBackend {
    /// Connect using the configured server, authentication mode and
    /// encryption setting.
    pub async fn connect(config: &DatabaseConfig) -> ExportResult<Self> {
        let tds_config = build_config(config)?;

        let tcp = TcpStream::connect(tds_config.get_addr())
            .await
            .map_err(|e| ExportError::Database(format!("SQL Server connection failed: {}", e)))?;
        tcp.set_nodelay(true).ok();

        let client = Client::connect(tds_config, tcp.compat_write())
            .await
            .map_err(|e| ExportError::Database(format!("SQL Server handshake failed: {}", e)))?;

        debug!(server = %config.server, database = %config.database, "Connected to SQL Server");
        Ok(Self { client })
    }
}

fn build_config(config: &DatabaseConfig) -> ExportResult<Config> {
    let mut tds_config = Config::new();
    tds_config.host(&config.server);
    tds_config.port(if config.port == 0 { DEFAULT_PORT } else { config.port });
    tds_config.database(&config.database);

    match config.authentication {
        AuthMode::Sql => {
            tds_config.authentication(AuthMethod::sql_server(&config.username, &config.password));
        }
        #[cfg(windows)]
        AuthMode::Windows => {
            tds_config.authentication(AuthMethod::Integrated);
        }
        #[cfg(not(windows))]
        AuthMode::Windows => {
            return Err(ExportError::Config(
                "Windows authentication is only available on a Windows host.".to_string(),
            ));
        }
    }

    if config.encrypt {
        tds_config.trust_cert();
        tds_config.encryption(EncryptionLevel::Required);
    } else {
        tds_config.encryption(EncryptionLevel::NotSupported);
    }

    Ok(tds_config)
}

#[async_trait]
impl DatabaseBackend for MssqlBackend {
    async fn ping(&mut self) -> ExportResult<()> {
        self.client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| ExportError::Database(format!("SQL Server ping failed: {}", e)))?
            .into_row()
            .await
            .map_err(|e| ExportError::Database(format!("SQL Server ping failed: {}", e)))?;
        Ok(())
    }

    async fn exists(
        &mut self,
        table: &str,
        pk_column: &str,
        pk_value: &str,
    ) -> ExportResult<bool> {
        let sql = format!("SELECT {} FROM {} WHERE {} = @P1", pk_column, table, pk_column);
        let row = self
            .client
            .query(sql.as_str(), &[&pk_value])
            .await
            .map_err(|e| ExportError::Database(format!("Existence probe failed: {}", e)))?
            .into_row()
            .await
            .map_err(|e| ExportError::Database(format!("Existence probe failed: {}", e)))?;
        Ok(row.is_some())
    }

    async fn execute(&mut self, query: &BoundQuery) -> ExportResult<u64> {
        let (sql, values) = query.to_positional(ParamMarker::AtNumbered);
        let params: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
        let result = self
            .client
            .execute(sql.as_str(), &params)
            .await
            .map_err(|e| ExportError::Database(format!("Statement failed: {}", e)))?;
        Ok(result.total())
    }

    fn supports_atomic_upsert(&self) -> bool {
        false
    }

    fn backend_type(&self) -> &'static str {
        "mssql"
    }
}
