//! Configuration file support
//!
//! The tool is driven by a single JSON configuration file (default `conf.json`)
//! holding the report service credentials, the target database block, and one
//! entry per report to run. Configuration is loaded once at startup and is
//! immutable for the process lifetime; a missing or malformed file is fatal.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

use crate::error::{ExportError, ExportResult};
use crate::parse::ReportFormat;

/// Database driver selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDriver {
    /// MySQL / MariaDB (atomic upsert via INSERT ... ON DUPLICATE KEY UPDATE)
    #[default]
    Mysql,
    /// Microsoft SQL Server (existence probe, then INSERT or UPDATE)
    Mssql,
}

impl std::str::FromStr for SqlDriver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(SqlDriver::Mysql),
            "mssql" | "sqlserver" => Ok(SqlDriver::Mssql),
            _ => Err(format!("Unknown database driver: {}. Use 'mysql' or 'mssql'.", s)),
        }
    }
}

impl std::fmt::Display for SqlDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlDriver::Mysql => write!(f, "mysql"),
            SqlDriver::Mssql => write!(f, "mssql"),
        }
    }
}

/// Database server authentication mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Username and password authentication
    #[default]
    Sql,
    /// Trusted connection (SQL Server on a Windows host only)
    Windows,
}

/// Report service connection section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiSection {
    /// Base URL of the reporting service
    pub endpoint: String,
    /// API key used for every request
    pub api_key: String,
}

/// Target database section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub driver: SqlDriver,
    pub server: String,
    /// 0 selects the driver default (3306 for MySQL, 1433 for SQL Server)
    #[serde(default)]
    pub port: u16,
    pub database: String,
    #[serde(default)]
    pub authentication: AuthMode,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub encrypt: bool,
}

impl DatabaseConfig {
    /// Validate the database block.
    ///
    /// The database name is always required; SQL authentication additionally
    /// requires a username and password.
    pub fn validate(&self) -> ExportResult<()> {
        if self.database.is_empty() {
            return Err(ExportError::Config(
                "Database name not set. Check the database section of your configuration."
                    .to_string(),
            ));
        }
        if self.authentication == AuthMode::Sql
            && (self.username.is_empty() || self.password.is_empty())
        {
            return Err(ExportError::Config(
                "SQL authentication requires both username and password.".to_string(),
            ));
        }
        Ok(())
    }
}

/// Mapping from report output fields to one database table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableMapping {
    pub table_name: String,
    /// Must equal one of the mapped database columns; rows whose mapping has
    /// no primary-key column are always treated as inserts.
    pub primary_key: String,
    /// Source field name -> database column name
    pub mapping: BTreeMap<String, String>,
}

impl TableMapping {
    /// Source field whose database column equals the primary key, if any.
    pub fn primary_key_field(&self) -> Option<&str> {
        self.mapping
            .iter()
            .find(|(_, col)| col.as_str() == self.primary_key)
            .map(|(field, _)| field.as_str())
    }
}

/// One report to run and ingest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportDefinition {
    pub report_id: u32,
    pub report_name: String,
    /// Ingest the spreadsheet output instead of the CSV output
    #[serde(default)]
    pub use_xlsx: bool,
    /// Delete the run instance on the service after ingestion (best effort)
    #[serde(default)]
    pub delete_run_instance: bool,
    /// Delete the downloaded file after ingestion (best effort)
    #[serde(default)]
    pub delete_local_file: bool,
    pub table: TableMapping,
}

impl ReportDefinition {
    /// File format this report ingests.
    pub fn format(&self) -> ReportFormat {
        if self.use_xlsx {
            ReportFormat::Xlsx
        } else {
            ReportFormat::Csv
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportConfig {
    pub api: ApiSection,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub reports: Vec<ReportDefinition>,
}

impl ExportConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> ExportResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ExportError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON string.
    pub fn parse(content: &str) -> ExportResult<Self> {
        serde_json::from_str(content)
            .map_err(|e| ExportError::Config(format!("Failed to decode configuration: {}", e)))
    }

    /// Validate the report service section and every report definition.
    ///
    /// A mapping whose columns never contain the primary key is legal but
    /// means every row from that report is inserted; it is reported as a
    /// warning, not an error.
    pub fn validate(&self) -> ExportResult<()> {
        if self.api.endpoint.is_empty() || self.api.api_key.is_empty() {
            return Err(ExportError::Config(
                "Report service endpoint and api_key must be set.".to_string(),
            ));
        }
        if self.reports.is_empty() {
            return Err(ExportError::Config(
                "No reports configured; nothing to do.".to_string(),
            ));
        }
        for report in &self.reports {
            let table = &report.table;
            if table.table_name.is_empty() || table.primary_key.is_empty() {
                return Err(ExportError::Config(format!(
                    "Report {} [{}]: table_name and primary_key must be set.",
                    report.report_name, report.report_id
                )));
            }
            if table.mapping.is_empty() {
                return Err(ExportError::Config(format!(
                    "Report {} [{}]: column mapping is empty.",
                    report.report_name, report.report_id
                )));
            }
            if table.primary_key_field().is_none() {
                warn!(
                    report = %report.report_name,
                    primary_key = %table.primary_key,
                    "No mapped column matches the primary key; all rows from this report will be inserted"
                );
            }
        }
        Ok(())
    }
}

/// Generate a sample configuration file content
pub fn sample_config() -> &'static str {
    r#"{
  "api": {
    "endpoint": "https://reporting.example.com/api",
    "api_key": "your-api-key"
  },
  "database": {
    "driver": "mysql",
    "server": "localhost",
    "port": 3306,
    "database": "reports",
    "authentication": "sql",
    "username": "exporter",
    "password": "secret",
    "encrypt": false
  },
  "reports": [
    {
      "report_id": 1,
      "report_name": "All Users",
      "use_xlsx": false,
      "delete_run_instance": true,
      "delete_local_file": true,
      "table": {
        "table_name": "users",
        "primary_key": "user_id",
        "mapping": {
          "User ID": "user_id",
          "Full Name": "full_name",
          "Email": "email"
        }
      }
    }
  ]
}
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_sql_driver_from_str() {
        assert_eq!(SqlDriver::from_str("mysql").unwrap(), SqlDriver::Mysql);
        assert_eq!(SqlDriver::from_str("mariadb").unwrap(), SqlDriver::Mysql);
        assert_eq!(SqlDriver::from_str("MSSQL").unwrap(), SqlDriver::Mssql);
        assert_eq!(SqlDriver::from_str("sqlserver").unwrap(), SqlDriver::Mssql);
        assert!(SqlDriver::from_str("oracle").is_err());
    }

    #[test]
    fn test_sample_config_is_valid() {
        let config = ExportConfig::parse(sample_config()).unwrap();
        config.validate().unwrap();
        config.database.validate().unwrap();
        assert_eq!(config.reports.len(), 1);
        assert_eq!(config.reports[0].table.primary_key, "user_id");
    }

    #[test]
    fn test_primary_key_field() {
        let config = ExportConfig::parse(sample_config()).unwrap();
        let table = &config.reports[0].table;
        assert_eq!(table.primary_key_field(), Some("User ID"));
    }

    #[test]
    fn test_validate_rejects_missing_credentials() {
        let mut config = ExportConfig::parse(sample_config()).unwrap();
        config.database.password.clear();
        assert!(config.database.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_reports() {
        let mut config = ExportConfig::parse(sample_config()).unwrap();
        config.reports.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_mapping() {
        let mut config = ExportConfig::parse(sample_config()).unwrap();
        config.reports[0].table.mapping.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        assert!(ExportConfig::parse("{not json").is_err());
    }

    #[test]
    fn test_report_format_selection() {
        let mut report = ReportDefinition::default();
        assert_eq!(report.format(), ReportFormat::Csv);
        report.use_xlsx = true;
        assert_eq!(report.format(), ReportFormat::Xlsx);
    }
}
