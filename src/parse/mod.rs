//! Report file parsing
//!
//! Turns a downloaded tabular file into an ordered sequence of rows. The first
//! record is treated as the header; every subsequent record is zipped against
//! it positionally into a field-name -> value mapping. A file that contains
//! only the header (or nothing at all) parses successfully to zero rows.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{ExportError, ExportResult};

pub mod csv;
pub mod xlsx;

pub use self::csv::parse_csv;
pub use self::xlsx::parse_xlsx;

/// One report record: source field name -> string value.
///
/// An absent or empty value means "no value supplied" and is never written to
/// the database.
pub type Row = BTreeMap<String, String>;

/// Supported report output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Csv,
    Xlsx,
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ReportFormat::Csv),
            "xlsx" => Ok(ReportFormat::Xlsx),
            _ => Err(format!("Unsupported report format: {}", s)),
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportFormat::Csv => write!(f, "csv"),
            ReportFormat::Xlsx => write!(f, "xlsx"),
        }
    }
}

/// Parse a downloaded report file into rows.
pub fn parse_file(path: &Path, format: ReportFormat) -> ExportResult<Vec<Row>> {
    let data = std::fs::read(path).map_err(|e| ExportError::Parse {
        file: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let result = match format {
        ReportFormat::Csv => parse_csv(&data),
        ReportFormat::Xlsx => parse_xlsx(&data),
    };
    result.map_err(|e| match e {
        ExportError::Parse { message, .. } => ExportError::Parse {
            file: path.to_path_buf(),
            message,
        },
        other => other,
    })
}

/// Zip a header record against a data record positionally.
///
/// Shared by both parsers; the caller guarantees the record is at least as
/// long as the header.
pub(crate) fn zip_record(header: &[String], record: &[String]) -> Row {
    header
        .iter()
        .cloned()
        .zip(record.iter().cloned())
        .collect()
}
