//! XLSX report parsing

use calamine::{Data, Reader};
use std::io::Cursor;
use std::path::PathBuf;

use super::{Row, zip_record};
use crate::error::{ExportError, ExportResult};

/// Parse XLSX bytes into rows.
///
/// The reporting service writes a single worksheet, so rows are read from the
/// first sheet in the workbook. The first row is the header; non-string cells
/// are stringified.
pub fn parse_xlsx(data: &[u8]) -> ExportResult<Vec<Row>> {
    let cursor = Cursor::new(data);
    let mut workbook =
        calamine::open_workbook_auto_from_rs(cursor).map_err(|e| parse_error(e.to_string()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| parse_error("Workbook contains no worksheets".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| parse_error(e.to_string()))?;

    let mut header: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for row in range.rows() {
        let fields: Vec<String> = row.iter().map(cell_to_string).collect();
        match &header {
            None => header = Some(fields),
            Some(header) => {
                // Ranges are rectangular, so every row has a cell (possibly
                // empty) for every header position.
                rows.push(zip_record(header, &fields));
            }
        }
    }

    Ok(rows)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}

fn parse_error(message: String) -> ExportError {
    ExportError::Parse {
        file: PathBuf::new(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&Data::Empty), "");
        assert_eq!(cell_to_string(&Data::String("x".to_string())), "x");
        assert_eq!(cell_to_string(&Data::Int(7)), "7");
        assert_eq!(cell_to_string(&Data::Bool(true)), "true");
    }

    #[test]
    fn test_garbage_bytes_are_a_parse_error() {
        assert!(parse_xlsx(b"not a workbook").is_err());
    }
}
