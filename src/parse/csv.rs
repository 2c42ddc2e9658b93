//! CSV report parsing

use csv::ReaderBuilder;
use std::path::PathBuf;

use super::{Row, zip_record};
use crate::error::{ExportError, ExportResult};

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Parse CSV bytes into rows.
///
/// A UTF-8 byte-order mark at the start of the stream is skipped. Any
/// malformed record (unequal column count, broken quoting) aborts the whole
/// file; no partial row set is returned.
pub fn parse_csv(data: &[u8]) -> ExportResult<Vec<Row>> {
    let data = strip_bom(data);

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(false)
        .from_reader(data);

    let mut header: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for result in reader.records() {
        let record = result.map_err(|e| parse_error(e.to_string()))?;
        let fields: Vec<String> = record.iter().map(str::to_string).collect();
        match &header {
            None => header = Some(fields),
            // The reader rejects records whose length differs from the
            // header's, so the zip below never drops a field.
            Some(header) => rows.push(zip_record(header, &fields)),
        }
    }

    Ok(rows)
}

fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&UTF8_BOM).unwrap_or(data)
}

fn parse_error(message: String) -> ExportError {
    ExportError::Parse {
        file: PathBuf::new(),
        message,
    }
}
