//! Per-run ingestion statistics

/// Running totals for one report's ingestion pass.
///
/// Created per report definition, passed explicitly into the ingestion loop,
/// and discarded after the summary is emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Rows whose statement executed successfully
    pub success: u64,
    /// Rows that failed (statement error or nothing mappable)
    pub failed: u64,
    /// Sum of reported affected-row counts from successful statements
    pub rows_affected: u64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, affected: u64) {
        self.success += 1;
        self.rows_affected += affected;
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// Total rows accounted for.
    pub fn total(&self) -> u64 {
        self.success + self.failed
    }
}
