//! Record reconciliation engine
//!
//! Converts one parsed row into a persisted database change and records the
//! outcome. The strategy follows the backend's capability profile: an atomic
//! upsert where the dialect offers one, otherwise an existence probe followed
//! by an INSERT or UPDATE. One bad row never aborts the batch.

use tracing::{debug, error, warn};

use super::query::{self, BoundQuery};
use super::DatabaseBackend;
use crate::config::TableMapping;
use crate::parse::Row;
use crate::stats::RunStats;

pub struct UpsertEngine<'a> {
    backend: &'a mut dyn DatabaseBackend,
    mapping: &'a TableMapping,
    /// Log statement text and bound values for every row
    diagnostics: bool,
}

impl<'a> UpsertEngine<'a> {
    pub fn new(
        backend: &'a mut dyn DatabaseBackend,
        mapping: &'a TableMapping,
        diagnostics: bool,
    ) -> Self {
        Self {
            backend,
            mapping,
            diagnostics,
        }
    }

    /// Reconcile one row against the target table, recording exactly one
    /// outcome in `stats`.
    pub async fn apply(&mut self, row: &Row, stats: &mut RunStats) {
        let query = match self.build_statement(row).await {
            Some(query) => query,
            None => {
                // Nothing mappable: record the failure and dump the row and
                // mapping for diagnosis, but keep going.
                stats.record_failure();
                warn!("Unable to map any values from the returned record");
                if let Ok(record) = serde_json::to_string(row) {
                    debug!(record = %record, "Offending record");
                }
                if let Ok(mapping) = serde_json::to_string(&self.mapping.mapping) {
                    debug!(mapping = %mapping, "Configured mapping");
                }
                return;
            }
        };

        if self.diagnostics {
            debug!(sql = %query.sql, "Executing statement");
            for param in &query.params {
                debug!(name = %param.name, value = %param.value, "Bound value");
            }
        }

        match self.backend.execute(&query).await {
            Ok(affected) => {
                stats.record_success(affected);
                if self.diagnostics {
                    debug!(rows_affected = affected, "Statement succeeded");
                }
            }
            Err(e) => {
                stats.record_failure();
                error!("Statement execution failed: {}", e);
            }
        }
    }

    async fn build_statement(&mut self, row: &Row) -> Option<BoundQuery> {
        if self.backend.supports_atomic_upsert() {
            return query::build_upsert(row, self.mapping);
        }

        // Check-then-branch: a row without a primary-key value cannot exist
        // yet, and a probe error is treated as absence.
        let pk_value = query::primary_key_value(row, self.mapping)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let exists = match pk_value {
            Some(pk_value) => {
                match self
                    .backend
                    .exists(&self.mapping.table_name, &self.mapping.primary_key, &pk_value)
                    .await
                {
                    Ok(exists) => exists,
                    Err(e) => {
                        debug!("Existence probe failed, treating row as new: {}", e);
                        false
                    }
                }
            }
            None => false,
        };

        if exists {
            query::build_update(row, self.mapping)
        } else {
            query::build_insert(row, self.mapping)
        }
    }
}
