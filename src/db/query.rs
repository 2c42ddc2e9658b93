//! Statement builders for the reconciliation engine
//!
//! Pure functions that turn one row plus its table mapping into a bound SQL
//! statement. Columns whose source value is an empty string are omitted
//! entirely; an empty value never overwrites nor inserts. Statement text uses
//! `:name` placeholders named after the sanitized column; backends rewrite
//! them to their positional marker at execution time.
//!
//! The mapping is a `BTreeMap`, so building the same row twice always yields
//! the same statement text and the same bound parameter set.

use crate::config::TableMapping;
use crate::parse::Row;

/// One named bind parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindParam {
    /// Sanitized column name, legal as a bind identifier
    pub name: String,
    pub value: String,
}

/// Positional placeholder style of a dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamMarker {
    /// `?` (MySQL)
    Question,
    /// `@P1`, `@P2`, ... (TDS)
    AtNumbered,
}

/// A statement plus its bound parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundQuery {
    /// SQL text with `:name` placeholders
    pub sql: String,
    pub params: Vec<BindParam>,
}

impl BoundQuery {
    /// Rewrite the named placeholders to positional markers, returning the
    /// rewritten SQL and the values in placeholder order. A name referenced
    /// more than once contributes its value once per occurrence.
    pub fn to_positional(&self, marker: ParamMarker) -> (String, Vec<&str>) {
        let mut sql = String::with_capacity(self.sql.len());
        let mut values = Vec::new();
        let mut chars = self.sql.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            if c != ':' {
                sql.push(c);
                continue;
            }
            let start = i + 1;
            let mut end = start;
            while let Some((j, next)) = chars.peek().copied() {
                if next.is_alphanumeric() || next == '_' {
                    end = j + next.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let name = &self.sql[start..end];
            match self.params.iter().find(|p| p.name == name) {
                Some(param) => {
                    values.push(param.value.as_str());
                    match marker {
                        ParamMarker::Question => sql.push('?'),
                        ParamMarker::AtNumbered => {
                            sql.push_str(&format!("@P{}", values.len()));
                        }
                    }
                }
                // Not one of ours; emit the text untouched.
                None => {
                    sql.push(':');
                    sql.push_str(name);
                }
            }
        }

        (sql, values)
    }
}

/// Normalize a column identifier into a legal bind-parameter name.
///
/// Strips one surrounding pair of brackets, one surrounding pair of
/// backticks, then removes interior spaces. The column name used in the
/// emitted SQL text is never mutated.
pub fn bind_name(column: &str) -> String {
    let s = column.strip_prefix('[').unwrap_or(column);
    let s = s.strip_suffix(']').unwrap_or(s);
    let s = s.strip_prefix('`').unwrap_or(s);
    let s = s.strip_suffix('`').unwrap_or(s);
    s.chars().filter(|c| *c != ' ').collect()
}

/// Value of the source field mapped to the primary-key column, if the mapping
/// has one and the row supplies it.
pub fn primary_key_value<'a>(row: &'a Row, mapping: &TableMapping) -> Option<&'a str> {
    let field = mapping.primary_key_field()?;
    row.get(field).map(String::as_str)
}

/// Mapped columns with a non-empty value in the row, in mapping order.
fn writable_columns<'a>(row: &'a Row, mapping: &'a TableMapping) -> Vec<(&'a str, &'a str)> {
    mapping
        .mapping
        .iter()
        .filter_map(|(field, column)| {
            row.get(field)
                .filter(|value| !value.is_empty())
                .map(|value| (column.as_str(), value.as_str()))
        })
        .collect()
}

/// Build an atomic upsert: `INSERT ... ON DUPLICATE KEY UPDATE`.
///
/// Returns `None` when no mapped column has a value.
pub fn build_upsert(row: &Row, mapping: &TableMapping) -> Option<BoundQuery> {
    let columns = writable_columns(row, mapping);
    if columns.is_empty() {
        return None;
    }

    let mut column_list = Vec::with_capacity(columns.len());
    let mut value_list = Vec::with_capacity(columns.len());
    let mut update_list = Vec::with_capacity(columns.len());
    let mut params = Vec::with_capacity(columns.len());

    for (column, value) in columns {
        let name = bind_name(column);
        column_list.push(column.to_string());
        value_list.push(format!(":{}", name));
        update_list.push(format!("{} = :{}", column, name));
        params.push(BindParam {
            name,
            value: value.to_string(),
        });
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) ON DUPLICATE KEY UPDATE {}",
        mapping.table_name,
        column_list.join(", "),
        value_list.join(", "),
        update_list.join(", ")
    );
    Some(BoundQuery { sql, params })
}

/// Build a plain insert listing only columns with non-empty values.
pub fn build_insert(row: &Row, mapping: &TableMapping) -> Option<BoundQuery> {
    let columns = writable_columns(row, mapping);
    if columns.is_empty() {
        return None;
    }

    let mut column_list = Vec::with_capacity(columns.len());
    let mut value_list = Vec::with_capacity(columns.len());
    let mut params = Vec::with_capacity(columns.len());

    for (column, value) in columns {
        let name = bind_name(column);
        column_list.push(column.to_string());
        value_list.push(format!(":{}", name));
        params.push(BindParam {
            name,
            value: value.to_string(),
        });
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        mapping.table_name,
        column_list.join(", "),
        value_list.join(", ")
    );
    Some(BoundQuery { sql, params })
}

/// Build an update keyed on the primary-key column.
///
/// Returns `None` when no mapped column has a value or the row has no
/// primary-key value to key the update on.
pub fn build_update(row: &Row, mapping: &TableMapping) -> Option<BoundQuery> {
    let pk_value = primary_key_value(row, mapping).filter(|v| !v.is_empty())?;
    let columns = writable_columns(row, mapping);
    if columns.is_empty() {
        return None;
    }

    let mut update_list = Vec::with_capacity(columns.len());
    let mut params = Vec::with_capacity(columns.len() + 1);

    for (column, value) in columns {
        let name = bind_name(column);
        update_list.push(format!("{} = :{}", column, name));
        params.push(BindParam {
            name,
            value: value.to_string(),
        });
    }

    let pk_name = bind_name(&mapping.primary_key);
    if !params.iter().any(|p| p.name == pk_name) {
        params.push(BindParam {
            name: pk_name.clone(),
            value: pk_value.to_string(),
        });
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = :{}",
        mapping.table_name,
        update_list.join(", "),
        mapping.primary_key,
        pk_name
    );
    Some(BoundQuery { sql, params })
}
