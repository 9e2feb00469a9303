//! Console inspection of tables
//!
//! Column profiles and head samples, comparable to a data-frame `info()` and
//! `head()`, written to the debug log.

use arrow::array::Array;
use arrow::util::pretty::pretty_format_batches;
use serde::Serialize;

use crate::table::Table;

/// Type and null statistics for one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub data_type: String,
    pub non_null: usize,
}

/// Shape and column statistics of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableProfile {
    pub name: String,
    pub rows: usize,
    pub columns: Vec<ColumnProfile>,
}

/// Profile every column of a table
#[must_use]
pub fn describe_table(table: &Table) -> TableProfile {
    let batch = table.batch();
    let columns = batch
        .schema()
        .fields()
        .iter()
        .zip(batch.columns())
        .map(|(field, array)| ColumnProfile {
            name: field.name().clone(),
            data_type: field.data_type().to_string(),
            non_null: array.len() - array.null_count(),
        })
        .collect();

    TableProfile {
        name: table.name().to_string(),
        rows: table.num_rows(),
        columns,
    }
}

/// Log the profile and the first `sample_rows` rows of a table at debug level
pub fn log_table_profile(table: &Table, sample_rows: usize) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }

    let profile = describe_table(table);
    log::debug!("{} table: {} rows", profile.name, profile.rows);
    for column in &profile.columns {
        log::debug!(
            "  {:<28} {:<32} {} non-null",
            column.name,
            column.data_type,
            column.non_null
        );
    }

    let head = table.batch().slice(0, sample_rows.min(table.num_rows()));
    match pretty_format_batches(&[head]) {
        Ok(rendered) => log::debug!("First rows of {} table:\n{rendered}", profile.name),
        Err(e) => log::debug!("Could not render sample of {} table: {e}", profile.name),
    }
}
