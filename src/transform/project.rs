//! Output projection: rename, select and order the unified columns.

use arrow::array::Array;
use arrow::compute::cast;
use arrow::datatypes::DataType;

use crate::error::Result;
use crate::schema::conversions::create_null_array;
use crate::schema::{OUTPUT_COLUMNS, OUTPUT_RENAMES};
use crate::table::Table;
use crate::utils::logging::log_warning;

/// The projected table and the output columns that had to be filled with nulls
#[derive(Debug, Clone)]
pub struct Projection {
    pub table: Table,
    pub backfilled: Vec<String>,
}

/// Rename joined columns to their output names and keep the output columns in order
///
/// An output column with no source is added as an all-null text column, and
/// columns the CSV reader typed as `Null` become text so every sink accepts them.
pub fn project_output(unified: &Table) -> Result<Projection> {
    let mut table = unified.rename_columns(OUTPUT_RENAMES)?;
    let mut backfilled = Vec::new();

    for column in OUTPUT_COLUMNS {
        let replacement = match table.column(column) {
            Some(array) if array.data_type() == &DataType::Null => {
                Some(cast(array.as_ref(), &DataType::Utf8)?)
            }
            Some(_) => None,
            None => {
                log_warning(
                    &format!("Output column '{column}' has no source, filling with nulls"),
                    None,
                );
                backfilled.push((*column).to_string());
                Some(create_null_array(&DataType::Utf8, table.num_rows()))
            }
        };

        if let Some(array) = replacement {
            table = table.with_column(column, array)?;
        }
    }

    let table = table.select(OUTPUT_COLUMNS)?.renamed("output");
    Ok(Projection { table, backfilled })
}
