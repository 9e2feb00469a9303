//! Optional `SQLite` copy of the unified table.
//!
//! The table is replaced wholesale inside one transaction, then read back to
//! confirm the row count. Connections are opened per call and closed before
//! returning.

use std::path::{Path, PathBuf};
use std::time::Instant;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, TimestampMillisecondArray,
};
use arrow::datatypes::DataType;
use arrow::util::display::array_value_to_string;
use itertools::Itertools;
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use serde::Serialize;

use crate::error::util::ensure_parent_dir;
use crate::error::{PipelineError, Result};
use crate::schema::DEFAULT_OUTPUT_DATETIME_FORMAT;
use crate::schema::date_utils::datetime_from_millis;
use crate::table::Table;
use crate::utils::logging::{log_operation_complete, log_operation_start};

/// Rows read back after writing
pub const SAMPLE_ROWS: usize = 5;

/// What the store holds after a successful write
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistReport {
    /// Table name in the store
    pub table: String,
    /// `COUNT(*)` of the written table
    pub rows: usize,
    /// First rows as text, in column order
    pub sample: Vec<Vec<Option<String>>>,
}

/// Writes tables into a `SQLite` database file
#[derive(Debug, Clone)]
pub struct SqliteSink {
    path: PathBuf,
    datetime_format: String,
}

impl SqliteSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            datetime_format: DEFAULT_OUTPUT_DATETIME_FORMAT.to_string(),
        }
    }

    /// Render timestamp cells with `format`, as the delimited export does
    #[must_use]
    pub fn with_datetime_format(mut self, format: &str) -> Self {
        self.datetime_format = format.to_string();
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace `table_name` with the contents of `table` and verify the write
    pub fn persist(&self, table_name: &str, table: &Table) -> Result<PersistReport> {
        let start = Instant::now();
        log_operation_start(&format!("Persisting table '{table_name}' to"), &self.path);

        ensure_parent_dir(&self.path)?;
        let mut conn = Connection::open(&self.path)?;

        write_table(&mut conn, table_name, table, &self.datetime_format)?;
        let report = verify_table(&conn, table_name)?;

        conn.close().map_err(|(_, e)| PipelineError::Sqlite(e))?;

        if report.rows != table.num_rows() {
            return Err(PipelineError::PersistedStore(format!(
                "Table '{table_name}' holds {} rows, expected {}",
                report.rows,
                table.num_rows()
            )));
        }

        log_operation_complete("persisted", &self.path, report.rows, Some(start.elapsed()));
        Ok(report)
    }
}

/// Convenience wrapper around [`SqliteSink::persist`]
pub fn persist_table(db_path: &Path, table_name: &str, table: &Table) -> Result<PersistReport> {
    SqliteSink::new(db_path).persist(table_name, table)
}

fn write_table(
    conn: &mut Connection,
    table_name: &str,
    table: &Table,
    datetime_format: &str,
) -> Result<()> {
    let schema = table.schema();
    if schema.fields().is_empty() {
        return Err(PipelineError::PersistedStore(format!(
            "Table '{table_name}' has no columns"
        )));
    }

    let quoted_table = quote_identifier(table_name);
    let column_defs = schema
        .fields()
        .iter()
        .map(|field| {
            format!(
                "{} {}",
                quote_identifier(field.name()),
                column_affinity(field.data_type())
            )
        })
        .join(", ");
    let placeholders = (1..=schema.fields().len()).map(|i| format!("?{i}")).join(", ");

    let tx = conn.transaction()?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {quoted_table}; CREATE TABLE {quoted_table} ({column_defs});"
    ))?;

    {
        let mut stmt = tx.prepare(&format!("INSERT INTO {quoted_table} VALUES ({placeholders})"))?;

        let columns = table.batch().columns();
        for row in 0..table.num_rows() {
            let values = columns
                .iter()
                .map(|array| cell_value(array, row, datetime_format))
                .collect::<Result<Vec<Value>>>()?;
            stmt.execute(params_from_iter(values))?;
        }
    }

    tx.commit()?;
    Ok(())
}

fn verify_table(conn: &Connection, table_name: &str) -> Result<PersistReport> {
    let quoted_table = quote_identifier(table_name);

    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {quoted_table}"), [], |row| {
        row.get(0)
    })?;
    let rows = usize::try_from(count).map_err(|_| {
        PipelineError::PersistedStore(format!("Negative row count {count} for '{table_name}'"))
    })?;

    let mut stmt = conn.prepare(&format!("SELECT * FROM {quoted_table} LIMIT {SAMPLE_ROWS}"))?;
    let column_count = stmt.column_count();
    let sample = stmt
        .query_map([], |row| {
            (0..column_count)
                .map(|i| row.get::<_, Value>(i).map(value_to_text))
                .collect::<rusqlite::Result<Vec<_>>>()
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    log::info!("Table '{table_name}' in store holds {rows} rows");
    for row in &sample {
        log::debug!("  {row:?}");
    }

    Ok(PersistReport {
        table: table_name.to_string(),
        rows,
        sample,
    })
}

/// Column type affinity for an Arrow type
#[must_use]
pub const fn column_affinity(data_type: &DataType) -> &'static str {
    match data_type {
        DataType::Float16 | DataType::Float32 | DataType::Float64 => "REAL",
        DataType::Boolean
        | DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => "INTEGER",
        _ => "TEXT",
    }
}

fn cell_value(array: &ArrayRef, row: usize, datetime_format: &str) -> Result<Value> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }

    if let Some(timestamps) = array.as_any().downcast_ref::<TimestampMillisecondArray>() {
        return Ok(datetime_from_millis(timestamps.value(row)).map_or(Value::Null, |dt| {
            Value::Text(dt.format(datetime_format).to_string())
        }));
    }
    if let Some(flags) = array.as_any().downcast_ref::<BooleanArray>() {
        return Ok(Value::Integer(i64::from(flags.value(row))));
    }

    if let Some(floats) = array.as_any().downcast_ref::<Float64Array>() {
        return Ok(Value::Real(floats.value(row)));
    }
    if let Some(ints) = array.as_any().downcast_ref::<Int64Array>() {
        return Ok(Value::Integer(ints.value(row)));
    }

    Ok(Value::Text(array_value_to_string(array, row)?))
}

fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(s) => Some(s),
        Value::Blob(b) => Some(format!("<{} bytes>", b.len())),
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
