//! Delimited file loading utilities

use std::io::{Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use arrow::csv::ReaderBuilder;
use arrow::csv::reader::Format;
use arrow::datatypes::{DataType, FieldRef, Schema};
use arrow::record_batch::RecordBatch;

use crate::config::PipelineConfig;
use crate::error::util::{require_input_file, safe_open_file};
use crate::error::{PipelineError, Result};
use crate::schema::{
    JOIN_KEY, MEASUREMENT_COLUMNS, PERSON_COLUMNS, PERSON_ID, SchemaReport, TEXT_COLUMNS,
    VISIT_COLUMNS,
};
use crate::table::Table;
use crate::utils::logging::{log_operation_complete, log_operation_start, log_warning};

/// Rows per batch handed out by the CSV reader
pub const DEFAULT_BATCH_SIZE: usize = 16384;

/// Options for reading one delimited file
#[derive(Debug, Clone, Copy)]
pub struct CsvOptions {
    pub delimiter: u8,
    /// Rows scanned for type inference; `None` scans the whole file
    pub infer_schema_max_records: Option<usize>,
    pub batch_size: usize,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            infer_schema_max_records: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl CsvOptions {
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            delimiter: config.delimiter_byte()?,
            infer_schema_max_records: config.infer_schema_max_records,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }
}

/// The three extracts as loaded from disk
#[derive(Debug, Clone)]
pub struct SourceTables {
    pub persons: Table,
    pub visits: Table,
    pub measurements: Table,
}

/// Read a delimited file with a header row into a single table
///
/// Column types are inferred from the header and cell contents, except for
/// [`TEXT_COLUMNS`] which are always read as text. Empty cells are read as
/// nulls.
pub fn read_csv(path: &Path, role: &str, options: &CsvOptions) -> Result<Table> {
    let start = Instant::now();
    log_operation_start(&format!("Reading {role} from"), path);

    let mut file = safe_open_file(path, role)?;

    let format = Format::default()
        .with_header(true)
        .with_delimiter(options.delimiter);
    let (schema, scanned) = format
        .infer_schema(&mut file, options.infer_schema_max_records)
        .map_err(|e| {
            PipelineError::Schema(format!(
                "Failed to infer schema of {role} file {}: {e}",
                path.display()
            ))
        })?;
    log::debug!("Inferred {role} schema from {scanned} records: {schema:?}");

    file.seek(SeekFrom::Start(0))?;

    let schema = Arc::new(with_text_columns(&schema, TEXT_COLUMNS));
    let reader = ReaderBuilder::new(Arc::clone(&schema))
        .with_header(true)
        .with_delimiter(options.delimiter)
        .with_batch_size(options.batch_size)
        .build(file)?;

    let batches = reader.collect::<std::result::Result<Vec<RecordBatch>, _>>()?;
    let table = Table::from_batches(role, schema, &batches)?;

    log_operation_complete("read", path, table.num_rows(), Some(start.elapsed()));
    Ok(table)
}

/// Override the inferred type of the named columns with `Utf8`
fn with_text_columns(schema: &Schema, names: &[&str]) -> Schema {
    let fields: Vec<FieldRef> = schema
        .fields()
        .iter()
        .map(|field| {
            if names.contains(&field.name().as_str()) && field.data_type() != &DataType::Utf8 {
                Arc::new(field.as_ref().clone().with_data_type(DataType::Utf8))
            } else {
                Arc::clone(field)
            }
        })
        .collect();
    Schema::new_with_metadata(fields, schema.metadata().clone())
}

/// Compare a table with its required columns
///
/// Missing columns are logged; a missing join key is an error because no
/// join can be performed without it.
pub fn check_required_columns(table: &Table, required: &[&str], key: &str) -> Result<SchemaReport> {
    let report = SchemaReport::check(table.name(), &table.schema(), required);

    if report.is_missing(key) {
        return Err(PipelineError::Schema(format!(
            "The {} table has no '{key}' column",
            table.name()
        )));
    }

    if report.is_complete() {
        log::debug!("All expected columns present in {} table", table.name());
    }
    for column in &report.missing {
        log_warning(
            &format!("Column '{column}' missing from {} table", table.name()),
            None,
        );
    }

    Ok(report)
}

/// Load the person, visit and measurement extracts
///
/// All three paths are checked before any file is parsed, so a missing
/// extract stops the run without partial work.
pub fn load_sources(config: &PipelineConfig) -> Result<SourceTables> {
    let inputs = [
        ("persons", config.persons_path.as_path()),
        ("visits", config.visits_path.as_path()),
        ("measurements", config.measurements_path.as_path()),
    ];
    for (role, path) in inputs {
        require_input_file(path, role)?;
    }

    let options = CsvOptions::from_config(config)?;

    let persons = read_csv(&config.persons_path, "persons", &options)?;
    check_required_columns(&persons, PERSON_COLUMNS, PERSON_ID)?;

    let visits = read_csv(&config.visits_path, "visits", &options)?;
    check_required_columns(&visits, VISIT_COLUMNS, JOIN_KEY)?;

    let measurements = read_csv(&config.measurements_path, "measurements", &options)?;
    check_required_columns(&measurements, MEASUREMENT_COLUMNS, JOIN_KEY)?;

    Ok(SourceTables {
        persons,
        visits,
        measurements,
    })
}
