//! Key and type normalization of the three extracts.

use std::sync::Arc;

use arrow::array::{Array, TimestampMillisecondArray};

use crate::error::{PipelineError, Result};
use crate::schema::conversions::{coerce_to_timestamp, format_timestamps, to_utf8};
use crate::schema::{CoercionStats, DateFormatConfig, JOIN_KEY, PERSON_ID, PERSON_PROJECTION};
use crate::table::Table;
use crate::utils::logging::log_warning;

/// Visit start column
pub const VISIT_START: &str = "START";
/// Visit end column
pub const VISIT_STOP: &str = "STOP";
/// Measurement date column
pub const MEASUREMENT_DATE: &str = "DATE";
/// Display date derived from the visit start
pub const ENCOUNTER_DATE: &str = "ENCOUNTER_DATE";
/// Display date derived from the measurement date
pub const OBSERVATION_DATE: &str = "OBSERVATION_DATE";
/// Visit class column as named by the extract contract
pub const ENCOUNTER_CLASS: &str = "ENCOUNTER_CLASS";
/// Visit class column as Synthea writes it
pub const ENCOUNTER_CLASS_ALIAS: &str = "ENCOUNTERCLASS";

/// Bring the person table onto the canonical key and demographic projection
pub fn normalize_persons(persons: &Table) -> Result<Table> {
    let renamed = if persons.has_column(JOIN_KEY) {
        log_warning(
            &format!("persons table already has a '{JOIN_KEY}' column, keeping it as key"),
            None,
        );
        persons.clone()
    } else {
        persons.rename_column(PERSON_ID, JOIN_KEY)?
    };

    for column in PERSON_PROJECTION {
        if !renamed.has_column(column) {
            log_warning(
                &format!("Demographic column '{column}' not present, skipping"),
                None,
            );
        }
    }

    let projected = renamed.select(PERSON_PROJECTION)?;
    key_to_utf8(&projected, JOIN_KEY)
}

/// Normalize visit keys and dates
///
/// Returns the coercion statistics for each date column that was present.
pub fn normalize_visits(
    visits: &Table,
    config: &DateFormatConfig,
) -> Result<(Table, Vec<CoercionStats>)> {
    let mut table = key_to_utf8(visits, JOIN_KEY)?;

    if !table.has_column(ENCOUNTER_CLASS) && table.has_column(ENCOUNTER_CLASS_ALIAS) {
        log::info!("Using '{ENCOUNTER_CLASS_ALIAS}' as '{ENCOUNTER_CLASS}'");
        table = table.rename_column(ENCOUNTER_CLASS_ALIAS, ENCOUNTER_CLASS)?;
    }

    let mut stats = Vec::new();
    for column in [VISIT_START, VISIT_STOP] {
        let (parsed, column_stats) = parse_date_column(&table, column, config)?;
        table = parsed;
        stats.extend(column_stats);
    }

    let table = derive_display_date(&table, VISIT_START, ENCOUNTER_DATE, &config.display_format)?;
    Ok((table, stats))
}

/// Normalize measurement keys and dates
pub fn normalize_measurements(
    measurements: &Table,
    config: &DateFormatConfig,
) -> Result<(Table, Vec<CoercionStats>)> {
    let table = key_to_utf8(measurements, JOIN_KEY)?;
    let (table, stats) = parse_date_column(&table, MEASUREMENT_DATE, config)?;
    let table = derive_display_date(&table, MEASUREMENT_DATE, OBSERVATION_DATE, &config.display_format)?;
    Ok((table, stats.into_iter().collect()))
}

/// Cast the key column to text so keys typed differently across files still match
pub fn key_to_utf8(table: &Table, key: &str) -> Result<Table> {
    let column = table.require_column(key)?;
    let utf8 = to_utf8(column)?;
    table.with_column(key, utf8)
}

/// Replace a text column with parsed millisecond timestamps
///
/// Unparseable cells become null. A column that is absent is left absent.
pub fn parse_date_column(
    table: &Table,
    column: &str,
    config: &DateFormatConfig,
) -> Result<(Table, Option<CoercionStats>)> {
    let Some(array) = table.column(column) else {
        log_warning(
            &format!("Date column '{column}' not present in {} table", table.name()),
            None,
        );
        return Ok((table.clone(), None));
    };

    let (timestamps, stats) = coerce_to_timestamp(array, column, config)?;
    if stats.coerced_to_null > 0 {
        log_warning(
            &format!(
                "{} unparseable dates in column '{column}' set to null",
                stats.coerced_to_null
            ),
            None,
        );
    }

    let table = table.with_column(column, Arc::new(timestamps))?;
    Ok((table, Some(stats)))
}

/// Add a display column rendering the dates of `source` with `format`
pub fn derive_display_date(table: &Table, source: &str, target: &str, format: &str) -> Result<Table> {
    let Some(array) = table.column(source) else {
        return Ok(table.clone());
    };

    let timestamps = array
        .as_any()
        .downcast_ref::<TimestampMillisecondArray>()
        .ok_or_else(|| {
            PipelineError::Schema(format!(
                "Column '{source}' has not been parsed as a timestamp"
            ))
        })?;

    let display = format_timestamps(timestamps, format);
    table.with_column(target, Arc::new(display))
}
