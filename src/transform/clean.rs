//! Missing-value policy.
//!
//! Exactly two columns are imputed: `GENDER` on the person table and `VALUE`
//! on the measurement table. Everything else keeps its nulls.

use std::sync::Arc;

use arrow::array::Float64Array;
use serde::Serialize;

use crate::error::Result;
use crate::schema::CoercionStats;
use crate::schema::conversions::{
    as_string_array, coerce_to_f64, fill_null_floats, fill_null_strings, to_utf8,
};
use crate::table::Table;
use crate::utils::logging::log_warning;

/// Gender column on the person table
pub const GENDER: &str = "GENDER";
/// Literal used for an absent gender
pub const UNKNOWN_GENDER: &str = "Unknown";
/// Measurement value column
pub const VALUE: &str = "VALUE";
/// Fill value when the value column has no numeric entries at all
pub const VALUE_FALLBACK: f64 = 0.0;

/// What the value imputation did
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueImputation {
    /// Outcome of the numeric coercion
    pub coercion: CoercionStats,
    /// Median of the numeric values, if there were any
    pub median: Option<f64>,
    /// Value written into every null cell
    pub fill_value: f64,
    /// Number of cells filled
    pub filled: usize,
}

/// Replace absent genders with `"Unknown"`; returns the number filled
pub fn fill_missing_gender(persons: &Table) -> Result<(Table, usize)> {
    let Some(column) = persons.column(GENDER) else {
        log_warning(
            &format!("Column '{GENDER}' not present in {} table", persons.name()),
            None,
        );
        return Ok((persons.clone(), 0));
    };

    let strings = to_utf8(column)?;
    let strings = as_string_array(&strings, GENDER)?;
    let (filled_array, filled) = fill_null_strings(strings, UNKNOWN_GENDER);

    if filled > 0 {
        log::info!("Filled {filled} missing {GENDER} values with '{UNKNOWN_GENDER}'");
    }

    let table = persons.with_column(GENDER, Arc::new(filled_array))?;
    Ok((table, filled))
}

/// Coerce measurement values to numbers and impute the gaps with the median
///
/// Non-numeric text becomes null first, then every null is replaced by the
/// median of the remaining numbers. When no number is left to take a median
/// of, the fill value is `0`.
pub fn impute_measurement_values(measurements: &Table) -> Result<(Table, Option<ValueImputation>)> {
    let Some(column) = measurements.column(VALUE) else {
        log_warning(
            &format!("Column '{VALUE}' not present in {} table", measurements.name()),
            None,
        );
        return Ok((measurements.clone(), None));
    };

    let (values, coercion) = coerce_to_f64(column, VALUE)?;
    if coercion.coerced_to_null > 0 {
        log::info!(
            "{} non-numeric {VALUE} entries treated as missing",
            coercion.coerced_to_null
        );
    }

    let median = median(&values);
    let fill_value = median.unwrap_or(VALUE_FALLBACK);
    let (filled_array, filled) = fill_null_floats(&values, fill_value);

    match median {
        Some(m) => log::info!("Filled {filled} missing {VALUE} entries with median {m}"),
        None => log::info!(
            "No numeric {VALUE} entries; filled {filled} entries with {VALUE_FALLBACK}"
        ),
    }

    let table = measurements.with_column(VALUE, Arc::new(filled_array))?;
    Ok((
        table,
        Some(ValueImputation {
            coercion,
            median,
            fill_value,
            filled,
        }),
    ))
}

/// Median of the non-null values; the mean of the two middle values for an
/// even count. `None` when there are no values.
#[must_use]
pub fn median(values: &Float64Array) -> Option<f64> {
    let mut present: Vec<f64> = values.iter().flatten().collect();
    if present.is_empty() {
        return None;
    }

    present.sort_by(f64::total_cmp);
    let mid = present.len() / 2;
    if present.len() % 2 == 0 {
        Some((present[mid - 1] + present[mid]) / 2.0)
    } else {
        Some(present[mid])
    }
}
