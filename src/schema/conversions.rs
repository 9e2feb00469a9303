//! Module for converting between different array types.
//!
//! All coercions here follow the same policy: a cell that cannot be converted
//! becomes null and is counted, it never fails the whole column.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, Float64Array, Float64Builder, StringArray, StringBuilder,
    TimestampMillisecondArray, TimestampMillisecondBuilder,
};
use arrow::compute::kernels::cast;
use arrow::datatypes::DataType;
use log::trace;

use crate::error::{PipelineError, Result};
use crate::schema::date_utils::{datetime_from_millis, parse_datetime_string};
use crate::schema::types::{CoercionStats, DateFormatConfig};

/// Check if a data type is numeric
#[must_use]
pub const fn is_numeric(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float16
            | DataType::Float32
            | DataType::Float64
    )
}

/// Cast any array to `Utf8`, returning it unchanged when it already is
pub fn to_utf8(array: &ArrayRef) -> Result<ArrayRef> {
    if array.data_type() == &DataType::Utf8 {
        return Ok(Arc::clone(array));
    }
    Ok(cast::cast(array.as_ref(), &DataType::Utf8)?)
}

/// Downcast an array that is known to be `Utf8`
pub fn as_string_array<'a>(array: &'a ArrayRef, column: &str) -> Result<&'a StringArray> {
    array.as_any().downcast_ref::<StringArray>().ok_or_else(|| {
        PipelineError::Schema(format!(
            "Column '{column}' is {:?}, expected Utf8",
            array.data_type()
        ))
    })
}

/// Parse a column of date or date-time values into millisecond timestamps
///
/// Columns the CSV reader already typed as dates or timestamps go through
/// their string rendering, so every source type follows the same rules.
pub fn coerce_to_timestamp(
    array: &ArrayRef,
    column: &str,
    config: &DateFormatConfig,
) -> Result<(TimestampMillisecondArray, CoercionStats)> {
    let strings = to_utf8(array)?;
    let strings = as_string_array(&strings, column)?;

    let mut stats = CoercionStats::new(column);
    let mut builder = TimestampMillisecondBuilder::with_capacity(strings.len());

    for i in 0..strings.len() {
        if strings.is_null(i) {
            stats.already_null += 1;
            builder.append_null();
            continue;
        }

        let value = strings.value(i);
        if let Some(dt) = parse_datetime_string(value, config) {
            stats.parsed += 1;
            builder.append_value(dt.and_utc().timestamp_millis());
        } else {
            trace!(
                "{}",
                PipelineError::DateParse {
                    column: column.to_string(),
                    value: value.to_string(),
                }
            );
            stats.coerced_to_null += 1;
            builder.append_null();
        }
    }

    Ok((builder.finish(), stats))
}

/// Render timestamps with a chrono format string; nulls stay null
#[must_use]
pub fn format_timestamps(array: &TimestampMillisecondArray, format: &str) -> StringArray {
    let mut builder = StringBuilder::with_capacity(array.len(), array.len() * format.len());

    for i in 0..array.len() {
        if array.is_null(i) {
            builder.append_null();
            continue;
        }
        match datetime_from_millis(array.value(i)) {
            Some(dt) => builder.append_value(dt.format(format).to_string()),
            None => builder.append_null(),
        }
    }

    builder.finish()
}

/// Coerce a column to `Float64`, turning anything non-numeric into null
///
/// Numeric columns are cast directly. Text is trimmed and parsed; values that
/// parse to NaN or infinity count as non-numeric.
pub fn coerce_to_f64(array: &ArrayRef, column: &str) -> Result<(Float64Array, CoercionStats)> {
    let mut stats = CoercionStats::new(column);

    if is_numeric(array.data_type()) {
        let cast_array = cast::cast(array.as_ref(), &DataType::Float64)?;
        let floats = cast_array
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| PipelineError::Schema(format!("Column '{column}' did not cast to Float64")))?
            .clone();
        stats.already_null = floats.null_count();
        stats.parsed = floats.len() - floats.null_count();
        return Ok((floats, stats));
    }

    let strings = to_utf8(array)?;
    let strings = as_string_array(&strings, column)?;
    let mut builder = Float64Builder::with_capacity(strings.len());

    for i in 0..strings.len() {
        if strings.is_null(i) {
            stats.already_null += 1;
            builder.append_null();
            continue;
        }

        let value = strings.value(i);
        match value.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => {
                stats.parsed += 1;
                builder.append_value(v);
            }
            _ => {
                trace!(
                    "{}",
                    PipelineError::NumericCoercion {
                        column: column.to_string(),
                        value: value.to_string(),
                    }
                );
                stats.coerced_to_null += 1;
                builder.append_null();
            }
        }
    }

    Ok((builder.finish(), stats))
}

/// Replace nulls in a text column with a literal; returns the number filled
#[must_use]
pub fn fill_null_strings(array: &StringArray, fill: &str) -> (StringArray, usize) {
    let filled = array.null_count();
    let values: StringArray = array
        .iter()
        .map(|value| Some(value.unwrap_or(fill)))
        .collect();
    (values, filled)
}

/// Replace nulls in a numeric column with a value; returns the number filled
#[must_use]
pub fn fill_null_floats(array: &Float64Array, fill: f64) -> (Float64Array, usize) {
    let filled = array.null_count();
    let values: Float64Array = array
        .iter()
        .map(|value| Some(value.unwrap_or(fill)))
        .collect();
    (values, filled)
}

/// Create an all-null array of the specified type and length
#[must_use]
pub fn create_null_array(data_type: &DataType, length: usize) -> ArrayRef {
    arrow::array::new_null_array(data_type, length)
}
