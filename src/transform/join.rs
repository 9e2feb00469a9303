//! Left outer joins on the person key.
//!
//! Joins are hash joins: the right table is indexed by key, the left table is
//! walked in order. Output rows follow left order, and for each left row the
//! matching right rows follow right order, so the result is deterministic.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, StringArray, TimestampMillisecondArray, UInt32Array};
use arrow::compute::take;
use arrow::datatypes::{FieldRef, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::config::JoinStrategy;
use crate::error::Result;
use crate::schema::JOIN_KEY;
use crate::schema::conversions::{as_string_array, to_utf8};
use crate::schema::date_utils::epoch_day;
use crate::table::Table;
use crate::transform::normalize::{MEASUREMENT_DATE, VISIT_START, VISIT_STOP};

/// Suffix for visit-side copies of colliding columns
pub const ENCOUNTER_SUFFIX: &str = "_encounter";
/// Suffix for person-side copies of colliding columns
pub const PATIENT_SUFFIX: &str = "_patient";
/// Suffix for measurement-side copies of colliding columns
pub const OBSERVATION_SUFFIX: &str = "_observation";

/// Decides whether a key match between two rows becomes an output row
pub trait PairFilter {
    /// `left_row` and `right_row` index into the left and right tables
    fn accepts(&self, left_row: usize, right_row: usize) -> bool;
}

/// Pairs a measurement with a visit only if it was taken near the visit
///
/// The visit window is `[START - days, STOP + days]` in whole days. A visit
/// without `STOP` is treated as ending on its start day. Rows without a
/// usable date never pair.
#[derive(Debug, Clone)]
pub struct DateWindowFilter {
    visit_windows: Vec<Option<(i64, i64)>>,
    measurement_days: Vec<Option<i64>>,
}

impl DateWindowFilter {
    /// Build the filter from normalized visit and measurement tables
    pub fn new(visits: &Table, measurements: &Table, days: i64) -> Self {
        let starts = epoch_days(visits, VISIT_START);
        let stops = epoch_days(visits, VISIT_STOP);

        let visit_windows = starts
            .iter()
            .zip(stops.iter())
            .map(|(start, stop)| {
                start.map(|s| {
                    let end = stop.unwrap_or(s).max(s);
                    (s - days, end + days)
                })
            })
            .collect();

        Self {
            visit_windows,
            measurement_days: epoch_days(measurements, MEASUREMENT_DATE),
        }
    }
}

impl PairFilter for DateWindowFilter {
    fn accepts(&self, left_row: usize, right_row: usize) -> bool {
        let window = self.visit_windows.get(left_row).copied().flatten();
        let day = self.measurement_days.get(right_row).copied().flatten();
        match (window, day) {
            (Some((from, to)), Some(day)) => from <= day && day <= to,
            _ => false,
        }
    }
}

/// Day numbers of a parsed timestamp column; all `None` when it is absent
fn epoch_days(table: &Table, column: &str) -> Vec<Option<i64>> {
    table
        .column(column)
        .and_then(|array| array.as_any().downcast_ref::<TimestampMillisecondArray>())
        .map_or_else(
            || vec![None; table.num_rows()],
            |timestamps| timestamps.iter().map(|ms| ms.map(epoch_day)).collect(),
        )
}

/// Left outer join of `left` and `right` on `key`
///
/// Every left row appears at least once. Non-key columns present on both
/// sides are renamed with `suffixes.0` (left) and `suffixes.1` (right). Right
/// columns are null where a left row found no accepted match. Null keys never
/// match.
pub fn left_join(
    left: &Table,
    right: &Table,
    key: &str,
    suffixes: (&str, &str),
    filter: Option<&dyn PairFilter>,
    name: &str,
) -> Result<Table> {
    let left_keys = key_strings(left, key)?;
    let right_keys = key_strings(right, key)?;

    let mut index: FxHashMap<&str, SmallVec<[u32; 4]>> = FxHashMap::default();
    for (row, value) in right_keys.iter().enumerate() {
        if let Some(value) = value {
            index.entry(value).or_default().push(to_index(row)?);
        }
    }

    let mut left_indices: Vec<u32> = Vec::with_capacity(left.num_rows());
    let mut right_indices: Vec<Option<u32>> = Vec::with_capacity(left.num_rows());

    for (row, value) in left_keys.iter().enumerate() {
        let left_row = to_index(row)?;
        let emitted = right_indices.len();

        if let Some(matches) = value.and_then(|v| index.get(v)) {
            for &right_row in matches {
                if filter.is_none_or(|f| f.accepts(row, right_row as usize)) {
                    left_indices.push(left_row);
                    right_indices.push(Some(right_row));
                }
            }
        }

        if right_indices.len() == emitted {
            left_indices.push(left_row);
            right_indices.push(None);
        }
    }

    let left_indices = UInt32Array::from(left_indices);
    let right_indices = UInt32Array::from(right_indices);

    let left_schema = left.schema();
    let right_schema = right.schema();
    let collides_left = |name: &str| name != key && right_schema.index_of(name).is_ok();
    let collides_right = |name: &str| name != key && left_schema.index_of(name).is_ok();

    let mut fields: Vec<FieldRef> = Vec::with_capacity(left.num_columns() + right.num_columns());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(fields.capacity());

    for (field, array) in left_schema.fields().iter().zip(left.batch().columns()) {
        let name = if collides_left(field.name()) {
            format!("{}{}", field.name(), suffixes.0)
        } else {
            field.name().clone()
        };
        fields.push(Arc::new(field.as_ref().clone().with_name(name)));
        columns.push(take(array.as_ref(), &left_indices, None)?);
    }

    for (field, array) in right_schema.fields().iter().zip(right.batch().columns()) {
        if field.name() == key {
            continue;
        }
        let name = if collides_right(field.name()) {
            format!("{}{}", field.name(), suffixes.1)
        } else {
            field.name().clone()
        };
        fields.push(Arc::new(
            field.as_ref().clone().with_name(name).with_nullable(true),
        ));
        columns.push(take(array.as_ref(), &right_indices, None)?);
    }

    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
    Ok(Table::new(name, batch))
}

/// Visits ⟕ Persons on `PATIENT`
pub fn attach_persons(visits: &Table, persons: &Table) -> Result<Table> {
    left_join(
        visits,
        persons,
        JOIN_KEY,
        (ENCOUNTER_SUFFIX, PATIENT_SUFFIX),
        None,
        "integrated_visits",
    )
}

/// IntegratedVisits ⟕ Measurements on `PATIENT` under the given strategy
pub fn attach_measurements(
    integrated_visits: &Table,
    measurements: &Table,
    strategy: JoinStrategy,
) -> Result<Table> {
    let window;
    let filter: Option<&dyn PairFilter> = match strategy {
        JoinStrategy::PersonOnly => None,
        JoinStrategy::DateWindow { days } => {
            window = DateWindowFilter::new(integrated_visits, measurements, days);
            Some(&window)
        }
    };

    left_join(
        integrated_visits,
        measurements,
        JOIN_KEY,
        (ENCOUNTER_SUFFIX, OBSERVATION_SUFFIX),
        filter,
        "unified",
    )
}

/// Row count of a person-only join: each left row contributes
/// `max(1, right rows sharing its key)`
pub fn expected_row_count(left: &Table, right: &Table, key: &str) -> Result<usize> {
    let left_keys = key_strings(left, key)?;
    let right_keys = key_strings(right, key)?;

    let mut counts: FxHashMap<&str, usize> = FxHashMap::default();
    for value in right_keys.iter().flatten() {
        *counts.entry(value).or_default() += 1;
    }

    Ok(left_keys
        .iter()
        .map(|value| value.and_then(|v| counts.get(v).copied()).unwrap_or(0).max(1))
        .sum())
}

/// Keys of the table whose value occurs more than once
pub fn duplicate_keys(table: &Table, key: &str) -> Result<Vec<String>> {
    let keys = key_strings(table, key)?;
    let mut counts: FxHashMap<&str, usize> = FxHashMap::default();
    for value in keys.iter().flatten() {
        *counts.entry(value).or_default() += 1;
    }

    Ok(counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(k, _)| k.to_string())
        .sorted()
        .collect())
}

fn key_strings(table: &Table, key: &str) -> Result<StringArray> {
    let column = table.require_column(key)?;
    let utf8 = to_utf8(column)?;
    Ok(as_string_array(&utf8, key)?.clone())
}

fn to_index(row: usize) -> Result<u32> {
    u32::try_from(row).map_err(|_| {
        ArrowError::ComputeError(format!("Row {row} exceeds the join index range")).into()
    })
}
