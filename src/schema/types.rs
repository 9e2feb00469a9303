//! Core types for column reconciliation.

use serde::{Deserialize, Serialize};

/// Layout for date-time cells in both sinks; fractional seconds are written
/// only when present
pub const DEFAULT_OUTPUT_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Configuration for date format handling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateFormatConfig {
    /// Date-time layouts tried before the date-only layouts
    pub datetime_formats: Vec<String>,
    /// Date layouts; a matching value is taken at midnight
    pub date_formats: Vec<String>,
    /// Layout of the derived `YYYY-MM-DD` display columns
    pub display_format: String,
    /// Layout for date-time columns in the delimited output and the store
    pub output_datetime_format: String,
    /// Enable heuristic format detection
    pub enable_format_detection: bool,
}

impl Default for DateFormatConfig {
    fn default() -> Self {
        Self {
            datetime_formats: vec![
                "%Y-%m-%dT%H:%M:%S%.f".to_string(), // 2019-02-17T05:07:38.123
                "%Y-%m-%dT%H:%M:%S".to_string(),    // 2019-02-17T05:07:38
                "%Y-%m-%d %H:%M:%S%.f".to_string(), // 2019-02-17 05:07:38.123
                "%Y-%m-%d %H:%M:%S".to_string(),    // 2019-02-17 05:07:38
                "%Y-%m-%d %H:%M".to_string(),       // 2019-02-17 05:07
                "%m/%d/%Y %H:%M:%S".to_string(),    // 02/17/2019 05:07:38
                "%m/%d/%Y %H:%M".to_string(),       // 02/17/2019 05:07
            ],
            date_formats: vec![
                "%Y-%m-%d".to_string(), // ISO format: 2023-01-15
                "%m/%d/%Y".to_string(), // US: 01/15/2023
                "%d/%m/%Y".to_string(), // UK: 15/01/2023
                "%d-%m-%Y".to_string(), // European: 15-01-2023
                "%d.%m.%Y".to_string(), // 15.01.2023
                "%Y/%m/%d".to_string(), // 2023/01/15
                "%Y%m%d".to_string(),   // Compact: 20230115
                "%d %b %Y".to_string(), // 15 Jan 2023
                "%d %B %Y".to_string(), // 15 January 2023
            ],
            display_format: "%Y-%m-%d".to_string(),
            output_datetime_format: DEFAULT_OUTPUT_DATETIME_FORMAT.to_string(),
            enable_format_detection: true,
        }
    }
}

/// Outcome of coercing one column cell by cell
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoercionStats {
    /// Column that was coerced
    pub column: String,
    /// Non-null cells that parsed
    pub parsed: usize,
    /// Non-null cells that failed to parse and became null
    pub coerced_to_null: usize,
    /// Cells that were null before coercion
    pub already_null: usize,
}

impl CoercionStats {
    pub(crate) fn new(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ..Self::default()
        }
    }
}
