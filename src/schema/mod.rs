//! Column layouts of the three extracts and the unified output.

pub mod conversions;
pub mod date_utils;
pub mod types;

pub use types::{CoercionStats, DEFAULT_OUTPUT_DATETIME_FORMAT, DateFormatConfig};

use arrow::datatypes::Schema;

/// Canonical join attribute shared by all three tables after normalization
pub const JOIN_KEY: &str = "PATIENT";
/// Primary key of the person extract before normalization
pub const PERSON_ID: &str = "Id";

/// Columns read as text whatever their cells look like
///
/// Keys and postal codes lose leading zeros as integers, and date-times
/// inferred by the reader would lose their UTC offset before parsing.
pub const TEXT_COLUMNS: &[&str] = &[JOIN_KEY, PERSON_ID, "ZIP", "START", "STOP", "DATE"];

/// Columns the person extract must provide
pub const PERSON_COLUMNS: &[&str] = &[
    "Id",
    "BIRTHDATE",
    "GENDER",
    "RACE",
    "ETHNICITY",
    "MARITAL",
    "COUNTY",
    "STATE",
    "CITY",
    "ZIP",
];

/// Demographic columns kept from the person extract, key first
pub const PERSON_PROJECTION: &[&str] = &[
    JOIN_KEY,
    "BIRTHDATE",
    "GENDER",
    "RACE",
    "ETHNICITY",
    "MARITAL",
    "COUNTY",
    "STATE",
    "CITY",
    "ZIP",
];

/// Columns the visit extract must provide
pub const VISIT_COLUMNS: &[&str] = &[
    "PATIENT",
    "START",
    "STOP",
    "ENCOUNTER_CLASS",
    "CODE",
    "DESCRIPTION",
    "REASONCODE",
    "REASONDESCRIPTION",
    "Id",
];

/// Columns the measurement extract must provide
pub const MEASUREMENT_COLUMNS: &[&str] = &[
    "PATIENT",
    "DATE",
    "CODE",
    "DESCRIPTION",
    "VALUE",
    "UNIT",
    "TYPE",
    "Id",
];

/// Renames applied to the joined table before projection
pub const OUTPUT_RENAMES: &[(&str, &str)] = &[
    ("Id_encounter", "Encounter_ID"),
    ("Id_observation", "Observation_ID"),
    ("CODE_encounter", "Encounter_Code"),
    ("DESCRIPTION_encounter", "Encounter_Description"),
    ("CODE_observation", "Observation_Code"),
    ("DESCRIPTION_observation", "Observation_Description"),
    ("VALUE", "Observation_Value"),
    ("UNIT", "Observation_Unit"),
    ("TYPE", "Observation_Type"),
    ("START", "Encounter_Start_DateTime"),
    ("STOP", "Encounter_End_DateTime"),
    ("ENCOUNTER_CLASS", "Encounter_Type_Class"),
];

/// Final column order of the unified table
pub const OUTPUT_COLUMNS: &[&str] = &[
    "PATIENT",
    "GENDER",
    "BIRTHDATE",
    "CITY",
    "STATE",
    "ZIP",
    "Encounter_ID",
    "Encounter_Start_DateTime",
    "Encounter_End_DateTime",
    "Encounter_Type_Class",
    "Encounter_Code",
    "Encounter_Description",
    "REASONCODE",
    "REASONDESCRIPTION",
    "ENCOUNTER_DATE",
    "Observation_ID",
    "OBSERVATION_DATE",
    "Observation_Code",
    "Observation_Description",
    "Observation_Value",
    "Observation_Unit",
    "Observation_Type",
];

/// Column presence report for one loaded table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaReport {
    /// Logical table name
    pub table: String,
    /// Required columns that are absent
    pub missing: Vec<String>,
    /// Columns present but not required
    pub extra: Vec<String>,
}

impl SchemaReport {
    /// Compare a schema against the required column list
    #[must_use]
    pub fn check(table: &str, schema: &Schema, required: &[&str]) -> Self {
        let missing = required
            .iter()
            .filter(|name| schema.index_of(name).is_err())
            .map(|name| (*name).to_string())
            .collect();

        let extra = schema
            .fields()
            .iter()
            .map(|f| f.name())
            .filter(|name| !required.contains(&name.as_str()))
            .cloned()
            .collect();

        Self {
            table: table.to_string(),
            missing,
            extra,
        }
    }

    /// Whether every required column is present
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Whether a specific required column is absent
    #[must_use]
    pub fn is_missing(&self, column: &str) -> bool {
        self.missing.iter().any(|m| m == column)
    }
}
