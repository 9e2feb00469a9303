//! Configuration for the unification pipeline.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::schema::types::DateFormatConfig;

/// File name of the person extract inside a data directory
pub const PERSONS_FILE: &str = "patients.csv";
/// File name of the visit extract inside a data directory
pub const VISITS_FILE: &str = "encounters.csv";
/// File name of the measurement extract inside a data directory
pub const MEASUREMENTS_FILE: &str = "observations.csv";
/// File name of the unified export
pub const OUTPUT_FILE: &str = "unified_health_data.csv";
/// File name of the SQLite store
pub const DATABASE_FILE: &str = "health_data.db";
/// Table replaced in the SQLite store on every run
pub const DEFAULT_TABLE_NAME: &str = "unified_patient_encounters_labs";

/// How measurements are paired with visits of the same person
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JoinStrategy {
    /// Every measurement of the person is paired with every visit of the person
    #[default]
    PersonOnly,
    /// A measurement is paired with a visit only when its date falls within
    /// `[START - days, STOP + days]`
    DateWindow {
        /// Slack on both sides of the visit, in days
        days: i64,
    },
}

/// Configuration for a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Person extract (one row per individual, key column `Id`)
    pub persons_path: PathBuf,
    /// Visit extract (one row per encounter)
    pub visits_path: PathBuf,
    /// Measurement extract (one row per observation)
    pub measurements_path: PathBuf,
    /// Unified delimited output, overwritten on each run
    pub output_path: PathBuf,
    /// SQLite database holding a copy of the unified table
    pub database_path: PathBuf,
    /// Whether to write the SQLite copy at all
    pub enable_database_sink: bool,
    /// Name of the table replaced in the database
    pub table_name: String,
    /// Field delimiter for both input and output files
    pub delimiter: char,
    /// Rows scanned for type inference; `None` scans the whole file
    pub infer_schema_max_records: Option<usize>,
    /// Pairing rule for the measurement join
    pub join_strategy: JoinStrategy,
    /// Accepted date and date-time layouts
    pub date_format_config: DateFormatConfig,
    /// Show a progress bar on the console
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_data_dir("data")
    }
}

impl PipelineConfig {
    /// Build a configuration that reads and writes the standard file names in `dir`
    pub fn from_data_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            persons_path: dir.join(PERSONS_FILE),
            visits_path: dir.join(VISITS_FILE),
            measurements_path: dir.join(MEASUREMENTS_FILE),
            output_path: dir.join(OUTPUT_FILE),
            database_path: dir.join(DATABASE_FILE),
            enable_database_sink: true,
            table_name: DEFAULT_TABLE_NAME.to_string(),
            delimiter: ',',
            infer_schema_max_records: None,
            join_strategy: JoinStrategy::PersonOnly,
            date_format_config: DateFormatConfig::default(),
            show_progress: true,
        }
    }

    /// Parse a configuration from TOML text; absent keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| PipelineError::Config(format!("Invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// The delimiter as a single byte, as the CSV reader and writer need it
    pub fn delimiter_byte(&self) -> Result<u8> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                PipelineError::Config(format!(
                    "Delimiter must be a single ASCII character, got {:?}",
                    self.delimiter
                ))
            })
    }

    /// Check the configuration for values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        self.delimiter_byte()?;

        if self.table_name.trim().is_empty() {
            return Err(PipelineError::Config(
                "Table name must not be empty".to_string(),
            ));
        }

        if let JoinStrategy::DateWindow { days } = self.join_strategy {
            if days < 0 {
                return Err(PipelineError::Config(format!(
                    "Join window must not be negative, got {days} days"
                )));
            }
        }

        let inputs = [
            &self.persons_path,
            &self.visits_path,
            &self.measurements_path,
        ];
        if inputs.contains(&&self.output_path) {
            return Err(PipelineError::Config(format!(
                "Output path {} would overwrite an input",
                self.output_path.display()
            )));
        }

        Ok(())
    }
}
