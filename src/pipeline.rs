//! End-to-end unification run
//!
//! Load, normalize, clean, join, project, then export. The delimited export
//! is the primary output; a failure of the database copy is reported in the
//! summary but does not fail the run.

use std::path::PathBuf;
use std::time::Instant;

use indicatif::ProgressBar;
use serde::Serialize;

use crate::config::{JoinStrategy, PipelineConfig};
use crate::error::Result;
use crate::loader::{SourceTables, load_sources};
use crate::schema::{CoercionStats, JOIN_KEY};
use crate::sink::{SqliteSink, write_csv};
use crate::table::Table;
use crate::transform::clean::{ValueImputation, fill_missing_gender, impute_measurement_values};
use crate::transform::join::{attach_measurements, attach_persons, duplicate_keys, expected_row_count};
use crate::transform::normalize::{normalize_measurements, normalize_persons, normalize_visits};
use crate::transform::project::project_output;
use crate::utils::logging::{
    TableProfile, create_stage_progress_bar, describe_table, finish_progress_bar,
    log_stage_complete, log_table_profile, log_warning,
};

/// Stages counted by the progress bar
const STAGES: u64 = 8;
/// Rows shown when a stage result is logged at debug level
const DEBUG_SAMPLE_ROWS: usize = 5;

/// Result of the optional database copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DatabaseOutcome {
    /// The sink was switched off
    Disabled,
    /// The table was replaced and verified
    Written { table: String, rows: usize },
    /// The write or the verification failed
    Failed { error: String },
}

/// What a run did, stage by stage
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub persons_rows: usize,
    pub visits_rows: usize,
    pub measurements_rows: usize,
    /// Rows after attaching persons to visits; equals `visits_rows`
    /// unless person keys repeat
    pub integrated_visit_rows: usize,
    pub unified_rows: usize,
    pub join_strategy: JoinStrategy,
    pub date_coercions: Vec<CoercionStats>,
    pub genders_filled: usize,
    pub value_imputation: Option<ValueImputation>,
    /// Person keys occurring more than once in the person extract
    pub duplicate_person_keys: Vec<String>,
    /// Output columns with no source column, written as nulls
    pub backfilled_columns: Vec<String>,
    pub output: TableProfile,
    pub output_path: PathBuf,
    pub database: DatabaseOutcome,
}

/// The unified table before export, with its summary so far
#[derive(Debug, Clone)]
pub struct Unified {
    pub table: Table,
    pub summary: PipelineSummary,
}

/// Runs the unification for one configuration
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline, rejecting configurations it cannot run with
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage and write the outputs
    pub fn run(&self) -> Result<PipelineSummary> {
        let start = Instant::now();
        let pb = create_stage_progress_bar(STAGES, self.config.show_progress);

        pb.set_message("loading extracts");
        let sources = load_sources(&self.config)?;
        for table in [&sources.persons, &sources.visits, &sources.measurements] {
            log_table_profile(table, DEBUG_SAMPLE_ROWS);
        }
        pb.inc(1);

        let Unified { table, mut summary } = self.unify(&sources, &pb)?;

        pb.set_message("writing delimited output");
        write_csv(
            &table,
            &self.config.output_path,
            self.config.delimiter_byte()?,
            &self.config.date_format_config.output_datetime_format,
        )?;
        pb.inc(1);

        pb.set_message("writing database copy");
        summary.database = self.persist(&table);
        pb.inc(1);

        finish_progress_bar(&pb, Some("unification complete"));
        log::info!(
            "Unified {} rows into {} in {:?}",
            summary.unified_rows,
            summary.output_path.display(),
            start.elapsed()
        );
        Ok(summary)
    }

    /// Run the in-memory stages on already loaded extracts
    pub fn unify(&self, sources: &SourceTables, pb: &ProgressBar) -> Result<Unified> {
        let date_config = &self.config.date_format_config;

        pb.set_message("normalizing");
        let stage = Instant::now();
        let persons = normalize_persons(&sources.persons)?;
        let (visits, mut date_coercions) = normalize_visits(&sources.visits, date_config)?;
        let (measurements, measurement_dates) =
            normalize_measurements(&sources.measurements, date_config)?;
        date_coercions.extend(measurement_dates);
        log_stage_complete("Normalized visits", visits.num_rows(), visits.num_columns(), stage.elapsed());
        pb.inc(1);

        pb.set_message("cleaning");
        let stage = Instant::now();
        let (persons, genders_filled) = fill_missing_gender(&persons)?;
        let (measurements, value_imputation) = impute_measurement_values(&measurements)?;
        log_stage_complete(
            "Cleaned measurements",
            measurements.num_rows(),
            measurements.num_columns(),
            stage.elapsed(),
        );
        pb.inc(1);

        let duplicate_person_keys = duplicate_keys(&persons, JOIN_KEY)?;
        if !duplicate_person_keys.is_empty() {
            log_warning(
                &format!(
                    "{} person keys occur more than once; their visits will repeat",
                    duplicate_person_keys.len()
                ),
                None,
            );
        }

        pb.set_message("attaching persons");
        let stage = Instant::now();
        let integrated = attach_persons(&visits, &persons)?;
        log_stage_complete(
            "Integrated visits",
            integrated.num_rows(),
            integrated.num_columns(),
            stage.elapsed(),
        );
        log_table_profile(&integrated, DEBUG_SAMPLE_ROWS);
        pb.inc(1);

        pb.set_message("attaching measurements");
        let stage = Instant::now();
        let unified = attach_measurements(&integrated, &measurements, self.config.join_strategy)?;
        if self.config.join_strategy == JoinStrategy::PersonOnly {
            let expected = expected_row_count(&integrated, &measurements, JOIN_KEY)?;
            if expected != unified.num_rows() {
                log_warning(
                    &format!(
                        "Unified table has {} rows, expected {expected}",
                        unified.num_rows()
                    ),
                    None,
                );
            }
        }
        log_stage_complete("Unified", unified.num_rows(), unified.num_columns(), stage.elapsed());
        pb.inc(1);

        pb.set_message("projecting output columns");
        let projection = project_output(&unified)?;
        log_table_profile(&projection.table, DEBUG_SAMPLE_ROWS);
        pb.inc(1);

        let summary = PipelineSummary {
            persons_rows: sources.persons.num_rows(),
            visits_rows: sources.visits.num_rows(),
            measurements_rows: sources.measurements.num_rows(),
            integrated_visit_rows: integrated.num_rows(),
            unified_rows: projection.table.num_rows(),
            join_strategy: self.config.join_strategy,
            date_coercions,
            genders_filled,
            value_imputation,
            duplicate_person_keys,
            backfilled_columns: projection.backfilled,
            output: describe_table(&projection.table),
            output_path: self.config.output_path.clone(),
            database: DatabaseOutcome::Disabled,
        };

        Ok(Unified {
            table: projection.table,
            summary,
        })
    }

    fn persist(&self, table: &Table) -> DatabaseOutcome {
        if !self.config.enable_database_sink {
            log::info!("Database sink disabled, skipping");
            return DatabaseOutcome::Disabled;
        }

        let sink = SqliteSink::new(&self.config.database_path)
            .with_datetime_format(&self.config.date_format_config.output_datetime_format);
        match sink.persist(&self.config.table_name, table) {
            Ok(report) => DatabaseOutcome::Written {
                table: report.table,
                rows: report.rows,
            },
            Err(e) => {
                log_warning(
                    &format!("Database copy failed, delimited output is still complete: {e}"),
                    Some(&self.config.database_path),
                );
                DatabaseOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}

/// Run the pipeline for a configuration
pub fn run(config: PipelineConfig) -> Result<PipelineSummary> {
    Pipeline::new(config)?.run()
}
