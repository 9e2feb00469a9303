use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use health_unify::{DatabaseOutcome, JoinStrategy, Pipeline, PipelineConfig};
use log::{error, info, warn};

#[derive(Parser, Debug)]
#[command(about = "Unify patient, encounter and observation extracts into one table")]
struct Cli {
    /// TOML configuration file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding patients.csv, encounters.csv and observations.csv.
    /// Outputs are written there too unless given explicitly.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[arg(long)]
    persons: Option<PathBuf>,

    #[arg(long)]
    visits: Option<PathBuf>,

    #[arg(long)]
    measurements: Option<PathBuf>,

    /// Unified delimited output
    #[arg(long)]
    output: Option<PathBuf>,

    /// SQLite database for the table copy
    #[arg(long)]
    database: Option<PathBuf>,

    /// Skip the SQLite copy
    #[arg(long, default_value_t = false)]
    no_database: bool,

    /// Table name in the SQLite database
    #[arg(long)]
    table: Option<String>,

    /// Pair measurements only with visits within this many days
    #[arg(long)]
    join_window_days: Option<i64>,

    /// Print the run summary as JSON on stdout
    #[arg(long, default_value_t = false)]
    summary_json: bool,

    /// Hide the progress bar
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_toml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(dir) = &self.data_dir {
            let from_dir = PipelineConfig::from_data_dir(dir);
            config.persons_path = from_dir.persons_path;
            config.visits_path = from_dir.visits_path;
            config.measurements_path = from_dir.measurements_path;
            config.output_path = from_dir.output_path;
            config.database_path = from_dir.database_path;
        }

        if let Some(path) = self.persons {
            config.persons_path = path;
        }
        if let Some(path) = self.visits {
            config.visits_path = path;
        }
        if let Some(path) = self.measurements {
            config.measurements_path = path;
        }
        if let Some(path) = self.output {
            config.output_path = path;
        }
        if let Some(path) = self.database {
            config.database_path = path;
        }
        if self.no_database {
            config.enable_database_sink = false;
        }
        if let Some(table) = self.table {
            config.table_name = table;
        }
        if let Some(days) = self.join_window_days {
            config.join_strategy = JoinStrategy::DateWindow { days };
        }
        if self.quiet || self.summary_json {
            config.show_progress = false;
        }

        config.validate()?;
        Ok(config)
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let summary_json = cli.summary_json;
    let config = cli.into_config()?;

    info!(
        "Unifying {}, {} and {}",
        config.persons_path.display(),
        config.visits_path.display(),
        config.measurements_path.display()
    );

    let summary = Pipeline::new(config)?.run()?;

    match &summary.database {
        DatabaseOutcome::Written { table, rows } => info!("Database table '{table}' holds {rows} rows"),
        DatabaseOutcome::Failed { error } => warn!("Database copy not written: {error}"),
        DatabaseOutcome::Disabled => {}
    }

    if summary_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

fn main() -> ExitCode {
    // Setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
