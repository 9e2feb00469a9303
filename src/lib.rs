//! A Rust library for unifying person, visit and measurement extracts into a
//! single patient-encounter-observation table, exported as delimited text and
//! optionally copied into SQLite.

pub mod config;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod schema;
pub mod sink;
pub mod table;
pub mod transform;
pub mod utils;

// Re-export the most common types for easier use
// Core types
pub use config::{JoinStrategy, PipelineConfig};
pub use error::{PipelineError, Result};
pub use pipeline::{DatabaseOutcome, Pipeline, PipelineSummary, run};
pub use table::Table;

// Arrow types
pub use arrow::datatypes::Schema as ArrowSchema;
pub use arrow::record_batch::RecordBatch;

// Loading and export
pub use loader::{CsvOptions, SourceTables, load_sources, read_csv};
pub use sink::{PersistReport, SqliteSink, persist_table, write_csv};
