//! Output sinks for the unified table

pub mod csv;
pub mod sqlite;

pub use self::csv::write_csv;
pub use self::sqlite::{PersistReport, SqliteSink, persist_table};
