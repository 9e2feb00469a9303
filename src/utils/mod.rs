//! Utility functions shared by the pipeline stages

pub mod logging;

pub use logging::{log_operation_complete, log_operation_start, log_warning};
