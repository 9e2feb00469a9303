//! In-memory stages between loading and export
//!
//! Each stage takes tables by reference and returns new tables.

pub mod clean;
pub mod join;
pub mod normalize;
pub mod project;

pub use clean::{ValueImputation, fill_missing_gender, impute_measurement_values};
pub use join::{DateWindowFilter, PairFilter, attach_measurements, attach_persons, left_join};
pub use normalize::{normalize_measurements, normalize_persons, normalize_visits};
pub use project::{Projection, project_output};
