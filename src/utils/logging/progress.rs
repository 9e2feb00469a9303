//! Progress reporting for the pipeline stages
//!
//! Uses the indicatif crate. A hidden bar is returned when progress output is
//! disabled, so callers never branch on visibility.

use indicatif::{ProgressBar, ProgressStyle};

/// Style for the stage progress bar
pub const STAGE_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}";

/// Create a progress bar with one step per pipeline stage
///
/// # Arguments
/// * `stages` - Number of stages the run will go through
/// * `visible` - Whether to draw the bar at all
#[must_use]
pub fn create_stage_progress_bar(stages: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(stages);
    let style = ProgressStyle::default_bar()
        .template(STAGE_TEMPLATE)
        .map_or_else(|_| ProgressStyle::default_bar(), |s| s.progress_chars("#>-"));
    pb.set_style(style);
    pb
}

/// Finish a progress bar with a completion message
pub fn finish_progress_bar(pb: &ProgressBar, message: Option<&str>) {
    if let Some(msg) = message {
        pb.finish_with_message(msg.to_string());
    } else {
        pb.finish();
    }
}
