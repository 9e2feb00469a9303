//! Utility functions for error handling
//!
//! Checks that turn filesystem conditions into pipeline errors with context.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Confirm that an input extract exists and is a regular file
///
/// # Arguments
/// * `path` - The path to check
/// * `role` - Which extract the file holds (for error context)
pub fn require_input_file(path: &Path, role: &str) -> Result<()> {
    if !path.is_file() {
        return Err(PipelineError::missing_input(role, path));
    }
    Ok(())
}

/// Safely open an input file
///
/// A file that disappeared between the existence check and the open is still
/// reported as a missing input rather than a bare IO error.
pub fn safe_open_file(path: &Path, role: &str) -> Result<fs::File> {
    require_input_file(path, role)?;

    match fs::File::open(path) {
        Ok(file) => Ok(file),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(PipelineError::missing_input(role, path))
        }
        Err(e) => Err(PipelineError::Io(io::Error::new(
            e.kind(),
            format!("Failed to open {role} input {}: {e}", path.display()),
        ))),
    }
}

/// Make sure the parent directory of an output file exists
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
