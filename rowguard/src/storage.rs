//! Persistence of check specifications.
//!
//! Checks files are YAML by default; a `.json` extension switches to JSON.
//! A missing file and a file with unusable content are distinct error
//! conditions, so callers can tell "nothing installed yet" apart from
//! "installed but broken".

use std::path::Path;

use serde_json::Value;
use tracing::instrument;

use crate::error::{DqError, Result};

/// Saves check specifications to a file, creating or overwriting it.
#[instrument(skip(specs), fields(specs = specs.len()))]
pub fn save_checks_to_file(path: impl AsRef<Path> + std::fmt::Debug, specs: &[Value]) -> Result<()> {
    let path = path.as_ref();
    let rendered = if is_json(path) {
        serde_json::to_string_pretty(specs)?
    } else {
        serde_yaml::to_string(specs)?
    };
    std::fs::write(path, rendered)?;
    Ok(())
}

/// Loads check specifications from a file.
///
/// A nonexistent path yields [`DqError::MissingFile`]; an existing file
/// whose content does not parse to a non-empty spec list yields
/// [`DqError::NoChecksInFile`].
#[instrument]
pub fn load_checks_from_file(path: impl AsRef<Path> + std::fmt::Debug) -> Result<Vec<Value>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DqError::MissingFile(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)?;

    let parsed: std::result::Result<Vec<Value>, _> = if is_json(path) {
        serde_json::from_str(&content).map_err(|_| ())
    } else {
        serde_yaml::from_str(&content).map_err(|_| ())
    };
    match parsed {
        Ok(specs) if !specs.is_empty() => Ok(specs),
        _ => Err(DqError::NoChecksInFile(path.display().to_string())),
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json")
}
