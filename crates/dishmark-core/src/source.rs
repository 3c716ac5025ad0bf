//! Restaurant listing files: discovery, strict reads for `mark`, lenient
//! reads for `harvest`.

use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::models::Restaurant;

/// List the `*.json` files directly inside `dir`, sorted by path.
pub fn discover_sources(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let entries = std::fs::read_dir(dir).map_err(|e| AppError::input(dir, e))?;

    let mut sources = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| AppError::input(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            sources.push(path);
        }
    }
    sources.sort();
    Ok(sources)
}

/// Read a listing file, failing with [`AppError::InputError`] if it is
/// missing or is not an array of restaurants.
pub fn read_restaurants(path: &Path) -> Result<Vec<Restaurant>, AppError> {
    let raw = std::fs::read_to_string(path).map_err(|e| AppError::input(path, e))?;
    serde_json::from_str(&raw).map_err(|e| AppError::input(path, format!("invalid JSON: {e}")))
}

/// Read a listing file for appending to it: missing or corrupt means empty.
pub fn load_listing(path: &Path) -> Vec<Restaurant> {
    match read_restaurants(path) {
        Ok(restaurants) => restaurants,
        Err(e) => {
            if path.exists() {
                tracing::warn!(error = %e, "Ignoring unreadable listing");
            }
            Vec::new()
        }
    }
}
