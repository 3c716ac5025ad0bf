//! Durable file writes.
//!
//! Everything is written to a temp file in the destination directory,
//! synced, then renamed over the target, so an interrupted write never
//! leaves a truncated checkpoint or batch behind.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::AppError;

/// Ensure `dir` exists and is a directory; create it if missing.
pub fn ensure_dir(dir: &Path) -> Result<(), AppError> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| AppError::persistence(dir, e))?;
        if !meta.is_dir() {
            return Err(AppError::persistence(dir, "path is not a directory"));
        }
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| AppError::persistence(dir, e))
}

fn staged(path: &Path, content: &[u8]) -> Result<NamedTempFile, AppError> {
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    ensure_dir(dir)?;
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| AppError::persistence(path, e))?;
    tmp.write_all(content)
        .map_err(|e| AppError::persistence(path, e))?;
    tmp.flush().map_err(|e| AppError::persistence(path, e))?;
    tmp.as_file_mut()
        .sync_all()
        .map_err(|e| AppError::persistence(path, e))?;
    Ok(tmp)
}

/// Atomically replace `path` with `content`.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), AppError> {
    let tmp = staged(path, content)?;
    tmp.persist(path)
        .map_err(|e| AppError::persistence(path, e.error))?;
    Ok(())
}

/// Atomically create `path`, failing if it already exists.
pub fn write_new(path: &Path, content: &[u8]) -> Result<(), AppError> {
    let tmp = staged(path, content)?;
    tmp.persist_noclobber(path)
        .map_err(|e| AppError::persistence(path, e.error))?;
    Ok(())
}

/// Pretty-print `value` and atomically replace `path` with it.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AppError> {
    let json = serde_json::to_vec_pretty(value).map_err(|e| AppError::persistence(path, e))?;
    write_atomic(path, &json)
}

/// Pretty-print `value` into a new file at `path`.
pub fn write_json_new<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AppError> {
    let json = serde_json::to_vec_pretty(value).map_err(|e| AppError::persistence(path, e))?;
    write_new(path, &json)
}
