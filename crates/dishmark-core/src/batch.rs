//! Fixed-size result batches flushed to numbered files.
//!
//! Files are named `<prefix>_<seq>.json` with the sequence zero-padded to
//! ten digits, the width of `u32::MAX`, so a directory listing sorts them in
//! write order at any count. Each
//! file is a standalone JSON array. Numbering resumes after the highest
//! sequence already present in the directory, whatever its padding, and
//! files are never overwritten.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::AppError;
use crate::persist;

#[derive(Debug)]
pub struct BatchWriter<T> {
    dir: PathBuf,
    prefix: String,
    threshold: usize,
    buffer: Vec<T>,
    next_sequence: u32,
    written: Vec<PathBuf>,
}

impl<T: Serialize> BatchWriter<T> {
    /// Open a writer over `dir`, creating the directory if needed.
    pub fn open(
        dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        threshold: usize,
    ) -> Result<Self, AppError> {
        if threshold == 0 {
            return Err(AppError::ConfigError(
                "batch size must be at least 1".into(),
            ));
        }
        let dir = dir.into();
        let prefix = prefix.into();
        persist::ensure_dir(&dir)?;
        let last = highest_sequence(&dir, &prefix)?;
        if last > 0 {
            tracing::info!(dir = %dir.display(), last, "Continuing batch numbering after existing files");
        }

        Ok(Self {
            dir,
            prefix,
            threshold,
            buffer: Vec::with_capacity(threshold),
            next_sequence: last + 1,
            written: Vec::new(),
        })
    }

    /// File name for a given sequence number.
    pub fn file_name(prefix: &str, sequence: u32) -> String {
        format!("{prefix}_{sequence:010}.json")
    }

    /// Append a record, flushing when the batch reaches the threshold.
    ///
    /// Returns the path of the flushed file, if one was written.
    pub fn accumulate(&mut self, record: T) -> Result<Option<PathBuf>, AppError> {
        self.buffer.push(record);
        if self.buffer.len() >= self.threshold {
            self.flush()
        } else {
            Ok(None)
        }
    }

    /// Write the pending records as the next numbered batch.
    ///
    /// Does nothing when the buffer is empty. On failure the records stay
    /// buffered and the sequence number is not consumed.
    pub fn flush(&mut self) -> Result<Option<PathBuf>, AppError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        let path = self
            .dir
            .join(Self::file_name(&self.prefix, self.next_sequence));
        persist::write_json_new(&path, &self.buffer)?;

        tracing::info!(
            batch = self.next_sequence,
            records = self.buffer.len(),
            path = %path.display(),
            "Saved batch"
        );
        self.buffer.clear();
        self.next_sequence += 1;
        self.written.push(path.clone());
        Ok(Some(path))
    }

    /// Records waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Files written by this writer, oldest first.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Highest `<prefix>_<digits>.json` sequence in `dir`, or 0.
fn highest_sequence(dir: &Path, prefix: &str) -> Result<u32, AppError> {
    let entries = std::fs::read_dir(dir).map_err(|e| AppError::persistence(dir, e))?;
    let head = format!("{prefix}_");

    let mut highest = 0;
    for entry in entries {
        let entry = entry.map_err(|e| AppError::persistence(dir, e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(digits) = name
            .strip_prefix(&head)
            .and_then(|rest| rest.strip_suffix(".json"))
        else {
            continue;
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        if let Ok(seq) = digits.parse::<u32>() {
            highest = highest.max(seq);
        }
    }
    Ok(highest)
}
