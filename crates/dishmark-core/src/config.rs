use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_BATCH_PREFIX: &str = "knowledge_base_batch";

/// Configuration for a `mark` run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory receiving the numbered batch files.
    pub knowledge_base_dir: PathBuf,
    /// Directory receiving the summary, detailed results and insert script.
    pub report_dir: PathBuf,
    pub checkpoint_path: PathBuf,
    pub batch_size: usize,
    pub batch_prefix: String,
    /// Checkpoint a parent even when some of its children failed to analyze.
    ///
    /// When false such parents stay out of the checkpoint and are redone in
    /// full on the next run.
    pub checkpoint_partial_failures: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            knowledge_base_dir: PathBuf::from("knowledge_base"),
            report_dir: PathBuf::from("."),
            checkpoint_path: PathBuf::from("processed_places.json"),
            batch_size: DEFAULT_BATCH_SIZE,
            batch_prefix: DEFAULT_BATCH_PREFIX.to_string(),
            checkpoint_partial_failures: true,
        }
    }
}

impl PipelineConfig {
    /// Put every output (batches, reports, checkpoint) under one directory.
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            knowledge_base_dir: root.join("knowledge_base"),
            report_dir: root.clone(),
            checkpoint_path: root.join("processed_places.json"),
            ..Self::default()
        }
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_checkpoint_partial_failures(mut self, enabled: bool) -> Self {
        self.checkpoint_partial_failures = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.batch_size == 0 {
            return Err(AppError::ConfigError(
                "batch size must be at least 1".into(),
            ));
        }
        if self.batch_prefix.is_empty()
            || self.batch_prefix.contains(['/', '\\'])
        {
            return Err(AppError::ConfigError(format!(
                "invalid batch prefix '{}'",
                self.batch_prefix
            )));
        }
        if self.checkpoint_path.as_os_str().is_empty() {
            return Err(AppError::ConfigError("checkpoint path is empty".into()));
        }
        Ok(())
    }
}

/// Configuration for a `harvest` run.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Directory receiving the listing JSON and its text summary.
    pub output_dir: PathBuf,
    /// Pause between two restaurants' photo lookups.
    pub restaurant_delay: Duration,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs"),
            restaurant_delay: Duration::from_secs(2),
        }
    }
}

impl HarvestConfig {
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_restaurant_delay(mut self, delay: Duration) -> Self {
        self.restaurant_delay = delay;
        self
    }
}
