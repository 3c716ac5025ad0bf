//! Resumable batch processing of restaurant photos.
//!
//! Three nested loops: sources → parents → children. Each child goes
//! through the injected [`Analyzer`] and [`Classifier`]. Once all of a
//! parent's children have been attempted its matches go to the batch writer
//! and its key is committed to the checkpoint, so an interrupted run redoes
//! at most the parent it was working on. A parent left out of the
//! checkpoint for retry contributes no batch entries.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::batch::BatchWriter;
use crate::checkpoint::CheckpointStore;
use crate::config::PipelineConfig;
use crate::error::AppError;
use crate::models::{AnalysisRecord, DishEntry, Outcome, ParentCounts, RunSummary};
use crate::report;
use crate::source;
use crate::traits::{Analyzer, Classifier, WorkItem};

/// Events emitted by the processor for monitoring/logging.
#[derive(Debug, Clone)]
pub enum PipelineEvent<'a> {
    RunStarted {
        run_id: Uuid,
        sources: usize,
        already_processed: usize,
    },
    SourceStarted {
        path: &'a Path,
        index: usize,
        total: usize,
    },
    SourceSkipped {
        path: &'a Path,
        error: &'a str,
    },
    ParentSkipped {
        key: &'a str,
        label: &'a str,
    },
    ParentStarted {
        key: &'a str,
        label: &'a str,
        children: usize,
    },
    ChildAnalyzed {
        parent_key: &'a str,
        index: usize,
        total: usize,
        reference: &'a str,
        outcome: &'a Outcome,
    },
    ParentCompleted {
        key: &'a str,
        label: &'a str,
        successes: usize,
        failures: usize,
        checkpointed: bool,
    },
    Cancelled,
    RunFinished {
        summary: &'a RunSummary,
    },
}

/// Trait for receiving pipeline events (decoupled logging).
pub trait PipelineReporter: Send + Sync {
    fn report(&self, event: PipelineEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPipelineReporter;

impl PipelineReporter for TracingPipelineReporter {
    fn report(&self, event: PipelineEvent<'_>) {
        match event {
            PipelineEvent::RunStarted {
                run_id,
                sources,
                already_processed,
            } => {
                tracing::info!(%run_id, %sources, %already_processed, "Run started");
            }
            PipelineEvent::SourceStarted { path, index, total } => {
                tracing::info!(path = %path.display(), "Processing file {index}/{total}");
            }
            PipelineEvent::SourceSkipped { path, error } => {
                tracing::warn!(path = %path.display(), %error, "Skipping input file");
            }
            PipelineEvent::ParentSkipped { key, label } => {
                tracing::info!(%key, "Skipping {label} (already processed)");
            }
            PipelineEvent::ParentStarted {
                key,
                label,
                children,
            } => {
                tracing::info!(%key, "Processing {label} ({children} photos)");
            }
            PipelineEvent::ChildAnalyzed {
                parent_key,
                index,
                total,
                reference,
                outcome,
            } => match outcome {
                Outcome::Match { label, .. } => {
                    tracing::info!(%parent_key, "Photo {index}/{total}: dish identified: {label}");
                }
                Outcome::NonMatch { reason } => {
                    tracing::info!(%parent_key, "Photo {index}/{total}: skipped ({reason})");
                }
                Outcome::Malformed { reason } => {
                    tracing::warn!(%parent_key, %reference, "Photo {index}/{total}: malformed response ({reason})");
                }
                Outcome::Failed { error } => {
                    tracing::warn!(%parent_key, %reference, %error, "Photo {index}/{total}: analysis failed");
                }
            },
            PipelineEvent::ParentCompleted {
                key,
                label,
                successes,
                failures,
                checkpointed,
            } => {
                if failures > 0 && checkpointed {
                    tracing::warn!(
                        %key,
                        %failures,
                        "Completed {label} with failed photos; they will not be retried"
                    );
                } else if !checkpointed {
                    tracing::warn!(%key, %failures, "{label} left out of checkpoint for retry");
                }
                tracing::info!(%key, "Completed {label}: {successes} dishes");
            }
            PipelineEvent::Cancelled => {
                tracing::info!("Cancellation requested, stopping before the next restaurant");
            }
            PipelineEvent::RunFinished { summary } => {
                tracing::info!(
                    processed = summary.parents_processed,
                    skipped = summary.parents_skipped,
                    photos = summary.children_analyzed,
                    dishes = summary.successes,
                    failures = summary.failures,
                    batches = summary.batches_written,
                    "Run finished"
                );
            }
        }
    }
}

/// What happened to one parent item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentOutcome {
    Skipped,
    Processed {
        successes: usize,
        failures: usize,
        checkpointed: bool,
    },
}

/// Checkpoint-driven processor over restaurant listings.
pub struct BatchProcessor<A, C>
where
    A: Analyzer,
    C: Classifier,
{
    analyzer: A,
    classifier: C,
    config: PipelineConfig,
    checkpoint: CheckpointStore,
    batches: BatchWriter<DishEntry>,
    records: Vec<AnalysisRecord>,
    parents: ParentCounts,
    /// `(key, label)` of every processed parent, in processing order.
    processed: Vec<(String, String)>,
    batched_entries: usize,
    sources: Vec<String>,
    run_id: Uuid,
    started_at: DateTime<Utc>,
}

impl<A, C> BatchProcessor<A, C>
where
    A: Analyzer,
    C: Classifier,
{
    /// Validate the config, load the checkpoint and open the batch writer.
    pub fn new(analyzer: A, classifier: C, config: PipelineConfig) -> Result<Self, AppError> {
        config.validate()?;
        let checkpoint = CheckpointStore::load(&config.checkpoint_path);
        let batches = BatchWriter::open(
            &config.knowledge_base_dir,
            &config.batch_prefix,
            config.batch_size,
        )?;

        Ok(Self {
            analyzer,
            classifier,
            config,
            checkpoint,
            batches,
            records: Vec::new(),
            parents: ParentCounts::default(),
            processed: Vec::new(),
            batched_entries: 0,
            sources: Vec::new(),
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
        })
    }

    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    pub fn records(&self) -> &[AnalysisRecord] {
        &self.records
    }

    /// Process every source file in order, then finalize.
    ///
    /// Stops early, still finalizing, when `cancel` fires between parents.
    /// A persistence failure ends the run with that error after a
    /// best-effort flush of the pending batch and reports.
    pub async fn run<R: PipelineReporter>(
        mut self,
        sources: &[PathBuf],
        cancel: &CancellationToken,
        reporter: &R,
    ) -> Result<RunSummary, AppError> {
        reporter.report(PipelineEvent::RunStarted {
            run_id: self.run_id,
            sources: sources.len(),
            already_processed: self.checkpoint.len(),
        });

        for (i, path) in sources.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            reporter.report(PipelineEvent::SourceStarted {
                path: path.as_path(),
                index: i + 1,
                total: sources.len(),
            });
            if let Err(e) = self.process_source(path, cancel, reporter).await {
                return Err(self.abort(e));
            }
        }

        if cancel.is_cancelled() {
            reporter.report(PipelineEvent::Cancelled);
        }
        self.finalize(reporter)
    }

    /// Process every parent of one source file.
    ///
    /// A missing or unparseable file is reported and skipped (`Ok`). Only
    /// persistence failures are returned as errors.
    pub async fn process_source<R: PipelineReporter>(
        &mut self,
        path: &Path,
        cancel: &CancellationToken,
        reporter: &R,
    ) -> Result<(), AppError> {
        let parents = match source::read_restaurants(path) {
            Ok(parents) => parents,
            Err(e) => {
                let error = e.to_string();
                reporter.report(PipelineEvent::SourceSkipped { path, error: &error });
                return Ok(());
            }
        };
        self.sources.push(path.display().to_string());

        for parent in &parents {
            if cancel.is_cancelled() {
                break;
            }
            self.process_parent(parent, reporter).await?;
        }
        Ok(())
    }

    /// Analyze all children of `parent`, then batch its matches and commit
    /// it to the checkpoint.
    ///
    /// A parent deferred for retry keeps its records but none of its
    /// matches reach the batch files. A batch write failure returns before
    /// the checkpoint is touched.
    pub async fn process_parent<P: WorkItem, R: PipelineReporter>(
        &mut self,
        parent: &P,
        reporter: &R,
    ) -> Result<ParentOutcome, AppError> {
        self.parents.seen += 1;
        let key = parent.key();
        let label = parent.label();

        if self.checkpoint.is_processed(key) {
            self.parents.skipped += 1;
            reporter.report(PipelineEvent::ParentSkipped { key, label });
            return Ok(ParentOutcome::Skipped);
        }

        let children = parent.children();
        reporter.report(PipelineEvent::ParentStarted {
            key,
            label,
            children: children.len(),
        });

        let mut entries = Vec::new();
        let mut failures = 0;
        for (i, reference) in children.iter().enumerate() {
            let record = self.analyze_child(key, label, reference).await;
            reporter.report(PipelineEvent::ChildAnalyzed {
                parent_key: key,
                index: i + 1,
                total: children.len(),
                reference: reference.as_str(),
                outcome: &record.outcome,
            });

            if record.outcome.is_failed() {
                failures += 1;
            }
            entries.extend(DishEntry::from_record(&record));
            self.records.push(record);
        }

        let successes = entries.len();
        self.parents.processed += 1;
        self.processed.push((key.to_string(), label.to_string()));
        let checkpointed = if failures > 0 && !self.config.checkpoint_partial_failures {
            self.parents.deferred += 1;
            false
        } else {
            for entry in entries {
                self.batches.accumulate(entry)?;
                self.batched_entries += 1;
            }
            self.checkpoint.mark_processed(key)?;
            true
        };

        reporter.report(PipelineEvent::ParentCompleted {
            key,
            label,
            successes,
            failures,
            checkpointed,
        });
        Ok(ParentOutcome::Processed {
            successes,
            failures,
            checkpointed,
        })
    }

    /// Call the analyzer for one reference.
    ///
    /// Failures are logged and handed back; the caller records them and
    /// moves on.
    pub async fn analyze(&self, reference: &str) -> Result<serde_json::Value, AppError> {
        match self.analyzer.analyze(reference).await {
            Ok(response) => Ok(response),
            Err(e) => {
                tracing::debug!(%reference, error = %e, retryable = e.is_retryable(), "Analyzer call failed");
                Err(e)
            }
        }
    }

    async fn analyze_child(&self, key: &str, label: &str, reference: &str) -> AnalysisRecord {
        let (response, outcome) = match self.analyze(reference).await {
            Ok(response) => {
                let outcome = Outcome::from(self.classifier.classify(&response));
                (Some(response), outcome)
            }
            Err(AppError::MalformedResponse(reason)) => (None, Outcome::Malformed { reason }),
            Err(e) => (
                None,
                Outcome::Failed {
                    error: e.to_string(),
                },
            ),
        };

        AnalysisRecord {
            parent_key: key.to_string(),
            parent_label: label.to_string(),
            reference: reference.to_string(),
            response,
            outcome,
        }
    }

    fn summary(&self) -> RunSummary {
        RunSummary::from_records(
            self.run_id,
            self.started_at,
            self.sources.clone(),
            self.parents,
            self.batches.written().len(),
            &self.records,
        )
        .with_processed_parents(&self.processed)
        .with_knowledge_base_entries(self.batched_entries)
    }

    /// Flush the trailing batch and write the end-of-run reports.
    ///
    /// If the flush fails the reports are still written and the flush
    /// error is returned.
    pub fn finalize<R: PipelineReporter>(mut self, reporter: &R) -> Result<RunSummary, AppError> {
        if let Err(e) = self.batches.flush() {
            return Err(self.abort(e));
        }
        let summary = self.summary();
        report::write_reports(&self.config.report_dir, &summary, &self.records)?;
        reporter.report(PipelineEvent::RunFinished { summary: &summary });
        Ok(summary)
    }

    /// Best-effort flush after a fatal error. Returns the original error.
    fn abort(mut self, err: AppError) -> AppError {
        tracing::error!(error = %err, "Persistence failed, stopping run");
        if let Err(e) = self.batches.flush() {
            tracing::error!(error = %e, pending = self.batches.pending(), "Could not flush pending batch");
        }
        let summary = self.summary();
        if let Err(e) = report::write_reports(&self.config.report_dir, &summary, &self.records) {
            tracing::error!(error = %e, "Could not write reports");
        }
        err
    }
}
