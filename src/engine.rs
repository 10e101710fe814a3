//! Validation Engine
//!
//! Orchestrates one run over a package:
//! - **Discovery**: the async [`PackageReader`] finds `jcr_root` and lists its files
//! - **Per-file work**: classification, parsing and validators run under `spawn_blocking`,
//!   since all of it is plain blocking reads and CPU work
//! - **Bounded concurrency**: a `Semaphore` limits how many files are in flight
//! - **Cancellation**: with fail-fast, the first file reporting an error stops new files
//!   from starting; files already in flight finish normally
//! - **Aggregation**: results go to a shared [`MessageAggregator`] and are sorted at the end

use futures::future::try_join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregator::{
    FileResult, FileStatus, FileSummary, MessageAggregator, ReportedMessage,
};
use crate::dispatch::{self, FileKind};
use crate::error::{Result, ValidationError};
use crate::message::{Severity, ValidationMessage};
use crate::package::{PackageEntry, PackageReader};
use crate::spi::{JcrFile, ValidatorRegistry};

/// Engine settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Maximum number of files validated at the same time
    pub max_concurrent_files: usize,
    /// Stop starting new files once one reported an error
    pub fail_fast: bool,
    /// Extensions of files that may be document views
    pub docview_extensions: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_files: num_cpus::get(),
            fail_fast: false,
            docview_extensions: vec!["xml".to_string()],
        }
    }
}

/// Phase of a run, reported through the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationPhase {
    Discovery,
    Validation,
    Aggregation,
    Complete,
}

/// Progress update for a run
#[derive(Debug, Clone)]
pub struct ValidationProgress {
    /// File just finished, during the validation phase
    pub current_file: Option<PathBuf>,
    pub completed: usize,
    pub total: usize,
    pub phase: ValidationPhase,
}

pub type ProgressCallback = Arc<dyn Fn(ValidationProgress) + Send + Sync>;

/// Counts over a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub total_files: usize,
    pub complete_files: usize,
    pub incomplete_files: usize,
    pub skipped_files: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub debugs: usize,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Absolute path of `jcr_root`
    pub root: PathBuf,
    /// Messages in aggregation order
    pub messages: Vec<ReportedMessage>,
    /// Per-file status in path order
    pub files: Vec<FileSummary>,
    pub summary: ReportSummary,
    pub worst_severity: Option<Severity>,
    pub duration: Duration,
    /// Set when fail-fast stopped the run early
    pub cancelled: bool,
}

impl ValidationReport {
    pub fn has_errors(&self) -> bool {
        self.worst_severity == Some(Severity::Error)
    }

    /// Messages reported for one relative file path.
    pub fn messages_for<'a>(
        &'a self,
        file_path: &'a Path,
    ) -> impl Iterator<Item = &'a ReportedMessage> + 'a {
        self.messages
            .iter()
            .filter(move |m| m.message.file_path.as_deref() == Some(file_path))
    }

    fn summarize(files: &[FileSummary], messages: &[ReportedMessage]) -> ReportSummary {
        let mut summary = ReportSummary {
            total_files: files.len(),
            ..ReportSummary::default()
        };
        for file in files {
            match file.status {
                FileStatus::Complete => summary.complete_files += 1,
                FileStatus::Incomplete { .. } => summary.incomplete_files += 1,
                FileStatus::Skipped { .. } => summary.skipped_files += 1,
            }
        }
        for message in messages {
            match message.severity() {
                Severity::Error => summary.errors += 1,
                Severity::Warn => summary.warnings += 1,
                Severity::Info => summary.infos += 1,
                Severity::Debug => summary.debugs += 1,
            }
        }
        summary
    }
}

/// Runs the registered validators over every file of a package.
pub struct ValidationEngine {
    registry: Arc<ValidatorRegistry>,
    reader: PackageReader,
    config: EngineConfig,
}

impl ValidationEngine {
    pub fn new(registry: ValidatorRegistry, reader: PackageReader, config: EngineConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            reader,
            config,
        }
    }

    pub fn registry(&self) -> &ValidatorRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate the package at `path` (a package directory or its `jcr_root`).
    pub async fn validate_package(&self, path: &Path) -> Result<ValidationReport> {
        self.validate_package_with_progress(path, None).await
    }

    pub async fn validate_package_with_progress(
        &self,
        path: &Path,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<ValidationReport> {
        let start = Instant::now();
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();

        // Phase 1: discovery
        report(&progress_callback, None, 0, 0, ValidationPhase::Discovery);
        let package = self.reader.read_package(path).await?;
        let total = package.len();
        info!(%run_id, root = %package.root.display(), files = total, "validating package");

        // Phase 2: validation
        let aggregator = Arc::new(MessageAggregator::new());
        let cancelled = Arc::new(AtomicBool::new(false));
        self.validate_entries(
            package.root.clone(),
            package.entries,
            Arc::clone(&aggregator),
            Arc::clone(&cancelled),
            progress_callback.clone(),
        )
        .await?;

        // Phase 3: aggregation
        report(&progress_callback, None, total, total, ValidationPhase::Aggregation);
        for registration in self.registry.iter() {
            for message in dispatch::finish_validator(registration) {
                aggregator.submit_run_message(message);
            }
        }

        let run = aggregator.finish();
        let summary = ValidationReport::summarize(&run.files, &run.messages);

        let report_value = ValidationReport {
            run_id,
            started_at,
            root: package.root,
            messages: run.messages,
            files: run.files,
            summary,
            worst_severity: run.worst_severity,
            duration: start.elapsed(),
            cancelled: cancelled.load(Ordering::SeqCst),
        };

        // Phase 4: complete
        report(&progress_callback, None, total, total, ValidationPhase::Complete);
        info!(
            %run_id,
            files = report_value.summary.total_files,
            errors = report_value.summary.errors,
            warnings = report_value.summary.warnings,
            duration_ms = report_value.duration.as_millis() as u64,
            "validation finished"
        );
        Ok(report_value)
    }

    async fn validate_entries(
        &self,
        root: PathBuf,
        entries: Vec<PackageEntry>,
        aggregator: Arc<MessageAggregator>,
        cancelled: Arc<AtomicBool>,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let total = entries.len();
        let completed = Arc::new(AtomicUsize::new(0));
        let semaphore = Arc::new(tokio::sync::Semaphore::new(
            self.config.max_concurrent_files.max(1),
        ));
        let root = Arc::new(root);
        let extensions = Arc::new(self.config.docview_extensions.clone());

        let tasks: Vec<_> = entries
            .into_iter()
            .map(|entry| {
                let registry = Arc::clone(&self.registry);
                let semaphore = Arc::clone(&semaphore);
                let aggregator = Arc::clone(&aggregator);
                let cancelled = Arc::clone(&cancelled);
                let completed = Arc::clone(&completed);
                let progress_callback = progress_callback.clone();
                let root = Arc::clone(&root);
                let extensions = Arc::clone(&extensions);
                let fail_fast = self.config.fail_fast;

                tokio::spawn(async move {
                    let _permit = semaphore.acquire().await.map_err(|_| {
                        ValidationError::Concurrency {
                            details: "Failed to acquire validation semaphore".to_string(),
                        }
                    })?;

                    let file_path = entry.relative_path.clone();
                    let result = if cancelled.load(Ordering::SeqCst) {
                        debug!(file = %file_path.display(), "run cancelled, file skipped");
                        FileResult::skipped(&file_path, "run cancelled after an earlier error")
                    } else {
                        let blocking_path = file_path.clone();
                        tokio::task::spawn_blocking(move || {
                            validate_file(&entry, &root, &extensions, &registry)
                        })
                        .await
                        .unwrap_or_else(|e| {
                            warn!(file = %blocking_path.display(), error = %e, "file task failed");
                            let mut result = FileResult::complete(&blocking_path);
                            result.mark_incomplete(format!("validation task failed: {}", e));
                            result.messages.push(ReportedMessage::new(
                                crate::spi::DOCVIEW_PARSER_ID,
                                0,
                                ValidationMessage::error(format!("Validation task failed: {}", e))
                                    .with_file(&blocking_path),
                            ));
                            result
                        })
                    };

                    if fail_fast
                        && result.worst_severity() == Some(Severity::Error)
                        && !cancelled.swap(true, Ordering::SeqCst)
                    {
                        info!(file = %file_path.display(), "error reported, stopping run (fail-fast)");
                    }

                    aggregator.submit(result);

                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    report(
                        &progress_callback,
                        Some(file_path),
                        done,
                        total,
                        ValidationPhase::Validation,
                    );

                    Ok::<(), ValidationError>(())
                })
            })
            .collect();

        let task_results = try_join_all(tasks)
            .await
            .map_err(|e| ValidationError::Concurrency {
                details: format!("Task join error: {}", e),
            })?;
        for result in task_results {
            result?;
        }

        Ok(())
    }
}

/// Classify and dispatch one file. Blocking.
fn validate_file(
    entry: &PackageEntry,
    root: &Path,
    docview_extensions: &[String],
    registry: &ValidatorRegistry,
) -> FileResult {
    let source = entry.source();
    let kind = match FileKind::classify(&source, &entry.relative_path, docview_extensions) {
        Ok(kind) => kind,
        Err(e) => {
            warn!(file = %entry.relative_path.display(), error = %e, "cannot read file");
            let mut result = FileResult::complete(&entry.relative_path);
            result.mark_incomplete(e.to_string());
            result.messages.push(ReportedMessage::new(
                crate::spi::DOCVIEW_PARSER_ID,
                0,
                ValidationMessage::error(format!("Cannot read file: {}", e))
                    .with_file(&entry.relative_path),
            ));
            return result;
        }
    };

    let file = JcrFile {
        file_path: &entry.relative_path,
        base_path: root,
        kind,
    };
    let applicable = registry.applicable(&file);
    debug!(
        file = %entry.relative_path.display(),
        ?kind,
        validators = applicable.len(),
        "dispatching"
    );
    dispatch::dispatch(&source, &file, &applicable)
}

fn report(
    callback: &Option<ProgressCallback>,
    current_file: Option<PathBuf>,
    completed: usize,
    total: usize,
    phase: ValidationPhase,
) {
    if let Some(callback) = callback {
        callback(ValidationProgress {
            current_file,
            completed,
            total,
            phase,
        });
    }
}
