//! Message Aggregator
//!
//! Collects per-file results from concurrent workers and produces the run-level message
//! sequence. The final order is established by a sort at the end, so it does not depend
//! on the order in which workers happened to finish.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::message::{Severity, ValidationMessage};

/// A message together with the validator that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedMessage {
    pub validator_id: String,
    /// Registration order of the validator (0 for the document view parser)
    pub registration_order: usize,
    #[serde(flatten)]
    pub message: ValidationMessage,
}

impl ReportedMessage {
    pub fn new(
        validator_id: impl Into<String>,
        registration_order: usize,
        message: ValidationMessage,
    ) -> Self {
        Self {
            validator_id: validator_id.into(),
            registration_order,
            message,
        }
    }

    pub fn severity(&self) -> Severity {
        self.message.severity
    }
}

/// How far validation of one file got.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FileStatus {
    /// Every applicable validator ran on a fully parsed file
    Complete,
    /// Parsing stopped early or the file could not be read; validators saw partial data
    Incomplete { reason: String },
    /// Not validated at all (cancelled run)
    Skipped { reason: String },
}

impl FileStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, FileStatus::Complete)
    }

    pub fn is_incomplete(&self) -> bool {
        matches!(self, FileStatus::Incomplete { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, FileStatus::Skipped { .. })
    }
}

/// Outcome of dispatching one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResult {
    /// Path relative to `jcr_root`
    pub file_path: PathBuf,
    pub status: FileStatus,
    pub messages: Vec<ReportedMessage>,
}

impl FileResult {
    pub fn complete(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            status: FileStatus::Complete,
            messages: Vec::new(),
        }
    }

    pub fn skipped(file_path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            status: FileStatus::Skipped {
                reason: reason.into(),
            },
            messages: Vec::new(),
        }
    }

    /// Downgrade to incomplete. The first reason recorded is kept.
    pub fn mark_incomplete(&mut self, reason: impl Into<String>) {
        if self.status.is_complete() {
            self.status = FileStatus::Incomplete {
                reason: reason.into(),
            };
        }
    }

    pub fn worst_severity(&self) -> Option<Severity> {
        self.messages.iter().map(ReportedMessage::severity).max()
    }
}

/// Per-file entry of the aggregated run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub file_path: PathBuf,
    #[serde(flatten)]
    pub status: FileStatus,
    pub message_count: usize,
}

/// Thread-safe sink for file results.
#[derive(Debug, Default)]
pub struct MessageAggregator {
    results: Mutex<Vec<FileResult>>,
    run_messages: Mutex<Vec<ReportedMessage>>,
}

impl MessageAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&self, result: FileResult) {
        let mut results = self.results.lock().unwrap_or_else(|e| e.into_inner());
        results.push(result);
    }

    /// Messages not tied to one file's dispatch, e.g. from a validator's end-of-run hook.
    pub fn submit_run_message(&self, message: ReportedMessage) {
        let mut messages = self.run_messages.lock().unwrap_or_else(|e| e.into_inner());
        messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.results.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain everything submitted so far into the final, ordered run.
    pub fn finish(&self) -> AggregatedRun {
        let mut results = std::mem::take(&mut *self.results.lock().unwrap_or_else(|e| e.into_inner()));
        let run_messages =
            std::mem::take(&mut *self.run_messages.lock().unwrap_or_else(|e| e.into_inner()));

        results.sort_by(|a, b| compare_paths(&a.file_path, &b.file_path));
        let files = results
            .iter()
            .map(|r| FileSummary {
                file_path: r.file_path.clone(),
                status: r.status.clone(),
                message_count: r.messages.len(),
            })
            .collect();

        let mut messages = aggregate(results);
        messages.extend(run_messages);
        sort_messages(&mut messages);
        let worst_severity = worst_severity(&messages);

        AggregatedRun {
            messages,
            files,
            worst_severity,
        }
    }
}

/// Result of [`MessageAggregator::finish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedRun {
    pub messages: Vec<ReportedMessage>,
    pub files: Vec<FileSummary>,
    pub worst_severity: Option<Severity>,
}

/// Flatten per-file results into one deterministically ordered sequence.
///
/// Order: relative file path, then line (messages without a line after those with one),
/// then validator registration order. Messages equal under all three keep their
/// submission order. Nothing is deduplicated.
pub fn aggregate<I>(results: I) -> Vec<ReportedMessage>
where
    I: IntoIterator<Item = FileResult>,
{
    let mut messages: Vec<ReportedMessage> = results
        .into_iter()
        .flat_map(|result| result.messages)
        .collect();
    sort_messages(&mut messages);
    messages
}

fn sort_messages(messages: &mut [ReportedMessage]) {
    messages.sort_by(compare_messages);
}

fn compare_messages(a: &ReportedMessage, b: &ReportedMessage) -> Ordering {
    let by_path = match (&a.message.file_path, &b.message.file_path) {
        (Some(pa), Some(pb)) => compare_paths(pa, pb),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };

    let by_line = || match (a.message.line, b.message.line) {
        (Some(la), Some(lb)) => la.cmp(&lb),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };

    by_path
        .then_with(by_line)
        .then_with(|| a.registration_order.cmp(&b.registration_order))
}

/// Compare relative paths on their `/`-normalised string form.
fn compare_paths(a: &Path, b: &Path) -> Ordering {
    normalize_path(a).cmp(&normalize_path(b))
}

pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Worst severity over a message sequence, `None` when it is empty.
pub fn worst_severity(messages: &[ReportedMessage]) -> Option<Severity> {
    messages.iter().map(ReportedMessage::severity).max()
}
