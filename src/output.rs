//! Output and Reporting
//!
//! Renders a [`ValidationReport`] as human-readable lines, JSON, or summary counts only.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use crate::aggregator::{FileStatus, FileSummary, ReportedMessage};
use crate::cli::{OutputFormat, VerbosityLevel};
use crate::engine::{ReportSummary, ValidationReport};
use crate::message::Severity;

/// Output formatter for validation reports
pub struct Output {
    verbosity: VerbosityLevel,
    format: OutputFormat,
    show_colors: bool,
}

impl Output {
    pub fn new(verbosity: VerbosityLevel, format: OutputFormat) -> Self {
        Self {
            verbosity,
            format,
            show_colors: atty::is(atty::Stream::Stdout),
        }
    }

    pub fn with_colors(mut self, show_colors: bool) -> Self {
        self.show_colors = show_colors;
        self
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    pub fn format_report(&self, report: &ValidationReport) -> serde_json::Result<String> {
        match self.format {
            OutputFormat::Human => Ok(self.format_human(report)),
            OutputFormat::Json => self.format_json(report),
            OutputFormat::Summary => Ok(self.format_summary(report)),
        }
    }

    fn format_human(&self, report: &ValidationReport) -> String {
        let mut output = String::new();

        for message in report
            .messages
            .iter()
            .filter(|m| self.shows(m.severity()))
        {
            output.push_str(&self.format_message(message));
            output.push('\n');
        }

        if self.verbosity >= VerbosityLevel::Verbose {
            for file in report.files.iter().filter(|f| !f.status.is_complete()) {
                output.push_str(&self.format_file_status(file));
                output.push('\n');
            }
        }

        if self.verbosity > VerbosityLevel::Quiet {
            if !output.is_empty() {
                output.push('\n');
            }
            output.push_str(&self.format_summary(report));
        }

        output
    }

    fn shows(&self, severity: Severity) -> bool {
        match self.verbosity {
            VerbosityLevel::Quiet => severity == Severity::Error,
            VerbosityLevel::Normal | VerbosityLevel::Verbose => severity >= Severity::Info,
            VerbosityLevel::Debug => true,
        }
    }

    /// `SEVERITY file:line[:column] [validator] text`
    pub fn format_message(&self, reported: &ReportedMessage) -> String {
        let message = &reported.message;
        let mut output = self.colorize(message.severity.label(), severity_color(message.severity));

        if let Some(file) = &message.file_path {
            output.push(' ');
            output.push_str(&file.display().to_string());
            if let Some(line) = message.line {
                output.push_str(&format!(":{}", line));
                if let Some(column) = message.column {
                    output.push_str(&format!(":{}", column));
                }
            }
        }

        output.push_str(&format!(" [{}]", reported.validator_id));
        if let Some(node) = &message.node_path {
            output.push_str(&format!(" {}", node));
        }
        output.push_str(&format!(" {}", message.message));
        output
    }

    pub fn format_file_status(&self, file: &FileSummary) -> String {
        match &file.status {
            FileStatus::Complete => format!(
                "{}  {}",
                self.colorize("✓ COMPLETE", "32"),
                file.file_path.display()
            ),
            FileStatus::Incomplete { reason } => format!(
                "{}  {} - {}",
                self.colorize("⚠ INCOMPLETE", "33"),
                file.file_path.display(),
                reason
            ),
            FileStatus::Skipped { reason } => format!(
                "{}  {} - {}",
                self.colorize("- SKIPPED", "36"),
                file.file_path.display(),
                reason
            ),
        }
    }

    pub fn format_summary(&self, report: &ValidationReport) -> String {
        let summary = &report.summary;
        let mut output = String::new();
        output.push_str("Validation Summary:\n");
        output.push_str(&format!("  Total files: {}\n", summary.total_files));
        if summary.incomplete_files > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Incomplete:", "33"),
                summary.incomplete_files
            ));
        }
        if summary.skipped_files > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Skipped:", "36"),
                summary.skipped_files
            ));
        }
        output.push_str(&format!(
            "  {} {}\n",
            self.colorize("Errors:", "31"),
            summary.errors
        ));
        output.push_str(&format!(
            "  {} {}\n",
            self.colorize("Warnings:", "33"),
            summary.warnings
        ));
        if self.verbosity >= VerbosityLevel::Verbose {
            output.push_str(&format!("  Infos: {}\n", summary.infos));
            output.push_str(&format!("  Debugs: {}\n", summary.debugs));
        }
        if report.cancelled {
            output.push_str("  Run stopped early after an error (fail-fast)\n");
        }
        output.push_str(&format!(
            "  Duration: {}\n",
            format_duration(report.duration)
        ));

        output
    }

    fn format_json(&self, report: &ValidationReport) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&JsonReport::from(report))
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    root: &'a Path,
    worst_severity: Option<Severity>,
    cancelled: bool,
    duration_ms: u64,
    summary: &'a ReportSummary,
    files: &'a [FileSummary],
    messages: &'a [ReportedMessage],
}

impl<'a> From<&'a ValidationReport> for JsonReport<'a> {
    fn from(report: &'a ValidationReport) -> Self {
        Self {
            run_id: report.run_id,
            started_at: report.started_at,
            root: &report.root,
            worst_severity: report.worst_severity,
            cancelled: report.cancelled,
            duration_ms: report.duration.as_millis() as u64,
            summary: &report.summary,
            files: &report.files,
            messages: &report.messages,
        }
    }
}

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "31",
        Severity::Warn => "33",
        Severity::Info => "36",
        Severity::Debug => "90",
    }
}

pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{:.0}ms", duration.as_millis())
    } else if total_secs < 60.0 {
        format!("{:.2}s", total_secs)
    } else {
        let mins = (total_secs / 60.0) as u64;
        let secs = total_secs % 60.0;
        format!("{}m{:.1}s", mins, secs)
    }
}
