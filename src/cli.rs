use clap::{ArgAction, Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Verbosity levels for output and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show errors
    Quiet,
    /// Show findings and the summary
    #[default]
    Normal,
    /// Also show per-file status
    Verbose,
    /// Show everything, including debug findings
    Debug,
}

impl VerbosityLevel {
    /// Default `tracing` filter for this level; `RUST_LOG` takes precedence.
    pub fn log_filter(self) -> &'static str {
        match self {
            VerbosityLevel::Quiet => "error",
            VerbosityLevel::Normal => "warn",
            VerbosityLevel::Verbose => "info",
            VerbosityLevel::Debug => "debug",
        }
    }
}

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// One line per finding plus a summary
    #[default]
    Human,
    /// Machine readable report
    Json,
    /// Summary counts only
    Summary,
}

/// Structural validator for content packages
#[derive(Parser, Debug, Clone)]
#[command(name = "docview-validate")]
#[command(
    about = "Validate the serialized node tree of a content package, reporting findings by file and line"
)]
#[command(version)]
pub struct Cli {
    /// Package directory containing jcr_root/, or a jcr_root directory
    #[arg(help = "Package directory or jcr_root directory to validate")]
    pub path: PathBuf,

    /// Configuration file (TOML or JSON)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Number of files validated concurrently
    #[arg(
        short = 't',
        long = "threads",
        help = "Number of files validated concurrently"
    )]
    pub threads: Option<usize>,

    /// Increase verbosity (-v verbose, -vv debug)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Quiet mode",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    /// Output format
    #[arg(long = "format", value_enum)]
    pub format: Option<OutputFormat>,

    /// Include file patterns (glob syntax, relative to jcr_root)
    #[arg(long = "include", action = ArgAction::Append)]
    pub include_patterns: Vec<String>,

    /// Exclude file patterns (glob syntax, relative to jcr_root)
    #[arg(long = "exclude", action = ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// Report nodes whose path matches this glob (repeatable)
    #[arg(long = "disallow", value_name = "GLOB", action = ArgAction::Append)]
    pub disallowed_paths: Vec<String>,

    /// Stop starting new files after the first error
    #[arg(long = "fail-fast")]
    pub fail_fast: bool,

    /// Show progress on stderr
    #[arg(long = "progress")]
    pub progress: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.path.exists() {
            return Err(format!("Path does not exist: {}", self.path.display()));
        }
        if let Some(threads) = self.threads
            && threads == 0
        {
            return Err("Number of threads must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else {
            match self.verbose {
                0 => VerbosityLevel::Normal,
                1 => VerbosityLevel::Verbose,
                _ => VerbosityLevel::Debug,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_cli_parsing() {
        let cli = Cli::try_parse_from(["docview-validate", "/tmp/pkg"]).unwrap();
        assert_eq!(cli.path, PathBuf::from("/tmp/pkg"));
        assert_eq!(cli.format, None);
        assert_eq!(cli.verbosity(), VerbosityLevel::Normal);
        assert!(cli.disallowed_paths.is_empty());
    }

    #[test]
    fn test_full_cli_parsing() {
        let cli = Cli::try_parse_from([
            "docview-validate",
            "pkg",
            "-t",
            "4",
            "-vv",
            "--format",
            "json",
            "--include",
            "content/**",
            "--exclude",
            "**/*.png",
            "--disallow",
            "/apps/secret",
            "--disallow",
            "/etc/**",
            "--fail-fast",
            "--progress",
            "--config",
            "cfg.toml",
        ])
        .unwrap();

        assert_eq!(cli.threads, Some(4));
        assert_eq!(cli.verbosity(), VerbosityLevel::Debug);
        assert_eq!(cli.format, Some(OutputFormat::Json));
        assert_eq!(cli.include_patterns, vec!["content/**"]);
        assert_eq!(cli.exclude_patterns, vec!["**/*.png"]);
        assert_eq!(cli.disallowed_paths, vec!["/apps/secret", "/etc/**"]);
        assert!(cli.fail_fast);
        assert!(cli.progress);
        assert_eq!(cli.config, Some(PathBuf::from("cfg.toml")));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["docview-validate", "pkg", "-q", "-v"]).is_err());
    }

    #[test]
    fn test_log_filter_per_level() {
        assert_eq!(VerbosityLevel::Quiet.log_filter(), "error");
        assert_eq!(VerbosityLevel::Normal.log_filter(), "warn");
        assert_eq!(VerbosityLevel::Verbose.log_filter(), "info");
        assert_eq!(VerbosityLevel::Debug.log_filter(), "debug");
    }

    #[test]
    fn test_validate_rejects_zero_threads() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().to_string_lossy().into_owned();
        let cli = Cli::try_parse_from(["docview-validate", path.as_str(), "-t", "0"]).unwrap();
        assert!(cli.validate().is_err());
    }
}
