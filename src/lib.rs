//! # docview-validate Library
//!
//! Structural validation of content packages. Document view files below `jcr_root` are
//! parsed as a stream of node events, indexed into a node path → line map, and handed to
//! pluggable validators together with the raw bytes. Findings from all files are merged
//! into one deterministically ordered report.

pub mod aggregator;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod index;
pub mod message;
pub mod name_codec;
pub mod output;
pub mod package;
pub mod parser;
pub mod path;
pub mod spi;
pub mod validators;

pub use aggregator::{
    AggregatedRun, FileResult, FileStatus, FileSummary, MessageAggregator, ReportedMessage,
    aggregate,
};
pub use cli::{Cli, OutputFormat, VerbosityLevel};
pub use config::{Config, ConfigError, ConfigManager};
pub use dispatch::{ContentSource, FileKind, FileSource, MemorySource, dispatch, mount_point};
pub use engine::{
    EngineConfig, ProgressCallback, ReportSummary, ValidationEngine, ValidationPhase,
    ValidationProgress, ValidationReport,
};
pub use error::{
    NameError, ParseError, ParseErrorKind, Result, StructuralError, ValidationError,
    ValidatorError,
};
pub use index::{Anomaly, AnomalyKind, IndexBuilder, IndexOutcome, PathLineIndex, index};
pub use message::{Severity, ValidationMessage};
pub use output::Output;
pub use package::{Package, PackageEntry, PackageReader};
pub use parser::{DocViewParser, Encoding, ParseEvent};
pub use path::{NodeName, NodePath, PathStack};
pub use spi::{
    Capability, DOCVIEW_PARSER_ID, JcrDataValidator, JcrFile, LegacyAdapter,
    LegacyJcrDataValidator, RegistryError, ValidatorRegistration, ValidatorRegistry,
};
