use std::path::PathBuf;

use thiserror::Error;

/// Run-level error type: failures that prevent a validation run from starting or finishing.
///
/// Per-file problems (malformed names, broken nesting, unparseable XML, failing
/// validators) never surface here; they become messages in the report.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Package layout error: {path} - {reason}")]
    PackageLayout { path: PathBuf, reason: String },

    #[error("File system traversal error: {path} - {reason}")]
    FileSystemTraversal { path: PathBuf, reason: String },

    #[error("Concurrent operation error: {details}")]
    Concurrency { details: String },
}

/// Reasons a serialized node or property name cannot be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("empty name")]
    Empty,

    #[error("incomplete escape sequence at offset {offset} in '{name}'")]
    IncompleteEscape { name: String, offset: usize },

    #[error("escape sequence at offset {offset} in '{name}' does not denote a character")]
    InvalidCodePoint { name: String, offset: usize },

    #[error("malformed same-name-sibling index in '{name}'")]
    MalformedIndex { name: String },

    #[error("'{name}' is not valid UTF-8")]
    NotUnicode { name: String },
}

/// Push/pop discipline violations detected by the path stack.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    #[error("closing tag '{name}' has no matching open node")]
    UnexpectedClose { name: String },

    #[error("closing tag '{found}' implicitly closes open node '{expected}'")]
    MismatchedClose { expected: String, found: String },
}

/// Byte-level malformation of a document view file. Halts event production for that file.
#[derive(Error, Debug)]
#[error("line {line}: {kind}")]
pub struct ParseError {
    /// Last known 1-based line number when the failure was detected
    pub line: u64,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(line: u64, kind: ParseErrorKind) -> Self {
        Self { line, kind }
    }
}

#[derive(Error, Debug)]
pub enum ParseErrorKind {
    #[error("unexpected end of input inside {context}")]
    UnexpectedEof { context: &'static str },

    #[error("invalid byte sequence for encoding {encoding}")]
    InvalidEncoding { encoding: &'static str },

    #[error("unsupported encoding '{0}'")]
    UnsupportedEncoding(String),

    #[error("malformed markup: {0}")]
    Malformed(String),

    #[error("undefined entity '&{0};'")]
    UndefinedEntity(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by a validator while processing one file.
#[derive(Error, Debug)]
pub enum ValidatorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Failed(String),

    #[error("validator panicked: {0}")]
    Panicked(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ValidationError>;
