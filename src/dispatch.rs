//! Validator Dispatch
//!
//! Runs the applicable validators of one file. The document view is parsed and indexed at
//! most once per file, and only when the file is a document view and at least one
//! applicable validator asked for the index. Every validator gets its own freshly opened
//! byte stream, and a failing or panicking validator is turned into an error message
//! without affecting the others.

use std::any::Any;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::aggregator::{FileResult, ReportedMessage};
use crate::error::{NameError, ValidatorError};
use crate::index::{self, IndexOutcome};
use crate::message::ValidationMessage;
use crate::name_codec;
use crate::parser::{DocViewParser, Encoding};
use crate::path::{NodeName, NodePath};
use crate::spi::{Capability, DOCVIEW_PARSER_ID, JcrFile, ValidatorRegistration};

/// File name of a document view describing its enclosing directory node.
pub const CONTENT_XML: &str = ".content.xml";

/// Root element name identifying a document view.
pub const DOCVIEW_ROOT: &str = "jcr:root";

/// How many leading bytes are inspected when classifying a file.
pub const SNIFF_LIMIT: u64 = 4096;

/// Something that can hand out the bytes of one file, as often as asked.
pub trait ContentSource: Send + Sync {
    fn open(&self) -> io::Result<Box<dyn BufRead + Send + '_>>;

    /// Encoding to decode with, when known up front.
    fn encoding(&self) -> Option<Encoding> {
        None
    }
}

/// A file on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    encoding: Option<Encoding>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            encoding: None,
        }
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ContentSource for FileSource {
    fn open(&self) -> io::Result<Box<dyn BufRead + Send + '_>> {
        Ok(Box::new(BufReader::new(File::open(&self.path)?)))
    }

    fn encoding(&self) -> Option<Encoding> {
        self.encoding
    }
}

/// File content held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    bytes: Arc<[u8]>,
    encoding: Option<Encoding>,
}

impl MemorySource {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Self {
            bytes: Arc::from(bytes),
            encoding: None,
        }
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }
}

impl ContentSource for MemorySource {
    fn open(&self) -> io::Result<Box<dyn BufRead + Send + '_>> {
        Ok(Box::new(Cursor::new(&self.bytes[..])))
    }

    fn encoding(&self) -> Option<Encoding> {
        self.encoding
    }
}

/// Classification of a file as far as the core is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Document view XML: one element per node
    DocView,
    /// Anything else, handed to validators as raw bytes
    Opaque,
}

impl FileKind {
    /// Classify a file: a document view has a configured extension and `jcr:root` as its
    /// first element within the first [`SNIFF_LIMIT`] bytes.
    pub fn classify(
        source: &dyn ContentSource,
        file_path: &Path,
        docview_extensions: &[String],
    ) -> io::Result<Self> {
        let extension_matches = file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                docview_extensions
                    .iter()
                    .any(|candidate| candidate.eq_ignore_ascii_case(ext))
            });
        if !extension_matches {
            return Ok(FileKind::Opaque);
        }

        let mut head = Vec::with_capacity(SNIFF_LIMIT as usize);
        source.open()?.take(SNIFF_LIMIT).read_to_end(&mut head)?;
        Ok(Self::sniff(&head))
    }

    /// Look for the first element name in a byte prefix.
    pub fn sniff(head: &[u8]) -> Self {
        match first_element_name(head) {
            Some(name) if name == DOCVIEW_ROOT.as_bytes() => FileKind::DocView,
            _ => FileKind::Opaque,
        }
    }
}

fn first_element_name(head: &[u8]) -> Option<&[u8]> {
    let mut rest = head.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(head);

    loop {
        let open = rest.iter().position(|&b| b == b'<')?;
        rest = &rest[open..];

        let skip_to = |haystack: &[u8], needle: &[u8]| -> Option<usize> {
            haystack
                .windows(needle.len())
                .position(|w| w == needle)
                .map(|pos| pos + needle.len())
        };

        if rest.starts_with(b"<?") {
            rest = &rest[skip_to(rest, b"?>")?..];
        } else if rest.starts_with(b"<!--") {
            rest = &rest[skip_to(rest, b"-->")?..];
        } else if rest.starts_with(b"<!") {
            rest = &rest[skip_to(rest, b">")?..];
        } else {
            let name = &rest[1..];
            let end = name
                .iter()
                .position(|&b| b.is_ascii_whitespace() || b == b'/' || b == b'>')?;
            return Some(&name[..end]);
        }
    }
}

/// Repository path the root element of a document view file stands for.
///
/// `a/_jcr_content/.content.xml` mounts at `/a/jcr:content`; `a/b.xml` mounts at `/a/b`.
pub fn mount_point(file_path: &Path) -> Result<NodePath, NameError> {
    let segments = file_path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .map(|part| {
            part.to_str().ok_or_else(|| NameError::NotUnicode {
                name: part.to_string_lossy().into_owned(),
            })
        })
        .collect::<Result<Vec<&str>, NameError>>()?;

    let Some((file_name, dirs)) = segments.split_last() else {
        return Ok(NodePath::root());
    };

    let mut names = Vec::with_capacity(segments.len());
    for dir in dirs {
        names.push(NodeName::new(name_codec::decode_platform(dir)?, None));
    }

    if *file_name != CONTENT_XML {
        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name);
        names.push(NodeName::new(name_codec::decode_platform(stem)?, None));
    }

    Ok(NodePath::from_segments(names))
}

/// Run `applicable` on one file and collect their messages.
pub fn dispatch(
    source: &dyn ContentSource,
    file: &JcrFile<'_>,
    applicable: &[&ValidatorRegistration],
) -> FileResult {
    let mut result = FileResult::complete(file.file_path);

    let needs_index = file.is_docview()
        && applicable
            .iter()
            .any(|r| r.capability == Capability::NodeIndex);

    let outcome = if needs_index {
        build_index(source, file, &mut result)
    } else {
        None
    };

    for registration in applicable {
        let node_index = match registration.capability {
            Capability::NodeIndex if file.is_docview() => match &outcome {
                Some(outcome) => Some(&outcome.index),
                None => {
                    debug!(
                        validator = %registration.id,
                        file = %file.file_path.display(),
                        "no index available, validator skipped"
                    );
                    continue;
                }
            },
            _ => None,
        };

        let messages = run_validator(source, file, registration, node_index);
        result.messages.extend(messages);
    }

    result
}

fn build_index(
    source: &dyn ContentSource,
    file: &JcrFile<'_>,
    result: &mut FileResult,
) -> Option<IndexOutcome> {
    let parser_message = |message: ValidationMessage| {
        ReportedMessage::new(DOCVIEW_PARSER_ID, 0, message.with_file(file.file_path))
    };

    let mount = match mount_point(file.file_path) {
        Ok(mount) => mount,
        Err(error) => {
            result.messages.push(parser_message(ValidationMessage::error(format!(
                "Cannot derive node path from file path: {}",
                error
            ))));
            result.mark_incomplete(error.to_string());
            return None;
        }
    };

    let reader = match source.open() {
        Ok(reader) => reader,
        Err(error) => {
            result.messages.push(parser_message(ValidationMessage::error(format!(
                "Cannot read file: {}",
                error
            ))));
            result.mark_incomplete(error.to_string());
            return None;
        }
    };

    let parser = match source.encoding() {
        Some(encoding) => DocViewParser::with_encoding(reader, encoding),
        None => DocViewParser::new(reader),
    };
    let outcome = index::index(mount, parser);

    for anomaly in &outcome.anomalies {
        let mut message = ValidationMessage::new(anomaly.severity(), anomaly.to_string());
        if let Some(line) = anomaly.line {
            message = message.with_line(line);
        }
        if let Some(path) = anomaly.path() {
            message = message.with_node_path(path);
        }
        result.messages.push(parser_message(message));
    }

    if let Some(error) = &outcome.parse_error {
        warn!(file = %file.file_path.display(), %error, "document view parsing stopped early");
        result.messages.push(parser_message(
            ValidationMessage::warn(format!(
                "Incomplete validation, parsing stopped: {}",
                error.kind
            ))
            .with_line(error.line),
        ));
        result.mark_incomplete(error.to_string());
    }

    debug!(
        file = %file.file_path.display(),
        nodes = outcome.index.len(),
        anomalies = outcome.anomalies.len(),
        "indexed document view"
    );
    Some(outcome)
}

fn run_validator(
    source: &dyn ContentSource,
    file: &JcrFile<'_>,
    registration: &ValidatorRegistration,
    node_index: Option<&index::PathLineIndex>,
) -> Vec<ReportedMessage> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(
        || -> Result<Vec<ValidationMessage>, ValidatorError> {
            let mut reader = source.open()?;
            registration.validator.validate(&mut reader, file, node_index)
        },
    ))
    .unwrap_or_else(|payload| Err(ValidatorError::Panicked(panic_message(payload))));

    match outcome {
        Ok(messages) => messages
            .into_iter()
            .map(|message| {
                let message = if message.file_path.is_none() {
                    message.with_file(file.file_path)
                } else {
                    message
                };
                ReportedMessage::new(&registration.id, registration.order, message)
            })
            .collect(),
        Err(error) => {
            warn!(
                validator = %registration.id,
                file = %file.file_path.display(),
                %error,
                "validator failed"
            );
            vec![ReportedMessage::new(
                &registration.id,
                registration.order,
                ValidationMessage::error(format!(
                    "Validator '{}' failed: {}",
                    registration.id, error
                ))
                .with_file(file.file_path),
            )]
        }
    }
}

/// Collect a validator's end-of-run messages. A panic in `done` becomes an error message
/// without a file.
pub fn finish_validator(registration: &ValidatorRegistration) -> Vec<ReportedMessage> {
    let messages = panic::catch_unwind(AssertUnwindSafe(|| registration.validator.done()))
        .unwrap_or_else(|payload| {
            let error = ValidatorError::Panicked(panic_message(payload));
            warn!(validator = %registration.id, %error, "validator failed at end of run");
            vec![ValidationMessage::error(format!(
                "Validator '{}' failed: {}",
                registration.id, error
            ))]
        });

    messages
        .into_iter()
        .map(|message| ReportedMessage::new(&registration.id, registration.order, message))
        .collect()
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
