//! Path/Line Index Builder
//!
//! Turns the raw event stream of one document view file into a [`PathLineIndex`]: the
//! ordered mapping from every node path to the line its start tag begins on. Problems
//! found on the way are collected as [`Anomaly`] values next to the (best-effort) index
//! instead of aborting the file.

use std::collections::HashMap;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::{NameError, ParseError, StructuralError};
use crate::message::Severity;
use crate::name_codec;
use crate::parser::ParseEvent;
use crate::path::{NodeName, NodePath, PathStack};

/// Node path (normalized string form) to the 1-based line of its first start tag.
///
/// Iteration follows document order. Keys are unique: a second insertion of the same
/// path is rejected and the first line is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathLineIndex {
    entries: Vec<(String, u64)>,
    positions: HashMap<String, usize>,
}

impl PathLineIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path -> line`. Returns the already recorded line if the path is present.
    pub fn insert(&mut self, path: String, line: u64) -> Result<(), u64> {
        if let Some(&pos) = self.positions.get(&path) {
            return Err(self.entries[pos].1);
        }
        self.positions.insert(path.clone(), self.entries.len());
        self.entries.push((path, line));
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<u64> {
        self.positions.get(path).map(|&pos| self.entries[pos].1)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.positions.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(path, line)| (path.as_str(), *line))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(path, _)| path.as_str())
    }
}

impl Serialize for PathLineIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnomalyKind {
    /// An element name could not be decoded; the node and its subtree were skipped
    MalformedName { name: String, error: NameError },
    /// Close tag without matching open tag, or closing an ancestor of the open node
    Structural(StructuralError),
    /// A second node resolved to an already indexed path
    DuplicatePath { path: String, first_line: u64 },
    /// Node still open when the input ended
    UnterminatedNode { path: String },
}

/// A structural irregularity found while indexing. Reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub line: Option<u64>,
}

impl Anomaly {
    pub fn severity(&self) -> Severity {
        Severity::Error
    }

    /// Node path the anomaly refers to, when it has one.
    pub fn path(&self) -> Option<&str> {
        match &self.kind {
            AnomalyKind::DuplicatePath { path, .. } | AnomalyKind::UnterminatedNode { path } => {
                Some(path)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            AnomalyKind::MalformedName { name, error } => {
                write!(f, "Invalid node name '{}': {}", name, error)
            }
            AnomalyKind::Structural(error) => write!(f, "Invalid nesting: {}", error),
            AnomalyKind::DuplicatePath { path, first_line } => write!(
                f,
                "Duplicate node path '{}' (first defined at line {})",
                path, first_line
            ),
            AnomalyKind::UnterminatedNode { path } => {
                write!(f, "Node '{}' is not closed before end of input", path)
            }
        }
    }
}

/// Everything the indexing pass learned about one file.
#[derive(Debug, Default)]
pub struct IndexOutcome {
    pub index: PathLineIndex,
    pub anomalies: Vec<Anomaly>,
    /// Set when the parser stopped early; the index only covers the part before it
    pub parse_error: Option<ParseError>,
}

impl IndexOutcome {
    pub fn is_complete(&self) -> bool {
        self.parse_error.is_none()
    }
}

/// Incremental index builder fed one event at a time.
#[derive(Debug)]
pub struct IndexBuilder {
    stack: PathStack,
    index: PathLineIndex,
    anomalies: Vec<Anomaly>,
    /// Raw names of the open elements of a subtree skipped because of a malformed name,
    /// the malformed element first
    skipped: Vec<String>,
}

impl IndexBuilder {
    pub fn new(mount: NodePath) -> Self {
        Self {
            stack: PathStack::new(mount),
            index: PathLineIndex::new(),
            anomalies: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn feed(&mut self, event: &ParseEvent) {
        match event {
            ParseEvent::NodeStart { name, line, .. } => self.node_start(name, *line),
            ParseEvent::NodeEnd { name, line } => self.node_end(name, *line),
            ParseEvent::Property { .. } | ParseEvent::Text { .. } | ParseEvent::Comment { .. } => {}
        }
    }

    fn node_start(&mut self, raw: &str, line: u64) {
        if !self.skipped.is_empty() {
            self.skipped.push(raw.to_string());
            return;
        }

        // The outermost element stands for the mount point; its name is not a segment.
        let name = if self.stack.depth() == 0 {
            NodeName::from_parts(raw.to_string(), raw.to_string(), None)
        } else {
            match name_codec::decode(raw) {
                Ok(name) => name,
                Err(error) => {
                    self.anomalies.push(Anomaly {
                        kind: AnomalyKind::MalformedName {
                            name: raw.to_string(),
                            error,
                        },
                        line: Some(line),
                    });
                    self.skipped.push(raw.to_string());
                    return;
                }
            }
        };

        let path = self.stack.push(raw, name).to_string();
        if let Err(first_line) = self.index.insert(path.clone(), line) {
            self.anomalies.push(Anomaly {
                kind: AnomalyKind::DuplicatePath { path, first_line },
                line: Some(line),
            });
        }
    }

    fn node_end(&mut self, raw: &str, line: u64) {
        if !self.skipped.is_empty() && self.skip_end(raw, line) {
            return;
        }

        match self.stack.pop(raw) {
            Ok(_) => {}
            Err(error @ StructuralError::MismatchedClose { .. }) => {
                self.anomalies.push(Anomaly {
                    kind: AnomalyKind::Structural(error),
                    line: Some(line),
                });
                self.stack.unwind_to(raw);
            }
            Err(error @ StructuralError::UnexpectedClose { .. }) => {
                self.anomalies.push(Anomaly {
                    kind: AnomalyKind::Structural(error),
                    line: Some(line),
                });
            }
        }
    }

    /// Close an element while a subtree is being skipped. Returns `false` when the close
    /// tag belongs to an indexed ancestor, which ends the skip and must reach the stack.
    /// A close tag naming no open element at all is recorded and the skip continues.
    fn skip_end(&mut self, raw: &str, line: u64) -> bool {
        let pos = self.skipped.iter().rposition(|open| open == raw);
        if pos.is_none() && !self.stack.is_open(raw) {
            self.anomalies.push(Anomaly {
                kind: AnomalyKind::Structural(StructuralError::UnexpectedClose {
                    name: raw.to_string(),
                }),
                line: Some(line),
            });
            return true;
        }

        if pos.is_none_or(|pos| pos + 1 != self.skipped.len()) {
            let expected = self.skipped.last().cloned().unwrap_or_default();
            self.anomalies.push(Anomaly {
                kind: AnomalyKind::Structural(StructuralError::MismatchedClose {
                    expected,
                    found: raw.to_string(),
                }),
                line: Some(line),
            });
        }

        match pos {
            Some(pos) => {
                self.skipped.truncate(pos);
                true
            }
            None => {
                self.skipped.clear();
                false
            }
        }
    }

    /// Current nesting depth (open, indexed elements).
    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    pub fn finish(mut self, parse_error: Option<ParseError>) -> IndexOutcome {
        for path in self.stack.drain() {
            let path = path.to_string();
            let line = self.index.get(&path);
            self.anomalies.push(Anomaly {
                kind: AnomalyKind::UnterminatedNode { path },
                line,
            });
        }

        IndexOutcome {
            index: self.index,
            anomalies: self.anomalies,
            parse_error,
        }
    }
}

/// Index a whole event stream. Stops consuming at the first parse error.
pub fn index<I>(mount: NodePath, events: I) -> IndexOutcome
where
    I: IntoIterator<Item = Result<ParseEvent, ParseError>>,
{
    let mut builder = IndexBuilder::new(mount);
    let mut parse_error = None;

    for event in events {
        match event {
            Ok(event) => builder.feed(&event),
            Err(error) => {
                parse_error = Some(error);
                break;
            }
        }
    }

    builder.finish(parse_error)
}
