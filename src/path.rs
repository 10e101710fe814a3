//! Node names, node paths and the path stack used while streaming a document view.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::{NameError, StructuralError};
use crate::name_codec;

/// One path segment: escaped form, decoded form and optional same-name-sibling index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeName {
    escaped: String,
    decoded: String,
    index: Option<u32>,
}

impl NodeName {
    /// Build a name from its decoded form, deriving the escaped form.
    pub fn new(decoded: impl Into<String>, index: Option<u32>) -> Self {
        let decoded = decoded.into();
        Self {
            escaped: name_codec::encode(&decoded, index),
            decoded,
            index,
        }
    }

    pub(crate) fn from_parts(escaped: String, decoded: String, index: Option<u32>) -> Self {
        Self {
            escaped,
            decoded,
            index,
        }
    }

    pub fn escaped(&self) -> &str {
        &self.escaped
    }

    pub fn decoded(&self) -> &str {
        &self.decoded
    }

    /// Explicit index as found in the source, if any.
    pub fn index(&self) -> Option<u32> {
        self.index
    }

    pub fn effective_index(&self) -> u32 {
        self.index.unwrap_or(1)
    }

    /// Same name with a resolved sibling index.
    pub fn with_index(&self, index: u32) -> Self {
        Self {
            escaped: self.escaped.clone(),
            decoded: self.decoded.clone(),
            index: Some(index),
        }
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.effective_index() {
            1 => write!(f, "{}", self.decoded),
            n => write!(f, "{}[{}]", self.decoded, n),
        }
    }
}

/// Absolute node path, rooted at the repository root.
///
/// Renders as `/` for the root and `/a/b[2]` otherwise; index 1 is never printed, so
/// `child` and `child[1]` address the same node.
#[derive(Debug, Clone, Default)]
pub struct NodePath {
    segments: Vec<NodeName>,
}

impl NodePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<NodeName>) -> Self {
        Self { segments }
    }

    /// Parse a normalized path string (decoded names, `[N]` indices).
    pub fn parse(path: &str) -> Result<Self, NameError> {
        let mut segments = Vec::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            let (name, index) = name_codec::split_index(part)?;
            if name.is_empty() {
                return Err(NameError::Empty);
            }
            segments.push(NodeName::new(name, index));
        }
        Ok(Self { segments })
    }

    pub fn child(&self, name: NodeName) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name);
        Self { segments }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn name(&self) -> Option<&NodeName> {
        self.segments.last()
    }

    pub fn segments(&self) -> &[NodeName] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

// Equality follows the rendered form: the escaped spelling and an explicit `[1]` do not
// distinguish nodes.
impl PartialEq for NodePath {
    fn eq(&self, other: &Self) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| a.decoded == b.decoded && a.effective_index() == b.effective_index())
    }
}

impl Eq for NodePath {}

impl Serialize for NodePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug)]
struct Frame {
    /// Element name exactly as it appeared in the open tag
    raw: String,
    path: NodePath,
    /// Sibling indices already taken under this node, per decoded child name
    taken: HashMap<String, BTreeSet<u32>>,
}

/// Tracks the absolute path of the innermost open element during a streaming parse.
///
/// The outermost element of a document view stands for the node the file is mounted
/// at, so its own name never becomes a path segment.
#[derive(Debug)]
pub struct PathStack {
    mount: NodePath,
    frames: Vec<Frame>,
}

impl PathStack {
    pub fn new(mount: NodePath) -> Self {
        Self {
            mount,
            frames: Vec::new(),
        }
    }

    /// Open an element and return the path it resolves to.
    ///
    /// Sibling indices: an explicit index is used as-is; otherwise the lowest index not
    /// yet taken under the parent for that decoded name is assigned.
    pub fn push(&mut self, raw: &str, name: NodeName) -> NodePath {
        let path = match self.frames.last_mut() {
            None => self.mount.clone(),
            Some(parent) => {
                let taken = parent.taken.entry(name.decoded().to_string()).or_default();
                let index = match name.index() {
                    Some(explicit) => explicit,
                    None => (1..).find(|i| !taken.contains(i)).unwrap_or(1),
                };
                taken.insert(index);
                parent.path.child(name.with_index(index))
            }
        };

        self.frames.push(Frame {
            raw: raw.to_string(),
            path: path.clone(),
            taken: HashMap::new(),
        });
        path
    }

    /// Close the innermost element. The closing name must match the innermost open tag;
    /// on mismatch the stack is left untouched.
    pub fn pop(&mut self, raw: &str) -> Result<NodePath, StructuralError> {
        let Some(top) = self.frames.last() else {
            return Err(StructuralError::UnexpectedClose {
                name: raw.to_string(),
            });
        };

        if top.raw == raw {
            let frame = self.frames.pop().ok_or(StructuralError::UnexpectedClose {
                name: raw.to_string(),
            })?;
            return Ok(frame.path);
        }

        if self.frames.iter().any(|f| f.raw == raw) {
            Err(StructuralError::MismatchedClose {
                expected: top.raw.clone(),
                found: raw.to_string(),
            })
        } else {
            Err(StructuralError::UnexpectedClose {
                name: raw.to_string(),
            })
        }
    }

    /// Recover from a mismatched close: pop every frame down to and including the
    /// innermost one opened as `raw`. Returns the paths left open by the source,
    /// innermost first, excluding the matching frame itself.
    pub fn unwind_to(&mut self, raw: &str) -> Vec<NodePath> {
        let Some(pos) = self.frames.iter().rposition(|f| f.raw == raw) else {
            return Vec::new();
        };
        let mut closed: Vec<NodePath> = self.frames.drain(pos..).map(|f| f.path).collect();
        closed.remove(0);
        closed.reverse();
        closed
    }

    /// Remove all open frames, outermost first.
    pub fn drain(&mut self) -> Vec<NodePath> {
        self.frames.drain(..).map(|f| f.path).collect()
    }

    /// Whether an element with this raw name is currently open.
    pub fn is_open(&self, raw: &str) -> bool {
        self.frames.iter().any(|f| f.raw == raw)
    }

    pub fn current(&self) -> Option<&NodePath> {
        self.frames.last().map(|f| &f.path)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn mount(&self) -> &NodePath {
        &self.mount
    }
}
