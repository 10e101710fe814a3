//! Document View Event Parser
//!
//! A pull-style streaming tokenizer specialised for the document view dialect. It reads
//! from any [`BufRead`], keeps only the token currently being scanned in memory, and
//! yields [`ParseEvent`]s through the [`Iterator`] interface:
//!
//! - `NodeStart` for every start tag (and every empty-element tag), followed by one
//!   `Property` per non-namespace attribute
//! - `NodeEnd` for every end tag (immediately after the properties for `<empty/>` tags)
//! - `Text` for non-whitespace character data and CDATA sections
//! - `Comment` for comments
//!
//! Nesting is deliberately not enforced here: an unbalanced end tag is reported by the
//! index builder as a structural anomaly rather than aborting the file. Byte-level
//! problems (truncated markup, undecodable bytes, undefined entities) end the stream with
//! a [`ParseError`]; after that the iterator is exhausted.
//!
//! Lines are 1-based and advance on every `\n` byte consumed.

use std::collections::VecDeque;
use std::io::BufRead;

use serde::Serialize;

use crate::error::{ParseError, ParseErrorKind};

/// Namespace prefix reserved for repository metadata (primary type, mixins, ...).
pub const METADATA_PREFIX: &str = "jcr";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Where an attribute came from, from the parser's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyOrigin {
    /// Attribute in the reserved metadata namespace (`jcr:primaryType`, `jcr:mixinTypes`, ...)
    Metadata,
    /// Namespace declaration (`xmlns`, `xmlns:foo`); never reported as a property
    Namespace,
    /// Any other attribute
    Plain,
}

impl PropertyOrigin {
    fn classify(name: &str) -> Self {
        if name == "xmlns" || name.starts_with("xmlns:") {
            PropertyOrigin::Namespace
        } else if name
            .split_once(':')
            .is_some_and(|(prefix, _)| prefix == METADATA_PREFIX)
        {
            PropertyOrigin::Metadata
        } else {
            PropertyOrigin::Plain
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    /// Attribute name as written (still escaped)
    pub name: String,
    /// Value with entity references expanded
    pub value: String,
    pub origin: PropertyOrigin,
}

/// One event of the document view stream. Element and property names are reported as
/// written; decoding and path resolution happen in the index builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseEvent {
    NodeStart {
        name: String,
        line: u64,
        attributes: Vec<Attribute>,
    },
    NodeEnd {
        name: String,
        line: u64,
    },
    Property {
        /// Raw name of the element owning the property
        owner: String,
        name: String,
        value: String,
        origin: PropertyOrigin,
        line: u64,
    },
    Text {
        content: String,
        line: u64,
    },
    Comment {
        content: String,
        line: u64,
    },
}

impl ParseEvent {
    pub fn line(&self) -> u64 {
        match self {
            ParseEvent::NodeStart { line, .. }
            | ParseEvent::NodeEnd { line, .. }
            | ParseEvent::Property { line, .. }
            | ParseEvent::Text { line, .. }
            | ParseEvent::Comment { line, .. } => *line,
        }
    }
}

/// Character encodings the parser can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Latin1,
}

impl Encoding {
    /// Resolve an encoding label as used in XML declarations.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" | "us-ascii" | "ascii" => Some(Encoding::Utf8),
            "iso-8859-1" | "iso8859-1" | "iso_8859-1" | "latin1" | "l1" => Some(Encoding::Latin1),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Latin1 => "ISO-8859-1",
        }
    }

    fn decode(self, bytes: Vec<u8>) -> Result<String, ParseErrorKind> {
        match self {
            Encoding::Utf8 => String::from_utf8(bytes).map_err(|_| ParseErrorKind::InvalidEncoding {
                encoding: self.name(),
            }),
            Encoding::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
        }
    }
}

/// Streaming document view parser. Not restartable: create one per file.
pub struct DocViewParser<R> {
    reader: R,
    line: u64,
    encoding: Encoding,
    /// An encoding supplied by the caller wins over the XML declaration
    encoding_pinned: bool,
    started: bool,
    finished: bool,
    pending: VecDeque<ParseEvent>,
}

impl<R: BufRead> DocViewParser<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 1,
            encoding: Encoding::Utf8,
            encoding_pinned: false,
            started: false,
            finished: false,
            pending: VecDeque::new(),
        }
    }

    /// Create a parser that decodes with the given encoding regardless of any declaration.
    pub fn with_encoding(reader: R, encoding: Encoding) -> Self {
        let mut parser = Self::new(reader);
        parser.encoding = encoding;
        parser.encoding_pinned = true;
        parser
    }

    /// Current 1-based line.
    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(self.line, kind)
    }

    fn eof(&self, context: &'static str) -> ParseError {
        self.error(ParseErrorKind::UnexpectedEof { context })
    }

    fn peek(&mut self) -> Result<Option<u8>, ParseError> {
        let buf = self
            .reader
            .fill_buf()
            .map_err(|e| ParseError::new(self.line, ParseErrorKind::Io(e)))?;
        Ok(buf.first().copied())
    }

    fn bump(&mut self) -> Result<Option<u8>, ParseError> {
        let byte = self.peek()?;
        if let Some(b) = byte {
            self.reader.consume(1);
            if b == b'\n' {
                self.line += 1;
            }
        }
        Ok(byte)
    }

    fn expect_byte(&mut self, context: &'static str) -> Result<u8, ParseError> {
        self.bump()?.ok_or_else(|| self.eof(context))
    }

    fn skip_whitespace(&mut self) -> Result<(), ParseError> {
        while let Some(b) = self.peek()? {
            if !b.is_ascii_whitespace() {
                break;
            }
            self.bump()?;
        }
        Ok(())
    }

    fn skip_bom(&mut self) -> Result<(), ParseError> {
        let buf = self
            .reader
            .fill_buf()
            .map_err(|e| ParseError::new(self.line, ParseErrorKind::Io(e)))?;
        if buf.starts_with(UTF8_BOM) {
            self.reader.consume(UTF8_BOM.len());
        }
        Ok(())
    }

    fn decode(&self, bytes: Vec<u8>) -> Result<String, ParseError> {
        self.encoding.decode(bytes).map_err(|kind| self.error(kind))
    }

    /// Consume bytes up to and including `terminator`, returning what preceded it.
    fn read_until(&mut self, terminator: &[u8], context: &'static str) -> Result<Vec<u8>, ParseError> {
        let mut bytes = Vec::new();
        loop {
            let b = self.expect_byte(context)?;
            bytes.push(b);
            if bytes.ends_with(terminator) {
                bytes.truncate(bytes.len() - terminator.len());
                return Ok(bytes);
            }
        }
    }

    /// Read a tag or attribute name: everything up to whitespace, `=`, `/` or `>`.
    fn read_name(&mut self, context: &'static str) -> Result<String, ParseError> {
        let mut bytes = Vec::new();
        loop {
            match self.peek()? {
                None => return Err(self.eof(context)),
                Some(b) if b.is_ascii_whitespace() || matches!(b, b'=' | b'/' | b'>') => break,
                Some(b'<') => {
                    return Err(self.error(ParseErrorKind::Malformed(format!(
                        "unexpected '<' in {context}"
                    ))));
                }
                Some(b) => {
                    bytes.push(b);
                    self.bump()?;
                }
            }
        }
        if bytes.is_empty() {
            return Err(self.error(ParseErrorKind::Malformed(format!("missing name in {context}"))));
        }
        self.decode(bytes)
    }

    fn next_event(&mut self) -> Result<Option<ParseEvent>, ParseError> {
        if !self.started {
            self.started = true;
            self.skip_bom()?;
        }

        loop {
            let Some(b) = self.peek()? else {
                return Ok(None);
            };

            if b != b'<' {
                if let Some(event) = self.read_text()? {
                    return Ok(Some(event));
                }
                continue;
            }

            let line = self.line;
            self.bump()?;
            match self.peek()? {
                None => return Err(self.eof("markup")),
                Some(b'/') => {
                    self.bump()?;
                    return self.read_end_tag(line).map(Some);
                }
                Some(b'!') => {
                    self.bump()?;
                    if let Some(event) = self.read_bang(line)? {
                        return Ok(Some(event));
                    }
                }
                Some(b'?') => {
                    self.bump()?;
                    self.read_processing_instruction()?;
                }
                Some(_) => return self.read_start_tag(line).map(Some),
            }
        }
    }

    fn read_text(&mut self) -> Result<Option<ParseEvent>, ParseError> {
        let line = self.line;
        let mut bytes = Vec::new();
        while let Some(b) = self.peek()? {
            if b == b'<' {
                break;
            }
            bytes.push(b);
            self.bump()?;
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let raw = self.decode(bytes)?;
        let content = self.expand_entities(&raw)?;
        Ok(Some(ParseEvent::Text { content, line }))
    }

    fn read_start_tag(&mut self, line: u64) -> Result<ParseEvent, ParseError> {
        let name = self.read_name("start tag")?;
        let mut attributes: Vec<Attribute> = Vec::new();

        let empty = loop {
            self.skip_whitespace()?;
            match self.peek()? {
                None => return Err(self.eof("start tag")),
                Some(b'>') => {
                    self.bump()?;
                    break false;
                }
                Some(b'/') => {
                    self.bump()?;
                    match self.expect_byte("start tag")? {
                        b'>' => break true,
                        other => {
                            return Err(self.error(ParseErrorKind::Malformed(format!(
                                "expected '>' after '/' in <{name}>, found '{}'",
                                other as char
                            ))));
                        }
                    }
                }
                Some(_) => {
                    let attribute = self.read_attribute(&name)?;
                    if attributes.iter().any(|a| a.name == attribute.name) {
                        return Err(self.error(ParseErrorKind::Malformed(format!(
                            "duplicate attribute '{}' on <{name}>",
                            attribute.name
                        ))));
                    }
                    attributes.push(attribute);
                }
            }
        };

        for attribute in &attributes {
            if attribute.origin == PropertyOrigin::Namespace {
                continue;
            }
            self.pending.push_back(ParseEvent::Property {
                owner: name.clone(),
                name: attribute.name.clone(),
                value: attribute.value.clone(),
                origin: attribute.origin,
                line,
            });
        }
        if empty {
            self.pending.push_back(ParseEvent::NodeEnd {
                name: name.clone(),
                line: self.line,
            });
        }

        Ok(ParseEvent::NodeStart {
            name,
            line,
            attributes,
        })
    }

    fn read_attribute(&mut self, element: &str) -> Result<Attribute, ParseError> {
        let name = self.read_name("attribute")?;
        self.skip_whitespace()?;
        if self.expect_byte("attribute")? != b'=' {
            return Err(self.error(ParseErrorKind::Malformed(format!(
                "attribute '{name}' on <{element}> has no value"
            ))));
        }
        self.skip_whitespace()?;

        let quote = self.expect_byte("attribute value")?;
        if quote != b'"' && quote != b'\'' {
            return Err(self.error(ParseErrorKind::Malformed(format!(
                "unquoted value for attribute '{name}'"
            ))));
        }

        let mut bytes = Vec::new();
        loop {
            match self.expect_byte("attribute value")? {
                b if b == quote => break,
                b'<' => {
                    return Err(self.error(ParseErrorKind::Malformed(format!(
                        "'<' in value of attribute '{name}'"
                    ))));
                }
                b => bytes.push(b),
            }
        }

        let raw = self.decode(bytes)?;
        let value = self.expand_entities(&raw)?;
        let origin = PropertyOrigin::classify(&name);
        Ok(Attribute {
            name,
            value,
            origin,
        })
    }

    fn read_end_tag(&mut self, line: u64) -> Result<ParseEvent, ParseError> {
        let name = self.read_name("end tag")?;
        self.skip_whitespace()?;
        match self.expect_byte("end tag")? {
            b'>' => Ok(ParseEvent::NodeEnd { name, line }),
            other => Err(self.error(ParseErrorKind::Malformed(format!(
                "unexpected '{}' in end tag </{name}>",
                other as char
            )))),
        }
    }

    /// `<!` has been consumed: comment, CDATA section or DOCTYPE.
    fn read_bang(&mut self, line: u64) -> Result<Option<ParseEvent>, ParseError> {
        match self.peek()? {
            Some(b'-') => {
                self.bump()?;
                if self.expect_byte("comment")? != b'-' {
                    return Err(self.error(ParseErrorKind::Malformed("invalid comment start".into())));
                }
                let bytes = self.read_until(b"-->", "comment")?;
                let content = self.decode(bytes)?;
                Ok(Some(ParseEvent::Comment { content, line }))
            }
            Some(b'[') => {
                self.bump()?;
                let opener = self.read_until(b"[", "CDATA section")?;
                if opener.as_slice() != b"CDATA" {
                    return Err(self.error(ParseErrorKind::Malformed("invalid CDATA section".into())));
                }
                let bytes = self.read_until(b"]]>", "CDATA section")?;
                let content = self.decode(bytes)?;
                Ok(Some(ParseEvent::Text { content, line }))
            }
            Some(b'D') => {
                self.skip_doctype()?;
                Ok(None)
            }
            _ => Err(self.error(ParseErrorKind::Malformed("unknown markup declaration".into()))),
        }
    }

    fn skip_doctype(&mut self) -> Result<(), ParseError> {
        let mut depth = 0usize;
        loop {
            match self.expect_byte("DOCTYPE")? {
                b'[' => depth += 1,
                b']' => depth = depth.saturating_sub(1),
                b'>' if depth == 0 => return Ok(()),
                _ => {}
            }
        }
    }

    /// `<?` has been consumed. The XML declaration may switch the encoding.
    fn read_processing_instruction(&mut self) -> Result<(), ParseError> {
        let bytes = self.read_until(b"?>", "processing instruction")?;
        let body = String::from_utf8_lossy(&bytes);

        let is_declaration = body
            .split_whitespace()
            .next()
            .is_some_and(|target| target == "xml");
        if !is_declaration || self.encoding_pinned {
            return Ok(());
        }

        if let Some(label) = pseudo_attribute(&body, "encoding") {
            self.encoding = Encoding::from_label(&label)
                .ok_or_else(|| self.error(ParseErrorKind::UnsupportedEncoding(label)))?;
        }
        Ok(())
    }

    fn expand_entities(&self, raw: &str) -> Result<String, ParseError> {
        if !raw.contains('&') {
            return Ok(raw.to_string());
        }

        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;
        while let Some(pos) = rest.find('&') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];
            let end = after.find(';').ok_or_else(|| {
                self.error(ParseErrorKind::Malformed("unterminated entity reference".into()))
            })?;
            let entity = &after[..end];

            let ch = match entity {
                "lt" => '<',
                "gt" => '>',
                "amp" => '&',
                "quot" => '"',
                "apos" => '\'',
                _ => self.char_reference(entity)?,
            };
            out.push(ch);
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn char_reference(&self, entity: &str) -> Result<char, ParseError> {
        let code = if let Some(hex) = entity.strip_prefix("#x") {
            u32::from_str_radix(hex, 16).ok()
        } else if let Some(dec) = entity.strip_prefix('#') {
            dec.parse::<u32>().ok()
        } else {
            return Err(self.error(ParseErrorKind::UndefinedEntity(entity.to_string())));
        };

        code.and_then(char::from_u32).ok_or_else(|| {
            self.error(ParseErrorKind::Malformed(format!(
                "invalid character reference '&{entity};'"
            )))
        })
    }
}

impl<R: BufRead> Iterator for DocViewParser<R> {
    type Item = Result<ParseEvent, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(event) = self.pending.pop_front() {
            return Some(Ok(event));
        }
        if self.finished {
            return None;
        }

        match self.next_event() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: BufRead> std::iter::FusedIterator for DocViewParser<R> {}

/// Extract `key="value"` from the body of a processing instruction.
fn pseudo_attribute(body: &str, key: &str) -> Option<String> {
    let start = body.find(key)? + key.len();
    let rest = body[start..].trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &rest[1..];
    let end = value.find(quote)?;
    Some(value[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn events(input: &str) -> Vec<Result<ParseEvent, ParseError>> {
        DocViewParser::new(Cursor::new(input.as_bytes().to_vec())).collect()
    }

    fn ok_events(input: &str) -> Vec<ParseEvent> {
        events(input)
            .into_iter()
            .map(|e| e.expect("well-formed input"))
            .collect()
    }

    #[test]
    fn test_single_empty_element() {
        let events = ok_events(r#"<jcr:root jcr:primaryType="nt:unstructured"/>"#);
        assert_eq!(events.len(), 3);

        match &events[0] {
            ParseEvent::NodeStart {
                name,
                line,
                attributes,
            } => {
                assert_eq!(name, "jcr:root");
                assert_eq!(*line, 1);
                assert_eq!(attributes.len(), 1);
                assert_eq!(attributes[0].origin, PropertyOrigin::Metadata);
            }
            other => panic!("expected NodeStart, got {other:?}"),
        }
        assert!(matches!(
            &events[1],
            ParseEvent::Property { name, value, origin: PropertyOrigin::Metadata, .. }
                if name == "jcr:primaryType" && value == "nt:unstructured"
        ));
        assert!(matches!(&events[2], ParseEvent::NodeEnd { name, .. } if name == "jcr:root"));
    }

    #[test]
    fn test_node_start_lines() {
        let input = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<jcr:root>\n  <a>\n    <b/>\n  </a>\n</jcr:root>\n";
        let starts: Vec<(String, u64)> = ok_events(input)
            .into_iter()
            .filter_map(|e| match e {
                ParseEvent::NodeStart { name, line, .. } => Some((name, line)),
                _ => None,
            })
            .collect();
        assert_eq!(
            starts,
            vec![
                ("jcr:root".to_string(), 2),
                ("a".to_string(), 3),
                ("b".to_string(), 4)
            ]
        );
    }

    #[test]
    fn test_multiline_start_tag_reports_first_line() {
        let input = "<jcr:root>\n<child\n  a=\"1\"\n  b=\"2\"/>\n</jcr:root>";
        let events = ok_events(input);
        assert!(matches!(&events[1], ParseEvent::NodeStart { name, line: 2, .. } if name == "child"));
    }

    #[test]
    fn test_crlf_counts_once() {
        let input = "<jcr:root>\r\n<a/>\r\n<b/>\r\n</jcr:root>";
        let lines: Vec<u64> = ok_events(input)
            .into_iter()
            .filter_map(|e| match e {
                ParseEvent::NodeStart { line, .. } => Some(line),
                _ => None,
            })
            .collect();
        assert_eq!(lines, vec![1, 2, 3]);
    }

    #[test]
    fn test_namespace_declarations_are_not_properties() {
        let input = r#"<jcr:root xmlns:jcr="http://www.jcp.org/jcr/1.0" title="x"/>"#;
        let events = ok_events(input);
        let props: Vec<&ParseEvent> = events
            .iter()
            .filter(|e| matches!(e, ParseEvent::Property { .. }))
            .collect();
        assert_eq!(props.len(), 1);
        assert!(matches!(
            props[0],
            ParseEvent::Property { origin: PropertyOrigin::Plain, .. }
        ));
    }

    #[test]
    fn test_entities_in_attributes_and_text() {
        let input = r#"<r a="&lt;b&gt; &amp; &quot;c&quot; &#65;&#x42;">x &amp; y</r>"#;
        let events = ok_events(input);
        assert!(matches!(
            &events[1],
            ParseEvent::Property { value, .. } if value == "<b> & \"c\" AB"
        ));
        assert!(matches!(&events[2], ParseEvent::Text { content, .. } if content == "x & y"));
    }

    #[test]
    fn test_comment_cdata_and_doctype() {
        let input = "<!DOCTYPE r [ <!ELEMENT r ANY> ]>\n<r><!-- note --><![CDATA[<raw>]]></r>";
        let events = ok_events(input);
        assert!(matches!(&events[0], ParseEvent::NodeStart { line: 2, .. }));
        assert!(matches!(&events[1], ParseEvent::Comment { content, .. } if content == " note "));
        assert!(matches!(&events[2], ParseEvent::Text { content, .. } if content == "<raw>"));
        assert!(matches!(&events[3], ParseEvent::NodeEnd { .. }));
    }

    #[test]
    fn test_utf8_bom_is_skipped() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"<r/>");
        let events: Vec<_> = DocViewParser::new(Cursor::new(bytes)).collect();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(Result::is_ok));
    }

    #[test]
    fn test_latin1_declaration() {
        let mut bytes = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><r t=\"".to_vec();
        bytes.push(0xE9);
        bytes.extend_from_slice(b"\"/>");
        let events: Vec<_> = DocViewParser::new(Cursor::new(bytes))
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(matches!(&events[1], ParseEvent::Property { value, .. } if value == "é"));
    }

    #[test]
    fn test_pinned_encoding_ignores_declaration() {
        let bytes = b"<?xml version=\"1.0\" encoding=\"EBCDIC\"?><r/>".to_vec();
        let parser = DocViewParser::with_encoding(Cursor::new(bytes), Encoding::Utf8);
        assert!(parser.collect::<Result<Vec<_>, _>>().is_ok());
    }

    #[test]
    fn test_unsupported_encoding() {
        let results = events("<?xml version=\"1.0\" encoding=\"EBCDIC\"?>\n<r/>");
        assert_eq!(results.len(), 1);
        let err = results.into_iter().next().unwrap().unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnsupportedEncoding(ref l) if l == "EBCDIC"));
    }

    #[test]
    fn test_invalid_utf8_stops_stream() {
        let mut bytes = b"<r>\n<a t=\"".to_vec();
        bytes.push(0xFF);
        bytes.extend_from_slice(b"\"/>\n<b/></r>");
        let results: Vec<_> = DocViewParser::new(Cursor::new(bytes)).collect();

        assert!(matches!(results[0], Ok(ParseEvent::NodeStart { .. })));
        let err = results.last().unwrap().as_ref().unwrap_err();
        assert_eq!(err.line, 2);
        assert!(matches!(err.kind, ParseErrorKind::InvalidEncoding { .. }));
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_truncated_tag_is_parse_error_with_line() {
        let results = events("<r>\n<a>\n<b attr=\"1\"");
        let err = results.last().unwrap().as_ref().unwrap_err();
        assert_eq!(err.line, 3);
        assert!(matches!(err.kind, ParseErrorKind::UnexpectedEof { .. }));
    }

    #[test]
    fn test_unclosed_elements_are_not_parse_errors() {
        let results = events("<r>\n<a>\n<b>");
        assert!(results.iter().all(Result::is_ok));
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_unbalanced_end_tag_is_passed_through() {
        let events = ok_events("<r><a></a></a><b/></r>");
        let ends = events
            .iter()
            .filter(|e| matches!(e, ParseEvent::NodeEnd { .. }))
            .count();
        assert_eq!(ends, 4);
    }

    #[test]
    fn test_undefined_entity() {
        let results = events("<r a=\"&nbsp;\"/>");
        let err = results.last().unwrap().as_ref().unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UndefinedEntity(ref e) if e == "nbsp"));
    }

    #[test]
    fn test_duplicate_attribute() {
        let results = events("<r a=\"1\" a=\"2\"/>");
        assert!(matches!(
            results.last().unwrap(),
            Err(ParseError {
                kind: ParseErrorKind::Malformed(_),
                ..
            })
        ));
    }

    #[test]
    fn test_iterator_is_fused_after_error() {
        let mut parser = DocViewParser::new(Cursor::new(b"<r".to_vec()));
        assert!(matches!(parser.next(), Some(Err(_))));
        assert!(parser.next().is_none());
        assert!(parser.next().is_none());
    }

    #[test]
    fn test_bracketed_element_names_are_accepted() {
        let events = ok_events("<r><child[2]/></r>");
        assert!(matches!(&events[1], ParseEvent::NodeStart { name, .. } if name == "child[2]"));
    }

    #[test]
    fn test_pseudo_attribute() {
        assert_eq!(
            pseudo_attribute("xml version=\"1.0\" encoding='latin1'", "encoding"),
            Some("latin1".to_string())
        );
        assert_eq!(pseudo_attribute("xml version=\"1.0\"", "encoding"), None);
    }
}
