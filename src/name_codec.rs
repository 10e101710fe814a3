//! Name Codec
//!
//! Reversible mapping between the escaped names found in a serialized package and the
//! true repository item names. Two flavours exist:
//!
//! - **Element names** (document view XML): characters that are not legal in an XML name
//!   are written as `_xHHHH_` (four hex digits). A literal `_` that would otherwise be read
//!   as the start of an escape is itself escaped. A trailing `[N]` token carries an explicit
//!   same-name-sibling index.
//! - **Platform names** (file and directory names below `jcr_root`): a namespace prefix
//!   `ns:local` is written `_ns_local`, a leading underscore is doubled, and characters
//!   that file systems reject are written as `%xx`.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::NameError;
use crate::path::NodeName;

/// Same-name-sibling index token: everything before the first `[` is the name.
static INDEX_TOKEN: OnceLock<Regex> = OnceLock::new();

fn index_token_regex() -> &'static Regex {
    INDEX_TOKEN.get_or_init(|| {
        Regex::new(r"^([^\[\]]*)\[([1-9][0-9]{0,8})\]$")
            .expect("Failed to compile index token regex")
    })
}

/// Characters file systems cannot hold, written as `%xx` in platform names.
const PLATFORM_RESERVED: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|', '%'];

/// Decode one document view element (or attribute) name.
///
/// Absence of an index token yields `index() == None`, which callers read as index 1.
pub fn decode(escaped: &str) -> Result<NodeName, NameError> {
    if escaped.is_empty() {
        return Err(NameError::Empty);
    }

    let (base, index) = split_index(escaped)?;
    let decoded = unescape_element(base, escaped)?;
    if decoded.is_empty() {
        return Err(NameError::Empty);
    }

    Ok(NodeName::from_parts(escaped.to_string(), decoded, index))
}

/// Encode a repository name (plus optional explicit sibling index) as an element name.
pub fn encode(name: &str, index: Option<u32>) -> String {
    let mut out = escape_element(name);
    if let Some(index) = index {
        out.push('[');
        out.push_str(&index.to_string());
        out.push(']');
    }
    out
}

/// Split a trailing `[N]` token off a name. Any other use of `[` or `]` is malformed.
pub fn split_index(escaped: &str) -> Result<(&str, Option<u32>), NameError> {
    if !escaped.contains(['[', ']']) {
        return Ok((escaped, None));
    }

    let caps = index_token_regex()
        .captures(escaped)
        .ok_or_else(|| NameError::MalformedIndex {
            name: escaped.to_string(),
        })?;

    let base = caps.get(1).map_or("", |m| m.as_str());
    let index = caps[2].parse::<u32>().map_err(|_| NameError::MalformedIndex {
        name: escaped.to_string(),
    })?;

    Ok((base, Some(index)))
}

fn is_name_char(c: char, first: bool) -> bool {
    if !c.is_ascii() {
        return true;
    }
    match c {
        'a'..='z' | 'A'..='Z' => true,
        '0'..='9' | '-' | '.' | ':' => !first,
        '_' => true,
        _ => false,
    }
}

fn escape_element(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len());

    for (i, &c) in chars.iter().enumerate() {
        let escape_underscore = c == '_' && chars.get(i + 1) == Some(&'x');
        if escape_underscore || !is_name_char(c, i == 0) {
            out.push_str(&format!("_x{:04X}_", c as u32));
        } else {
            out.push(c);
        }
    }

    out
}

fn unescape_element(base: &str, whole: &str) -> Result<String, NameError> {
    let bytes = base.as_bytes();
    let mut out = String::with_capacity(base.len());
    let mut i = 0;

    while i < bytes.len() {
        let starts_escape = bytes[i] == b'_'
            && bytes.get(i + 1) == Some(&b'x')
            && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit);

        if !starts_escape {
            // Copy one whole UTF-8 character.
            let ch = base[i..].chars().next().ok_or(NameError::Empty)?;
            out.push(ch);
            i += ch.len_utf8();
            continue;
        }

        let hex = bytes.get(i + 2..i + 6);
        let complete = hex.is_some_and(|h| h.iter().all(u8::is_ascii_hexdigit))
            && bytes.get(i + 6) == Some(&b'_');
        if !complete {
            return Err(NameError::IncompleteEscape {
                name: whole.to_string(),
                offset: i,
            });
        }

        let code = u32::from_str_radix(&base[i + 2..i + 6], 16).map_err(|_| {
            NameError::IncompleteEscape {
                name: whole.to_string(),
                offset: i,
            }
        })?;
        let ch = char::from_u32(code).ok_or_else(|| NameError::InvalidCodePoint {
            name: whole.to_string(),
            offset: i,
        })?;
        out.push(ch);
        i += 7;
    }

    Ok(out)
}

/// Decode one file or directory name below `jcr_root` into a repository name.
pub fn decode_platform(segment: &str) -> Result<String, NameError> {
    if segment.is_empty() {
        return Err(NameError::Empty);
    }

    let name = if let Some(rest) = segment.strip_prefix("__") {
        format!("_{}", unescape_platform(rest, segment)?)
    } else if let Some(rest) = segment.strip_prefix('_') {
        match rest.find('_') {
            Some(pos) if pos > 0 => format!(
                "{}:{}",
                unescape_platform(&rest[..pos], segment)?,
                unescape_platform(&rest[pos + 1..], segment)?
            ),
            _ => format!("_{}", unescape_platform(rest, segment)?),
        }
    } else {
        unescape_platform(segment, segment)?
    };

    if name.is_empty() {
        return Err(NameError::Empty);
    }
    Ok(name)
}

/// Encode a repository name as a file or directory name.
pub fn encode_platform(name: &str) -> String {
    if let Some((prefix, local)) = name.split_once(':')
        && !prefix.is_empty()
        && !prefix.contains('_')
    {
        return format!(
            "_{}_{}",
            escape_platform(prefix),
            escape_platform(local)
        );
    }

    if name.starts_with('_') {
        format!("_{}", escape_platform(name))
    } else {
        escape_platform(name)
    }
}

fn escape_platform(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if PLATFORM_RESERVED.contains(&c) {
            out.push_str(&format!("%{:02x}", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

fn unescape_platform(part: &str, whole: &str) -> Result<String, NameError> {
    let bytes = part.as_bytes();
    let mut out = String::with_capacity(part.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'%' {
            let ch = part[i..].chars().next().ok_or(NameError::Empty)?;
            out.push(ch);
            i += ch.len_utf8();
            continue;
        }

        let hex = part
            .get(i + 1..i + 3)
            .filter(|h| h.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| NameError::IncompleteEscape {
                name: whole.to_string(),
                offset: i,
            })?;
        let code = u32::from_str_radix(hex, 16).map_err(|_| NameError::IncompleteEscape {
            name: whole.to_string(),
            offset: i,
        })?;
        let ch = char::from_u32(code).ok_or_else(|| NameError::InvalidCodePoint {
            name: whole.to_string(),
            offset: i,
        })?;
        out.push(ch);
        i += 3;
    }

    Ok(out)
}
