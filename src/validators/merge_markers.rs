use std::io::{BufRead, BufReader, Read};

use crate::error::ValidatorError;
use crate::index::PathLineIndex;
use crate::message::ValidationMessage;
use crate::spi::{JcrDataValidator, JcrFile};

const MARKERS: [&[u8]; 3] = [b"<<<<<<< ", b"=======", b">>>>>>> "];
const SEPARATOR: &[u8] = b"=======";

/// Marker opening `line`, if any. The separator must be the whole line.
fn marker_of(line: &[u8]) -> Option<&'static [u8]> {
    let content = line.strip_suffix(b"\n").unwrap_or(line);
    let content = content.strip_suffix(b"\r").unwrap_or(content);

    MARKERS.iter().copied().find(|&marker| {
        if marker == SEPARATOR {
            content == SEPARATOR
        } else {
            content.starts_with(marker)
        }
    })
}

/// Flags lines left behind by an unresolved version control merge.
#[derive(Debug, Default, Clone, Copy)]
pub struct MergeMarkersValidator;

impl JcrDataValidator for MergeMarkersValidator {
    fn should_validate(&self, _file: &JcrFile<'_>) -> bool {
        true
    }

    fn validate(
        &self,
        input: &mut dyn Read,
        _file: &JcrFile<'_>,
        _node_index: Option<&PathLineIndex>,
    ) -> Result<Vec<ValidationMessage>, ValidatorError> {
        let mut reader = BufReader::new(input);
        let mut messages = Vec::new();
        let mut line = Vec::new();
        let mut number = 0u64;

        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            number += 1;

            if let Some(marker) = marker_of(&line) {
                let marker = String::from_utf8_lossy(marker);
                messages.push(
                    ValidationMessage::error(format!(
                        "Found merge conflict marker '{}'",
                        marker.trim_end()
                    ))
                    .with_line(number)
                    .with_column(1),
                );
            }
        }

        Ok(messages)
    }
}
