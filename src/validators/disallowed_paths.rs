use std::io::Read;

use globset::GlobSet;

use crate::error::{Result, ValidatorError};
use crate::index::PathLineIndex;
use crate::message::ValidationMessage;
use crate::package::build_glob_set;
use crate::spi::{Capability, JcrDataValidator, JcrFile};

/// Reports every node whose path matches one of the configured globs.
///
/// Patterns are matched against normalized node paths such as `/content/site/jcr:content`;
/// `*` stays within one path segment, `**` crosses segments.
#[derive(Debug)]
pub struct DisallowedPathsValidator {
    patterns: Vec<String>,
    globs: Option<GlobSet>,
}

impl DisallowedPathsValidator {
    pub fn new(patterns: &[String]) -> Result<Self> {
        Ok(Self {
            patterns: patterns.to_vec(),
            globs: build_glob_set(patterns)?,
        })
    }

    fn first_match(&self, node_path: &str) -> Option<&str> {
        let globs = self.globs.as_ref()?;
        let index = globs.matches(node_path).into_iter().min()?;
        self.patterns.get(index).map(String::as_str)
    }
}

impl JcrDataValidator for DisallowedPathsValidator {
    fn capability(&self) -> Capability {
        Capability::NodeIndex
    }

    fn should_validate(&self, file: &JcrFile<'_>) -> bool {
        file.is_docview()
    }

    fn validate(
        &self,
        _input: &mut dyn Read,
        _file: &JcrFile<'_>,
        node_index: Option<&PathLineIndex>,
    ) -> std::result::Result<Vec<ValidationMessage>, ValidatorError> {
        let Some(index) = node_index else {
            return Ok(Vec::new());
        };

        Ok(index
            .iter()
            .filter_map(|(path, line)| {
                self.first_match(path).map(|pattern| {
                    ValidationMessage::error(format!(
                        "Node '{}' is not allowed (matches '{}')",
                        path, pattern
                    ))
                    .with_node_path(path)
                    .with_line(line)
                })
            })
            .collect())
    }
}
