use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use docview_validate::{
    Capability, JcrDataValidator, JcrFile, LegacyJcrDataValidator, PathLineIndex,
    ValidationMessage, ValidatorError,
};

/// Panics on files whose path contains `trigger`, reports nothing otherwise.
pub struct PanickingValidator {
    pub trigger: &'static str,
}

impl JcrDataValidator for PanickingValidator {
    fn should_validate(&self, _file: &JcrFile<'_>) -> bool {
        true
    }

    fn validate(
        &self,
        _input: &mut dyn Read,
        file: &JcrFile<'_>,
        _node_index: Option<&PathLineIndex>,
    ) -> Result<Vec<ValidationMessage>, ValidatorError> {
        if file.file_path.to_string_lossy().contains(self.trigger) {
            panic!("boom on {}", file.file_path.display());
        }
        Ok(Vec::new())
    }
}

/// Returns an error for every file.
pub struct FailingValidator;

impl JcrDataValidator for FailingValidator {
    fn should_validate(&self, _file: &JcrFile<'_>) -> bool {
        true
    }

    fn validate(
        &self,
        _input: &mut dyn Read,
        _file: &JcrFile<'_>,
        _node_index: Option<&PathLineIndex>,
    ) -> Result<Vec<ValidationMessage>, ValidatorError> {
        Err(ValidatorError::Failed("rule engine unavailable".to_string()))
    }
}

/// Reports one info message per file and remembers what it saw.
#[derive(Default)]
pub struct RecordingValidator {
    pub capability: Option<Capability>,
    seen: Mutex<Vec<(PathBuf, Option<usize>)>>,
}

impl RecordingValidator {
    pub fn with_index() -> Self {
        Self {
            capability: Some(Capability::NodeIndex),
            ..Self::default()
        }
    }

    /// `(file, index size)` pairs in call order.
    pub fn seen(&self) -> Vec<(PathBuf, Option<usize>)> {
        self.seen.lock().unwrap().clone()
    }
}

impl JcrDataValidator for RecordingValidator {
    fn capability(&self) -> Capability {
        self.capability.unwrap_or(Capability::RawBytes)
    }

    fn should_validate(&self, _file: &JcrFile<'_>) -> bool {
        true
    }

    fn validate(
        &self,
        input: &mut dyn Read,
        file: &JcrFile<'_>,
        node_index: Option<&PathLineIndex>,
    ) -> Result<Vec<ValidationMessage>, ValidatorError> {
        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;
        self.seen
            .lock()
            .unwrap()
            .push((file.file_path.to_path_buf(), node_index.map(PathLineIndex::len)));
        Ok(vec![ValidationMessage::info(format!("{} bytes", bytes.len()))])
    }
}

/// Validator written against the older contract: flags empty files.
pub struct EmptyFileCheck;

impl LegacyJcrDataValidator for EmptyFileCheck {
    fn should_validate(&self, file_path: &Path) -> bool {
        file_path.extension().is_some_and(|ext| ext == "txt")
    }

    fn validate(
        &self,
        input: &mut dyn Read,
        _file_path: &Path,
    ) -> Result<Vec<ValidationMessage>, ValidatorError> {
        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;
        Ok(if bytes.is_empty() {
            vec![ValidationMessage::warn("empty file")]
        } else {
            Vec::new()
        })
    }
}

/// Accepts every file but panics in its end-of-run hook.
pub struct PanicsWhenDone;

impl JcrDataValidator for PanicsWhenDone {
    fn should_validate(&self, _file: &JcrFile<'_>) -> bool {
        true
    }

    fn validate(
        &self,
        _input: &mut dyn Read,
        _file: &JcrFile<'_>,
        _node_index: Option<&PathLineIndex>,
    ) -> Result<Vec<ValidationMessage>, ValidatorError> {
        Ok(Vec::new())
    }

    fn done(&self) -> Vec<ValidationMessage> {
        panic!("summary unavailable");
    }
}
