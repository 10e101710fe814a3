//! Validator Contract
//!
//! Validators plug into the run through [`JcrDataValidator`]. Each one is registered once
//! under a unique identifier and reused for every file of the run. Whether a validator
//! needs the path/line index is a [`Capability`] resolved at registration time, so the
//! dispatch loop never has to probe a validator to find out.

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::dispatch::FileKind;
use crate::error::ValidatorError;
use crate::index::PathLineIndex;
use crate::message::ValidationMessage;

/// Identifier under which indexing anomalies and parse failures are reported.
pub const DOCVIEW_PARSER_ID: &str = "jackrabbit-docviewparser";

/// What a validator needs handed to it for each file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Raw bytes plus the path/line index of the document view
    NodeIndex,
    /// Raw bytes only; never triggers the document view parser
    RawBytes,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::NodeIndex => write!(f, "node-index"),
            Capability::RawBytes => write!(f, "raw-bytes"),
        }
    }
}

/// One file of the package as seen by a validator.
#[derive(Debug, Clone, Copy)]
pub struct JcrFile<'a> {
    /// Path relative to `jcr_root`, `/`-separated
    pub file_path: &'a Path,
    /// Absolute path of `jcr_root`
    pub base_path: &'a Path,
    pub kind: FileKind,
}

impl JcrFile<'_> {
    pub fn is_docview(&self) -> bool {
        self.kind == FileKind::DocView
    }
}

/// A validator working on the files below `jcr_root`.
///
/// Implementations are shared across worker threads. Validators that keep cross-file state
/// synchronise it themselves.
pub trait JcrDataValidator: Send + Sync {
    fn capability(&self) -> Capability {
        Capability::RawBytes
    }

    /// Applicability check. Returning `false` means `validate` is never called for `file`.
    fn should_validate(&self, file: &JcrFile<'_>) -> bool;

    /// Process one file. `node_index` is `Some` exactly when the validator declared
    /// [`Capability::NodeIndex`] and the file is a document view.
    fn validate(
        &self,
        input: &mut dyn Read,
        file: &JcrFile<'_>,
        node_index: Option<&PathLineIndex>,
    ) -> Result<Vec<ValidationMessage>, ValidatorError>;

    /// Called once after the last file of the run.
    fn done(&self) -> Vec<ValidationMessage> {
        Vec::new()
    }
}

/// Older validator contract without the root path and without index support.
pub trait LegacyJcrDataValidator: Send + Sync {
    fn should_validate(&self, file_path: &Path) -> bool;

    fn validate(
        &self,
        input: &mut dyn Read,
        file_path: &Path,
    ) -> Result<Vec<ValidationMessage>, ValidatorError>;
}

/// Lets a [`LegacyJcrDataValidator`] take part in a run as a raw-bytes validator.
#[derive(Debug)]
pub struct LegacyAdapter<V>(pub V);

impl<V: LegacyJcrDataValidator> JcrDataValidator for LegacyAdapter<V> {
    fn should_validate(&self, file: &JcrFile<'_>) -> bool {
        self.0.should_validate(file.file_path)
    }

    fn validate(
        &self,
        input: &mut dyn Read,
        file: &JcrFile<'_>,
        _node_index: Option<&PathLineIndex>,
    ) -> Result<Vec<ValidationMessage>, ValidatorError> {
        self.0.validate(input, file.file_path)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("validator id '{0}' is already registered")]
    DuplicateId(String),

    #[error("validator id '{0}' is reserved")]
    ReservedId(String),

    #[error("validator id must not be empty")]
    EmptyId,
}

/// A validator bound to its identifier, registration order and resolved capability.
#[derive(Clone)]
pub struct ValidatorRegistration {
    pub id: String,
    /// 1-based; order 0 belongs to the document view parser
    pub order: usize,
    pub capability: Capability,
    pub validator: Arc<dyn JcrDataValidator>,
}

impl fmt::Debug for ValidatorRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorRegistration")
            .field("id", &self.id)
            .field("order", &self.order)
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}

/// The read-only set of validators of one run, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ValidatorRegistry {
    registrations: Vec<ValidatorRegistration>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        id: impl Into<String>,
        validator: Arc<dyn JcrDataValidator>,
    ) -> Result<&ValidatorRegistration, RegistryError> {
        let id = id.into();
        if id.is_empty() {
            return Err(RegistryError::EmptyId);
        }
        if id == DOCVIEW_PARSER_ID {
            return Err(RegistryError::ReservedId(id));
        }
        if self.get(&id).is_some() {
            return Err(RegistryError::DuplicateId(id));
        }

        let registration = ValidatorRegistration {
            order: self.registrations.len() + 1,
            capability: validator.capability(),
            id,
            validator,
        };
        self.registrations.push(registration);
        Ok(&self.registrations[self.registrations.len() - 1])
    }

    pub fn register_legacy<V>(
        &mut self,
        id: impl Into<String>,
        validator: V,
    ) -> Result<&ValidatorRegistration, RegistryError>
    where
        V: LegacyJcrDataValidator + 'static,
    {
        self.register(id, Arc::new(LegacyAdapter(validator)))
    }

    pub fn get(&self, id: &str) -> Option<&ValidatorRegistration> {
        self.registrations.iter().find(|r| r.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidatorRegistration> {
        self.registrations.iter()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Validators whose applicability check accepts `file`, in registration order.
    pub fn applicable(&self, file: &JcrFile<'_>) -> Vec<&ValidatorRegistration> {
        self.registrations
            .iter()
            .filter(|r| r.validator.should_validate(file))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct Fixed {
        capability: Capability,
        extension: &'static str,
    }

    impl JcrDataValidator for Fixed {
        fn capability(&self) -> Capability {
            self.capability
        }

        fn should_validate(&self, file: &JcrFile<'_>) -> bool {
            file.file_path.extension().is_some_and(|e| e == self.extension)
        }

        fn validate(
            &self,
            _input: &mut dyn Read,
            _file: &JcrFile<'_>,
            _node_index: Option<&PathLineIndex>,
        ) -> Result<Vec<ValidationMessage>, ValidatorError> {
            Ok(Vec::new())
        }
    }

    struct OldStyle;

    impl LegacyJcrDataValidator for OldStyle {
        fn should_validate(&self, file_path: &Path) -> bool {
            file_path.starts_with("apps")
        }

        fn validate(
            &self,
            input: &mut dyn Read,
            file_path: &Path,
        ) -> Result<Vec<ValidationMessage>, ValidatorError> {
            let mut content = String::new();
            input.read_to_string(&mut content)?;
            Ok(vec![
                ValidationMessage::info(format!("{} bytes", content.len())).with_file(file_path),
            ])
        }
    }

    fn file(path: &Path) -> JcrFile<'_> {
        JcrFile {
            file_path: path,
            base_path: Path::new("/pkg/jcr_root"),
            kind: FileKind::Opaque,
        }
    }

    #[test]
    fn test_registration_order_and_capability() {
        let mut registry = ValidatorRegistry::new();
        let first = registry
            .register(
                "first",
                Arc::new(Fixed {
                    capability: Capability::NodeIndex,
                    extension: "xml",
                }),
            )
            .unwrap();
        assert_eq!(first.order, 1);
        assert_eq!(first.capability, Capability::NodeIndex);

        let second = registry.register_legacy("second", OldStyle).unwrap();
        assert_eq!(second.order, 2);
        assert_eq!(second.capability, Capability::RawBytes);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_and_reserved_ids_rejected() {
        let mut registry = ValidatorRegistry::new();
        registry.register_legacy("dup", OldStyle).unwrap();

        assert_eq!(
            registry.register_legacy("dup", OldStyle).unwrap_err(),
            RegistryError::DuplicateId("dup".to_string())
        );
        assert_eq!(
            registry.register_legacy(DOCVIEW_PARSER_ID, OldStyle).unwrap_err(),
            RegistryError::ReservedId(DOCVIEW_PARSER_ID.to_string())
        );
        assert_eq!(
            registry.register_legacy("", OldStyle).unwrap_err(),
            RegistryError::EmptyId
        );
    }

    #[test]
    fn test_applicable_filters_in_registration_order() {
        let mut registry = ValidatorRegistry::new();
        registry
            .register(
                "xml-only",
                Arc::new(Fixed {
                    capability: Capability::RawBytes,
                    extension: "xml",
                }),
            )
            .unwrap();
        registry.register_legacy("apps-only", OldStyle).unwrap();

        let path = PathBuf::from("apps/site/.content.xml");
        let ids: Vec<&str> = registry
            .applicable(&file(&path))
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["xml-only", "apps-only"]);

        let path = PathBuf::from("content/logo.png");
        assert!(registry.applicable(&file(&path)).is_empty());
    }

    #[test]
    fn test_legacy_adapter_ignores_index() {
        let adapter = LegacyAdapter(OldStyle);
        let path = PathBuf::from("apps/x.txt");
        let mut input: &[u8] = b"hello";
        let messages = adapter
            .validate(&mut input, &file(&path), Some(&PathLineIndex::new()))
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message, "5 bytes");
        assert_eq!(adapter.capability(), Capability::RawBytes);
    }
}
