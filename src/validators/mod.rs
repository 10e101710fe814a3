//! Built-in validators.
//!
//! Domain rules normally come from external plugins; these two keep the tool useful on its
//! own and cover both sides of the capability split.

mod disallowed_paths;
mod merge_markers;

use std::sync::Arc;

use tracing::debug;

use crate::config::ValidatorsConfig;
use crate::error::{Result, ValidationError};
use crate::spi::ValidatorRegistry;

pub use disallowed_paths::DisallowedPathsValidator;
pub use merge_markers::MergeMarkersValidator;

pub const DISALLOWED_PATHS_ID: &str = "jackrabbit-disallowed-paths";
pub const MERGE_MARKERS_ID: &str = "jackrabbit-merge-markers";

/// Registry with the built-in validators enabled by `config`, in a fixed order.
pub fn builtin_registry(config: &ValidatorsConfig) -> Result<ValidatorRegistry> {
    let mut registry = ValidatorRegistry::new();
    let enabled = |id: &str| !config.disabled.iter().any(|d| d == id);

    if !config.disallowed_paths.is_empty() && enabled(DISALLOWED_PATHS_ID) {
        let validator = DisallowedPathsValidator::new(&config.disallowed_paths)?;
        registry
            .register(DISALLOWED_PATHS_ID, Arc::new(validator))
            .map_err(|e| ValidationError::Config(e.to_string()))?;
    }

    if config.merge_markers && enabled(MERGE_MARKERS_ID) {
        registry
            .register(MERGE_MARKERS_ID, Arc::new(MergeMarkersValidator))
            .map_err(|e| ValidationError::Config(e.to_string()))?;
    }

    debug!(
        validators = ?registry.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
        "built-in validators registered"
    );
    Ok(registry)
}
