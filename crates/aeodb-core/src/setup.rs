//! Loading a setup plan from a YAML file.
//!
//! The CLI `seed` command accepts the same company/products/competitors/
//! icps/personas shape the wizard assembles, validated by the same rules, so
//! both entry points feed an identical plan into the transactional
//! submission.

use std::path::Path;

use crate::wizard::{validate_plan, SetupPlan};
use crate::ConfigError;

/// Load and validate a setup plan from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails the
/// wizard's validation rules.
pub fn load_setup_file(path: &Path) -> Result<SetupPlan, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SetupFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_setup_file(&content)
}

/// Parse and validate setup YAML already in memory.
///
/// # Errors
///
/// Returns `ConfigError` on parse or validation failure.
pub fn parse_setup_file(content: &str) -> Result<SetupPlan, ConfigError> {
    let plan: SetupPlan = serde_yaml::from_str(content)?;
    validate_plan(&plan).map_err(|e| ConfigError::Validation(e.to_string()))?;
    Ok(plan)
}
