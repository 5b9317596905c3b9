//! Settings file loading

use std::path::Path;

use scopevar_domain::GlobalSettings;

use crate::error::{AppError, AppResult};

/// Loads [`GlobalSettings`] from a `.json`, `.yaml` or `.yml` file.
///
/// Fields missing from the file keep their defaults.
///
/// # Errors
///
/// Returns an error if the file cannot be read, has an unsupported
/// extension, or does not parse.
pub fn load_settings(path: &Path) -> AppResult<GlobalSettings> {
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase);
    let content = std::fs::read_to_string(path).map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "loading settings");

    match extension.as_deref() {
        Some("json") => Ok(serde_json::from_str(&content)?),
        Some("yaml" | "yml") => Ok(serde_yaml::from_str(&content)?),
        _ => Err(AppError::UnsupportedExtension(path.to_path_buf())),
    }
}
