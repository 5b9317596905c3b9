//! Command-line error types

use std::path::PathBuf;

use scopevar_domain::VariableError;
use thiserror::Error;

/// Errors reported by the command-line front end.
#[derive(Debug, Error)]
pub enum AppError {
    /// The settings file could not be read.
    #[error("cannot read settings file '{path}': {source}")]
    Io {
        /// Path of the settings file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid JSON.
    #[error("invalid JSON settings: {0}")]
    Json(#[from] serde_json::Error),

    /// The settings file is not valid YAML.
    #[error("invalid YAML settings: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The settings file has an extension other than `.json`, `.yaml` or `.yml`.
    #[error("unsupported settings file '{0}': expected .json, .yaml or .yml")]
    UnsupportedExtension(PathBuf),

    /// Resolving a variable failed.
    #[error(transparent)]
    Variable(#[from] VariableError),
}

/// Result alias for command-line operations.
pub type AppResult<T> = Result<T, AppError>;
