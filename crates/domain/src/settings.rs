//! Global settings domain model
//!
//! Start-of-run configuration used to build the global variable frame.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::environment::EnvironmentLookup;

/// Settings applied once at process start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSettings {
    /// Command-line style variables in `name:value` form.
    pub variables: Vec<String>,

    /// Directory exposed as `${OUTPUT_DIR}`.
    pub output_dir: String,

    /// Level exposed as `${LOG_LEVEL}`.
    pub log_level: String,

    /// Output file exposed as `${OUTPUT_FILE}`.
    pub output_file: Option<String>,

    /// Report file exposed as `${REPORT_FILE}`.
    pub report_file: Option<String>,

    /// Log file exposed as `${LOG_FILE}`.
    pub log_file: Option<String>,

    /// Debug file exposed as `${DEBUG_FILE}`.
    pub debug_file: Option<String>,

    /// Whether `%{NAME}` may read the process environment.
    #[serde(default = "default_true")]
    pub process_environment: bool,

    /// Alternate environment values consulted after the process environment.
    pub environment: IndexMap<String, String>,
}

const fn default_true() -> bool {
    true
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            variables: Vec::new(),
            output_dir: ".".to_string(),
            log_level: "INFO".to_string(),
            output_file: None,
            report_file: None,
            log_file: None,
            debug_file: None,
            process_environment: true,
            environment: IndexMap::new(),
        }
    }
}

impl GlobalSettings {
    /// Creates default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `name:value` variable.
    #[must_use]
    pub fn with_variable(mut self, definition: impl Into<String>) -> Self {
        self.variables.push(definition.into());
        self
    }

    /// Splits the configured variables into `(name, value)` pairs.
    ///
    /// A definition without `:` gets an empty value.
    #[must_use]
    pub fn variable_pairs(&self) -> Vec<(String, String)> {
        self.variables
            .iter()
            .map(|definition| match definition.split_once(':') {
                Some((name, value)) => (name.to_string(), value.to_string()),
                None => (definition.clone(), String::new()),
            })
            .collect()
    }

    /// Builds the environment lookup described by these settings.
    #[must_use]
    pub fn environment_lookup(&self) -> EnvironmentLookup {
        EnvironmentLookup {
            include_process: self.process_environment,
            properties: self.environment.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_settings() {
        let settings = GlobalSettings::default();
        assert!(settings.variables.is_empty());
        assert_eq!(settings.log_level, "INFO");
        assert!(settings.process_environment);
    }

    #[test]
    fn test_variable_pairs() {
        let settings = GlobalSettings::new()
            .with_variable("name:value")
            .with_variable("url:http://host:80")
            .with_variable("flag");
        assert_eq!(
            settings.variable_pairs(),
            vec![
                ("name".to_string(), "value".to_string()),
                ("url".to_string(), "http://host:80".to_string()),
                ("flag".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_deserialize_partial() {
        let json = r#"{"variables": ["a:1"], "environment": {"HOME": "/tmp"}}"#;
        let settings: GlobalSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.variables, vec!["a:1".to_string()]);
        assert_eq!(settings.output_dir, ".");
        assert!(settings.process_environment);
        assert_eq!(
            settings.environment_lookup().properties.get("HOME"),
            Some(&"/tmp".to_string())
        );
    }
}
