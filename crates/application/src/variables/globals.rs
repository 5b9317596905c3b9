//! Global variables
//!
//! The frame every scope stack starts from: built-in variables followed by
//! variables given at start-up.

use std::path::MAIN_SEPARATOR;

use scopevar_domain::{EnvironmentLookup, GlobalSettings, Value, VariableResult};

use super::Variables;

/// Built-in and start-up variables.
#[derive(Debug)]
pub struct GlobalVariables {
    variables: Variables,
}

impl GlobalVariables {
    /// Creates a global frame holding only the built-in variables, with
    /// `OUTPUT_DIR` and `LOG_LEVEL` at their defaults.
    #[must_use]
    pub fn new(environment: EnvironmentLookup) -> Self {
        let settings = GlobalSettings::new();
        let variables = Variables::new(environment);
        for (name, value) in builtins(&settings) {
            if let Err(err) = variables.set(&name, value) {
                tracing::warn!(%name, %err, "built-in variable rejected");
            }
        }
        Self { variables }
    }

    /// Creates the global frame from start-up settings.
    ///
    /// Variables given as `name:value` override built-ins of the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if a start-up variable name is not valid.
    pub fn from_settings(settings: &GlobalSettings) -> VariableResult<Self> {
        let variables = Variables::new(settings.environment_lookup());
        for (name, value) in builtins(settings) {
            variables.set(&name, value)?;
        }
        for (name, value) in settings.variable_pairs() {
            tracing::debug!(%name, "setting start-up variable");
            variables.set(&format!("${{{name}}}"), Value::String(value))?;
        }
        Ok(Self { variables })
    }

    /// The global frame itself.
    #[must_use]
    pub const fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Copies the global frame as the root of a new scope stack.
    #[must_use]
    pub fn copy(&self) -> Variables {
        self.variables.copy()
    }
}

fn builtins(settings: &GlobalSettings) -> Vec<(String, Value)> {
    let execdir = std::env::current_dir()
        .map_or_else(|_| ".".to_string(), |dir| dir.display().to_string());
    let path_separator = if cfg!(windows) { ";" } else { ":" };
    let line_separator = if cfg!(windows) { "\r\n" } else { "\n" };
    vec![
        ("${TEMPDIR}".to_string(), Value::String(std::env::temp_dir().display().to_string())),
        ("${EXECDIR}".to_string(), Value::String(execdir)),
        ("${/}".to_string(), Value::String(MAIN_SEPARATOR.to_string())),
        ("${:}".to_string(), Value::from(path_separator)),
        ("${\\n}".to_string(), Value::from(line_separator)),
        ("${SPACE}".to_string(), Value::from(" ")),
        ("${True}".to_string(), Value::Bool(true)),
        ("${False}".to_string(), Value::Bool(false)),
        ("${None}".to_string(), Value::None),
        ("${null}".to_string(), Value::None),
        ("${OUTPUT_DIR}".to_string(), Value::String(settings.output_dir.clone())),
        ("${OUTPUT_FILE}".to_string(), file_or_none(settings.output_file.as_deref())),
        ("${REPORT_FILE}".to_string(), file_or_none(settings.report_file.as_deref())),
        ("${LOG_FILE}".to_string(), file_or_none(settings.log_file.as_deref())),
        ("${DEBUG_FILE}".to_string(), file_or_none(settings.debug_file.as_deref())),
        ("${LOG_LEVEL}".to_string(), Value::String(settings.log_level.clone())),
        ("${PREV_TEST_NAME}".to_string(), Value::from("")),
        ("${PREV_TEST_STATUS}".to_string(), Value::from("")),
        ("${PREV_TEST_MESSAGE}".to_string(), Value::from("")),
    ]
}

/// Disabled output files are exposed as the string `NONE`.
fn file_or_none(path: Option<&str>) -> Value {
    Value::from(path.unwrap_or("NONE"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    fn settings() -> GlobalSettings {
        let mut settings = GlobalSettings::new();
        settings.process_environment = false;
        settings
    }

    #[test]
    fn test_builtins() {
        let globals = GlobalVariables::from_settings(&settings()).unwrap();
        let variables = globals.variables();
        assert_eq!(variables.get("${SPACE}").unwrap(), Value::from(" "));
        assert_eq!(variables.get("${true}").unwrap(), Value::Bool(true));
        assert_eq!(variables.get("${None}").unwrap(), Value::None);
        assert_eq!(variables.get("${LOG_LEVEL}").unwrap(), Value::from("INFO"));
        assert_eq!(
            variables.get("${/}").unwrap(),
            Value::String(MAIN_SEPARATOR.to_string())
        );
        assert!(variables.contains("${\\n}"));
        assert!(variables.contains("${TEMPDIR}"));
    }

    #[test]
    fn test_output_file_builtins() {
        let mut settings = settings();
        settings.log_file = Some("out/log.html".to_string());
        let globals = GlobalVariables::from_settings(&settings).unwrap();
        let variables = globals.variables();
        assert_eq!(variables.get("${LOG_FILE}").unwrap(), Value::from("out/log.html"));
        assert_eq!(variables.get("${OUTPUT_FILE}").unwrap(), Value::from("NONE"));
        assert_eq!(variables.get("${REPORT_FILE}").unwrap(), Value::from("NONE"));
        assert_eq!(variables.get("${DEBUG_FILE}").unwrap(), Value::from("NONE"));
    }

    #[test]
    fn test_start_up_variables_override_builtins() {
        let settings = settings()
            .with_variable("name:value")
            .with_variable("SPACE:wide")
            .with_variable("flag");
        let globals = GlobalVariables::from_settings(&settings).unwrap();
        let variables = globals.variables();
        assert_eq!(variables.get("${name}").unwrap(), Value::from("value"));
        assert_eq!(variables.get("${SPACE}").unwrap(), Value::from("wide"));
        assert_eq!(variables.get("${flag}").unwrap(), Value::from(""));
    }

    #[test]
    fn test_invalid_start_up_variable() {
        let settings = settings().with_variable("a}b:value");
        assert!(GlobalVariables::from_settings(&settings).is_err());
    }

    #[test]
    fn test_copy_is_independent() {
        let globals = GlobalVariables::new(EnvironmentLookup::isolated(IndexMap::new()));
        let copy = globals.copy();
        copy.set("${extra}", Value::Int(1)).unwrap();
        assert!(!globals.variables().contains("${extra}"));
    }
}
