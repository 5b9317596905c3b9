//! Environment variable sources for `%{NAME}` references

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Where `%{NAME}` references are looked up.
///
/// The process environment is consulted first, then the alternate property
/// table. Properties can be set from configuration and are the only source
/// when the process environment is disabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentLookup {
    /// Whether the process environment is consulted.
    pub include_process: bool,
    /// Alternate name/value source consulted after the process environment.
    pub properties: IndexMap<String, String>,
}

impl Default for EnvironmentLookup {
    fn default() -> Self {
        Self::process()
    }
}

impl EnvironmentLookup {
    /// Looks up the process environment, with no alternate properties.
    #[must_use]
    pub fn process() -> Self {
        Self {
            include_process: true,
            properties: IndexMap::new(),
        }
    }

    /// Looks up only the given properties, ignoring the process environment.
    #[must_use]
    pub fn isolated(properties: IndexMap<String, String>) -> Self {
        Self {
            include_process: false,
            properties,
        }
    }

    /// Adds an alternate property.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Returns the value of an environment variable.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        if self.include_process
            && let Ok(value) = std::env::var(name)
        {
            return Some(value);
        }
        self.properties.get(name).cloned()
    }

    /// Returns every known environment variable name.
    ///
    /// Process variables whose names are not valid UTF-8 are skipped.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = if self.include_process {
            std::env::vars_os()
                .filter_map(|(name, _)| name.into_string().ok())
                .collect()
        } else {
            Vec::new()
        };
        for name in self.properties.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_isolated_lookup_ignores_process() {
        let lookup = EnvironmentLookup::isolated(IndexMap::new()).with_property("NAME", "42");
        assert_eq!(lookup.get("NAME"), Some("42".to_string()));
        assert_eq!(lookup.get("PATH"), None);
        assert_eq!(lookup.names(), vec!["NAME".to_string()]);
    }

    #[test]
    fn test_properties_fill_in_after_process() {
        let lookup = EnvironmentLookup::process().with_property("SCOPEVAR_TEST_ONLY_KEY", "x");
        assert_eq!(lookup.get("SCOPEVAR_TEST_ONLY_KEY"), Some("x".to_string()));
        assert!(lookup.names().contains(&"SCOPEVAR_TEST_ONLY_KEY".to_string()));
    }

    #[test]
    fn test_deserialize_defaults() {
        let lookup: EnvironmentLookup =
            serde_json::from_str(r#"{"properties": {"A": "1"}}"#).unwrap_or_default();
        assert!(lookup.include_process);
        assert_eq!(lookup.get("A").as_deref(), Some("1"));
    }
}
