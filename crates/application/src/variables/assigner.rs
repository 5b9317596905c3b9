//! Assigning keyword return values
//!
//! Targets such as `${a}`, `${b}=` or `@{rest}` are validated up front; the
//! return value is then distributed over them and written to a frame.

use std::sync::LazyLock;

use regex::Regex;
use scopevar_domain::{AttributeAccess, Sigil, Value, VariableError, VariableResult};

use super::Variables;
use crate::variable_resolver::search::is_assign;

#[allow(clippy::expect_used)]
static VALID_ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[_a-zA-Z]\w*$").expect("valid regex"));

/// Validated assignment targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableAssigner {
    targets: Vec<String>,
}

impl VariableAssigner {
    /// Validates assignment targets.
    ///
    /// A trailing `=` is allowed on the last target only and is stripped.
    ///
    /// # Errors
    ///
    /// Returns a syntax error for an invalid target, a misplaced `=`, more
    /// than one list target, or a dictionary target combined with others.
    pub fn new<S: AsRef<str>>(targets: &[S]) -> VariableResult<Self> {
        let mut validator = AssignmentValidator::default();
        let targets = targets
            .iter()
            .map(|target| validator.validate(target.as_ref()))
            .collect::<VariableResult<Vec<_>>>()?;
        Ok(Self { targets })
    }

    /// Targets with assign marks removed.
    #[must_use]
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Assigns `return_value` to the targets in `variables`.
    ///
    /// # Errors
    ///
    /// Returns an error when the value cannot be distributed over the
    /// targets or a target cannot be set.
    pub fn assign(&self, variables: &Variables, return_value: Value) -> VariableResult<()> {
        if self.targets.is_empty() {
            return Ok(());
        }
        tracing::trace!(value = %return_value.repr(), "assigning return value");
        for (name, value) in ReturnValueResolver::new(&self.targets).resolve(return_value)? {
            if !extended_assign(&name, &value, variables)? {
                tracing::debug!("{name} = {}", value.repr());
                variables.set(&name, value)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct AssignmentValidator {
    seen_list: bool,
    seen_dict: bool,
    seen_any: bool,
    seen_assign_mark: bool,
}

impl AssignmentValidator {
    fn validate(&mut self, target: &str) -> VariableResult<String> {
        if !is_assign(target, true) {
            return Err(VariableError::syntax(format!(
                "Invalid variable to assign: '{target}'."
            )));
        }
        if self.seen_assign_mark {
            return Err(VariableError::syntax(
                "Assign mark '=' can be used only with the last variable.",
            ));
        }
        self.seen_assign_mark = target.ends_with('=');
        let target = target.trim_end_matches(['=', ' ']).to_string();
        self.validate_state(target.chars().next().and_then(Sigil::from_char))?;
        Ok(target)
    }

    fn validate_state(&mut self, sigil: Option<Sigil>) -> VariableResult<()> {
        let dict_error = || {
            VariableError::syntax("Dictionary variable cannot be assigned with other variables.")
        };
        if self.seen_dict {
            return Err(dict_error());
        }
        match sigil {
            Some(Sigil::List) => {
                if self.seen_list {
                    return Err(VariableError::syntax(
                        "Assignment can contain only one list variable.",
                    ));
                }
                self.seen_list = true;
            }
            Some(Sigil::Dict) => {
                if self.seen_any {
                    return Err(dict_error());
                }
                self.seen_dict = true;
            }
            _ => {}
        }
        self.seen_any = true;
        Ok(())
    }
}

struct ReturnValueResolver<'a> {
    targets: &'a [String],
    list_index: Option<usize>,
}

impl<'a> ReturnValueResolver<'a> {
    fn new(targets: &'a [String]) -> Self {
        let list_index = targets.iter().position(|target| target.starts_with('@'));
        Self {
            targets,
            list_index,
        }
    }

    fn resolve(&self, return_value: Value) -> VariableResult<Vec<(String, Value)>> {
        match self.targets {
            [target] => Ok(vec![(target.clone(), one_variable(target, return_value))]),
            targets => self.multiple_variables(targets, return_value),
        }
    }

    fn multiple_variables(
        &self,
        targets: &[String],
        return_value: Value,
    ) -> VariableResult<Vec<(String, Value)>> {
        let min_count = targets.len() - usize::from(self.list_index.is_some());
        let values = match return_value {
            Value::None => vec![Value::None; min_count],
            other => convert_to_list(&other)?,
        };
        let Some(list_index) = self.list_index else {
            if values.len() != min_count {
                return Err(cannot_assign(&format!(
                    "Expected {min_count} return values, got {}.",
                    values.len()
                )));
            }
            return Ok(targets.iter().cloned().zip(values).collect());
        };
        if values.len() < min_count {
            return Err(cannot_assign(&format!(
                "Expected {min_count} or more return values, got {}.",
                values.len()
            )));
        }
        let after = targets.len() - list_index - 1;
        let list_end = values.len() - after;
        let mut assigned: Vec<(String, Value)> = targets[..list_index]
            .iter()
            .cloned()
            .zip(values[..list_index].iter().cloned())
            .collect();
        assigned.push((
            targets[list_index].clone(),
            Value::list(values[list_index..list_end].to_vec()),
        ));
        assigned.extend(
            targets[list_index + 1..]
                .iter()
                .cloned()
                .zip(values[list_end..].iter().cloned()),
        );
        Ok(assigned)
    }
}

fn one_variable(target: &str, return_value: Value) -> Value {
    match (return_value, target.chars().next()) {
        (Value::None, Some('@')) => Value::list(Vec::new()),
        (Value::None, Some('&')) => Value::empty_dict(),
        (value, _) => value,
    }
}

fn convert_to_list(value: &Value) -> VariableResult<Vec<Value>> {
    match value {
        Value::List(items) => Ok(items.borrow().clone()),
        Value::Dict(entries) => Ok(entries.borrow().keys().cloned().map(Value::String).collect()),
        other => Err(cannot_assign(&format!(
            "Expected list-like value, got {}.",
            other.type_name()
        ))),
    }
}

fn cannot_assign(message: &str) -> VariableError {
    VariableError::type_mismatch(format!("Cannot set variables: {message}"))
}

/// Sets `${base.attr}` as an attribute of an existing `${base}`. Returns
/// false when the name should be assigned normally instead.
fn extended_assign(name: &str, value: &Value, variables: &Variables) -> VariableResult<bool> {
    if !name.starts_with('$') || !name.contains('.') || variables.contains(name) {
        return Ok(false);
    }
    let Some((base, attribute)) = name.rsplit_once('.') else {
        return Ok(false);
    };
    let base = format!("{}}}", base.trim());
    let attribute = attribute.strip_suffix('}').unwrap_or(attribute).trim();
    let Ok(target) = variables.get(&base) else {
        return Ok(false);
    };
    let supports_attributes = !matches!(
        target,
        Value::String(_) | Value::Int(_) | Value::Float(_) | Value::Bool(_)
    );
    if !supports_attributes || !VALID_ATTRIBUTE.is_match(attribute) {
        return Ok(false);
    }
    target
        .set_attribute(attribute, value.clone())
        .map_err(|message| {
            VariableError::type_mismatch(format!(
                "Setting attribute '{attribute}' to variable '{base}' failed: {message}"
            ))
        })?;
    tracing::debug!("{base}.{attribute} = {}", value.repr());
    Ok(true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use scopevar_domain::{EnvironmentLookup, Record};

    fn variables() -> Variables {
        Variables::new(EnvironmentLookup::isolated(IndexMap::new()))
    }

    fn ints(values: &[i64]) -> Value {
        Value::list(values.iter().copied().map(Value::Int).collect())
    }

    fn syntax_error(targets: &[&str]) -> String {
        VariableAssigner::new(targets).unwrap_err().to_string()
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            VariableAssigner::new(&["${a}", "${b} ="]).unwrap().targets(),
            ["${a}".to_string(), "${b}".to_string()]
        );
        assert_eq!(
            syntax_error(&["${a}=", "${b}"]),
            "Assign mark '=' can be used only with the last variable."
        );
        assert_eq!(
            syntax_error(&["@{a}", "@{b}"]),
            "Assignment can contain only one list variable."
        );
        assert_eq!(
            syntax_error(&["${a}", "&{b}"]),
            "Dictionary variable cannot be assigned with other variables."
        );
        assert_eq!(
            syntax_error(&["&{a}", "${b}"]),
            "Dictionary variable cannot be assigned with other variables."
        );
        assert_eq!(syntax_error(&["name"]), "Invalid variable to assign: 'name'.");
        assert_eq!(
            syntax_error(&["%{ENV}"]),
            "Invalid variable to assign: '%{ENV}'."
        );
    }

    #[test]
    fn test_single_target_takes_whole_value() {
        let variables = variables();
        VariableAssigner::new(&["${all}"])
            .unwrap()
            .assign(&variables, ints(&[1, 2]))
            .unwrap();
        assert_eq!(variables.get("${all}").unwrap(), ints(&[1, 2]));
    }

    #[test]
    fn test_none_for_single_target() {
        let variables = variables();
        for (target, expected) in [
            ("${s}", Value::None),
            ("@{l}", Value::list(Vec::new())),
            ("&{d}", Value::empty_dict()),
        ] {
            VariableAssigner::new(&[target])
                .unwrap()
                .assign(&variables, Value::None)
                .unwrap();
            assert_eq!(variables.get(target).unwrap(), expected);
        }
    }

    #[test]
    fn test_multiple_scalars() {
        let variables = variables();
        let assigner = VariableAssigner::new(&["${a}", "${b}"]).unwrap();
        assigner.assign(&variables, ints(&[1, 2])).unwrap();
        assert_eq!(variables.get("${b}").unwrap(), Value::Int(2));

        assigner.assign(&variables, Value::None).unwrap();
        assert_eq!(variables.get("${a}").unwrap(), Value::None);

        let err = assigner.assign(&variables, ints(&[1])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot set variables: Expected 2 return values, got 1."
        );
        let err = assigner.assign(&variables, Value::from("ab")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot set variables: Expected list-like value, got string."
        );
    }

    #[test]
    fn test_list_target_absorbs_surplus() {
        let variables = variables();
        VariableAssigner::new(&["${first}", "@{middle}", "${last}"])
            .unwrap()
            .assign(&variables, ints(&[1, 2, 3, 4]))
            .unwrap();
        assert_eq!(variables.get("${first}").unwrap(), Value::Int(1));
        assert_eq!(variables.get("@{middle}").unwrap(), ints(&[2, 3]));
        assert_eq!(variables.get("${last}").unwrap(), Value::Int(4));

        let err = VariableAssigner::new(&["${a}", "${b}", "@{c}"])
            .unwrap()
            .assign(&variables, ints(&[1]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot set variables: Expected 2 or more return values, got 1."
        );
    }

    #[test]
    fn test_dictionary_return_value_gives_keys() {
        let variables = variables();
        let mut entries = IndexMap::new();
        entries.insert("x".to_string(), Value::Int(1));
        entries.insert("y".to_string(), Value::Int(2));
        VariableAssigner::new(&["${k1}", "${k2}"])
            .unwrap()
            .assign(&variables, Value::dict(entries))
            .unwrap();
        assert_eq!(variables.get("${k2}").unwrap(), Value::from("y"));
    }

    #[test]
    fn test_extended_assign() {
        let variables = variables();
        variables
            .set("${obj}", Value::object(Record::new("Thing").with_field("name", "old")))
            .unwrap();
        VariableAssigner::new(&["${obj.name}"])
            .unwrap()
            .assign(&variables, Value::from("new"))
            .unwrap();
        assert!(!variables.contains("${obj.name}"));
        let Value::Object(object) = variables.get("${obj}").unwrap() else {
            panic!("expected object");
        };
        assert_eq!(object.attribute("name"), Some(Value::from("new")));
    }

    #[test]
    fn test_extended_assign_to_dictionary() {
        let variables = variables();
        variables.set("&{conf}", Value::empty_dict()).unwrap();
        VariableAssigner::new(&["${conf.port}"])
            .unwrap()
            .assign(&variables, Value::Int(80))
            .unwrap();
        let conf = variables.get("&{conf}").unwrap().to_map().unwrap();
        assert_eq!(conf.get("port"), Some(&Value::Int(80)));
    }

    #[test]
    fn test_extended_assign_falls_back_to_normal() {
        let variables = variables();
        variables.set("${text}", Value::from("abc")).unwrap();
        VariableAssigner::new(&["${text.upper}", "${missing.attr}"])
            .unwrap()
            .assign(&variables, Value::list(vec![Value::Int(1), Value::Int(2)]))
            .unwrap();
        assert_eq!(variables.get("${text}").unwrap(), Value::from("abc"));
        assert!(variables.contains("${text.upper}"));
        assert!(variables.contains("${missing.attr}"));
    }

    #[test]
    fn test_extended_assign_failure() {
        let variables = variables();
        variables
            .set("${obj}", Value::object(Record::new("Thing").frozen()))
            .unwrap();
        let err = VariableAssigner::new(&["${obj.name}"])
            .unwrap()
            .assign(&variables, Value::Int(1))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Setting attribute 'name' to variable '${obj}' failed: cannot set attribute 'name' of 'Thing'"
        );
    }
}
