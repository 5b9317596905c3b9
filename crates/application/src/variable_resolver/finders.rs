//! Finder chain
//!
//! A variable name is resolved by trying an ordered list of strategies.
//! The first strategy returning a value wins; a strategy that does not
//! recognize the name returns `Ok(None)` and the next one is tried. Errors
//! are not swallowed: a strategy that recognizes the name but fails to
//! produce a value stops the chain.

use std::sync::LazyLock;

use regex::Regex;
use scopevar_domain::{Sigil, Value, VariableError, VariableResult, normalize};

use super::evaluation::evaluate_extended;
use super::notfound::{environment_not_found, variable_not_found};
use super::search::search_variable;
use crate::variables::Variables;

/// One strategy in the finder chain.
pub trait Finder {
    /// Sigils this strategy handles.
    fn identifiers(&self) -> &'static [Sigil];

    /// Tries to resolve `base` referenced with `sigil`.
    ///
    /// # Errors
    ///
    /// Returns an error when the name is recognized but cannot be resolved.
    fn find(&self, sigil: Sigil, base: &str, variables: &Variables)
    -> VariableResult<Option<Value>>;
}

/// Looks the name up in the current frame, resolving deferred values.
///
/// List and dictionary references only accept values of the matching shape.
#[derive(Debug, Clone, Copy)]
pub struct StoredFinder;

impl Finder for StoredFinder {
    fn identifiers(&self) -> &'static [Sigil] {
        &[Sigil::Scalar, Sigil::List, Sigil::Dict]
    }

    fn find(
        &self,
        sigil: Sigil,
        base: &str,
        variables: &Variables,
    ) -> VariableResult<Option<Value>> {
        let value = variables.resolve_stored(base)?;
        Ok(value.filter(|value| match sigil {
            Sigil::List => value.is_list_like(),
            Sigil::Dict => value.is_dict_like(),
            _ => true,
        }))
    }
}

/// Integer and float literals such as `${42}`, `${0x1F}` or `${1.5}`.
#[derive(Debug, Clone, Copy)]
pub struct NumberFinder;

impl Finder for NumberFinder {
    fn identifiers(&self) -> &'static [Sigil] {
        &[Sigil::Scalar]
    }

    fn find(&self, _sigil: Sigil, base: &str, _variables: &Variables) -> VariableResult<Option<Value>> {
        Ok(parse_number(&normalize(base)))
    }
}

fn parse_number(number: &str) -> Option<Value> {
    let radix = match number.get(..2) {
        Some("0b") => Some(2),
        Some("0o") => Some(8),
        Some("0x") => Some(16),
        _ => None,
    };
    if let Some(radix) = radix {
        return i64::from_str_radix(&number[2..], radix).ok().map(Value::Int);
    }
    if let Ok(integer) = number.parse::<i64>() {
        return Some(Value::Int(integer));
    }
    number.parse::<f64>().ok().map(Value::Float)
}

/// `${EMPTY}`, `@{EMPTY}` and `&{EMPTY}`.
#[derive(Debug, Clone, Copy)]
pub struct EmptyFinder;

impl Finder for EmptyFinder {
    fn identifiers(&self) -> &'static [Sigil] {
        &[Sigil::Scalar, Sigil::List, Sigil::Dict]
    }

    fn find(&self, sigil: Sigil, base: &str, _variables: &Variables) -> VariableResult<Option<Value>> {
        if normalize(base) != "empty" {
            return Ok(None);
        }
        Ok(match sigil {
            Sigil::Scalar => Some(Value::String(String::new())),
            Sigil::List => Some(Value::list(Vec::new())),
            Sigil::Dict => Some(Value::empty_dict()),
            Sigil::Environment | Sigil::Reserved => None,
        })
    }
}

/// Reports a list or dictionary reference to a stored value of another shape.
#[derive(Debug, Clone, Copy)]
pub struct CrossSigilFinder;

impl Finder for CrossSigilFinder {
    fn identifiers(&self) -> &'static [Sigil] {
        &[Sigil::List, Sigil::Dict]
    }

    fn find(
        &self,
        sigil: Sigil,
        base: &str,
        variables: &Variables,
    ) -> VariableResult<Option<Value>> {
        if variables.resolve_stored(base)?.is_none() {
            return Ok(None);
        }
        let (kind, shape) = match sigil {
            Sigil::Dict => ("dictionary", "dictionary or dictionary-like"),
            _ => ("list", "list or list-like"),
        };
        Err(VariableError::type_mismatch(format!(
            "Using scalar variable '{}' as {kind} variable '{}' requires its value to be {shape}.",
            Sigil::Scalar.decorate(base),
            sigil.decorate(base)
        )))
    }
}

/// `%{NAME}` and `%{NAME=default}` environment variables.
#[derive(Debug, Clone, Copy)]
pub struct EnvironmentFinder;

impl Finder for EnvironmentFinder {
    fn identifiers(&self) -> &'static [Sigil] {
        &[Sigil::Environment]
    }

    fn find(
        &self,
        sigil: Sigil,
        base: &str,
        variables: &Variables,
    ) -> VariableResult<Option<Value>> {
        let (name, default) = match base.split_once('=') {
            Some((name, default)) => (name.trim(), Some(default)),
            None => (base.trim(), None),
        };
        let environment = variables.environment();
        if let Some(value) = environment.get(name) {
            return Ok(Some(Value::String(value)));
        }
        match default {
            Some(default) => Ok(Some(Value::from(default))),
            None => Err(environment_not_found(
                &sigil.decorate(name),
                &environment.names(),
            )),
        }
    }
}

#[allow(clippy::expect_used)]
static EXTENDED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^(.+?)([^\s\w].+)$").expect("valid regex"));

/// Extended syntax such as `${obj.attr}`, `${items[0]}` or `${count + 1}`.
///
/// The base name is resolved through the whole chain and the rest is
/// evaluated against it.
#[derive(Debug, Clone, Copy)]
pub struct ExtendedFinder;

impl Finder for ExtendedFinder {
    fn identifiers(&self) -> &'static [Sigil] {
        &[Sigil::Scalar, Sigil::List, Sigil::Dict]
    }

    fn find(
        &self,
        sigil: Sigil,
        base: &str,
        variables: &Variables,
    ) -> VariableResult<Option<Value>> {
        let Some(captures) = EXTENDED.captures(base) else {
            return Ok(None);
        };
        let (Some(base_name), Some(extended)) = (captures.get(1), captures.get(2)) else {
            return Ok(None);
        };
        let full_name = sigil.decorate(base);
        let value = VariableFinder::new(variables)
            .find_parts(Sigil::Scalar, base_name.as_str())
            .map_err(|err| VariableError::evaluation(&full_name, err.to_string()))?;
        evaluate_extended(&value, extended.as_str())
            .map(Some)
            .map_err(|message| VariableError::evaluation(full_name, message))
    }
}

const FINDERS: &[&dyn Finder] = &[
    &StoredFinder,
    &NumberFinder,
    &EmptyFinder,
    &CrossSigilFinder,
    &EnvironmentFinder,
    &ExtendedFinder,
];

/// Runs the finder chain against one frame.
#[derive(Debug, Clone, Copy)]
pub struct VariableFinder<'a> {
    variables: &'a Variables,
}

impl<'a> VariableFinder<'a> {
    /// Creates a finder reading from `variables`.
    #[must_use]
    pub const fn new(variables: &'a Variables) -> Self {
        Self { variables }
    }

    /// Resolves a decorated name such as `${name}`.
    ///
    /// The name must be a single reference without items.
    ///
    /// # Errors
    ///
    /// Returns a syntax error for an invalid name, or the first error
    /// raised by the chain.
    pub fn find(&self, name: &str) -> VariableResult<Value> {
        match search_variable(name)? {
            Some(found) if found.is_variable() && found.items.is_empty() => {
                self.find_parts(found.identifier, found.base)
            }
            _ => Err(VariableError::syntax(format!(
                "Invalid variable name '{name}'."
            ))),
        }
    }

    /// Resolves `base` referenced with `sigil`.
    ///
    /// # Errors
    ///
    /// Returns a not-found error with recommendations when no strategy
    /// recognizes the name.
    pub fn find_parts(&self, sigil: Sigil, base: &str) -> VariableResult<Value> {
        for finder in FINDERS {
            if !finder.identifiers().contains(&sigil) {
                continue;
            }
            if let Some(value) = finder.find(sigil, base, self.variables)? {
                return Ok(value);
            }
        }
        Err(variable_not_found(
            &sigil.decorate(base),
            &self.variables.candidates(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use scopevar_domain::{EnvironmentLookup, Record};

    fn variables() -> Variables {
        let variables = Variables::new(EnvironmentLookup::isolated(IndexMap::new()));
        variables.set("${name}", Value::from("world")).unwrap();
        variables
            .set("@{items}", Value::list(vec![Value::from("a"), Value::from("b")]))
            .unwrap();
        variables
            .set(
                "${point}",
                Value::object(Record::new("Point").with_field("x", 1).with_field("y", 2)),
            )
            .unwrap();
        variables
    }

    #[test]
    fn test_stored_lookup_is_normalized() {
        let variables = variables();
        let finder = VariableFinder::new(&variables);
        assert_eq!(finder.find("${Na_ME}").unwrap(), Value::from("world"));
        assert_eq!(finder.find("${ n a m e }").unwrap(), Value::from("world"));
    }

    #[test]
    fn test_numbers() {
        let variables = variables();
        let finder = VariableFinder::new(&variables);
        assert_eq!(finder.find("${42}").unwrap(), Value::Int(42));
        assert_eq!(finder.find("${-7}").unwrap(), Value::Int(-7));
        assert_eq!(finder.find("${1_000}").unwrap(), Value::Int(1000));
        assert_eq!(finder.find("${0b101}").unwrap(), Value::Int(5));
        assert_eq!(finder.find("${0o17}").unwrap(), Value::Int(15));
        assert_eq!(finder.find("${0xFF}").unwrap(), Value::Int(255));
        assert_eq!(finder.find("${1.5}").unwrap(), Value::Float(1.5));
        assert!(finder.find("@{42}").is_err());
    }

    #[test]
    fn test_empty_values() {
        let variables = variables();
        let finder = VariableFinder::new(&variables);
        assert_eq!(finder.find("${EMPTY}").unwrap(), Value::from(""));
        assert_eq!(finder.find("@{EMPTY}").unwrap(), Value::list(Vec::new()));
        assert_eq!(finder.find("&{empty}").unwrap(), Value::empty_dict());
    }

    #[test]
    fn test_list_as_scalar_and_scalar_as_list() {
        let variables = variables();
        let finder = VariableFinder::new(&variables);
        assert_eq!(
            finder.find("${items}").unwrap(),
            Value::list(vec![Value::from("a"), Value::from("b")])
        );
        let err = finder.find("@{name}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Using scalar variable '${name}' as list variable '@{name}' requires its value to be list or list-like."
        );
        let err = finder.find("&{items}").unwrap_err();
        assert!(matches!(err, VariableError::TypeMismatch(_)));
    }

    #[test]
    fn test_environment() {
        let lookup = EnvironmentLookup::isolated(IndexMap::new()).with_property("HOME", "/home/me");
        let variables = Variables::new(lookup);
        let finder = VariableFinder::new(&variables);
        assert_eq!(finder.find("%{HOME}").unwrap(), Value::from("/home/me"));
        assert_eq!(finder.find("%{ HOME }").unwrap(), Value::from("/home/me"));
        assert_eq!(finder.find("%{MISSING=fallback}").unwrap(), Value::from("fallback"));
        assert_eq!(finder.find("%{MISSING=}").unwrap(), Value::from(""));
        let err = finder.find("%{HOEM}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Environment variable '%{HOEM}' not found. Did you mean:\n    %{HOME}"
        );
    }

    #[test]
    fn test_extended_syntax() {
        let variables = variables();
        let finder = VariableFinder::new(&variables);
        assert_eq!(finder.find("${point.x}").unwrap(), Value::Int(1));
        assert_eq!(finder.find("${point.y * 10}").unwrap(), Value::Int(20));
        assert_eq!(finder.find("${items[1]}").unwrap(), Value::from("b"));
        assert_eq!(finder.find("${1 + 2}").unwrap(), Value::Int(3));
        assert_eq!(finder.find("${name + '!'}").unwrap(), Value::from("world!"));
    }

    #[test]
    fn test_extended_failures_name_full_reference() {
        let variables = variables();
        let finder = VariableFinder::new(&variables);
        let err = finder.find("${point.z}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Resolving variable '${point.z}' failed: AttributeError: 'Point' object has no attribute 'z'"
        );
        let err = finder.find("${missing.attr}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Resolving variable '${missing.attr}' failed: Variable '${missing}' not found."
        );
    }

    #[test]
    fn test_not_found_recommends_by_shape() {
        let variables = variables();
        let finder = VariableFinder::new(&variables);
        let err = finder.find("${nmae}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Variable '${nmae}' not found. Did you mean:\n    ${name}"
        );
        let err = finder.find("@{itemz}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Variable '@{itemz}' not found. Did you mean:\n    @{items}"
        );
    }

    #[test]
    fn test_invalid_names() {
        let variables = variables();
        let finder = VariableFinder::new(&variables);
        for name in ["name", "${name}[0]", "x${name}", "${}"] {
            let err = finder.find(name).unwrap_err();
            assert_eq!(err, VariableError::syntax(format!("Invalid variable name '{name}'.")));
        }
    }
}
