//! Deferred variable values
//!
//! Variables declared in a variable table are stored unresolved and only
//! computed when first read, so they can refer to each other regardless of
//! declaration order.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use scopevar_domain::{Sigil, Value, VariableError, VariableResult};

use super::Variables;
use crate::variable_resolver::replacer::VariableReplacer;
use crate::variable_resolver::search::{is_dict_variable, is_list_variable, search_variable};
use crate::variable_resolver::splitting::split_from_equals;

/// Callback receiving the decorated name and error of a variable that
/// could not be created or resolved.
pub type ErrorReporter = Rc<dyn Fn(&str, &VariableError)>;

/// One item of a dictionary table value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictItem {
    /// A `key=value` item.
    Pair(String, String),
    /// A whole `&{dict}` reference whose items are merged in.
    Variable(String),
}

/// The unresolved definition of a deferred value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredKind {
    /// `${name}`: a single value, or items joined with a separator.
    Scalar {
        /// Explicit `SEPARATOR=` value.
        separator: Option<String>,
        /// Raw items.
        values: Vec<String>,
    },
    /// `@{name}`: raw items, with list variables expanded.
    List(Vec<String>),
    /// `&{name}`: key/value pairs.
    Dict(Vec<DictItem>),
}

#[derive(Debug, Clone)]
enum State {
    Unresolved,
    Resolving,
    Resolved(Value),
    Failed(VariableError),
}

/// A variable value computed on first use.
///
/// Resolving moves the value through `Unresolved -> Resolving -> Resolved`
/// or `Failed`. Entering resolution again while `Resolving` means the value
/// refers to itself and fails with [`VariableError::RecursiveDefinition`].
pub struct DeferredValue {
    name: String,
    base: String,
    kind: DeferredKind,
    state: RefCell<State>,
    reporter: Option<ErrorReporter>,
}

impl fmt::Debug for DeferredValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredValue")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("reporter", &self.reporter.is_some())
            .finish()
    }
}

impl DeferredValue {
    /// Creates a deferred value from a variable table row.
    ///
    /// `name` is the decorated target, optionally followed by `=`. Scalar
    /// rows may start with a `SEPARATOR=` item. Dictionary rows must use
    /// `key=value` items or whole `&{dict}` references.
    ///
    /// # Errors
    ///
    /// Returns a syntax error for an invalid name or dictionary item.
    pub fn from_table(
        name: &str,
        values: Vec<String>,
        reporter: Option<ErrorReporter>,
    ) -> VariableResult<Self> {
        let target = name.strip_suffix('=').map_or(name, str::trim_end);
        let found = search_variable(target)?
            .filter(|found| found.is_assign(false, false, false))
            .ok_or_else(|| VariableError::syntax(format!("Invalid variable name '{name}'.")))?;
        let kind = match found.identifier {
            Sigil::List => DeferredKind::List(values),
            Sigil::Dict => DeferredKind::Dict(
                values
                    .iter()
                    .map(|item| dict_item(item))
                    .collect::<VariableResult<_>>()?,
            ),
            _ => {
                let mut values = values;
                let separator = if values
                    .first()
                    .is_some_and(|first| first.starts_with("SEPARATOR="))
                {
                    Some(values.remove(0)["SEPARATOR=".len()..].to_string())
                } else {
                    None
                };
                DeferredKind::Scalar { separator, values }
            }
        };
        Ok(Self::new(found.name(), found.base, kind, reporter))
    }

    /// Creates an unresolved value.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        base: impl Into<String>,
        kind: DeferredKind,
        reporter: Option<ErrorReporter>,
    ) -> Self {
        Self {
            name: name.into(),
            base: base.into(),
            kind,
            state: RefCell::new(State::Unresolved),
            reporter,
        }
    }

    /// The decorated name, e.g. `@{items}`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bare name used as store key.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The unresolved definition.
    #[must_use]
    pub const fn kind(&self) -> &DeferredKind {
        &self.kind
    }

    /// The sigil matching the shape of the resolved value.
    #[must_use]
    pub const fn shape(&self) -> Sigil {
        match self.kind {
            DeferredKind::Scalar { .. } => Sigil::Scalar,
            DeferredKind::List(_) => Sigil::List,
            DeferredKind::Dict(_) => Sigil::Dict,
        }
    }

    /// Returns true once resolution has succeeded or failed.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(*self.state.borrow(), State::Resolved(_) | State::Failed(_))
    }

    /// A copy of this value in the unresolved state.
    #[must_use]
    pub fn fresh(&self) -> Self {
        Self::new(
            self.name.clone(),
            self.base.clone(),
            self.kind.clone(),
            self.reporter.clone(),
        )
    }

    /// Passes an error to the reporter, if one is set.
    pub fn report(&self, error: &VariableError) {
        if let Some(reporter) = &self.reporter {
            reporter(&self.name, error);
        }
    }

    /// Computes the value against `variables`.
    ///
    /// The outcome is cached: later calls return the same value or error.
    ///
    /// # Errors
    ///
    /// Returns [`VariableError::RecursiveDefinition`] when called again
    /// while already resolving, or the error that resolving the items raised.
    pub fn resolve(&self, variables: &Variables) -> VariableResult<Value> {
        match &*self.state.borrow() {
            State::Resolved(value) => return Ok(value.clone()),
            State::Failed(err) => return Err(err.clone()),
            State::Resolving => return Err(VariableError::RecursiveDefinition),
            State::Unresolved => {}
        }
        tracing::trace!(name = %self.name, "resolving deferred variable");
        let guard = ResolvingGuard::enter(&self.state);
        let result = self.compute(variables);
        guard.finish(&result);
        tracing::trace!(name = %self.name, ok = result.is_ok(), "deferred variable resolved");
        result
    }

    fn compute(&self, variables: &Variables) -> VariableResult<Value> {
        let replacer = VariableReplacer::new(variables);
        match &self.kind {
            DeferredKind::Scalar { separator, values } => {
                if separator.is_none() && values.len() == 1 && !is_list_variable(&values[0]) {
                    return replacer.replace_scalar_str(&values[0], false);
                }
                let separator = match separator {
                    Some(separator) => replacer.replace_string(separator, false)?,
                    None => " ".to_string(),
                };
                let items: Vec<Value> = values.iter().map(|value| Value::from(value.as_str())).collect();
                let joined = replacer
                    .replace_list(&items, None, false)?
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(&separator);
                Ok(Value::String(joined))
            }
            DeferredKind::List(values) => {
                let items: Vec<Value> = values.iter().map(|value| Value::from(value.as_str())).collect();
                replacer.replace_list(&items, None, false).map(Value::list)
            }
            DeferredKind::Dict(items) => {
                let mut entries = IndexMap::new();
                for item in items {
                    match item {
                        DictItem::Pair(key, value) => {
                            let key = replacer.replace_scalar_str(key, false)?;
                            let value = replacer.replace_scalar_str(value, false)?;
                            insert_unique(&mut entries, &key, value)?;
                        }
                        DictItem::Variable(reference) => {
                            let value = replacer.replace_scalar_str(reference, false)?;
                            let merged = value.to_map().ok_or_else(|| {
                                VariableError::type_mismatch(format!(
                                    "Value of variable '{reference}' is not dictionary or dictionary-like."
                                ))
                            })?;
                            for (key, value) in merged {
                                insert_unique(&mut entries, &Value::String(key), value)?;
                            }
                        }
                    }
                }
                Ok(Value::dict(entries))
            }
        }
    }
}

fn dict_item(item: &str) -> VariableResult<DictItem> {
    if is_dict_variable(item) {
        return Ok(DictItem::Variable(item.to_string()));
    }
    match split_from_equals(item) {
        (key, Some(value)) => Ok(DictItem::Pair(key.to_string(), value.to_string())),
        (_, None) => Err(VariableError::syntax(format!(
            "Invalid dictionary variable item '{item}'. Items must use 'name=value' \
             syntax or be dictionary variables themselves."
        ))),
    }
}

fn insert_unique(
    entries: &mut IndexMap<String, Value>,
    key: &Value,
    value: Value,
) -> VariableResult<()> {
    let key = key.as_str().map_or_else(|| key.to_string(), str::to_string);
    if entries.contains_key(&key) {
        return Err(VariableError::syntax(format!(
            "Creating dictionary failed: duplicate key '{key}'."
        )));
    }
    entries.insert(key, value);
    Ok(())
}

/// Keeps a deferred value in the `Resolving` state while it is computed.
///
/// Dropping the guard without [`ResolvingGuard::finish`] returns the value
/// to `Unresolved`.
struct ResolvingGuard<'a> {
    state: &'a RefCell<State>,
}

impl<'a> ResolvingGuard<'a> {
    fn enter(state: &'a RefCell<State>) -> Self {
        *state.borrow_mut() = State::Resolving;
        Self { state }
    }

    fn finish(self, result: &VariableResult<Value>) {
        *self.state.borrow_mut() = match result {
            Ok(value) => State::Resolved(value.clone()),
            Err(err) => State::Failed(err.clone()),
        };
    }
}

impl Drop for ResolvingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        if matches!(*state, State::Resolving) {
            *state = State::Unresolved;
        }
    }
}
