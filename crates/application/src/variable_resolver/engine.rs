//! Variable engine
//!
//! The entry point used by an execution engine: scope lifecycle hooks,
//! lookups, assignments with each scope, template substitution and bulk
//! imports, all against one scope stack.

use std::rc::Rc;

use scopevar_domain::{GlobalSettings, Value, VariableError, VariableResult};

use super::search::{VariableMatches, is_variable, search_variable};
use crate::variables::{ErrorReporter, GlobalVariables, VariableAssigner, VariableScopes, Variables};

/// A value handed to [`VariableEngine::import_bulk`].
#[derive(Debug, Clone, PartialEq)]
pub enum BulkValue {
    /// Unresolved table cells, resolved on first use.
    Raw(Vec<String>),
    /// A ready value stored as-is.
    Concrete(Value),
}

/// Resolves and assigns variables for one execution context.
pub struct VariableEngine {
    scopes: VariableScopes,
    reporter: ErrorReporter,
}

impl std::fmt::Debug for VariableEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableEngine")
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

impl VariableEngine {
    /// Creates an engine whose global frame is a copy of `globals`.
    #[must_use]
    pub fn new(globals: &GlobalVariables) -> Self {
        Self {
            scopes: VariableScopes::new(globals),
            reporter: Rc::new(|name: &str, err: &VariableError| {
                tracing::warn!("Setting variable '{name}' failed: {err}");
            }),
        }
    }

    /// Creates an engine from start-up settings.
    ///
    /// # Errors
    ///
    /// Returns an error if a start-up variable name is not valid.
    pub fn from_settings(settings: &GlobalSettings) -> VariableResult<Self> {
        Ok(Self::new(&GlobalVariables::from_settings(settings)?))
    }

    /// Replaces the hook receiving errors of variable table values.
    #[must_use]
    pub fn with_reporter(mut self, reporter: ErrorReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// The scope stack.
    #[must_use]
    pub const fn scopes(&self) -> &VariableScopes {
        &self.scopes
    }

    fn current(&self) -> &Variables {
        self.scopes.current()
    }

    /// Starts a suite scope.
    pub fn enter_suite(&mut self) {
        self.scopes.start_suite();
    }

    /// Ends the current suite scope.
    ///
    /// # Errors
    ///
    /// Returns a scope error if the current scope is not a suite.
    pub fn leave_suite(&mut self) -> VariableResult<()> {
        self.scopes.end_suite()
    }

    /// Starts a test scope.
    ///
    /// # Errors
    ///
    /// Returns a scope error if no suite is started.
    pub fn enter_test(&mut self) -> VariableResult<()> {
        self.scopes.start_test()
    }

    /// Ends the current test scope.
    ///
    /// # Errors
    ///
    /// Returns a scope error if the current scope is not a test.
    pub fn leave_test(&mut self) -> VariableResult<()> {
        self.scopes.end_test()
    }

    /// Starts a keyword scope.
    pub fn enter_keyword(&mut self) {
        self.scopes.start_keyword();
    }

    /// Ends the current keyword scope.
    ///
    /// # Errors
    ///
    /// Returns a scope error if the current scope is not a keyword.
    pub fn leave_keyword(&mut self) -> VariableResult<()> {
        self.scopes.end_keyword()
    }

    /// Returns the value of a variable.
    ///
    /// `name` is a reference such as `${x}`, `@{x}[0]` or `%{HOME}`; a bare
    /// name is looked up as `${name}`.
    ///
    /// # Errors
    ///
    /// Returns a not-found, recursive-definition, type or syntax error.
    pub fn lookup(&self, name: &str) -> VariableResult<Value> {
        let name = decorate(name);
        match search_variable(&name)? {
            Some(found) if !found.items.is_empty() => {
                self.current().replace_scalar(&Value::from(name.as_str()), false)
            }
            _ => self.current().get(&name),
        }
    }

    /// Sets a variable in the current scope only.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name or a value of the wrong shape.
    pub fn assign(&self, name: &str, value: Value) -> VariableResult<()> {
        self.scopes.set_local(&decorate(name), value)
    }

    /// Sets a variable in every scope, including scopes started later.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name or a value of the wrong shape.
    pub fn assign_global(&mut self, name: &str, value: Value) -> VariableResult<()> {
        self.scopes.set_global(&decorate(name), value)
    }

    /// Sets a variable in the current suite and the scopes below it.
    ///
    /// See [`VariableScopes::set_suite`] for `top` and `children`.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name or a value of the wrong shape.
    pub fn assign_suite(
        &mut self,
        name: &str,
        value: Value,
        top: bool,
        children: bool,
    ) -> VariableResult<()> {
        self.scopes.set_suite(&decorate(name), value, top, children)
    }

    /// Sets a variable in the current test and the keywords below it.
    ///
    /// # Errors
    ///
    /// Returns a scope error when no test is started.
    pub fn assign_test(&mut self, name: &str, value: Value) -> VariableResult<()> {
        self.scopes.set_test(&decorate(name), value)
    }

    /// Sets a variable in the current keyword and keywords it starts.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name or a value of the wrong shape.
    pub fn assign_keyword(&mut self, name: &str, value: Value) -> VariableResult<()> {
        self.scopes.set_keyword(&decorate(name), value)
    }

    /// Assigns a keyword return value to targets like `${a}  @{rest}=`.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid targets or a value that does not fit them.
    pub fn assign_return_value<S: AsRef<str>>(
        &self,
        targets: &[S],
        value: Value,
    ) -> VariableResult<()> {
        VariableAssigner::new(targets)?.assign(self.current(), value)
    }

    /// Substitutes a template, keeping the type of a lone reference.
    ///
    /// # Errors
    ///
    /// Returns the first resolution error.
    pub fn substitute_scalar(&self, text: &str) -> VariableResult<Value> {
        self.current().replace_scalar(&Value::from(text), false)
    }

    /// Substitutes every reference in a template, producing text.
    ///
    /// # Errors
    ///
    /// Returns the first resolution error.
    pub fn substitute_string(&self, text: &str) -> VariableResult<String> {
        self.current().replace_string(text, false)
    }

    /// Substitutes a list of items, expanding lone `@{list}` items in place.
    ///
    /// With `limit`, only that many leading output items are resolved; the
    /// rest are returned escaped.
    ///
    /// # Errors
    ///
    /// Returns the first resolution error.
    pub fn substitute_sequence(
        &self,
        items: &[Value],
        limit: Option<usize>,
    ) -> VariableResult<Vec<Value>> {
        self.current().replace_list(items, limit, false)
    }

    /// Registers many variables in the current suite scope.
    ///
    /// Raw values are resolved lazily; invalid entries are reported to the
    /// reporter hook and skipped.
    pub fn import_bulk(&self, pairs: Vec<(String, BulkValue)>, overwrite: bool) {
        tracing::debug!(count = pairs.len(), overwrite, "importing variables");
        let mut rows = Vec::new();
        for (name, value) in pairs {
            match value {
                BulkValue::Raw(cells) => rows.push((name, cells)),
                BulkValue::Concrete(value) => {
                    if let Err(err) = self.scopes.current_suite().set_with(&name, value, overwrite) {
                        (self.reporter)(&name, &err);
                    }
                }
            }
        }
        self.scopes
            .set_from_variable_table(&rows, overwrite, Some(&self.reporter));
    }

    /// Resolves all pending table values of the current suite, reporting
    /// and removing the ones that fail.
    pub fn flush_deferred(&self) {
        self.scopes.resolve_delayed();
    }

    /// References in `text` that cannot currently be resolved.
    #[must_use]
    pub fn find_unresolved(&self, text: &str) -> Vec<String> {
        let mut unresolved = Vec::new();
        for found in &VariableMatches::new(text) {
            let Ok(found) = found else {
                break;
            };
            let matched = Value::from(found.matched());
            if self.current().replace_scalar(&matched, false).is_err() {
                unresolved.push(found.matched().to_string());
            }
        }
        unresolved
    }
}

fn decorate(name: &str) -> String {
    if is_variable(name) {
        name.to_string()
    } else {
        format!("${{{name}}}")
    }
}
