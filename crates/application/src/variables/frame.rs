//! One scope frame of variables

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use scopevar_domain::{EnvironmentLookup, Sigil, Value, VariableError, VariableResult};

use super::deferred::{DeferredValue, ErrorReporter};
use super::store::{StoreEntry, VariableStore};
use crate::variable_resolver::finders::VariableFinder;
use crate::variable_resolver::notfound::variable_not_found;
use crate::variable_resolver::replacer::{VariableReplacer, validate_value};
use crate::variable_resolver::search::search_variable;

/// The variables visible in one scope frame.
///
/// Bindings live behind a `RefCell` so that resolving a deferred value can
/// read other bindings of the same frame and then store its result.
#[derive(Debug)]
pub struct Variables {
    store: RefCell<VariableStore>,
    environment: Rc<EnvironmentLookup>,
}

impl Variables {
    /// Creates an empty frame.
    #[must_use]
    pub fn new(environment: EnvironmentLookup) -> Self {
        Self::with_environment(Rc::new(environment))
    }

    /// Creates an empty frame sharing an environment lookup.
    #[must_use]
    pub fn with_environment(environment: Rc<EnvironmentLookup>) -> Self {
        Self {
            store: RefCell::new(VariableStore::new()),
            environment,
        }
    }

    /// The environment consulted by `%{NAME}` references.
    #[must_use]
    pub fn environment(&self) -> &EnvironmentLookup {
        &self.environment
    }

    /// Copies the frame for a new scope.
    ///
    /// Containers are shared with this frame; deferred values start
    /// unresolved in the copy.
    #[must_use]
    pub fn copy(&self) -> Self {
        Self {
            store: RefCell::new(self.store.borrow().fresh_copy()),
            environment: Rc::clone(&self.environment),
        }
    }

    /// Returns the value of a decorated name such as `${x}` or `@{x}`.
    ///
    /// # Errors
    ///
    /// Returns a syntax, not-found, recursive-definition or type error.
    pub fn get(&self, name: &str) -> VariableResult<Value> {
        let value = VariableFinder::new(self).find(name)?;
        let sigil = name
            .chars()
            .next()
            .and_then(Sigil::from_char)
            .unwrap_or(Sigil::Scalar);
        validate_value(sigil, name, value)
    }

    /// Sets a decorated name, replacing an existing binding.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name or a value of the wrong shape.
    pub fn set(&self, name: &str, value: Value) -> VariableResult<()> {
        self.store.borrow_mut().add(name, value, true, true)
    }

    /// Sets a decorated name, keeping an existing binding unless `overwrite`.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name or a value of the wrong shape.
    pub fn set_with(&self, name: &str, value: Value, overwrite: bool) -> VariableResult<()> {
        self.store.borrow_mut().add(name, value, overwrite, true)
    }

    /// Returns true if the decorated name is bound in this frame.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        match search_variable(name) {
            Ok(Some(found)) if found.is_variable() => self.store.borrow().contains(found.base),
            _ => false,
        }
    }

    /// Removes a decorated name, returning true if it was bound.
    pub fn remove(&self, name: &str) -> bool {
        match search_variable(name) {
            Ok(Some(found)) if found.is_variable() => {
                self.store.borrow_mut().remove(found.base).is_some()
            }
            _ => false,
        }
    }

    /// Removes every binding.
    pub fn clear(&self) {
        self.store.borrow_mut().clear();
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.borrow().len()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.borrow().is_empty()
    }

    /// Bare names in insertion order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.store.borrow().names()
    }

    /// Bare names paired with the sigil of their value shape.
    #[must_use]
    pub fn candidates(&self) -> Vec<(String, Sigil)> {
        self.store.borrow().candidates()
    }

    /// Every binding keyed by its name decorated with the sigil of its
    /// value shape, e.g. `@{items}` for a list.
    ///
    /// Deferred values are resolved; those that fail are left out.
    #[must_use]
    pub fn as_decorated(&self) -> IndexMap<String, Value> {
        let mut decorated = IndexMap::new();
        for name in self.names() {
            if let Ok(Some(value)) = self.resolve_stored(&name) {
                let sigil = match &value {
                    Value::List(_) => Sigil::List,
                    Value::Dict(_) => Sigil::Dict,
                    _ => Sigil::Scalar,
                };
                decorated.insert(sigil.decorate(&name), value);
            }
        }
        decorated
    }

    /// Adds a deferred value under its bare name.
    pub fn set_deferred(&self, value: DeferredValue, overwrite: bool) {
        let base = value.base().to_string();
        self.store
            .borrow_mut()
            .add_deferred(&base, Rc::new(value), overwrite);
    }

    /// Registers variable table rows as deferred values.
    ///
    /// Rows with an invalid name or item are reported and skipped.
    pub fn set_from_variable_table(
        &self,
        rows: &[(String, Vec<String>)],
        overwrite: bool,
        reporter: Option<&ErrorReporter>,
    ) {
        for (name, values) in rows {
            match DeferredValue::from_table(name, values.clone(), reporter.cloned()) {
                Ok(deferred) => self.set_deferred(deferred, overwrite),
                Err(err) => {
                    if let Some(reporter) = reporter {
                        reporter(name, &err);
                    }
                }
            }
        }
    }

    /// Returns the value bound to a bare name, resolving a deferred value.
    ///
    /// A deferred value that fails is removed from the frame and reported.
    /// The caller then sees a recursive-definition error, or a not-found
    /// error for any other cause.
    ///
    /// # Errors
    ///
    /// Returns an error if a deferred value cannot be resolved.
    pub fn resolve_stored(&self, name: &str) -> VariableResult<Option<Value>> {
        let entry = self.store.borrow().entry(name);
        match entry {
            None => Ok(None),
            Some(StoreEntry::Value(value)) => Ok(Some(value)),
            Some(StoreEntry::Deferred(deferred)) => self.resolve_deferred(name, &deferred).map(Some),
        }
    }

    fn resolve_deferred(&self, name: &str, deferred: &Rc<DeferredValue>) -> VariableResult<Value> {
        match deferred.resolve(self) {
            Ok(value) => {
                self.store
                    .borrow_mut()
                    .replace_resolved(name, deferred, value.clone());
                Ok(value)
            }
            Err(err) => {
                let removed = self.store.borrow_mut().remove_if_same(name, deferred);
                if removed {
                    tracing::debug!(name = %deferred.name(), error = %err, "removing unresolvable variable");
                    deferred.report(&err);
                }
                if err == VariableError::RecursiveDefinition {
                    return Err(err);
                }
                Err(variable_not_found(deferred.name(), &self.candidates()))
            }
        }
    }

    /// Resolves every deferred value in the frame.
    ///
    /// Failures are reported and the failing variables removed; the sweep
    /// always continues with the remaining values.
    pub fn resolve_delayed(&self) {
        let names = self.store.borrow().deferred_names();
        tracing::trace!(count = names.len(), "resolving delayed variables");
        for name in names {
            if let Err(err) = self.resolve_stored(&name) {
                tracing::trace!(%name, error = %err, "delayed variable left unresolved");
            }
        }
    }

    /// Replaces variables in a single item. See [`VariableReplacer::replace_scalar`].
    ///
    /// # Errors
    ///
    /// Returns the first resolution error unless `ignore_errors` is set.
    pub fn replace_scalar(&self, item: &Value, ignore_errors: bool) -> VariableResult<Value> {
        VariableReplacer::new(self).replace_scalar(item, ignore_errors)
    }

    /// Replaces variables in text. See [`VariableReplacer::replace_string`].
    ///
    /// # Errors
    ///
    /// Returns the first resolution error unless `ignore_errors` is set.
    pub fn replace_string(&self, text: &str, ignore_errors: bool) -> VariableResult<String> {
        VariableReplacer::new(self).replace_string(text, ignore_errors)
    }

    /// Replaces variables in a list. See [`VariableReplacer::replace_list`].
    ///
    /// # Errors
    ///
    /// Returns the first resolution error unless `ignore_errors` is set.
    pub fn replace_list(
        &self,
        items: &[Value],
        replace_until: Option<usize>,
        ignore_errors: bool,
    ) -> VariableResult<Vec<Value>> {
        VariableReplacer::new(self).replace_list(items, replace_until, ignore_errors)
    }
}
