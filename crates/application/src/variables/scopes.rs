//! Scope stack
//!
//! Global, suite, test and keyword frames. A new frame is a copy of the
//! frame it inherits from: suites copy the global frame, tests and keywords
//! copy the current suite. Values set with a wider scope are written into
//! every active frame of that scope and below, and remembered so that
//! frames started later see them too.

use scopevar_domain::{NormalizedMap, Value, VariableError, VariableResult, VariableScope};

use super::Variables;
use super::deferred::ErrorReporter;
use super::globals::GlobalVariables;

/// The stack of active scope frames.
#[derive(Debug)]
pub struct VariableScopes {
    scopes: Vec<Variables>,
    kinds: Vec<VariableScope>,
    suite: Option<usize>,
    test: Option<usize>,
    variables_set: SetVariables,
}

impl VariableScopes {
    /// Creates a stack holding a copy of the global frame.
    #[must_use]
    pub fn new(globals: &GlobalVariables) -> Self {
        Self {
            scopes: vec![globals.copy()],
            kinds: vec![VariableScope::Global],
            suite: None,
            test: None,
            variables_set: SetVariables::default(),
        }
    }

    /// The innermost frame.
    #[must_use]
    pub fn current(&self) -> &Variables {
        // The global frame is never popped.
        &self.scopes[self.scopes.len() - 1]
    }

    /// The global frame of this stack.
    #[must_use]
    pub fn global(&self) -> &Variables {
        &self.scopes[0]
    }

    /// The current suite frame, or the global frame of this stack when no
    /// suite is started.
    #[must_use]
    pub fn current_suite(&self) -> &Variables {
        &self.scopes[self.suite.unwrap_or(0)]
    }

    /// The kind of the innermost frame.
    #[must_use]
    pub fn current_kind(&self) -> VariableScope {
        self.kinds[self.kinds.len() - 1]
    }

    /// Number of active frames, including the global frame.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    fn push(&mut self, variables: Variables, kind: VariableScope) -> usize {
        self.scopes.push(variables);
        self.kinds.push(kind);
        tracing::debug!(scope = kind.display_name(), depth = self.scopes.len(), "scope started");
        self.scopes.len() - 1
    }

    fn pop(&mut self, kind: VariableScope) -> VariableResult<()> {
        let current = self.current_kind();
        if current != kind || self.scopes.len() == 1 {
            return Err(VariableError::Scope(format!(
                "Cannot end {} scope: current scope is {}.",
                kind.display_name(),
                current.display_name()
            )));
        }
        self.scopes.pop();
        self.kinds.pop();
        tracing::debug!(scope = kind.display_name(), depth = self.scopes.len(), "scope ended");
        Ok(())
    }

    /// Starts a suite frame copied from the global frame.
    pub fn start_suite(&mut self) {
        let suite = self.global().copy();
        let index = self.push(suite, VariableScope::Suite);
        self.suite = Some(index);
        self.variables_set.start_suite();
        self.variables_set.update(&self.scopes[index]);
    }

    /// Ends the current suite frame.
    ///
    /// # Errors
    ///
    /// Returns a scope error if the innermost frame is not a suite.
    pub fn end_suite(&mut self) -> VariableResult<()> {
        self.pop(VariableScope::Suite)?;
        self.suite = (self.scopes.len() > 1).then(|| self.scopes.len() - 1);
        self.variables_set.end_suite();
        Ok(())
    }

    /// Starts a test frame copied from the current suite.
    ///
    /// # Errors
    ///
    /// Returns a scope error if no suite is started.
    pub fn start_test(&mut self) -> VariableResult<()> {
        let suite = self
            .suite
            .ok_or_else(|| VariableError::Scope("Cannot start test when no suite is started.".to_string()))?;
        let test = self.scopes[suite].copy();
        self.test = Some(self.push(test, VariableScope::Test));
        self.variables_set.start_test();
        Ok(())
    }

    /// Ends the current test frame.
    ///
    /// # Errors
    ///
    /// Returns a scope error if the innermost frame is not a test.
    pub fn end_test(&mut self) -> VariableResult<()> {
        self.pop(VariableScope::Test)?;
        self.test = None;
        self.variables_set.end_test();
        Ok(())
    }

    /// Starts a keyword frame copied from the current suite, or from the
    /// global frame when no suite is started.
    pub fn start_keyword(&mut self) {
        let keyword = self.scopes[self.suite.unwrap_or(0)].copy();
        self.variables_set.start_keyword();
        self.variables_set.update(&keyword);
        self.push(keyword, VariableScope::Keyword);
    }

    /// Ends the current keyword frame.
    ///
    /// # Errors
    ///
    /// Returns a scope error if the innermost frame is not a keyword.
    pub fn end_keyword(&mut self) -> VariableResult<()> {
        self.pop(VariableScope::Keyword)?;
        self.variables_set.end_keyword();
        Ok(())
    }

    fn scopes_until(&self, stop: usize) -> impl Iterator<Item = &Variables> {
        self.scopes[stop..].iter().rev()
    }

    /// Sets a variable in every frame.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name or a value of the wrong shape.
    pub fn set_global(&mut self, name: &str, value: Value) -> VariableResult<()> {
        let (name, _) = set_in_each(self.scopes_until(0), name, value)?;
        self.variables_set.set_global(&name);
        Ok(())
    }

    /// Sets a variable in the current suite and every frame below it.
    ///
    /// With `top` only the top-level suite is changed. With `children` the
    /// value is also given to suites and keywords started later.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name or a value of the wrong shape.
    pub fn set_suite(
        &mut self,
        name: &str,
        value: Value,
        top: bool,
        children: bool,
    ) -> VariableResult<()> {
        if top {
            let top_suite = self.scopes.get(1).ok_or_else(|| {
                VariableError::Scope("Cannot set suite variable when no suite is started.".to_string())
            })?;
            return top_suite.set(name, value);
        }
        let (name, value) = set_in_each(self.scopes_until(self.suite.unwrap_or(0)), name, value)?;
        if children {
            self.variables_set.set_suite(&name, value);
        }
        Ok(())
    }

    /// Sets a variable in the current test and every keyword frame below it.
    ///
    /// # Errors
    ///
    /// Returns a scope error when no test is started, or an error for an
    /// invalid name or value.
    pub fn set_test(&mut self, name: &str, value: Value) -> VariableResult<()> {
        let test = self.test.ok_or_else(|| {
            VariableError::Scope("Cannot set test variable when no test is started.".to_string())
        })?;
        let (name, value) = set_in_each(self.scopes_until(test), name, value)?;
        self.variables_set.set_test(&name, value);
        Ok(())
    }

    /// Sets a variable in the current frame and in keywords started from it.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name or a value of the wrong shape.
    pub fn set_keyword(&mut self, name: &str, value: Value) -> VariableResult<()> {
        self.current().set(name, value.clone())?;
        self.variables_set.set_keyword(name, value);
        Ok(())
    }

    /// Sets a variable in the current frame only.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name or a value of the wrong shape.
    pub fn set_local(&self, name: &str, value: Value) -> VariableResult<()> {
        self.current().set(name, value)
    }

    /// Registers variable table rows in the current suite frame, or in the
    /// global frame of this stack when no suite is started.
    pub fn set_from_variable_table(
        &self,
        rows: &[(String, Vec<String>)],
        overwrite: bool,
        reporter: Option<&ErrorReporter>,
    ) {
        tracing::debug!(rows = rows.len(), overwrite, "registering variable table");
        self.current_suite()
            .set_from_variable_table(rows, overwrite, reporter);
    }

    /// Resolves deferred values in every frame from the innermost one up to
    /// the current suite.
    pub fn resolve_delayed(&self) {
        for scope in self.scopes_until(self.suite.unwrap_or(0)) {
            scope.resolve_delayed();
        }
    }
}

/// Sets `name` in each frame. After the first frame, list and dictionary
/// names are rewritten to their `$` form so every frame shares the container
/// created by the first one.
fn set_in_each<'a>(
    scopes: impl Iterator<Item = &'a Variables>,
    name: &str,
    value: Value,
) -> VariableResult<(String, Value)> {
    let mut name = name.to_string();
    let mut value = value;
    for scope in scopes {
        scope.set(&name, value.clone())?;
        if !name.starts_with('$') {
            let mut scalar = String::from("$");
            scalar.push_str(&name[1..]);
            name = scalar;
            value = scope.get(&name)?;
        }
    }
    Ok((name, value))
}

/// Remembers variables set with suite, test or keyword scope so they can
/// be applied to frames started later.
#[derive(Debug, Default)]
struct SetVariables {
    scopes: Vec<NormalizedMap<Value>>,
    suite: Option<usize>,
    test: Option<usize>,
}

impl SetVariables {
    fn top(&self) -> NormalizedMap<Value> {
        self.scopes.last().cloned().unwrap_or_default()
    }

    fn start_suite(&mut self) {
        let scope = self.top();
        self.scopes.push(scope);
        self.suite = Some(self.scopes.len() - 1);
    }

    fn end_suite(&mut self) {
        self.scopes.pop();
        self.suite = self.scopes.len().checked_sub(1);
    }

    fn start_test(&mut self) {
        let scope = self.top();
        self.scopes.push(scope);
        self.test = Some(self.scopes.len() - 1);
    }

    fn end_test(&mut self) {
        self.test = None;
        self.scopes.pop();
    }

    fn start_keyword(&mut self) {
        let scope = self.top();
        self.scopes.push(scope);
    }

    fn end_keyword(&mut self) {
        self.scopes.pop();
    }

    fn set_global(&mut self, name: &str) {
        for scope in &mut self.scopes {
            scope.remove(name);
        }
    }

    fn set_until(&mut self, stop: Option<usize>, name: &str, value: &Value) {
        let stop = stop.unwrap_or(0);
        for scope in self.scopes.iter_mut().skip(stop) {
            scope.insert(name, value.clone());
        }
    }

    fn set_suite(&mut self, name: &str, value: Value) {
        self.set_until(self.suite, name, &value);
    }

    fn set_test(&mut self, name: &str, value: Value) {
        self.set_until(self.test, name, &value);
    }

    fn set_keyword(&mut self, name: &str, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, value);
        }
    }

    fn update(&self, variables: &Variables) {
        let Some(scope) = self.scopes.last() else {
            return;
        };
        for (name, value) in scope.iter() {
            if let Err(err) = variables.set(name, value.clone()) {
                tracing::trace!(%name, error = %err, "skipping propagated variable");
            }
        }
    }
}
