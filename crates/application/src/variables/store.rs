//! Variable store
//!
//! Holds the bindings of one scope frame keyed by bare, normalized names.
//! Values are either concrete or deferred; deferred entries are replaced by
//! their resolved value the first time they are read.

use std::rc::Rc;

use scopevar_domain::{NormalizedMap, Sigil, Value, VariableError, VariableResult};

use super::deferred::DeferredValue;
use crate::variable_resolver::search::search_variable;

/// One binding in a store.
#[derive(Debug, Clone)]
pub enum StoreEntry {
    /// A concrete value.
    Value(Value),
    /// A value computed on first read.
    Deferred(Rc<DeferredValue>),
}

impl StoreEntry {
    /// The sigil matching the shape of the value.
    #[must_use]
    pub fn shape(&self) -> Sigil {
        match self {
            Self::Value(value) if value.is_list_like() => Sigil::List,
            Self::Value(value) if value.is_dict_like() => Sigil::Dict,
            Self::Value(_) => Sigil::Scalar,
            Self::Deferred(deferred) => deferred.shape(),
        }
    }
}

/// Bindings of a single scope frame.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    data: NormalizedMap<StoreEntry>,
}

impl VariableStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value.
    ///
    /// With `decorated`, `name` must be an assignable reference such as
    /// `${x}`, `@{x}` or `&{x}`; list and dictionary values are validated
    /// against the sigil and copied. Otherwise `name` is used as-is.
    /// Without `overwrite` an existing binding is kept.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name or a value of the wrong shape.
    pub fn add(
        &mut self,
        name: &str,
        value: Value,
        overwrite: bool,
        decorated: bool,
    ) -> VariableResult<()> {
        let (name, value) = if decorated {
            undecorate_and_validate(name, value)?
        } else {
            (name.to_string(), value)
        };
        if overwrite || !self.data.contains(&name) {
            self.data.insert(&name, StoreEntry::Value(value));
        }
        Ok(())
    }

    /// Adds a deferred value under a bare name.
    pub fn add_deferred(&mut self, name: &str, value: Rc<DeferredValue>, overwrite: bool) {
        if overwrite || !self.data.contains(name) {
            self.data.insert(name, StoreEntry::Deferred(value));
        }
    }

    /// Returns a handle to the binding of a bare name.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<StoreEntry> {
        self.data.get(name).cloned()
    }

    /// Replaces `deferred` with its resolved value, if it is still bound.
    pub(crate) fn replace_resolved(&mut self, name: &str, deferred: &Rc<DeferredValue>, value: Value) {
        if let Some(entry) = self.data.get_mut(name)
            && matches!(entry, StoreEntry::Deferred(current) if Rc::ptr_eq(current, deferred))
        {
            *entry = StoreEntry::Value(value);
        }
    }

    /// Removes `deferred`, if it is still bound. Returns true if it was.
    pub(crate) fn remove_if_same(&mut self, name: &str, deferred: &Rc<DeferredValue>) -> bool {
        let same = matches!(
            self.data.get(name),
            Some(StoreEntry::Deferred(current)) if Rc::ptr_eq(current, deferred)
        );
        if same {
            self.data.remove(name);
        }
        same
    }

    /// Removes the binding of a bare name.
    pub fn remove(&mut self, name: &str) -> Option<StoreEntry> {
        self.data.remove(name)
    }

    /// Returns true if a bare name is bound.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.data.contains(name)
    }

    /// Bare names in insertion order, as originally spelled.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.data.keys().map(str::to_string).collect()
    }

    /// Bare names of entries that are still deferred.
    #[must_use]
    pub fn deferred_names(&self) -> Vec<String> {
        self.data
            .iter()
            .filter(|(_, entry)| matches!(entry, StoreEntry::Deferred(_)))
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Names paired with the sigil of their value shape, for recommendations.
    #[must_use]
    pub fn candidates(&self) -> Vec<(String, Sigil)> {
        self.data
            .iter()
            .map(|(name, entry)| (name.to_string(), entry.shape()))
            .collect()
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Removes every binding.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Copies the store for a new frame.
    ///
    /// Concrete values are shared. Deferred values are recreated unresolved
    /// so that each frame resolves them against its own bindings.
    #[must_use]
    pub fn fresh_copy(&self) -> Self {
        let mut data = NormalizedMap::new();
        for (name, entry) in self.data.iter() {
            let entry = match entry {
                StoreEntry::Deferred(deferred) => StoreEntry::Deferred(Rc::new(deferred.fresh())),
                StoreEntry::Value(value) => StoreEntry::Value(value.clone()),
            };
            data.insert(name, entry);
        }
        Self { data }
    }
}

fn undecorate_and_validate(name: &str, value: Value) -> VariableResult<(String, Value)> {
    let found = search_variable(name)?
        .filter(|found| found.is_assign(false, false, false))
        .ok_or_else(|| VariableError::syntax(format!("Invalid variable name '{name}'.")))?;
    let value = match found.identifier {
        Sigil::List => value
            .to_vec()
            .map(Value::list)
            .ok_or_else(|| cannot_set(name, "list", &value))?,
        Sigil::Dict => value
            .to_map()
            .map(Value::dict)
            .ok_or_else(|| cannot_set(name, "dictionary", &value))?,
        _ => value,
    };
    Ok((found.base.to_string(), value))
}

fn cannot_set(name: &str, expected: &str, value: &Value) -> VariableError {
    VariableError::type_mismatch(format!(
        "Cannot set variable '{name}': Expected {expected}-like value, got {}.",
        value.type_name()
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn value_of(store: &VariableStore, name: &str) -> Value {
        match store.entry(name) {
            Some(StoreEntry::Value(value)) => value,
            other => panic!("expected concrete value, got {other:?}"),
        }
    }

    #[test]
    fn test_add_decorated_uses_bare_name() {
        let mut store = VariableStore::new();
        store.add("${My Var}", Value::from("x"), true, true).unwrap();
        assert!(store.contains("my_var"));
        assert_eq!(value_of(&store, "MYVAR"), Value::from("x"));
        assert_eq!(store.names(), vec!["My Var".to_string()]);
    }

    #[test]
    fn test_add_without_overwrite_keeps_existing() {
        let mut store = VariableStore::new();
        store.add("${x}", Value::Int(1), true, true).unwrap();
        store.add("${x}", Value::Int(2), false, true).unwrap();
        assert_eq!(value_of(&store, "x"), Value::Int(1));
        store.add("${x}", Value::Int(3), true, true).unwrap();
        assert_eq!(value_of(&store, "x"), Value::Int(3));
    }

    #[test]
    fn test_list_and_dict_values_are_validated_and_copied() {
        let mut store = VariableStore::new();
        let list = Value::list(vec![Value::Int(1)]);
        store.add("@{list}", list.clone(), true, true).unwrap();
        let stored = value_of(&store, "list");
        assert_eq!(stored, list);
        assert!(!stored.same_identity(&list));

        let err = store
            .add("@{bad}", Value::from("text"), true, true)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot set variable '@{bad}': Expected list-like value, got string."
        );
        let err = store
            .add("&{bad}", Value::list(Vec::new()), true, true)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot set variable '&{bad}': Expected dictionary-like value, got list."
        );
    }

    #[test]
    fn test_scalar_values_are_shared() {
        let mut store = VariableStore::new();
        let list = Value::list(vec![Value::Int(1)]);
        store.add("${list}", list.clone(), true, true).unwrap();
        assert!(value_of(&store, "list").same_identity(&list));
    }

    #[test]
    fn test_invalid_names() {
        let mut store = VariableStore::new();
        for name in ["x", "%{x}", "${x}[0]", "${a${b}}", "${x}y"] {
            let err = store.add(name, Value::None, true, true).unwrap_err();
            assert_eq!(
                err,
                VariableError::syntax(format!("Invalid variable name '{name}'."))
            );
        }
        assert!(store.is_empty());
    }

    #[test]
    fn test_candidates_report_shapes() {
        let mut store = VariableStore::new();
        store.add("${s}", Value::from("x"), true, true).unwrap();
        store.add("${l}", Value::list(Vec::new()), true, true).unwrap();
        store.add("&{d}", Value::empty_dict(), true, true).unwrap();
        assert_eq!(
            store.candidates(),
            vec![
                ("s".to_string(), Sigil::Scalar),
                ("l".to_string(), Sigil::List),
                ("d".to_string(), Sigil::Dict),
            ]
        );
    }

    #[test]
    fn test_copy_shares_containers() {
        let mut store = VariableStore::new();
        store
            .add("@{list}", Value::list(vec![Value::Int(1)]), true, true)
            .unwrap();
        let mut copy = store.fresh_copy();
        if let Value::List(items) = value_of(&copy, "list") {
            items.borrow_mut().push(Value::Int(2));
        }
        assert_eq!(value_of(&store, "list").to_vec().unwrap().len(), 2);

        copy.add("${list}", Value::None, true, true).unwrap();
        assert!(value_of(&store, "list").is_list_like());
    }
}
