//! Generic host object with named fields

use std::cell::RefCell;
use std::fmt;

use indexmap::IndexMap;

use super::{AttributeAccess, HostObject, Value};

/// A host object with a type name and a mutable set of named fields.
///
/// Useful for exposing structured data to extended variable syntax
/// (`${record.field}`) without implementing [`HostObject`] by hand.
#[derive(Debug)]
pub struct Record {
    type_name: String,
    fields: RefCell<IndexMap<String, Value>>,
    frozen: bool,
}

impl Record {
    /// Creates an empty record that accepts new fields.
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: RefCell::new(IndexMap::new()),
            frozen: false,
        }
    }

    /// Adds a field, consuming and returning the record.
    #[must_use]
    pub fn with_field(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.borrow_mut().insert(name.into(), value.into());
        self
    }

    /// Rejects all later attribute assignments.
    #[must_use]
    pub const fn frozen(mut self) -> Self {
        self.frozen = true;
        self
    }
}

impl AttributeAccess for Record {
    fn attribute(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    fn set_attribute(&self, name: &str, value: Value) -> Result<(), String> {
        if self.frozen {
            return Err(format!("cannot set attribute '{name}' of '{}'", self.type_name));
        }
        self.fields.borrow_mut().insert(name.to_string(), value);
        Ok(())
    }
}

impl HostObject for Record {
    fn type_name(&self) -> &str {
        &self.type_name
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self
            .fields
            .borrow()
            .iter()
            .map(|(name, value)| format!("{name}={}", value.repr()))
            .collect();
        write!(f, "{}({})", self.type_name, fields.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_record_fields() {
        let value = Value::object(Record::new("Point").with_field("x", 1).with_field("y", 2));
        assert_eq!(value.attribute("x"), Some(Value::Int(1)));
        assert_eq!(value.type_name(), "Point");
        assert_eq!(value.to_string(), "Point(x=1, y=2)");

        assert_eq!(value.set_attribute("z", Value::Int(3)), Ok(()));
        assert_eq!(value.attribute("z"), Some(Value::Int(3)));
    }

    #[test]
    fn test_frozen_record_rejects_assignment() {
        let value = Value::object(Record::new("Frozen").frozen());
        assert!(value.set_attribute("x", Value::Int(1)).is_err());
    }
}
