//! Runtime values stored in variables
//!
//! Scalars are copied by value. Lists, dictionaries and host objects are
//! shared handles: copying a scope copies the handle, so in-place mutation
//! of a container is visible from every scope that holds it while rebinding
//! a name is not.

mod access;
mod record;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

pub use access::{AttributeAccess, HostObject, IndexAccess, Slice};
pub use record::Record;

/// Shared handle to a list value.
pub type ListRef = Rc<RefCell<Vec<Value>>>;

/// Shared handle to an insertion-ordered dictionary value.
pub type DictRef = Rc<RefCell<IndexMap<String, Value>>>;

/// Shared handle to an opaque host object.
pub type ObjectRef = Rc<dyn HostObject>;

/// A runtime value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// The absence of a value.
    #[default]
    None,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A text value.
    String(String),
    /// An ordered sequence.
    List(ListRef),
    /// An insertion-ordered mapping with string keys.
    Dict(DictRef),
    /// An opaque object supporting attribute get/set.
    Object(ObjectRef),
}

impl Value {
    /// Creates a list value owning the given items.
    #[must_use]
    pub fn list(items: Vec<Self>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    /// Creates a dictionary value owning the given entries.
    #[must_use]
    pub fn dict(entries: IndexMap<String, Self>) -> Self {
        Self::Dict(Rc::new(RefCell::new(entries)))
    }

    /// Creates an empty dictionary value.
    #[must_use]
    pub fn empty_dict() -> Self {
        Self::dict(IndexMap::new())
    }

    /// Wraps a host object.
    #[must_use]
    pub fn object(object: impl HostObject + 'static) -> Self {
        Self::Object(Rc::new(object))
    }

    /// Returns true for sequence-shaped values.
    #[must_use]
    pub const fn is_list_like(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Returns true for mapping-shaped values.
    #[must_use]
    pub const fn is_dict_like(&self) -> bool {
        matches!(self, Self::Dict(_))
    }

    /// Returns the text if this is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(text) => Some(text),
            _ => None,
        }
    }

    /// Returns a snapshot of the items if this is a list value.
    #[must_use]
    pub fn to_vec(&self) -> Option<Vec<Self>> {
        match self {
            Self::List(items) => Some(items.borrow().clone()),
            _ => None,
        }
    }

    /// Returns a snapshot of the entries if this is a dictionary value.
    #[must_use]
    pub fn to_map(&self) -> Option<IndexMap<String, Self>> {
        match self {
            Self::Dict(entries) => Some(entries.borrow().clone()),
            _ => None,
        }
    }

    /// Returns true when both values are the same shared container or object.
    ///
    /// Scalars are never identical in this sense.
    #[must_use]
    pub fn same_identity(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Dict(a), Self::Dict(b)) => Rc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => {
                Rc::as_ptr(a).cast::<()>() == Rc::as_ptr(b).cast::<()>()
            }
            _ => false,
        }
    }

    /// Returns a short name of the value type used in error messages.
    #[must_use]
    pub fn type_name(&self) -> String {
        match self {
            Self::None => "None".to_string(),
            Self::Bool(_) => "boolean".to_string(),
            Self::Int(_) => "integer".to_string(),
            Self::Float(_) => "float".to_string(),
            Self::String(_) => "string".to_string(),
            Self::List(_) => "list".to_string(),
            Self::Dict(_) => "dictionary".to_string(),
            Self::Object(object) => object.type_name().to_string(),
        }
    }

    /// Returns the quoted representation used inside containers.
    #[must_use]
    pub fn repr(&self) -> String {
        match self {
            Self::String(text) => quote(text),
            other => other.to_string(),
        }
    }
}

fn quote(text: &str) -> String {
    let delimiter = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push(delimiter);
    for ch in text.chars() {
        match ch {
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if c == delimiter => {
                quoted.push('\\');
                quoted.push(c);
            }
            c => quoted.push(c),
        }
    }
    quoted.push(delimiter);
    quoted
}

fn format_float(number: f64) -> String {
    if number.is_nan() {
        "nan".to_string()
    } else if number.is_infinite() {
        if number > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if number.fract() == 0.0 && number.abs() < 1e16 {
        format!("{number:.1}")
    } else {
        number.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(number) => write!(f, "{number}"),
            Self::Float(number) => f.write_str(&format_float(*number)),
            Self::String(text) => f.write_str(text),
            Self::List(items) => {
                let rendered: Vec<String> = items.borrow().iter().map(Self::repr).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            Self::Dict(entries) => {
                let rendered: Vec<String> = entries
                    .borrow()
                    .iter()
                    .map(|(key, value)| format!("{}: {}", quote(key), value.repr()))
                    .collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
            Self::Object(object) => write!(f, "{object}"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            #[allow(clippy::cast_precision_loss)]
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => (*a as f64) == *b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Self::Dict(a), Self::Dict(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Self::Object(_), Self::Object(_)) => self.same_identity(other),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::String(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::String(text)
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Self::Bool(flag)
    }
}

impl From<i64> for Value {
    fn from(number: i64) -> Self {
        Self::Int(number)
    }
}

impl From<i32> for Value {
    fn from(number: i32) -> Self {
        Self::Int(i64::from(number))
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Self::Float(number)
    }
}

impl From<Vec<Self>> for Value {
    fn from(items: Vec<Self>) -> Self {
        Self::list(items)
    }
}

impl From<IndexMap<String, Self>> for Value {
    fn from(entries: IndexMap<String, Self>) -> Self {
        Self::dict(entries)
    }
}
