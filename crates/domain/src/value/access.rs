//! Capability traits for item and attribute access

use std::fmt;

use super::Value;

/// Attribute get/set on a value, used by extended variable syntax and
/// extended assignment (`${obj.attr}`).
pub trait AttributeAccess {
    /// Returns the attribute value, or `None` if the attribute does not exist.
    fn attribute(&self, name: &str) -> Option<Value>;

    /// Sets an attribute, returning a message on failure.
    ///
    /// # Errors
    ///
    /// Returns a description of why the attribute cannot be set.
    fn set_attribute(&self, name: &str, value: Value) -> Result<(), String>;
}

/// An opaque host object that can be stored in a variable.
pub trait HostObject: AttributeAccess + fmt::Debug + fmt::Display {
    /// Name of the object type used in error messages.
    fn type_name(&self) -> &str;
}

/// Positional access on sequence-shaped values.
pub trait IndexAccess {
    /// Number of addressable items, or `None` if the value is not a sequence.
    fn sequence_len(&self) -> Option<usize>;

    /// Returns the item at a possibly negative index.
    fn item_at(&self, index: i64) -> Option<Value>;

    /// Returns a new value holding the selected items.
    ///
    /// # Errors
    ///
    /// Returns a message when the slice is invalid or the value is not a sequence.
    fn slice(&self, slice: Slice) -> Result<Value, String>;
}

/// A `start:stop:step` slice with optional bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Slice {
    /// First index, inclusive.
    pub start: Option<i64>,
    /// Last index, exclusive.
    pub stop: Option<i64>,
    /// Step between selected indices.
    pub step: Option<i64>,
}

impl Slice {
    /// Computes the concrete indices selected from a sequence of `len` items.
    ///
    /// Out of range bounds are clamped; negative bounds count from the end.
    ///
    /// # Errors
    ///
    /// Returns a message if the step is zero.
    pub fn indices(&self, len: usize) -> Result<Vec<usize>, String> {
        let step = self.step.unwrap_or(1);
        if step == 0 {
            return Err("slice step cannot be zero".to_string());
        }
        let len = i64::try_from(len).map_err(|_| "sequence is too long".to_string())?;
        let clamp = |bound: i64, low: i64, high: i64| {
            let bound = if bound < 0 { bound + len } else { bound };
            bound.clamp(low, high)
        };

        let mut selected = Vec::new();
        if step > 0 {
            let start = self.start.map_or(0, |s| clamp(s, 0, len));
            let stop = self.stop.map_or(len, |s| clamp(s, 0, len));
            let mut index = start;
            while index < stop {
                selected.push(index);
                let Some(next) = index.checked_add(step) else {
                    break;
                };
                index = next;
            }
        } else {
            let start = self.start.map_or(len - 1, |s| clamp(s, -1, len - 1));
            let stop = self.stop.map_or(-1, |s| clamp(s, -1, len - 1));
            let mut index = start;
            while index > stop {
                selected.push(index);
                let Some(next) = index.checked_add(step) else {
                    break;
                };
                index = next;
            }
        }
        Ok(selected
            .into_iter()
            .filter_map(|index| usize::try_from(index).ok())
            .collect())
    }
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { index + len } else { index };
    if (0..len).contains(&index) {
        usize::try_from(index).ok()
    } else {
        None
    }
}

impl IndexAccess for Value {
    fn sequence_len(&self) -> Option<usize> {
        match self {
            Self::List(items) => Some(items.borrow().len()),
            Self::String(text) => Some(text.chars().count()),
            _ => None,
        }
    }

    fn item_at(&self, index: i64) -> Option<Self> {
        let position = resolve_index(index, self.sequence_len()?)?;
        match self {
            Self::List(items) => items.borrow().get(position).cloned(),
            Self::String(text) => text.chars().nth(position).map(|c| Self::String(c.to_string())),
            _ => None,
        }
    }

    fn slice(&self, slice: Slice) -> Result<Self, String> {
        let len = self
            .sequence_len()
            .ok_or_else(|| format!("'{}' object is not subscriptable", self.type_name()))?;
        let indices = slice.indices(len)?;
        match self {
            Self::List(items) => {
                let items = items.borrow();
                Ok(Self::list(
                    indices.iter().filter_map(|&i| items.get(i).cloned()).collect(),
                ))
            }
            Self::String(text) => {
                let chars: Vec<char> = text.chars().collect();
                Ok(Self::String(
                    indices.iter().filter_map(|&i| chars.get(i)).collect(),
                ))
            }
            _ => Err(format!("'{}' object is not subscriptable", self.type_name())),
        }
    }
}

impl AttributeAccess for Value {
    fn attribute(&self, name: &str) -> Option<Self> {
        match self {
            Self::Dict(entries) => entries.borrow().get(name).cloned(),
            Self::Object(object) => object.attribute(name),
            _ => None,
        }
    }

    fn set_attribute(&self, name: &str, value: Self) -> Result<(), String> {
        match self {
            Self::Dict(entries) => {
                entries.borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            Self::Object(object) => object.set_attribute(name, value),
            other => Err(format!(
                "'{}' object has no attribute '{name}'",
                other.type_name()
            )),
        }
    }
}
