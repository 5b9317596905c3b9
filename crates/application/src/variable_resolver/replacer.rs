//! Variable replacer
//!
//! Turns templates into concrete values. `replace_scalar` keeps the native
//! type of a value when the whole template is one reference,
//! `replace_string` always produces text, and `replace_list` expands list
//! references into multiple items.

use std::borrow::Cow;

use scopevar_domain::{IndexAccess, Sigil, Slice, Value, VariableError, VariableResult};

use super::escaping::{escape, unescape, unescape_variable_syntax};
use super::finders::VariableFinder;
use super::search::{VariableMatch, VariableSearcher};
use crate::variables::Variables;

/// Substitutes variable references using the values of one frame.
#[derive(Debug, Clone, Copy)]
pub struct VariableReplacer<'a> {
    variables: &'a Variables,
}

enum Index {
    Item(i64),
    Slice(Slice),
}

impl<'a> VariableReplacer<'a> {
    /// Creates a replacer reading from `variables`.
    #[must_use]
    pub const fn new(variables: &'a Variables) -> Self {
        Self { variables }
    }

    /// Replaces variables in a list of items.
    ///
    /// A whole-item `@{list}` reference is expanded in place. With
    /// `replace_until`, only that many leading output items are resolved:
    /// surplus items produced by an expansion are escaped and the remaining
    /// input items are returned as-is.
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
        let Some(limit) = replace_until else {
            let mut replaced = Vec::with_capacity(items.len());
            for item in items {
                replaced.extend(self.replace_list_item(item, ignore_errors)?);
            }
            return Ok(replaced);
        };
        let mut replaced = Vec::new();
        let mut consumed = 0;
        while replaced.len() < limit && consumed < items.len() {
            replaced.extend(self.replace_list_item(&items[consumed], ignore_errors)?);
            consumed += 1;
        }
        for item in replaced.iter_mut().skip(limit) {
            if let Value::String(text) = item {
                *text = escape(text);
            }
        }
        replaced.extend(items[consumed..].iter().cloned());
        Ok(replaced)
    }

    fn replace_list_item(&self, item: &Value, ignore_errors: bool) -> VariableResult<Vec<Value>> {
        let Value::String(text) = item else {
            return Ok(vec![item.clone()]);
        };
        let Some(found) = searcher(ignore_errors).search(text)? else {
            return Ok(vec![Value::String(unescape(text))]);
        };
        let value = self.replace_match(text, &found, ignore_errors)?;
        if found.is_list_variable()
            && let Some(items) = value.to_vec()
        {
            return Ok(items);
        }
        Ok(vec![value])
    }

    /// Replaces variables in a single item.
    ///
    /// Non-string values are returned unchanged. When the whole string is
    /// one reference its value is returned with its own type, otherwise the
    /// result is a string.
    ///
    /// # Errors
    ///
    /// Returns the first resolution error unless `ignore_errors` is set.
    pub fn replace_scalar(&self, item: &Value, ignore_errors: bool) -> VariableResult<Value> {
        match item {
            Value::String(text) => self.replace_scalar_str(text, ignore_errors),
            other => Ok(other.clone()),
        }
    }

    /// [`Self::replace_scalar`] for text input.
    ///
    /// # Errors
    ///
    /// Returns the first resolution error unless `ignore_errors` is set.
    pub fn replace_scalar_str(&self, text: &str, ignore_errors: bool) -> VariableResult<Value> {
        match searcher(ignore_errors).search(text)? {
            Some(found) => self.replace_match(text, &found, ignore_errors),
            None => Ok(Value::String(unescape(text))),
        }
    }

    fn replace_match(
        &self,
        text: &str,
        found: &VariableMatch<'_>,
        ignore_errors: bool,
    ) -> VariableResult<Value> {
        if found.is_variable() {
            self.variable_value(found, ignore_errors)
        } else {
            self.replace_string_with(text, unescape, ignore_errors)
                .map(Value::String)
        }
    }

    /// Replaces every reference in `text` with the string form of its value.
    ///
    /// # Errors
    ///
    /// Returns the first resolution error unless `ignore_errors` is set.
    pub fn replace_string(&self, text: &str, ignore_errors: bool) -> VariableResult<String> {
        self.replace_string_with(text, unescape, ignore_errors)
    }

    fn replace_string_with(
        &self,
        text: &str,
        unescaper: fn(&str) -> String,
        ignore_errors: bool,
    ) -> VariableResult<String> {
        let searcher = searcher(ignore_errors);
        let mut result = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(found) = searcher.search(rest)? {
            result.push_str(&unescaper(found.before()));
            let value = self.variable_value(&found, ignore_errors)?;
            result.push_str(&value.to_string());
            rest = found.after();
        }
        result.push_str(&unescaper(rest));
        Ok(result)
    }

    fn variable_value(
        &self,
        found: &VariableMatch<'_>,
        ignore_errors: bool,
    ) -> VariableResult<Value> {
        if found.identifier == Sigil::Reserved {
            return Ok(Value::from(found.matched()));
        }
        match self.resolve_match(found, ignore_errors) {
            Err(_) if ignore_errors => Ok(Value::String(unescape(found.matched()))),
            result => result,
        }
    }

    fn resolve_match(&self, found: &VariableMatch<'_>, ignore_errors: bool) -> VariableResult<Value> {
        let base = if found.has_internal_variables() {
            Cow::Owned(self.replace_string_with(
                found.base,
                unescape_variable_syntax,
                ignore_errors,
            )?)
        } else {
            Cow::Borrowed(found.base)
        };
        let finder = VariableFinder::new(self.variables);
        let mut name = found.identifier.decorate(&base);
        let mut value = if found.items.is_empty() {
            finder.find_parts(found.identifier, &base)?
        } else {
            finder.find_parts(Sigil::Scalar, &base)?
        };
        for item in &found.items {
            value = self.item_value(&name, &value, item)?;
            name = format!("{name}[{item}]");
        }
        validate_value(found.identifier, &name, value)
    }

    fn item_value(&self, name: &str, value: &Value, item: &str) -> VariableResult<Value> {
        match value {
            Value::Dict(entries) => {
                let key = self.replace_scalar_str(item, false)?;
                let key = key.as_str().map_or_else(|| key.to_string(), str::to_string);
                entries.borrow().get(&key).cloned().ok_or_else(|| {
                    VariableError::type_mismatch(format!("Dictionary '{name}' has no key '{key}'."))
                })
            }
            Value::List(_) | Value::String(_) => {
                let index = self.replace_string(item, false)?;
                sequence_item(name, value, &index)
            }
            other => Err(VariableError::type_mismatch(format!(
                "Variable '{name}' is {}, which is not subscriptable, and thus accessing \
                 item '{item}' from it is not possible. To use '[{item}]' as a literal \
                 value, it needs to be escaped like '\\[{item}]'.",
                other.type_name()
            ))),
        }
    }
}

fn searcher(ignore_errors: bool) -> VariableSearcher {
    VariableSearcher::new().ignore_errors(ignore_errors)
}

fn sequence_item(name: &str, value: &Value, index: &str) -> VariableResult<Value> {
    let kind = if matches!(value, Value::String(_)) { "String" } else { "List" };
    let parsed = parse_index(index).ok_or_else(|| {
        VariableError::syntax(format!(
            "{kind} '{name}' used with invalid index '{index}'. To use '[{index}]' as a \
             literal value, it needs to be escaped like '\\[{index}]'."
        ))
    })?;
    match parsed {
        Index::Item(position) => value.item_at(position).ok_or_else(|| {
            VariableError::type_mismatch(format!(
                "{kind} '{name}' has no item in index {position}."
            ))
        }),
        Index::Slice(slice) => value
            .slice(slice)
            .map_err(|message| VariableError::evaluation(format!("{name}[{index}]"), message)),
    }
}

fn parse_index(index: &str) -> Option<Index> {
    if !index.contains(':') {
        return index.trim().parse().ok().map(Index::Item);
    }
    let bounds: Vec<&str> = index.split(':').collect();
    if bounds.len() > 3 {
        return None;
    }
    let mut parsed = Vec::with_capacity(3);
    for bound in bounds {
        let bound = bound.trim();
        parsed.push(if bound.is_empty() {
            None
        } else {
            Some(bound.parse::<i64>().ok()?)
        });
    }
    parsed.resize(3, None);
    Some(Index::Slice(Slice {
        start: parsed[0],
        stop: parsed[1],
        step: parsed[2],
    }))
}

/// Checks the final value of a reference against its sigil.
///
/// List and dictionary references get their own copy of the container.
pub(crate) fn validate_value(sigil: Sigil, name: &str, value: Value) -> VariableResult<Value> {
    match sigil {
        Sigil::List => value.to_vec().map(Value::list).ok_or_else(|| {
            VariableError::type_mismatch(format!(
                "Value of variable '{name}' is not list or list-like."
            ))
        }),
        Sigil::Dict => value.to_map().map(Value::dict).ok_or_else(|| {
            VariableError::type_mismatch(format!(
                "Value of variable '{name}' is not dictionary or dictionary-like."
            ))
        }),
        _ => Ok(value),
    }
}
