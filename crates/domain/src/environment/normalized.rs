//! Name-normalizing map
//!
//! Variable names are compared case-insensitively, ignoring spaces and
//! underscores. The map keeps the first spelling a name was stored with so
//! it can be shown back to the user.

use indexmap::IndexMap;

/// Normalizes a variable name for lookup.
#[must_use]
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// An insertion-ordered map keyed by normalized names.
#[derive(Debug, Clone)]
pub struct NormalizedMap<V> {
    entries: IndexMap<String, (String, V)>,
}

impl<V> Default for NormalizedMap<V> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<V> NormalizedMap<V> {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under a name equivalent to `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&V> {
        self.entries.get(&normalize(name)).map(|(_, value)| value)
    }

    /// Returns a mutable reference to the value stored under `name`.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut V> {
        self.entries
            .get_mut(&normalize(name))
            .map(|(_, value)| value)
    }

    /// Inserts a value, keeping the original spelling of an existing entry.
    ///
    /// Returns the previous value, if any.
    pub fn insert(&mut self, name: &str, value: V) -> Option<V> {
        let key = normalize(name);
        if let Some((_, existing)) = self.entries.get_mut(&key) {
            return Some(std::mem::replace(existing, value));
        }
        self.entries.insert(key, (name.to_string(), value));
        None
    }

    /// Removes the entry equivalent to `name`.
    pub fn remove(&mut self, name: &str) -> Option<V> {
        self.entries
            .shift_remove(&normalize(name))
            .map(|(_, value)| value)
    }

    /// Returns true if a name equivalent to `name` is stored.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&normalize(name))
    }

    /// Iterates over `(original name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries
            .values()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Iterates over original names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|(name, _)| name.as_str())
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("My Var_Name"), "myvarname");
        assert_eq!(normalize("__x__"), "x");
    }

    #[test]
    fn test_equivalent_names_share_entry() {
        let mut map = NormalizedMap::new();
        assert_eq!(map.insert("User Name", 1), None);
        assert_eq!(map.insert("user_name", 2), Some(1));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("USERNAME"), Some(&2));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["User Name"]);
    }

    #[test]
    fn test_remove_and_contains() {
        let mut map = NormalizedMap::new();
        map.insert("a", 1);
        map.insert("b", 2);
        assert!(map.contains("A"));
        assert_eq!(map.remove("a"), Some(1));
        assert!(!map.contains("a"));
        assert_eq!(map.iter().collect::<Vec<_>>(), vec![("b", &2)]);
    }
}
