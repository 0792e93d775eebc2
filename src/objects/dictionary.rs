//! Dictionary objects.

use std::collections::HashMap;

use crate::objects::{Name, Object, Reference};

/// A PDF dictionary (ISO 32000-1, 7.3.7).
///
/// Keys are decoded name payloads without the leading solidus. Entry order
/// is insignificant; the writer emits keys sorted so output is
/// deterministic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dict(HashMap<String, Object>);

impl Dict {
    pub fn new() -> Self {
        Dict(HashMap::new())
    }

    /// Inserts an entry, replacing any previous value for the key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Object>) {
        self.0.insert(key.into(), value.into());
    }

    /// Chained insertion for literal construction.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Object>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Object> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Object> {
        self.0.get_mut(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Object> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Object)> {
        self.0.iter()
    }

    /// Keys in byte order, the order the writer uses.
    pub fn sorted_keys(&self) -> Vec<&String> {
        let mut keys: Vec<&String> = self.0.keys().collect();
        keys.sort();
        keys
    }

    /// Direct `/Type` name payload, if present and a name.
    pub fn dict_type(&self) -> Option<&str> {
        self.get("Type").and_then(Object::as_name).map(Name::as_str)
    }

    /// Direct `/Subtype` name payload, if present and a name.
    pub fn subtype(&self) -> Option<&str> {
        self.get("Subtype")
            .and_then(Object::as_name)
            .map(Name::as_str)
    }

    /// Direct boolean value for `key`, ignoring indirection.
    pub fn boolean(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Object::as_bool)
    }

    /// Direct integer value for `key`, ignoring indirection.
    pub fn integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Object::as_integer)
    }

    /// Direct name payload for `key`, ignoring indirection.
    pub fn name(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Object::as_name).map(Name::as_str)
    }

    /// Direct reference value for `key`, ignoring indirection.
    pub fn reference(&self, key: &str) -> Option<Reference> {
        self.get(key).and_then(Object::as_reference)
    }

    /// Direct array value for `key`, ignoring indirection.
    pub fn array(&self, key: &str) -> Option<&[Object]> {
        self.get(key).and_then(Object::as_array)
    }

    /// Direct dict value for `key`, ignoring indirection.
    pub fn dict(&self, key: &str) -> Option<&Dict> {
        self.get(key).and_then(Object::as_dict)
    }
}

impl FromIterator<(String, Object)> for Dict {
    fn from_iter<T: IntoIterator<Item = (String, Object)>>(iter: T) -> Self {
        Dict(iter.into_iter().collect())
    }
}
