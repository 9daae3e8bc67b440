//! Parsed configuration sections.
//!
//! A [`ConfigNode`] is what a section schema produces from raw input: every
//! declared field in declaration order, each holding a value of its declared
//! type or nothing when the field is optional and was neither supplied nor
//! defaulted.

use crate::error::{Error, Result};
use crate::schema::FieldValue;
use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Width of the dot leaders in [`ConfigNode::dot_str`].
pub const DOTS_WIDTH: usize = 50;

const INDENT: &str = "    ";

/// A typed, fully-defaulted configuration section.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigNode {
    name: String,
    values: IndexMap<String, Option<FieldValue>>,
}

impl ConfigNode {
    pub(crate) fn new(name: String, values: IndexMap<String, Option<FieldValue>>) -> Self {
        Self { name, values }
    }

    /// Section name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `field` is declared (set or not).
    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    /// Value of `field`, or `None` when undeclared or unset.
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field).and_then(Option::as_ref)
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(FieldValue::as_bool)
    }

    pub fn get_int(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(FieldValue::as_i64)
    }

    pub fn get_float(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(FieldValue::as_f64)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_str)
    }

    /// Add an argument that the schema did not declare.
    ///
    /// Fails with [`Error::DuplicateField`] if `field` already exists.
    pub fn register_arg(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Result<()> {
        let field = field.into();
        if self.values.contains_key(&field) {
            return Err(Error::DuplicateField { section: self.name.clone(), field });
        }
        self.values.insert(field, Some(value.into()));
        Ok(())
    }

    /// `(name, value)` pairs of every set field, in declaration order.
    pub fn items(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().filter_map(|(k, v)| v.as_ref().map(|v| (k.as_str(), v)))
    }

    /// Names of every set field.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items().map(|(k, _)| k)
    }

    /// Values of every set field.
    pub fn values(&self) -> impl Iterator<Item = &FieldValue> {
        self.items().map(|(_, v)| v)
    }

    /// JSON mapping of every declared field; unset fields are `null`.
    pub fn to_json(&self) -> Value {
        let map = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.as_ref().map_or(Value::Null, FieldValue::to_json)))
            .collect();
        Value::Object(map)
    }

    /// Render the section as a dotted block indented to `depth`.
    pub fn dot_str(&self, depth: usize) -> String {
        let mut lines = vec![format!("{}{} = {{", INDENT.repeat(depth), self.name)];
        for (key, value) in &self.values {
            let shown = value.as_ref().map_or_else(|| "None".to_string(), ToString::to_string);
            lines.push(dotted_line(depth + 1, key, &shown));
        }
        lines.push(format!("{}}}", INDENT.repeat(depth)));
        lines.join("\n")
    }
}

/// One `key ..... value` line with dots padding the key column.
pub(crate) fn dotted_line(depth: usize, key: &str, value: &str) -> String {
    let used = key.len() + (depth.saturating_sub(1)) * INDENT.len();
    let dots = ".".repeat(DOTS_WIDTH.saturating_sub(used).max(1));
    format!("{}{key} {dots} {value}", INDENT.repeat(depth))
}

impl fmt::Display for ConfigNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dot_str(0))
    }
}

impl Serialize for ConfigNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (key, value) in &self.values {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
