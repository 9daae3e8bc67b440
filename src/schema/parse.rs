//! Parsing an untyped section mapping against a composed schema.

use super::compose::ComposedSchema;
use super::field::{describe_raw, FieldType, FieldValue};
use crate::error::{Error, Result};
use crate::node::ConfigNode;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::warn;

impl ComposedSchema {
    /// Parse a raw mapping into a fully-defaulted, typed [`ConfigNode`].
    ///
    /// `null` (or an absent section) is treated as an empty mapping, and a
    /// `null` field value counts as "not supplied".
    pub fn parse(&self, raw: &Value) -> Result<ConfigNode> {
        let empty = serde_json::Map::new();
        let mapping = match raw {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(Error::SectionNotMapping {
                    section: self.name.clone(),
                    actual: describe_raw(other),
                })
            }
        };

        // canonical field -> (input key, raw value)
        let mut supplied: IndexMap<&str, (&str, &Value)> = IndexMap::new();
        for (key, value) in mapping {
            let canonical = self.canonical(key).ok_or_else(|| Error::UnknownField {
                section: self.name.clone(),
                field: key.clone(),
                declared: self.declared_list(),
            })?;

            if value.is_null() {
                continue;
            }

            if canonical != key.as_str() {
                let deprecated = self
                    .field(canonical)
                    .is_some_and(|spec| spec.aliases.iter().any(|a| a.name == *key && a.deprecated));
                if deprecated {
                    warn!(
                        section = %self.name,
                        alias = %key,
                        field = %canonical,
                        "deprecated configuration key, use the canonical name instead"
                    );
                }
            }

            match supplied.get(canonical) {
                Some((other_key, other_value)) if *other_value != value => {
                    // Report the canonical spelling as the field.
                    let (field_value, alias, alias_value) = if *other_key == canonical {
                        (*other_value, key.as_str(), value)
                    } else {
                        (value, *other_key, *other_value)
                    };
                    return Err(Error::AliasConflict {
                        section: self.name.clone(),
                        field: canonical.to_string(),
                        alias: alias.to_string(),
                        value: field_value.to_string(),
                        alias_value: alias_value.to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    supplied.insert(canonical, (key.as_str(), value));
                }
            }
        }

        let mut values: IndexMap<String, Option<FieldValue>> = IndexMap::new();
        for spec in self.fields() {
            let value = match supplied.get(spec.name()) {
                Some((_, raw_value)) => {
                    let typed = spec.field_type().coerce(raw_value).ok_or_else(|| {
                        if spec.field_type() == FieldType::Int && raw_value.is_u64() {
                            return Error::InvalidValue {
                                section: self.name.clone(),
                                field: spec.name().to_string(),
                                value: raw_value.to_string(),
                                reason: format!("exceeds i64 range (max {})", i64::MAX),
                            };
                        }
                        Error::TypeMismatch {
                            section: self.name.clone(),
                            field: spec.name().to_string(),
                            expected: spec.field_type().to_string(),
                            actual: describe_raw(raw_value),
                        }
                    })?;
                    spec.check(&typed).map_err(|reason| Error::InvalidValue {
                        section: self.name.clone(),
                        field: spec.name().to_string(),
                        value: typed.to_string(),
                        reason,
                    })?;
                    Some(typed)
                }
                None if spec.is_required() => {
                    return Err(Error::MissingField {
                        section: self.name.clone(),
                        field: spec.name().to_string(),
                    })
                }
                None => spec.default().cloned(),
            };
            values.insert(spec.name().to_string(), value);
        }

        Ok(ConfigNode::new(self.name.clone(), values))
    }
}
