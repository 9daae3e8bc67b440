//! Schema fragments, section schemas and composition.
//!
//! A section schema is an ordered list of fragments: the fragments it
//! inherited from its parent followed by its own. Composition folds the
//! fragments into a single field table and enforces that a later fragment
//! only narrows what an earlier one declared.

use super::field::{FieldSpec, FieldValue};
use crate::error::{Error, Result};
use indexmap::IndexMap;
use std::collections::HashMap;

/// An ordered group of field declarations.
#[derive(Debug, Clone, Default)]
pub struct SchemaFragment {
    fields: Vec<FieldSpec>,
}

impl SchemaFragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field declaration.
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }
}

/// Declaration of a named configuration section.
#[derive(Debug, Clone)]
pub struct SectionSchema {
    name: String,
    inherited: Vec<SchemaFragment>,
    own: SchemaFragment,
}

impl SectionSchema {
    /// Start a schema with no parent.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), inherited: Vec::new(), own: SchemaFragment::new() }
    }

    /// Start a schema that inherits every field declaration of `parent`.
    pub fn extending(name: impl Into<String>, parent: &SectionSchema) -> Self {
        let mut inherited = parent.inherited.clone();
        inherited.push(parent.own.clone());
        Self { name: name.into(), inherited, own: SchemaFragment::new() }
    }

    /// Declare (or redeclare) a field in this schema's own fragment.
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.own.fields.push(spec);
        self
    }

    /// Append every declaration of `fragment` to this schema's own fragment.
    pub fn fragment(mut self, fragment: SchemaFragment) -> Self {
        self.own.fields.extend(fragment.fields);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inherited fragments first, own fragment last.
    pub fn fragments(&self) -> impl Iterator<Item = &SchemaFragment> {
        self.inherited.iter().chain(std::iter::once(&self.own))
    }

    /// Fold the fragments into a field table, running the capability check.
    pub fn compose(&self) -> Result<ComposedSchema> {
        let mut fields: IndexMap<String, FieldSpec> = IndexMap::new();

        for fragment in self.fragments() {
            let mut seen_in_fragment = Vec::new();
            for spec in fragment.fields() {
                if seen_in_fragment.contains(&spec.name.as_str()) {
                    return Err(self.conflict(&spec.name, "declared twice in the same fragment"));
                }
                seen_in_fragment.push(spec.name.as_str());

                let merged = match fields.get(&spec.name) {
                    Some(parent) => self.narrow(parent, spec)?,
                    None => spec.clone(),
                };
                fields.insert(spec.name.clone(), merged);
            }
        }

        let mut aliases = HashMap::new();
        for spec in fields.values() {
            self.check_default(spec)?;
            for alias in &spec.aliases {
                if fields.contains_key(&alias.name) {
                    return Err(self.conflict(
                        &spec.name,
                        &format!("alias '{}' shadows a declared field", alias.name),
                    ));
                }
                if let Some(owner) = aliases.insert(alias.name.clone(), spec.name.clone()) {
                    if owner != spec.name {
                        return Err(self.conflict(
                            &spec.name,
                            &format!("alias '{}' is already used by '{owner}'", alias.name),
                        ));
                    }
                }
            }
        }

        Ok(ComposedSchema { name: self.name.clone(), fields, aliases })
    }

    /// Merge a redeclaration onto an inherited field, rejecting any loosening.
    fn narrow(&self, parent: &FieldSpec, child: &FieldSpec) -> Result<FieldSpec> {
        if !parent.ty.admits_narrowing_to(child.ty) {
            return Err(self.conflict(
                &child.name,
                &format!("type {} is incompatible with inherited type {}", child.ty, parent.ty),
            ));
        }
        if parent.required && !child.required {
            return Err(self.conflict(&child.name, "cannot make an inherited required field optional"));
        }

        let default = match (&child.default, &parent.default) {
            (Some(d), _) => Some(d.clone()),
            (None, Some(d)) => Some(d.retype(child.ty).ok_or_else(|| {
                self.conflict(
                    &child.name,
                    &format!("inherited default {d} does not fit narrowed type {}", child.ty),
                )
            })?),
            (None, None) => None,
        };

        let mut validators = parent.validators.clone();
        validators.extend(child.validators.iter().cloned());

        let mut aliases = parent.aliases.clone();
        for alias in &child.aliases {
            if !aliases.iter().any(|a| a.name == alias.name) {
                aliases.push(alias.clone());
            }
        }

        Ok(FieldSpec {
            name: child.name.clone(),
            ty: child.ty,
            default,
            required: child.required,
            validators,
            aliases,
            doc: child.doc.clone().or_else(|| parent.doc.clone()),
        })
    }

    fn check_default(&self, spec: &FieldSpec) -> Result<()> {
        let Some(default) = &spec.default else {
            return Ok(());
        };
        if !spec.ty.holds(default) {
            return Err(self.conflict(
                &spec.name,
                &format!("default {default} is not of declared type {}", spec.ty),
            ));
        }
        spec.check(default).map_err(|reason| {
            self.conflict(&spec.name, &format!("default {default} fails validation: {reason}"))
        })
    }

    fn conflict(&self, field: &str, reason: &str) -> Error {
        Error::SchemaConflict {
            section: self.name.clone(),
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A section schema after composition: one entry per field, declaration order kept.
#[derive(Debug, Clone)]
pub struct ComposedSchema {
    pub(crate) name: String,
    pub(crate) fields: IndexMap<String, FieldSpec>,
    pub(crate) aliases: HashMap<String, String>,
}

impl ComposedSchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.values()
    }

    /// Canonical field name for an input key, following aliases.
    pub fn canonical<'a>(&'a self, key: &'a str) -> Option<&'a str> {
        if self.fields.contains_key(key) {
            Some(key)
        } else {
            self.aliases.get(key).map(String::as_str)
        }
    }

    /// Comma-separated field names for diagnostics.
    pub(crate) fn declared_list(&self) -> String {
        self.fields.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
    }

    /// Default value of a field, if any.
    pub fn default_of(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).and_then(FieldSpec::default)
    }
}
