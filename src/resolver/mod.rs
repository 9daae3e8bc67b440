//! Configuration resolution
//!
//! [`ConfigResolver`] turns a raw nested mapping (section name → field name
//! → value) into a [`ResolvedConfig`]:
//!
//! 1. Reject top-level keys that name no built-in or registered section
//! 2. Parse every section against its schema
//! 3. Resolve the batch section for the supplied world size
//! 4. Validate the fp16 section
//! 5. Run the built-in and registered cross-section rules
//!
//! Resolution is all-or-nothing: any failure returns an error and no
//! partial configuration.
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use trainconf::ConfigResolver;
//!
//! let raw = json!({
//!     "batch": {"micro_batch_size_per_worker": 4, "gradient_accumulation_steps": 2},
//!     "fp16": {"enabled": true}
//! });
//! let config = ConfigResolver::new().resolve(&raw, 8)?;
//! assert_eq!(config.train_batch_size(), 64);
//! assert!(config.fp16_enabled());
//! # Ok::<(), trainconf::Error>(())
//! ```

#[cfg(test)]
mod tests;

use crate::batch::BatchConfig;
use crate::error::{Error, Result};
use crate::precision::PrecisionConfig;
use crate::resolved::ResolvedConfig;
use crate::schema::{describe_raw, ComposedSchema, ConfigSection, SectionSchema};
use crate::training::{builtin_rules, CrossRule, TrainingConfig};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info};

/// Label used for the top level of the raw input in diagnostics.
const ROOT_SECTION: &str = "<root>";

/// Registry of sections and cross-section rules.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    extensions: IndexMap<String, ComposedSchema>,
    rules: Vec<CrossRule>,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigResolver {
    /// Resolver with the built-in `batch` and `fp16` sections.
    pub fn new() -> Self {
        Self { extensions: IndexMap::new(), rules: builtin_rules() }
    }

    /// Register an extension section.
    ///
    /// The schema is composed here, so a redeclaration that loosens an
    /// inherited constraint fails now rather than at resolution time.
    pub fn register_section(&mut self, schema: SectionSchema) -> Result<()> {
        let composed = self.admit(&schema, &[])?;
        info!(section = composed.name(), "registered configuration section");
        self.extensions.insert(composed.name().to_string(), composed);
        Ok(())
    }

    /// Register a cross-section rule; rules run in registration order.
    pub fn register_rule(&mut self, rule: CrossRule) {
        debug!(rule = rule.name(), "registered cross-section rule");
        self.rules.push(rule);
    }

    /// Builder form of [`Self::register_section`].
    pub fn with_section(mut self, schema: SectionSchema) -> Result<Self> {
        self.register_section(schema)?;
        Ok(self)
    }

    /// Builder form of [`Self::register_rule`].
    pub fn with_rule(mut self, rule: CrossRule) -> Self {
        self.register_rule(rule);
        self
    }

    /// Every known section name: built-ins first, then extensions.
    pub fn section_names(&self) -> Vec<&str> {
        [BatchConfig::NAME, PrecisionConfig::NAME]
            .into_iter()
            .chain(self.extensions.keys().map(String::as_str))
            .collect()
    }

    pub fn rules(&self) -> &[CrossRule] {
        &self.rules
    }

    /// Resolve `raw` for `world_size` workers.
    pub fn resolve(&self, raw: &Value, world_size: u64) -> Result<ResolvedConfig> {
        self.resolve_with(raw, world_size, &[])
    }

    /// Resolve with additional sections that apply to this call only.
    pub fn resolve_with(
        &self,
        raw: &Value,
        world_size: u64,
        extra_sections: &[SectionSchema],
    ) -> Result<ResolvedConfig> {
        let mut extra: Vec<ComposedSchema> = Vec::with_capacity(extra_sections.len());
        for schema in extra_sections {
            let composed = self.admit(schema, &extra)?;
            extra.push(composed);
        }
        let extensions: Vec<&ComposedSchema> = self.extensions.values().chain(extra.iter()).collect();

        let empty = serde_json::Map::new();
        let sections = match raw {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(Error::SectionNotMapping {
                    section: ROOT_SECTION.to_string(),
                    actual: describe_raw(other),
                })
            }
        };

        for key in sections.keys() {
            let known = key == BatchConfig::NAME
                || key == PrecisionConfig::NAME
                || extensions.iter().any(|schema| schema.name() == key);
            if !known {
                let mut names = self.section_names();
                names.extend(extra.iter().map(ComposedSchema::name));
                return Err(Error::UnknownSection { section: key.clone(), known: names.join(", ") });
            }
        }

        let section = |name: &str| sections.get(name).unwrap_or(&Value::Null);

        let batch_node = BatchConfig::schema().compose()?.parse(section(BatchConfig::NAME))?;
        let precision_node =
            PrecisionConfig::schema().compose()?.parse(section(PrecisionConfig::NAME))?;
        let extension_nodes = extensions
            .iter()
            .map(|schema| schema.parse(section(schema.name())))
            .collect::<Result<Vec<_>>>()?;

        let batch = BatchConfig::from_node(&batch_node)?.resolve(world_size)?;
        let precision = PrecisionConfig::from_node(&precision_node)?;

        let training = TrainingConfig::new(batch, precision, precision_node, extension_nodes);
        training.validate(&self.rules)?;

        info!(
            train_batch_size = batch.train_batch_size(),
            micro_batch_size_per_worker = batch.micro_batch_size_per_worker(),
            gradient_accumulation_steps = batch.gradient_accumulation_steps(),
            world_size,
            fp16 = training.precision().enabled,
            extensions = extensions.len(),
            "configuration resolved"
        );

        Ok(ResolvedConfig::new(training))
    }

    /// Compose `schema` and check its name is not taken.
    fn admit(&self, schema: &SectionSchema, pending: &[ComposedSchema]) -> Result<ComposedSchema> {
        let name = schema.name();
        let taken = name == BatchConfig::NAME
            || name == PrecisionConfig::NAME
            || self.extensions.contains_key(name)
            || pending.iter().any(|p| p.name() == name);
        if taken {
            return Err(Error::DuplicateSection { section: name.to_string() });
        }
        schema.compose()
    }
}
