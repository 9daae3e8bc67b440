//! Training configuration aggregate and cross-section rules
//!
//! [`TrainingConfig`] holds the resolved batch and precision sections plus
//! every extension section, in registration order. [`CrossRule`]s are pure
//! predicates over that aggregate; they run only after every section has
//! parsed, in registration order, and the first failure aborts resolution.


use crate::batch::{
    BatchConfig, ResolvedBatch, GRADIENT_ACCUMULATION_STEPS, MICRO_BATCH_SIZE, TRAIN_BATCH_SIZE,
    WORLD_SIZE,
};
use crate::error::{Error, Result};
use crate::node::ConfigNode;
use crate::precision::PrecisionConfig;
use crate::schema::{ConfigSection, FieldValue};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

type RuleCheck = dyn Fn(&TrainingConfig) -> std::result::Result<(), String> + Send + Sync;

/// A named predicate over the set of resolved sections.
#[derive(Clone)]
pub struct CrossRule {
    name: String,
    sections: Vec<String>,
    check: Arc<RuleCheck>,
}

impl CrossRule {
    /// Create a rule involving `sections`; `check` returns the failure reason.
    pub fn new<F>(name: impl Into<String>, sections: &[&str], check: F) -> Self
    where
        F: Fn(&TrainingConfig) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            sections: sections.iter().map(ToString::to_string).collect(),
            check: Arc::new(check),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    /// Run the rule against `config`.
    pub fn evaluate(&self, config: &TrainingConfig) -> Result<()> {
        (self.check)(config).map_err(|reason| Error::CrossValidation {
            rule: self.name.clone(),
            sections: self.sections.join(", "),
            reason,
        })
    }
}

impl fmt::Debug for CrossRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrossRule")
            .field("name", &self.name)
            .field("sections", &self.sections)
            .finish_non_exhaustive()
    }
}

/// Rules every resolution runs before any registered rule.
pub fn builtin_rules() -> Vec<CrossRule> {
    vec![CrossRule::new(
        "fp16_requires_micro_batch",
        &[PrecisionConfig::NAME, BatchConfig::NAME],
        |config| {
            let micro = config.batch().micro_batch_size_per_worker();
            if config.precision().enabled && micro < 1 {
                return Err(format!("{MICRO_BATCH_SIZE} must be >= 1 with fp16 enabled, got {micro}"));
            }
            Ok(())
        },
    )]
}

/// Resolved batch, precision and extension sections.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    batch: ResolvedBatch,
    precision: PrecisionConfig,
    sections: IndexMap<String, ConfigNode>,
}

impl TrainingConfig {
    /// Aggregate resolved sections.
    ///
    /// `precision_node` and `extensions` are stored as given; the batch node
    /// is rebuilt from `batch` so derived values are visible by name.
    pub fn new(
        batch: ResolvedBatch,
        precision: PrecisionConfig,
        precision_node: ConfigNode,
        extensions: Vec<ConfigNode>,
    ) -> Self {
        let mut sections = IndexMap::new();
        sections.insert(BatchConfig::NAME.to_string(), batch_node(&batch));
        sections.insert(PrecisionConfig::NAME.to_string(), precision_node);
        for node in extensions {
            sections.insert(node.name().to_string(), node);
        }
        Self { batch, precision, sections }
    }

    /// Run `rules` in order, stopping at the first failure.
    pub fn validate(&self, rules: &[CrossRule]) -> Result<()> {
        for rule in rules {
            rule.evaluate(self)?;
            debug!(rule = rule.name(), "cross-section rule passed");
        }
        Ok(())
    }

    pub fn batch(&self) -> &ResolvedBatch {
        &self.batch
    }

    pub fn precision(&self) -> &PrecisionConfig {
        &self.precision
    }

    /// Any section by name, built-in or extension.
    pub fn section(&self, name: &str) -> Option<&ConfigNode> {
        self.sections.get(name)
    }

    /// All sections: batch, fp16, then extensions in registration order.
    pub fn sections(&self) -> impl Iterator<Item = &ConfigNode> {
        self.sections.values()
    }

    /// Extension sections in registration order.
    pub fn extensions(&self) -> impl Iterator<Item = &ConfigNode> {
        self.sections.values().skip(2)
    }
}

fn batch_node(batch: &ResolvedBatch) -> ConfigNode {
    // Resolution caps every quantity at i64::MAX.
    let as_value = |v: u64| Some(FieldValue::Int(v as i64));
    let mut values = IndexMap::new();
    values.insert(TRAIN_BATCH_SIZE.to_string(), as_value(batch.train_batch_size()));
    values.insert(MICRO_BATCH_SIZE.to_string(), as_value(batch.micro_batch_size_per_worker()));
    values.insert(
        GRADIENT_ACCUMULATION_STEPS.to_string(),
        as_value(batch.gradient_accumulation_steps()),
    );
    values.insert(WORLD_SIZE.to_string(), as_value(batch.world_size()));
    ConfigNode::new(BatchConfig::NAME.to_string(), values)
}
