//! Immutable result of a successful resolution pass.

use crate::batch::ResolvedBatch;
use crate::node::ConfigNode;
use crate::precision::{LossScaler, PrecisionConfig};
use crate::schema::FieldValue;
use crate::training::TrainingConfig;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Resolved training configuration.
///
/// Only shared references to the sections are handed out; any change
/// requires a new resolution pass.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    training: TrainingConfig,
}

impl ResolvedConfig {
    pub(crate) fn new(training: TrainingConfig) -> Self {
        Self { training }
    }

    pub fn training(&self) -> &TrainingConfig {
        &self.training
    }

    pub fn batch(&self) -> &ResolvedBatch {
        self.training.batch()
    }

    pub fn precision(&self) -> &PrecisionConfig {
        self.training.precision()
    }

    pub fn train_batch_size(&self) -> u64 {
        self.batch().train_batch_size()
    }

    pub fn micro_batch_size_per_worker(&self) -> u64 {
        self.batch().micro_batch_size_per_worker()
    }

    pub fn gradient_accumulation_steps(&self) -> u64 {
        self.batch().gradient_accumulation_steps()
    }

    pub fn world_size(&self) -> u64 {
        self.batch().world_size()
    }

    pub fn fp16_enabled(&self) -> bool {
        self.precision().enabled
    }

    /// Any section by name.
    pub fn section(&self, name: &str) -> Option<&ConfigNode> {
        self.training.section(name)
    }

    /// A field value addressed by section and field name.
    pub fn get(&self, section: &str, field: &str) -> Option<&FieldValue> {
        self.section(section).and_then(|node| node.get(field))
    }

    pub fn sections(&self) -> impl Iterator<Item = &ConfigNode> {
        self.training.sections()
    }

    /// Activate loss scaling for a training run.
    ///
    /// Each call starts a fresh controller at `initial_scale`.
    pub fn loss_scaler(&self) -> LossScaler {
        self.precision().scaler()
    }

    /// JSON mapping of section name to section fields.
    pub fn to_json(&self) -> Value {
        Value::Object(self.sections().map(|node| (node.name().to_string(), node.to_json())).collect())
    }
}

impl fmt::Display for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "TrainingConfig = {{")?;
        for node in self.sections() {
            writeln!(f, "{}", node.dot_str(1))?;
        }
        write!(f, "}}")
    }
}

impl Serialize for ResolvedConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let nodes: Vec<&ConfigNode> = self.sections().collect();
        let mut map = serializer.serialize_map(Some(nodes.len()))?;
        for node in nodes {
            map.serialize_entry(node.name(), node)?;
        }
        map.end()
    }
}
