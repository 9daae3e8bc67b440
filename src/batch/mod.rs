//! Batch size configuration
//!
//! Resolves the relation
//!
//! ```text
//! train_batch_size = micro_batch_size_per_worker
//!                    × gradient_accumulation_steps × world_size
//! ```
//!
//! `gradient_accumulation_steps` defaults to 1. Given either
//! `micro_batch_size_per_worker` or `train_batch_size`, the other is derived;
//! given both, they must agree.

#[cfg(test)]
mod proptests;

use crate::error::{Error, Result};
use crate::node::ConfigNode;
use crate::schema::{ConfigSection, FieldSpec, SectionSchema};
use serde::Serialize;
use tracing::debug;

pub const TRAIN_BATCH_SIZE: &str = "train_batch_size";
pub const MICRO_BATCH_SIZE: &str = "micro_batch_size_per_worker";
pub const GRADIENT_ACCUMULATION_STEPS: &str = "gradient_accumulation_steps";
pub const WORLD_SIZE: &str = "world_size";

/// Default number of accumulation steps when the field is absent
pub const DEFAULT_GRADIENT_ACCUMULATION_STEPS: i64 = 1;

/// Batch section as supplied by the user, before resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchConfig {
    /// Samples per optimizer step across all workers
    pub train_batch_size: Option<i64>,
    /// Samples per forward/backward pass on one worker
    pub micro_batch_size_per_worker: Option<i64>,
    /// Micro-batches accumulated before an optimizer step
    pub gradient_accumulation_steps: Option<i64>,
}

impl BatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_train_batch_size(mut self, size: i64) -> Self {
        self.train_batch_size = Some(size);
        self
    }

    pub fn with_micro_batch_size(mut self, size: i64) -> Self {
        self.micro_batch_size_per_worker = Some(size);
        self
    }

    pub fn with_gradient_accumulation_steps(mut self, steps: i64) -> Self {
        self.gradient_accumulation_steps = Some(steps);
        self
    }

    /// Complete the batch triangle for `world_size` workers.
    pub fn resolve(&self, world_size: u64) -> Result<ResolvedBatch> {
        if world_size == 0 {
            return Err(Error::InvalidBatchValue { field: WORLD_SIZE.to_string(), value: 0 });
        }

        let accum = positive(
            GRADIENT_ACCUMULATION_STEPS,
            self.gradient_accumulation_steps.unwrap_or(DEFAULT_GRADIENT_ACCUMULATION_STEPS),
        )?;
        let micro =
            self.micro_batch_size_per_worker.map(|v| positive(MICRO_BATCH_SIZE, v)).transpose()?;
        let train = self.train_batch_size.map(|v| positive(TRAIN_BATCH_SIZE, v)).transpose()?;

        let resolved = match (micro, train) {
            (Some(micro), Some(train)) => {
                let expected = product(micro, accum, world_size)?;
                if train != expected {
                    return Err(Error::InconsistentBatchSize {
                        train_batch_size: train,
                        micro,
                        accum,
                        world_size,
                        expected,
                    });
                }
                ResolvedBatch::new(train, micro, accum, world_size, Derivation::None)
            }
            (Some(micro), None) => {
                let train = product(micro, accum, world_size)?;
                debug!(
                    train_batch_size = train,
                    micro,
                    accum,
                    world_size,
                    "derived train_batch_size"
                );
                ResolvedBatch::new(train, micro, accum, world_size, Derivation::TrainBatchSize)
            }
            (None, Some(train)) => {
                let divisor = product(1, accum, world_size)?;
                if train % divisor != 0 {
                    return Err(Error::NonDivisibleBatchSize {
                        train_batch_size: train,
                        accum,
                        world_size,
                        divisor,
                    });
                }
                let micro = positive(MICRO_BATCH_SIZE, (train / divisor) as i64)?;
                debug!(
                    micro,
                    train_batch_size = train,
                    accum,
                    world_size,
                    "derived micro_batch_size_per_worker"
                );
                ResolvedBatch::new(train, micro, accum, world_size, Derivation::MicroBatchSize)
            }
            (None, None) => {
                return Err(Error::UnderspecifiedBatchConfig { accum, world_size });
            }
        };

        Ok(resolved)
    }
}

fn positive(field: &str, value: i64) -> Result<u64> {
    if value <= 0 {
        return Err(Error::InvalidBatchValue { field: field.to_string(), value });
    }
    Ok(value as u64)
}

/// Largest batch quantity an integer field can hold.
const MAX_BATCH_VALUE: u64 = i64::MAX as u64;

fn product(micro: u64, accum: u64, world_size: u64) -> Result<u64> {
    micro
        .checked_mul(accum)
        .and_then(|p| p.checked_mul(world_size))
        .filter(|&p| p <= MAX_BATCH_VALUE)
        .ok_or(Error::BatchOverflow { micro, accum, world_size })
}

impl ConfigSection for BatchConfig {
    const NAME: &'static str = "batch";

    fn schema() -> SectionSchema {
        SectionSchema::new(Self::NAME)
            .field(
                FieldSpec::int(TRAIN_BATCH_SIZE)
                    .doc("Samples per optimizer step across all workers"),
            )
            .field(
                FieldSpec::int(MICRO_BATCH_SIZE)
                    .alias("micro_batch_size")
                    .deprecated_alias("train_micro_batch_size_per_gpu")
                    .doc("Samples per forward/backward pass on one worker"),
            )
            .field(
                FieldSpec::int(GRADIENT_ACCUMULATION_STEPS)
                    .default_value(DEFAULT_GRADIENT_ACCUMULATION_STEPS)
                    .doc("Micro-batches accumulated before each optimizer step"),
            )
    }

    fn from_node(node: &ConfigNode) -> Result<Self> {
        Ok(Self {
            train_batch_size: node.get_int(TRAIN_BATCH_SIZE),
            micro_batch_size_per_worker: node.get_int(MICRO_BATCH_SIZE),
            gradient_accumulation_steps: node.get_int(GRADIENT_ACCUMULATION_STEPS),
        })
    }
}

/// Which quantity resolution filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Derivation {
    /// Everything was supplied and checked
    None,
    /// `train_batch_size` was computed from the product
    TrainBatchSize,
    /// `micro_batch_size_per_worker` was computed by exact division
    MicroBatchSize,
}

/// Fully-resolved batch quantities; all positive, mutually consistent and
/// no larger than `i64::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedBatch {
    train_batch_size: u64,
    micro_batch_size_per_worker: u64,
    gradient_accumulation_steps: u64,
    world_size: u64,
    derived: Derivation,
}

impl ResolvedBatch {
    fn new(train: u64, micro: u64, accum: u64, world_size: u64, derived: Derivation) -> Self {
        Self {
            train_batch_size: train,
            micro_batch_size_per_worker: micro,
            gradient_accumulation_steps: accum,
            world_size,
            derived,
        }
    }

    pub fn train_batch_size(&self) -> u64 {
        self.train_batch_size
    }

    pub fn micro_batch_size_per_worker(&self) -> u64 {
        self.micro_batch_size_per_worker
    }

    pub fn gradient_accumulation_steps(&self) -> u64 {
        self.gradient_accumulation_steps
    }

    pub fn world_size(&self) -> u64 {
        self.world_size
    }

    pub fn derived(&self) -> Derivation {
        self.derived
    }

    /// Samples processed per worker per optimizer step.
    pub fn samples_per_worker_step(&self) -> u64 {
        self.micro_batch_size_per_worker * self.gradient_accumulation_steps
    }

    /// `(name, value)` pairs in the order they are rendered.
    pub fn items(&self) -> [(&'static str, u64); 4] {
        [
            (TRAIN_BATCH_SIZE, self.train_batch_size),
            (MICRO_BATCH_SIZE, self.micro_batch_size_per_worker),
            (GRADIENT_ACCUMULATION_STEPS, self.gradient_accumulation_steps),
            (WORLD_SIZE, self.world_size),
        ]
    }
}
