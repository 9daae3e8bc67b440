//! Training configuration resolution.
//!
//! Turns a nested mapping of user-supplied settings into a validated,
//! immutable [`ResolvedConfig`]:
//!
//! - **Schemas** ([`schema`]): typed fields with defaults, validators and
//!   aliases; extensions compose by narrowing, never loosening
//! - **Batch** ([`batch`]): derives the missing member of
//!   `train_batch_size = micro_batch_size_per_worker × gradient_accumulation_steps × world_size`
//! - **Precision** ([`precision`]): fp16 settings and the dynamic
//!   [`LossScaleController`]
//! - **Cross-section rules** ([`training`]): predicates run after every
//!   section parsed
//! - **Loading** ([`loader`]): JSON or YAML files with duplicate-key rejection
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use trainconf::ConfigResolver;
//!
//! let config = ConfigResolver::new().resolve(&json!({"batch": {"train_batch_size": 32}}), 4)?;
//! assert_eq!(config.micro_batch_size_per_worker(), 8);
//!
//! let mut scaler = config.loss_scaler();
//! assert_eq!(scaler.report_step(true).scale, 1.0);
//! # Ok::<(), trainconf::Error>(())
//! ```

pub mod batch;
pub mod cli;
pub mod error;
pub mod loader;
pub mod node;
pub mod precision;
pub mod resolved;
pub mod resolver;
pub mod schema;
pub mod training;

pub use batch::{BatchConfig, Derivation, ResolvedBatch};
pub use error::{Error, Result};
pub use loader::{load_config, load_config_with, load_raw};
pub use node::ConfigNode;
pub use precision::{
    has_overflow, LossScaleController, LossScaleState, LossScaler, PrecisionConfig, StepDecision,
};
pub use resolved::ResolvedConfig;
pub use resolver::ConfigResolver;
pub use schema::{ConfigSection, FieldSpec, FieldType, FieldValue, SectionSchema, Validator};
pub use training::{builtin_rules, CrossRule, TrainingConfig};
