//! Mixed-precision (`fp16`) configuration and dynamic loss scaling
//!
//! Reduced-precision gradients underflow unless the loss is multiplied by a
//! scale factor before the backward pass. This module holds the static
//! settings of the `fp16` section and the runtime controller that adapts the
//! scale to overflow reports.
//!
//! ## Example
//!
//! ```
//! use trainconf::precision::PrecisionConfig;
//!
//! let config = PrecisionConfig::fp16().with_scale_window(3).with_hysteresis(1);
//! let mut scaler = config.scaler();
//!
//! scaler.report_step(false);
//! scaler.report_step(false);
//! let decision = scaler.report_step(false);
//! assert_eq!(decision.scale, 131072.0);
//!
//! let decision = scaler.report_step(true);
//! assert!(decision.skip_step);
//! assert_eq!(decision.scale, 65536.0);
//! ```

mod scaler;

#[cfg(test)]
mod proptests;
#[cfg(test)]
mod tests;

pub use scaler::{has_overflow, LossScaleController, LossScaleState, LossScaler, StepDecision};

use crate::error::{Error, Result};
use crate::node::ConfigNode;
use crate::schema::{ConfigSection, FieldSpec, SectionSchema, Validator};
use serde::Serialize;

pub const ENABLED: &str = "enabled";
pub const INITIAL_SCALE: &str = "initial_scale";
pub const SCALE_WINDOW: &str = "scale_window";
pub const MIN_SCALE: &str = "min_scale";
pub const HYSTERESIS: &str = "hysteresis";
pub const CLIP: &str = "clip";
pub const MAX_SCALE: &str = "max_scale";

/// Default initial loss scale (2^16)
pub const DEFAULT_INITIAL_SCALE: f64 = 65536.0;
/// Default number of good steps between scale increases
pub const DEFAULT_SCALE_WINDOW: u64 = 1000;
pub const DEFAULT_MIN_SCALE: f64 = 1.0;
pub const DEFAULT_HYSTERESIS: u64 = 2;
pub const DEFAULT_CLIP: f64 = 1.0;

/// Static settings of the `fp16` section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrecisionConfig {
    /// Enable fp16 mixed precision
    pub enabled: bool,
    /// Loss scale at the start of training
    pub initial_scale: f64,
    /// Good steps required for one doubling
    pub scale_window: u64,
    /// Floor for the loss scale
    pub min_scale: f64,
    /// Good steps required after an overflow before growth resumes
    pub hysteresis: u64,
    /// Gradient clipping threshold
    pub clip: f64,
    /// Optional ceiling for the loss scale; uncapped when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_scale: Option<f64>,
}

impl PrecisionConfig {
    /// Mixed precision disabled; scale fixed at 1.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            initial_scale: DEFAULT_INITIAL_SCALE,
            scale_window: DEFAULT_SCALE_WINDOW,
            min_scale: DEFAULT_MIN_SCALE,
            hysteresis: DEFAULT_HYSTERESIS,
            clip: DEFAULT_CLIP,
            max_scale: None,
        }
    }

    /// fp16 with default dynamic loss scaling.
    pub fn fp16() -> Self {
        Self { enabled: true, ..Self::disabled() }
    }

    pub fn with_initial_scale(mut self, scale: f64) -> Self {
        self.initial_scale = scale;
        self
    }

    pub fn with_scale_window(mut self, window: u64) -> Self {
        self.scale_window = window;
        self
    }

    pub fn with_min_scale(mut self, scale: f64) -> Self {
        self.min_scale = scale;
        self
    }

    pub fn with_hysteresis(mut self, steps: u64) -> Self {
        self.hysteresis = steps;
        self
    }

    pub fn with_max_scale(mut self, scale: f64) -> Self {
        self.max_scale = Some(scale);
        self
    }

    /// Check ranges and the relations between scale bounds.
    pub fn validate(&self) -> Result<()> {
        if !(self.initial_scale.is_finite() && self.initial_scale > 0.0) {
            return Err(invalid(INITIAL_SCALE, self.initial_scale, "must be > 0"));
        }
        if self.scale_window == 0 {
            return Err(invalid(SCALE_WINDOW, self.scale_window, "must be >= 1"));
        }
        if !(self.min_scale.is_finite() && self.min_scale > 0.0) {
            return Err(invalid(MIN_SCALE, self.min_scale, "must be > 0"));
        }
        if !(self.clip.is_finite() && self.clip > 0.0) {
            return Err(invalid(CLIP, self.clip, "must be > 0"));
        }
        if self.min_scale > self.initial_scale {
            return Err(invalid(
                MIN_SCALE,
                self.min_scale,
                &format!("must be <= {INITIAL_SCALE} ({})", self.initial_scale),
            ));
        }
        if let Some(max) = self.max_scale {
            if max.is_nan() || max < self.initial_scale {
                return Err(invalid(
                    MAX_SCALE,
                    max,
                    &format!("must be >= {INITIAL_SCALE} ({})", self.initial_scale),
                ));
            }
        }
        Ok(())
    }

    /// Loss scale consumers should use before any step is reported.
    pub fn effective_scale(&self) -> f64 {
        if self.enabled {
            self.initial_scale
        } else {
            1.0
        }
    }

    /// Create the runtime controller; `None` when mixed precision is disabled.
    pub fn controller(&self) -> Option<LossScaleController> {
        self.enabled.then(|| LossScaleController::from_config(self))
    }

    /// Create the loss scaler the training loop reports steps to.
    pub fn scaler(&self) -> LossScaler {
        self.controller().map_or(LossScaler::Disabled, LossScaler::Dynamic)
    }
}

impl Default for PrecisionConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> Error {
    Error::InvalidValue {
        section: PrecisionConfig::NAME.to_string(),
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl ConfigSection for PrecisionConfig {
    const NAME: &'static str = "fp16";

    fn schema() -> SectionSchema {
        SectionSchema::new(Self::NAME)
            .field(FieldSpec::bool(ENABLED).default_value(false).doc("Enable fp16 mixed precision"))
            .field(
                FieldSpec::float(INITIAL_SCALE)
                    .default_value(DEFAULT_INITIAL_SCALE)
                    .validate(Validator::positive())
                    .doc("Loss scale at the start of training"),
            )
            .field(
                FieldSpec::int(SCALE_WINDOW)
                    .default_value(DEFAULT_SCALE_WINDOW as i64)
                    .validate(Validator::at_least(1.0))
                    .doc("Good steps between scale increases"),
            )
            .field(
                FieldSpec::float(MIN_SCALE)
                    .default_value(DEFAULT_MIN_SCALE)
                    .validate(Validator::positive())
                    .doc("Floor for the loss scale"),
            )
            .field(
                FieldSpec::int(HYSTERESIS)
                    .default_value(DEFAULT_HYSTERESIS as i64)
                    .validate(Validator::non_negative())
                    .doc("Good steps required after an overflow before growth resumes"),
            )
            .field(
                FieldSpec::float(CLIP)
                    .default_value(DEFAULT_CLIP)
                    .validate(Validator::positive())
                    .doc("Gradient clipping threshold"),
            )
            .field(
                FieldSpec::float(MAX_SCALE)
                    .validate(Validator::positive())
                    .doc("Optional ceiling for the loss scale"),
            )
    }

    fn from_node(node: &ConfigNode) -> Result<Self> {
        let defaults = Self::disabled();
        let config = Self {
            enabled: node.get_bool(ENABLED).unwrap_or(defaults.enabled),
            initial_scale: node.get_float(INITIAL_SCALE).unwrap_or(defaults.initial_scale),
            scale_window: node
                .get_int(SCALE_WINDOW)
                .map_or(defaults.scale_window, |v| v.max(0) as u64),
            min_scale: node.get_float(MIN_SCALE).unwrap_or(defaults.min_scale),
            hysteresis: node.get_int(HYSTERESIS).map_or(defaults.hysteresis, |v| v.max(0) as u64),
            clip: node.get_float(CLIP).unwrap_or(defaults.clip),
            max_scale: node.get_float(MAX_SCALE),
        };
        config.validate()?;
        Ok(config)
    }
}
