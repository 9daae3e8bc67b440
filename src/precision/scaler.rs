//! Dynamic loss scaling for mixed-precision training.

use super::PrecisionConfig;
use serde::Serialize;
use tracing::{debug, warn};

/// Conceptual state of the loss-scale controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LossScaleState {
    /// No recent overflow; growth is counted.
    Steady {
        /// Consecutive good steps since the last growth or overflow
        good_steps: u64,
    },
    /// Recently overflowed; growth is suppressed.
    Cooling {
        /// Good steps still required before returning to Steady (always >= 1)
        remaining: u64,
    },
}

/// Outcome of one reported training step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepDecision {
    /// Loss scale to use for the next step
    pub scale: f64,
    /// Whether the optimizer update for the reported step must be skipped
    pub skip_step: bool,
}

impl From<StepDecision> for (f64, bool) {
    fn from(decision: StepDecision) -> Self {
        (decision.scale, decision.skip_step)
    }
}

/// Dynamic loss-scale state machine.
///
/// The scale halves on every overflow (floored at `min_scale`) and doubles
/// after `scale_window` consecutive good steps in the Steady state. After an
/// overflow, `hysteresis` good steps must pass before counting toward growth
/// resumes. The output is a pure function of the overflow-report sequence.
#[derive(Debug, Clone)]
pub struct LossScaleController {
    /// Current loss scale
    scale: f64,
    initial_scale: f64,
    min_scale: f64,
    max_scale: Option<f64>,
    /// Good steps required for one doubling
    scale_window: u64,
    /// Good steps required to leave Cooling
    hysteresis: u64,
    state: LossScaleState,
    /// Number of overflows encountered
    overflow_count: u64,
    /// Number of optimizer steps skipped
    skipped_steps: u64,
    /// Number of reported steps
    total_steps: u64,
}

impl LossScaleController {
    /// Create from a validated precision config.
    pub fn from_config(config: &PrecisionConfig) -> Self {
        Self {
            scale: config.initial_scale,
            initial_scale: config.initial_scale,
            min_scale: config.min_scale,
            max_scale: config.max_scale,
            scale_window: config.scale_window,
            hysteresis: config.hysteresis,
            state: LossScaleState::Steady { good_steps: 0 },
            overflow_count: 0,
            skipped_steps: 0,
            total_steps: 0,
        }
    }

    /// Report the outcome of one training step.
    pub fn report_step(&mut self, overflow: bool) -> StepDecision {
        self.total_steps += 1;

        if overflow {
            self.on_overflow();
            self.skipped_steps += 1;
            return StepDecision { scale: self.scale, skip_step: true };
        }

        let state = self.state;
        self.state = match state {
            LossScaleState::Steady { good_steps } => {
                let good_steps = good_steps + 1;
                if good_steps >= self.scale_window {
                    self.grow();
                    LossScaleState::Steady { good_steps: 0 }
                } else {
                    LossScaleState::Steady { good_steps }
                }
            }
            LossScaleState::Cooling { remaining } if remaining <= 1 => {
                debug!(scale = self.scale, "hysteresis elapsed, scale growth resumes");
                LossScaleState::Steady { good_steps: 0 }
            }
            LossScaleState::Cooling { remaining } => {
                LossScaleState::Cooling { remaining: remaining - 1 }
            }
        };

        StepDecision { scale: self.scale, skip_step: false }
    }

    fn on_overflow(&mut self) {
        self.overflow_count += 1;

        let previous = self.scale;
        let halved = previous / 2.0;
        self.scale = halved.max(self.min_scale);
        if halved < self.min_scale {
            warn!(
                scale = self.scale,
                min_scale = self.min_scale,
                "gradient overflow at minimum loss scale"
            );
        } else {
            debug!(from = previous, to = self.scale, "gradient overflow, loss scale reduced");
        }

        self.state = if self.hysteresis == 0 {
            LossScaleState::Steady { good_steps: 0 }
        } else {
            LossScaleState::Cooling { remaining: self.hysteresis }
        };
    }

    fn grow(&mut self) {
        let mut grown = self.scale * 2.0;
        if !grown.is_finite() {
            return;
        }
        if let Some(max) = self.max_scale {
            grown = grown.min(max);
        }
        if grown > self.scale {
            debug!(from = self.scale, to = grown, "loss scale increased");
            self.scale = grown;
        }
    }

    /// Get current scale
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn state(&self) -> LossScaleState {
        self.state
    }

    /// Good steps counted toward the next doubling (0 while Cooling).
    pub fn good_steps_since_overflow(&self) -> u64 {
        match self.state {
            LossScaleState::Steady { good_steps } => good_steps,
            LossScaleState::Cooling { .. } => 0,
        }
    }

    /// Good steps still required before growth can resume.
    pub fn hysteresis_remaining(&self) -> u64 {
        match self.state {
            LossScaleState::Steady { .. } => 0,
            LossScaleState::Cooling { remaining } => remaining,
        }
    }

    pub fn is_cooling(&self) -> bool {
        matches!(self.state, LossScaleState::Cooling { .. })
    }

    /// Get overflow count
    pub fn overflow_count(&self) -> u64 {
        self.overflow_count
    }

    pub fn skipped_steps(&self) -> u64 {
        self.skipped_steps
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Scale a loss value
    pub fn scale_loss(&self, loss: f64) -> f64 {
        loss * self.scale
    }

    /// Unscale a gradient value
    pub fn unscale_grad(&self, grad: f64) -> f64 {
        grad / self.scale
    }

    /// Unscale gradients in place and check for overflow
    ///
    /// Returns true if gradients are valid (no overflow), false otherwise.
    pub fn unscale_and_check(&self, grads: &mut [f32]) -> bool {
        let inv_scale = (1.0 / self.scale) as f32;
        for grad in grads.iter_mut() {
            *grad *= inv_scale;
        }
        !has_overflow(grads)
    }

    /// Restart from the initial scale with all counters cleared.
    pub fn reset(&mut self) {
        self.scale = self.initial_scale;
        self.state = LossScaleState::Steady { good_steps: 0 };
        self.overflow_count = 0;
        self.skipped_steps = 0;
        self.total_steps = 0;
    }
}

/// Whether any gradient value is NaN or infinite.
pub fn has_overflow(grads: &[f32]) -> bool {
    grads.iter().any(|g| !g.is_finite())
}

/// Loss scaling as seen by the training loop.
///
/// With mixed precision disabled the scale is fixed at 1 and no step is
/// ever skipped.
#[derive(Debug, Clone)]
pub enum LossScaler {
    Disabled,
    Dynamic(LossScaleController),
}

impl LossScaler {
    /// Report the outcome of one training step.
    pub fn report_step(&mut self, overflow: bool) -> StepDecision {
        match self {
            Self::Disabled => StepDecision { scale: 1.0, skip_step: false },
            Self::Dynamic(controller) => controller.report_step(overflow),
        }
    }

    /// Effective loss scale.
    pub fn scale(&self) -> f64 {
        match self {
            Self::Disabled => 1.0,
            Self::Dynamic(controller) => controller.scale(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Dynamic(_))
    }

    pub fn controller(&self) -> Option<&LossScaleController> {
        match self {
            Self::Disabled => None,
            Self::Dynamic(controller) => Some(controller),
        }
    }

    /// Restart the controller, if any.
    pub fn reset(&mut self) {
        if let Self::Dynamic(controller) = self {
            controller.reset();
        }
    }
}
