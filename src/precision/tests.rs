//! Tests for the fp16 section and the loss-scale controller.

use super::*;
use serde_json::json;

fn controller(window: u64, hysteresis: u64) -> LossScaleController {
    PrecisionConfig::fp16()
        .with_scale_window(window)
        .with_hysteresis(hysteresis)
        .controller()
        .unwrap()
}

fn parse(raw: serde_json::Value) -> Result<PrecisionConfig> {
    let node = PrecisionConfig::schema().compose()?.parse(&raw)?;
    PrecisionConfig::from_node(&node)
}

// =========================================================================
// Section parsing
// =========================================================================

#[test]
fn test_defaults() {
    let config = parse(json!({})).unwrap();
    assert_eq!(config, PrecisionConfig::disabled());
    assert!(!config.enabled);
    assert_eq!(config.initial_scale, 65536.0);
    assert_eq!(config.scale_window, 1000);
    assert_eq!(config.min_scale, 1.0);
    assert_eq!(config.hysteresis, 2);
    assert_eq!(config.clip, 1.0);
    assert!(config.max_scale.is_none());
}

#[test]
fn test_integer_scale_is_accepted_as_float() {
    let config = parse(json!({"enabled": true, "initial_scale": 1024})).unwrap();
    assert_eq!(config.initial_scale, 1024.0);
}

#[test]
fn test_non_positive_min_scale_rejected() {
    let err = parse(json!({"min_scale": 0})).unwrap_err();
    assert!(matches!(err, Error::InvalidValue { ref field, .. } if field == MIN_SCALE));

    let err = parse(json!({"min_scale": -1.0})).unwrap_err();
    assert!(matches!(err, Error::InvalidValue { ref field, .. } if field == MIN_SCALE));
}

#[test]
fn test_zero_scale_window_rejected() {
    let err = parse(json!({"scale_window": 0})).unwrap_err();
    assert!(matches!(err, Error::InvalidValue { ref field, .. } if field == SCALE_WINDOW));
}

#[test]
fn test_negative_hysteresis_rejected() {
    let err = parse(json!({"hysteresis": -1})).unwrap_err();
    assert!(matches!(err, Error::InvalidValue { ref field, .. } if field == HYSTERESIS));
}

#[test]
fn test_min_scale_above_initial_rejected() {
    let err = parse(json!({"initial_scale": 4.0, "min_scale": 8.0})).unwrap_err();
    match err {
        Error::InvalidValue { section, field, reason, .. } => {
            assert_eq!(section, "fp16");
            assert_eq!(field, MIN_SCALE);
            assert!(reason.contains("initial_scale"));
        }
        other => panic!("Expected InvalidValue, got {other:?}"),
    }
}

#[test]
fn test_max_scale_below_initial_rejected() {
    let err = parse(json!({"initial_scale": 1024.0, "max_scale": 512.0})).unwrap_err();
    assert!(matches!(err, Error::InvalidValue { ref field, .. } if field == MAX_SCALE));
}

#[test]
fn test_boolean_type_enforced() {
    let err = parse(json!({"enabled": 1})).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { ref field, .. } if field == ENABLED));
}

#[test]
fn test_disabled_has_no_controller() {
    let config = PrecisionConfig::disabled();
    assert!(config.controller().is_none());
    assert_eq!(config.effective_scale(), 1.0);

    let mut scaler = config.scaler();
    assert!(!scaler.is_enabled());
    for overflow in [true, false, true] {
        let decision = scaler.report_step(overflow);
        assert_eq!(decision, StepDecision { scale: 1.0, skip_step: false });
    }
}

#[test]
fn test_enabled_effective_scale() {
    assert_eq!(PrecisionConfig::fp16().effective_scale(), 65536.0);
}

// =========================================================================
// Controller state machine
// =========================================================================

#[test]
fn test_growth_after_window_then_overflow_with_hysteresis() {
    let mut c = controller(3, 1);

    assert_eq!(c.report_step(false), StepDecision { scale: 65536.0, skip_step: false });
    assert_eq!(c.report_step(false), StepDecision { scale: 65536.0, skip_step: false });
    assert_eq!(c.report_step(false), StepDecision { scale: 131072.0, skip_step: false });

    let decision = c.report_step(true);
    assert_eq!(decision, StepDecision { scale: 65536.0, skip_step: true });
    assert_eq!(c.state(), LossScaleState::Cooling { remaining: 1 });

    // Exactly one good step leaves Cooling
    c.report_step(false);
    assert_eq!(c.state(), LossScaleState::Steady { good_steps: 0 });

    // Then a full window grows again
    c.report_step(false);
    c.report_step(false);
    assert_eq!(c.report_step(false).scale, 131072.0);
}

#[test]
fn test_no_growth_during_cooling() {
    let mut c = controller(1, 3);
    assert_eq!(c.report_step(true).scale, 32768.0);
    for remaining in [2, 1] {
        assert_eq!(c.report_step(false).scale, 32768.0);
        assert_eq!(c.hysteresis_remaining(), remaining);
        assert!(c.is_cooling());
    }
    // Last cooling step returns to Steady without growing
    assert_eq!(c.report_step(false).scale, 32768.0);
    assert!(!c.is_cooling());
    // Window of 1: the next good step grows
    assert_eq!(c.report_step(false).scale, 65536.0);
}

#[test]
fn test_overflow_while_cooling_resets_hysteresis() {
    let mut c = controller(10, 3);
    c.report_step(true);
    c.report_step(false);
    assert_eq!(c.hysteresis_remaining(), 2);

    let decision = c.report_step(true);
    assert!(decision.skip_step);
    assert_eq!(decision.scale, 16384.0);
    assert_eq!(c.state(), LossScaleState::Cooling { remaining: 3 });
}

#[test]
fn test_zero_hysteresis_skips_cooling() {
    let mut c = controller(2, 0);
    c.report_step(true);
    assert_eq!(c.state(), LossScaleState::Steady { good_steps: 0 });
    c.report_step(false);
    assert_eq!(c.report_step(false).scale, 65536.0);
}

#[test]
fn test_overflow_resets_good_step_counter() {
    let mut c = controller(3, 1);
    c.report_step(false);
    c.report_step(false);
    assert_eq!(c.good_steps_since_overflow(), 2);
    c.report_step(true);
    assert_eq!(c.good_steps_since_overflow(), 0);
}

#[test]
fn test_scale_floored_at_min_scale() {
    let mut c = PrecisionConfig::fp16()
        .with_initial_scale(8.0)
        .with_min_scale(2.0)
        .controller()
        .unwrap();
    let scales: Vec<f64> = (0..5).map(|_| c.report_step(true).scale).collect();
    assert_eq!(scales, vec![4.0, 2.0, 2.0, 2.0, 2.0]);
    assert_eq!(c.overflow_count(), 5);
    assert_eq!(c.skipped_steps(), 5);
}

#[test]
fn test_max_scale_caps_growth() {
    let mut c = PrecisionConfig::fp16()
        .with_initial_scale(1024.0)
        .with_max_scale(3000.0)
        .with_scale_window(1)
        .controller()
        .unwrap();
    assert_eq!(c.report_step(false).scale, 2048.0);
    assert_eq!(c.report_step(false).scale, 3000.0);
    assert_eq!(c.report_step(false).scale, 3000.0);
}

#[test]
fn test_growth_stops_at_representable_limit() {
    let mut c = PrecisionConfig::fp16()
        .with_initial_scale(f64::MAX)
        .with_scale_window(1)
        .controller()
        .unwrap();
    assert_eq!(c.report_step(false).scale, f64::MAX);
}

#[test]
fn test_counters_and_reset() {
    let mut c = controller(2, 1);
    c.report_step(false);
    c.report_step(true);
    c.report_step(false);
    assert_eq!(c.total_steps(), 3);
    assert_eq!(c.skipped_steps(), 1);

    c.reset();
    assert_eq!(c.scale(), 65536.0);
    assert_eq!(c.total_steps(), 0);
    assert_eq!(c.overflow_count(), 0);
    assert_eq!(c.state(), LossScaleState::Steady { good_steps: 0 });
}

#[test]
fn test_step_decision_into_tuple() {
    let mut c = controller(1000, 2);
    let (scale, skip): (f64, bool) = c.report_step(true).into();
    assert_eq!(scale, 32768.0);
    assert!(skip);
}

#[test]
fn test_scale_loss_and_unscale() {
    let c = PrecisionConfig::fp16().with_initial_scale(1000.0).controller().unwrap();
    assert_eq!(c.scale_loss(0.5), 500.0);
    assert_eq!(c.unscale_grad(1000.0), 1.0);
}

#[test]
fn test_unscale_and_check() {
    let c = PrecisionConfig::fp16().with_initial_scale(100.0).controller().unwrap();
    let mut grads = vec![100.0, 200.0, 300.0];
    assert!(c.unscale_and_check(&mut grads));
    assert_eq!(grads, vec![1.0, 2.0, 3.0]);

    let mut grads = vec![100.0, f32::INFINITY, 300.0];
    assert!(!c.unscale_and_check(&mut grads));
}

#[test]
fn test_has_overflow() {
    assert!(!has_overflow(&[0.0, -1.5, 3.0]));
    assert!(has_overflow(&[0.0, f32::NAN]));
    assert!(has_overflow(&[f32::NEG_INFINITY]));
    assert!(!has_overflow(&[]));
}

#[test]
fn test_scaler_reset_restores_initial_scale() {
    let mut scaler = PrecisionConfig::fp16().scaler();
    scaler.report_step(true);
    assert_eq!(scaler.scale(), 32768.0);
    scaler.reset();
    assert_eq!(scaler.scale(), 65536.0);
    assert_eq!(scaler.controller().map(LossScaleController::total_steps), Some(0));
}
