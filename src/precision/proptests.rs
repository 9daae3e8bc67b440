//! Property-based tests for dynamic loss scaling

use super::*;
use proptest::collection::vec;
use proptest::prelude::*;

fn arb_config() -> impl Strategy<Value = PrecisionConfig> {
    (0u32..24, 0u32..8, 1u64..16, 0u64..6).prop_map(|(initial_exp, min_exp, window, hysteresis)| {
        let initial = 2f64.powi(initial_exp as i32);
        let min = 2f64.powi(min_exp.min(initial_exp) as i32);
        PrecisionConfig::fp16()
            .with_initial_scale(initial)
            .with_min_scale(min)
            .with_scale_window(window)
            .with_hysteresis(hysteresis)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_scale_never_below_min(config in arb_config(), reports in vec(any::<bool>(), 0..200)) {
        prop_assert!(config.validate().is_ok());
        let mut controller = config.controller().unwrap();
        for overflow in reports {
            let decision = controller.report_step(overflow);
            prop_assert!(decision.scale >= config.min_scale);
            prop_assert_eq!(decision.skip_step, overflow);
        }
    }

    #[test]
    fn prop_decisions_are_deterministic(config in arb_config(), reports in vec(any::<bool>(), 0..200)) {
        let mut a = config.controller().unwrap();
        let mut b = config.controller().unwrap();
        for overflow in reports {
            prop_assert_eq!(a.report_step(overflow), b.report_step(overflow));
        }
        prop_assert_eq!(a.state(), b.state());
    }

    #[test]
    fn prop_scale_never_grows_while_cooling(config in arb_config(), reports in vec(any::<bool>(), 0..200)) {
        let mut controller = config.controller().unwrap();
        for overflow in reports {
            let was_cooling = controller.is_cooling();
            let before = controller.scale();
            let after = controller.report_step(overflow).scale;
            if was_cooling {
                prop_assert!(after <= before);
            }
        }
    }

    #[test]
    fn prop_repeated_overflow_reaches_floor(config in arb_config(), extra in 0usize..10) {
        let mut controller = config.controller().unwrap();
        let halvings = (config.initial_scale / config.min_scale).log2().ceil() as usize;
        for _ in 0..halvings + extra {
            controller.report_step(true);
        }
        prop_assert_eq!(controller.scale(), config.min_scale);
    }
}
