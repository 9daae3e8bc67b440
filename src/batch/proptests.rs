//! Property-based tests for batch resolution

use super::*;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_micro_round_trips_through_train_batch_size(
        micro in 1i64..512,
        accum in 1i64..64,
        world in 1u64..256,
    ) {
        let forward = BatchConfig::new()
            .with_micro_batch_size(micro)
            .with_gradient_accumulation_steps(accum)
            .resolve(world)
            .unwrap();
        prop_assert_eq!(forward.train_batch_size(), micro as u64 * accum as u64 * world);

        let backward = BatchConfig::new()
            .with_train_batch_size(forward.train_batch_size() as i64)
            .with_gradient_accumulation_steps(accum)
            .resolve(world)
            .unwrap();
        prop_assert_eq!(backward.micro_batch_size_per_worker(), micro as u64);
    }

    #[test]
    fn prop_off_by_one_train_batch_is_inconsistent(
        micro in 1i64..512,
        accum in 1i64..64,
        world in 1u64..256,
    ) {
        let expected = micro * accum * world as i64;
        let result = BatchConfig::new()
            .with_micro_batch_size(micro)
            .with_gradient_accumulation_steps(accum)
            .with_train_batch_size(expected + 1)
            .resolve(world);
        let is_inconsistent = matches!(result, Err(Error::InconsistentBatchSize { .. }));
        prop_assert!(is_inconsistent);
    }

    #[test]
    fn prop_resolved_values_are_positive_and_consistent(
        train in 1i64..100_000,
        accum in 1i64..16,
        world in 1u64..16,
    ) {
        if let Ok(batch) = BatchConfig::new()
            .with_train_batch_size(train)
            .with_gradient_accumulation_steps(accum)
            .resolve(world)
        {
            prop_assert!(batch.micro_batch_size_per_worker() >= 1);
            prop_assert_eq!(
                batch.train_batch_size(),
                batch.micro_batch_size_per_worker() * batch.gradient_accumulation_steps() * batch.world_size()
            );
        } else {
            prop_assert!(train as u64 % (accum as u64 * world) != 0);
        }
    }

    #[test]
    fn prop_non_positive_values_rejected(value in -1000i64..=0) {
        let result = BatchConfig::new().with_micro_batch_size(value).resolve(1);
        let is_invalid = matches!(result, Err(Error::InvalidBatchValue { .. }));
        prop_assert!(is_invalid);
    }
}
