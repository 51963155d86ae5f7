//! Property tests for the replay guard's sliding window (spec §4.B): any
//! strictly increasing sequence is always accepted, and resubmitting a
//! sequence number already seen is always rejected.

use proptest::prelude::*;
use vpn_crypto::replay::ReplayGuard;

proptest! {
    #[test]
    fn strictly_increasing_sequence_numbers_are_always_accepted(
        steps in proptest::collection::vec(1u64..1000, 1..200),
    ) {
        let mut guard = ReplayGuard::new();
        let mut seq = 0u64;
        for step in steps {
            seq += step;
            prop_assert!(guard.check_and_update(seq).is_ok());
        }
    }

    #[test]
    fn resubmitting_any_previously_accepted_sequence_number_is_rejected(
        steps in proptest::collection::vec(1u64..50, 1..100),
    ) {
        let mut guard = ReplayGuard::new();
        let mut seq = 0u64;
        let mut seen = Vec::new();
        for step in steps {
            seq += step;
            guard.check_and_update(seq).unwrap();
            seen.push(seq);
        }
        for s in seen {
            prop_assert!(guard.check_and_update(s).is_err());
        }
    }
}
