//! Property tests for admission and metadata handling.
//!
//! These check the gate's budget arithmetic across windows and that the
//! pipeline commits metadata exactly as given.

use std::sync::Arc;
use std::time::Duration;

use payload_capture::{
    CaptureFactory, CaptureKind, ManualClock, MemorySink, Metadata, OperationContext, RateGate,
    WriteOutcome,
};
use proptest::prelude::*;

// Strategy: metadata entries with unique keys and optional values
fn arb_entries() -> impl Strategy<Value = Vec<(String, Option<String>)>> {
    prop::collection::btree_map(
        prop::string::string_regex("[a-z][a-z0-9_-]{0,12}").unwrap(),
        prop::option::of(any::<String>()),
        0..12,
    )
    .prop_map(|map| map.into_iter().collect::<Vec<_>>())
    .prop_shuffle()
}

proptest! {
    /// Property: within one window exactly min(budget, attempts) are admitted
    #[test]
    fn proptest_gate_admits_min_of_budget_and_attempts(
        budget in 0u32..64,
        attempts in 0usize..200,
    ) {
        let gate = RateGate::with_clock(budget, Duration::from_secs(1), ManualClock::new());

        let admitted = (0..attempts).filter(|_| gate.admit()).count();

        prop_assert_eq!(admitted, attempts.min(budget as usize));
    }

    /// Property: every window gets a fresh budget, whatever happened before
    #[test]
    fn proptest_gate_budget_resets_per_window(
        budget in 1u32..16,
        per_window in prop::collection::vec(0usize..40, 1..6),
    ) {
        let clock = ManualClock::new();
        let gate = RateGate::with_clock(budget, Duration::from_millis(100), clock.clone());

        for attempts in per_window {
            let admitted = (0..attempts).filter(|_| gate.admit()).count();
            prop_assert_eq!(admitted, attempts.min(budget as usize));
            clock.advance(Duration::from_millis(100));
        }
    }

    /// Property: committed metadata equals the input in keys, values and order
    #[test]
    fn proptest_committed_metadata_preserves_entries(entries in arb_entries()) {
        let sink = Arc::new(MemorySink::new());
        let factory = CaptureFactory::new(sink.clone(), Arc::new(RateGate::new(1)));
        let pipeline = factory.pipeline().unwrap();
        let ctx = Arc::new(OperationContext::new("svc", "op"));

        let metadata: Metadata = entries.iter().cloned().collect();
        let unit = factory.create(&ctx).unwrap();
        let outcome = pipeline.write(unit, CaptureKind::Response, &entries, metadata);
        prop_assert_eq!(outcome, WriteOutcome::Committed);

        let captures = sink.captures();
        prop_assert_eq!(captures.len(), 1);
        let committed: Vec<(String, Option<String>)> = captures[0]
            .metadata()
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
            .collect();
        prop_assert_eq!(committed, entries);
    }

    /// Property: a disabled factory yields nothing, whatever the budget
    #[test]
    fn proptest_disabled_factory_yields_nothing(budget in 0u32..1000, attempts in 1usize..50) {
        let gate = Arc::new(RateGate::with_clock(budget, Duration::from_secs(1), ManualClock::new()));
        let factory = CaptureFactory::with_optional_sink(None, Arc::clone(&gate));
        let ctx = Arc::new(OperationContext::new("svc", "op"));

        for _ in 0..attempts {
            prop_assert!(factory.create(&ctx).is_none());
        }
        prop_assert_eq!(gate.admit(), budget > 0);
    }
}
