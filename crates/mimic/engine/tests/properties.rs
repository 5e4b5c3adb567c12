//! Property tests: matcher evaluation, maximum counts and sequence coercion.

use std::sync::Arc;

use mimic_engine::matchers::matches_all;
use mimic_engine::*;
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// Argument values paired with an optional expected value per position.
fn arb_positions() -> impl Strategy<Value = Vec<(i32, Option<i32>)>> {
    prop::collection::vec((0i32..4, prop::option::of(0i32..4)), 0..6)
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// A matcher set accepts exactly when every positional matcher accepts.
    #[test]
    fn matcher_set_accepts_iff_every_position_accepts(positions in arb_positions()) {
        let layer = MockLayer::new();
        let equivalence = EquivalenceMap::new();
        let ctx = MatchContext { equivalence: &equivalence, layer: &layer };

        let args: Vec<Value> = positions.iter().map(|(arg, _)| Value::Int(*arg)).collect();
        let mut matchers: Vec<Option<ArgumentMatcher>> = positions
            .iter()
            .map(|(_, expected)| expected.map(ArgumentMatcher::eq))
            .collect();
        let expected = positions
            .iter()
            .all(|(arg, expected)| expected.map_or(true, |e| e == *arg));

        prop_assert_eq!(matches_all(&mut matchers, &args, &ctx), expected);
    }

    /// The count never passes the maximum; every extra call is unexpected.
    #[test]
    fn count_never_exceeds_maximum(max in 0u32..5, calls in 0u32..10) {
        let engine = MockEngine::with_defaults(Arc::new(MockLayer::new()));
        let ping = MemberSignature::static_fn("net::Probe", "ping", vec![], TypeDesc::Bool);
        let id = engine
            .record_call(RecordedCall::on_static(ping.clone()).max_times(max))
            .unwrap();
        engine.begin_replay().unwrap();

        let mut unexpected = 0;
        for _ in 0..calls {
            match engine.replay_call(&InterceptedCall::new(ping.clone())) {
                Ok(_) => {}
                Err(MockError::UnexpectedInvocation(_)) => unexpected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
            prop_assert!(engine.invocation_count(id).unwrap() <= max);
        }
        prop_assert_eq!(engine.invocation_count(id).unwrap(), calls.min(max));
        prop_assert_eq!(unexpected, calls.saturating_sub(max));
    }

    /// Arrays keep every value in order; sets keep first occurrences.
    #[test]
    fn sequence_coercion_shapes(values in prop::collection::vec(-5i32..5, 1..8)) {
        let values: Vec<Value> = values.into_iter().map(Value::Int).collect();
        let before = values.clone();

        let array = ValueSequence::coerce(&values[0], &values[1..], &TypeDesc::array_of(TypeDesc::Int));
        prop_assert_eq!(array, Some(Value::array(TypeDesc::Int, values.clone())));

        let set = ValueSequence::coerce(&values[0], &values[1..], &TypeDesc::set_of(TypeDesc::Int));
        let mut unique: Vec<Value> = Vec::new();
        for v in &values {
            if !unique.contains(v) {
                unique.push(v.clone());
            }
        }
        prop_assert_eq!(set, Some(Value::Set(unique)));
        prop_assert_eq!(values, before);
    }

    /// Resolving the same owner and member twice yields the same instance.
    #[test]
    fn cascading_is_idempotent(repeats in 2usize..6) {
        let layer = Arc::new(MockLayer::new());
        let engine = MockEngine::with_defaults(layer.clone());
        let owner = InstanceHandle::new("app::Session");
        let user = MemberSignature::method("app::Session", "user", vec![], TypeDesc::reference("app::User"));
        engine.begin_replay().unwrap();

        let results: Vec<Value> = (0..repeats)
            .map(|_| {
                engine
                    .replay_call(&InterceptedCall::new(user.clone()).on(owner.clone()))
                    .unwrap()
                    .into_value()
                    .unwrap()
            })
            .collect();
        prop_assert!(results.windows(2).all(|w| w[0] == w[1]));
        prop_assert_eq!(layer.created().len(), 1);
    }
}
