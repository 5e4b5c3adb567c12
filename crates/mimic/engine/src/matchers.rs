//! Argument matchers.
//!
//! A recorded expectation carries one optional matcher per parameter. `None`
//! accepts any argument. Every variant answers three questions:
//!
//! - `matches`: does this argument satisfy the matcher?
//! - `same_as`: is another matcher interchangeable with this one when the
//!   same call is recorded again?
//! - `describe_mismatch`: how to render the expectation in a failure report.
//!
//! `matches` is pure for every variant except `Capture` (appends to its sink)
//! and `Reflective` (remembers the last argument for the report).

use std::fmt;
use std::sync::Arc;

use mimic_types::{TypeDesc, TypeName, Value};
use parking_lot::Mutex;

use crate::diagnostics::ArgumentMismatch;
use crate::equivalence::EquivalenceMap;
use crate::layer::InstrumentationLayer;

/// What a matcher may consult besides the argument itself.
pub struct MatchContext<'a> {
    pub equivalence: &'a EquivalenceMap,
    pub layer: &'a dyn InstrumentationLayer,
}

/// Which end of the string a substring matcher looks at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubstringKind {
    Contains,
    StartsWith,
    EndsWith,
}

/// Shared list receiving captured arguments.
#[derive(Clone, Default)]
pub struct CaptureSink(Arc<Mutex<Vec<Value>>>);

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, value: Value) {
        self.0.lock().push(value);
    }

    /// Snapshot of everything captured so far.
    pub fn values(&self) -> Vec<Value> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

impl fmt::Debug for CaptureSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSink")
            .field("captured", &self.len())
            .finish()
    }
}

/// A matcher implemented outside the engine.
pub trait ExternalMatcher: Send + Sync {
    fn matches(&self, value: &Value) -> bool;

    /// Render what the matcher expects.
    fn describe_to(&self, sink: &mut ArgumentMismatch);
}

type Predicate = Arc<dyn Fn(&Value) -> Option<bool> + Send + Sync>;

/// One positional argument matcher.
#[derive(Clone)]
pub enum ArgumentMatcher {
    Equality(Value),
    Inequality(Value),
    /// Equality that also accepts an instance standing in for the expected one.
    LenientEquality(Value),
    Substring {
        kind: SubstringKind,
        substring: String,
    },
    /// Accepts everything; arguments conforming to `expected` (or all, when
    /// `None`) are appended to the sink.
    Capture {
        sink: CaptureSink,
        expected: Option<TypeDesc>,
    },
    /// Delegates the decision to a predicate. `None` from the predicate
    /// counts as acceptance.
    Reflective {
        name: String,
        predicate: Predicate,
        last: Option<Value>,
    },
    External(Arc<dyn ExternalMatcher>),
}

impl ArgumentMatcher {
    pub fn eq(value: impl Into<Value>) -> Self {
        ArgumentMatcher::Equality(value.into())
    }

    pub fn ne(value: impl Into<Value>) -> Self {
        ArgumentMatcher::Inequality(value.into())
    }

    pub fn lenient(value: impl Into<Value>) -> Self {
        ArgumentMatcher::LenientEquality(value.into())
    }

    pub fn contains(substring: impl Into<String>) -> Self {
        Self::substring(SubstringKind::Contains, substring)
    }

    pub fn starts_with(substring: impl Into<String>) -> Self {
        Self::substring(SubstringKind::StartsWith, substring)
    }

    pub fn ends_with(substring: impl Into<String>) -> Self {
        Self::substring(SubstringKind::EndsWith, substring)
    }

    fn substring(kind: SubstringKind, substring: impl Into<String>) -> Self {
        ArgumentMatcher::Substring {
            kind,
            substring: substring.into(),
        }
    }

    pub fn capture(sink: &CaptureSink) -> Self {
        ArgumentMatcher::Capture {
            sink: sink.clone(),
            expected: None,
        }
    }

    /// Capture only arguments conforming to `expected`.
    pub fn capture_typed(sink: &CaptureSink, expected: TypeDesc) -> Self {
        ArgumentMatcher::Capture {
            sink: sink.clone(),
            expected: Some(expected),
        }
    }

    pub fn predicate<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::predicate_with_opinion(name, move |v| Some(f(v)))
    }

    pub fn predicate_with_opinion<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value) -> Option<bool> + Send + Sync + 'static,
    {
        ArgumentMatcher::Reflective {
            name: name.into(),
            predicate: Arc::new(f),
            last: None,
        }
    }

    pub fn external(matcher: Arc<dyn ExternalMatcher>) -> Self {
        ArgumentMatcher::External(matcher)
    }

    pub fn matches(&mut self, value: &Value, ctx: &MatchContext<'_>) -> bool {
        match self {
            ArgumentMatcher::Equality(expected) => expected.equals(value),
            ArgumentMatcher::Inequality(unexpected) => !unexpected.equals(value),
            ArgumentMatcher::LenientEquality(expected) => lenient_equals(expected, value, ctx),
            ArgumentMatcher::Substring { kind, substring } => match value.as_str() {
                Some(s) => match kind {
                    SubstringKind::Contains => s.contains(substring.as_str()),
                    SubstringKind::StartsWith => s.starts_with(substring.as_str()),
                    SubstringKind::EndsWith => s.ends_with(substring.as_str()),
                },
                None => false,
            },
            ArgumentMatcher::Capture { sink, expected } => {
                let wanted = match expected {
                    None => true,
                    Some(ty) if value.is_null() => !ty.is_primitive(),
                    Some(ty) => {
                        let assignable =
                            |t: &TypeName, s: &TypeName| ctx.layer.is_assignable(t, s);
                        value.conforms_to(ty, &assignable)
                    }
                };
                if wanted {
                    sink.push(value.clone());
                }
                true
            }
            ArgumentMatcher::Reflective {
                predicate, last, ..
            } => {
                *last = Some(value.clone());
                (**predicate)(value).unwrap_or(true)
            }
            ArgumentMatcher::External(m) => m.matches(value),
        }
    }

    /// Whether `other` may replace this matcher when a call is recorded again.
    /// Capture matchers are never interchangeable.
    pub fn same_as(&self, other: &ArgumentMatcher) -> bool {
        match (self, other) {
            (ArgumentMatcher::Equality(a), ArgumentMatcher::Equality(b))
            | (ArgumentMatcher::Inequality(a), ArgumentMatcher::Inequality(b))
            | (ArgumentMatcher::LenientEquality(a), ArgumentMatcher::LenientEquality(b)) => {
                a.equals(b)
            }
            (
                ArgumentMatcher::Substring {
                    kind: ka,
                    substring: sa,
                },
                ArgumentMatcher::Substring {
                    kind: kb,
                    substring: sb,
                },
            ) => ka == kb && sa == sb,
            (
                ArgumentMatcher::Reflective { predicate: a, .. },
                ArgumentMatcher::Reflective { predicate: b, .. },
            ) => Arc::ptr_eq(a, b),
            (ArgumentMatcher::External(a), ArgumentMatcher::External(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn describe_mismatch(&self, sink: &mut ArgumentMismatch) {
        match self {
            ArgumentMatcher::Equality(v) | ArgumentMatcher::LenientEquality(v) => {
                sink.append_formatted(v);
            }
            ArgumentMatcher::Inequality(v) => {
                sink.append("not ").append_formatted(v);
            }
            ArgumentMatcher::Substring { kind, substring } => {
                let phrase = match kind {
                    SubstringKind::Contains => "a string containing ",
                    SubstringKind::StartsWith => "a string starting with ",
                    SubstringKind::EndsWith => "a string ending with ",
                };
                sink.append(phrase)
                    .append_formatted(&Value::Str(substring.clone()));
            }
            ArgumentMatcher::Capture { .. } => {}
            ArgumentMatcher::Reflective { name, last, .. } => match last {
                Some(value) => {
                    sink.append(name)
                        .append("(")
                        .append_formatted(value)
                        .append(") (should return true, was false)");
                }
                None => {
                    sink.append("?");
                }
            },
            ArgumentMatcher::External(m) => m.describe_to(sink),
        }
    }

    /// Rendering used in expectation descriptions; `any` when nothing is said.
    pub fn describe(&self) -> String {
        let mut sink = ArgumentMismatch::new();
        self.describe_mismatch(&mut sink);
        if sink.is_empty() {
            "any".to_string()
        } else {
            sink.into_string()
        }
    }
}

impl fmt::Debug for ArgumentMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentMatcher::Equality(v) => f.debug_tuple("Equality").field(v).finish(),
            ArgumentMatcher::Inequality(v) => f.debug_tuple("Inequality").field(v).finish(),
            ArgumentMatcher::LenientEquality(v) => {
                f.debug_tuple("LenientEquality").field(v).finish()
            }
            ArgumentMatcher::Substring { kind, substring } => f
                .debug_struct("Substring")
                .field("kind", kind)
                .field("substring", substring)
                .finish(),
            ArgumentMatcher::Capture { sink, expected } => f
                .debug_struct("Capture")
                .field("sink", sink)
                .field("expected", expected)
                .finish(),
            ArgumentMatcher::Reflective { name, last, .. } => f
                .debug_struct("Reflective")
                .field("name", name)
                .field("last", last)
                .finish(),
            ArgumentMatcher::External(_) => f.write_str("External"),
        }
    }
}

fn lenient_equals(expected: &Value, actual: &Value, ctx: &MatchContext<'_>) -> bool {
    match (expected, actual) {
        (Value::Null, actual) => actual.is_null(),
        (_, Value::Null) => false,
        (Value::Instance(e), Value::Instance(a)) => ctx.equivalence.are_equivalent(a, e),
        _ => expected.equals(actual),
    }
}

/// Evaluate a positional matcher set against call arguments.
///
/// Every matcher is consulted until one rejects; a matcher without a
/// corresponding argument rejects.
pub fn matches_all(
    matchers: &mut [Option<ArgumentMatcher>],
    args: &[Value],
    ctx: &MatchContext<'_>,
) -> bool {
    for (i, slot) in matchers.iter_mut().enumerate() {
        let Some(matcher) = slot else {
            continue;
        };
        match args.get(i) {
            Some(arg) if matcher.matches(arg, ctx) => {}
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockLayer;
    use mimic_types::InstanceHandle;

    fn with_ctx<R>(equivalence: &EquivalenceMap, f: impl FnOnce(&MatchContext<'_>) -> R) -> R {
        let layer = MockLayer::new();
        let ctx = MatchContext {
            equivalence,
            layer: &layer,
        };
        f(&ctx)
    }

    #[test]
    fn equality_and_inequality() {
        let map = EquivalenceMap::new();
        with_ctx(&map, |ctx| {
            let mut eq = ArgumentMatcher::eq(5);
            let mut ne = ArgumentMatcher::ne(5);
            assert!(eq.matches(&Value::Int(5), ctx));
            assert!(!eq.matches(&Value::Int(6), ctx));
            assert!(!ne.matches(&Value::Int(5), ctx));
            assert!(ne.matches(&Value::Int(6), ctx));
        });
    }

    #[test]
    fn equality_compares_arrays_deeply() {
        let map = EquivalenceMap::new();
        with_ctx(&map, |ctx| {
            let expected = Value::array(TypeDesc::Int, vec![Value::Int(1), Value::Int(2)]);
            let mut eq = ArgumentMatcher::Equality(expected.clone());
            assert!(eq.matches(&expected.clone(), ctx));
            assert!(!eq.matches(&Value::array(TypeDesc::Int, vec![Value::Int(1)]), ctx));
        });
    }

    #[test]
    fn lenient_equality_consults_equivalence_map() {
        let mut map = EquivalenceMap::new();
        let recorded = InstanceHandle::new("db::Conn");
        let replacement = InstanceHandle::new("db::Conn");
        let mut matcher = ArgumentMatcher::lenient(recorded.clone());

        with_ctx(&map, |ctx| {
            assert!(!matcher.matches(&Value::Instance(replacement.clone()), ctx));
        });
        map.register(&recorded, &replacement);
        with_ctx(&map, |ctx| {
            assert!(matcher.matches(&Value::Instance(replacement.clone()), ctx));
            assert!(!matcher.matches(&Value::Null, ctx));
        });
    }

    #[test]
    fn lenient_null_only_matches_null() {
        let map = EquivalenceMap::new();
        with_ctx(&map, |ctx| {
            let mut m = ArgumentMatcher::LenientEquality(Value::Null);
            assert!(m.matches(&Value::Null, ctx));
            assert!(!m.matches(&Value::Int(0), ctx));
        });
    }

    #[test]
    fn substring_family() {
        let map = EquivalenceMap::new();
        with_ctx(&map, |ctx| {
            let s = Value::str("hello world");
            assert!(ArgumentMatcher::contains("lo w").matches(&s, ctx));
            assert!(ArgumentMatcher::starts_with("hello").matches(&s, ctx));
            assert!(!ArgumentMatcher::ends_with("hello").matches(&s, ctx));
            assert!(!ArgumentMatcher::contains("x").matches(&Value::Int(1), ctx));
        });
    }

    #[test]
    fn capture_records_conforming_values_only() {
        let map = EquivalenceMap::new();
        let sink = CaptureSink::new();
        with_ctx(&map, |ctx| {
            let mut m = ArgumentMatcher::capture_typed(&sink, TypeDesc::Str);
            assert!(m.matches(&Value::str("a"), ctx));
            assert!(m.matches(&Value::Int(1), ctx));
            assert!(m.matches(&Value::Null, ctx));
        });
        assert_eq!(sink.values(), vec![Value::str("a"), Value::Null]);
    }

    #[test]
    fn capture_matchers_are_never_same() {
        let sink = CaptureSink::new();
        let a = ArgumentMatcher::capture(&sink);
        assert!(!a.same_as(&a.clone()));
    }

    #[test]
    fn same_as_is_reflexive_for_value_matchers() {
        let matchers = vec![
            ArgumentMatcher::eq("x"),
            ArgumentMatcher::ne(1),
            ArgumentMatcher::lenient(2),
            ArgumentMatcher::contains("y"),
            ArgumentMatcher::predicate("positive", |_| true),
        ];
        for m in &matchers {
            assert!(m.same_as(&m.clone()), "{:?}", m);
        }
        assert!(!ArgumentMatcher::eq(1).same_as(&ArgumentMatcher::lenient(1)));
    }

    #[test]
    fn reflective_remembers_last_argument() {
        let map = EquivalenceMap::new();
        let mut m = ArgumentMatcher::predicate("isPositive", |v| v.as_i64().unwrap_or(0) > 0);
        assert_eq!(m.describe(), "?");
        with_ctx(&map, |ctx| assert!(!m.matches(&Value::Int(-3), ctx)));
        assert_eq!(m.describe(), "isPositive(-3) (should return true, was false)");
    }

    #[test]
    fn reflective_without_opinion_accepts() {
        let map = EquivalenceMap::new();
        let mut m = ArgumentMatcher::predicate_with_opinion("shrug", |_| None);
        with_ctx(&map, |ctx| assert!(m.matches(&Value::Int(1), ctx)));
    }

    struct EvenMatcher;

    impl ExternalMatcher for EvenMatcher {
        fn matches(&self, value: &Value) -> bool {
            value.as_i64().is_some_and(|n| n % 2 == 0)
        }

        fn describe_to(&self, sink: &mut ArgumentMismatch) {
            sink.append("an even number");
        }
    }

    #[test]
    fn external_adapter_delegates() {
        let map = EquivalenceMap::new();
        let inner: Arc<dyn ExternalMatcher> = Arc::new(EvenMatcher);
        let mut m = ArgumentMatcher::external(inner.clone());
        with_ctx(&map, |ctx| {
            assert!(m.matches(&Value::Int(4), ctx));
            assert!(!m.matches(&Value::Int(5), ctx));
        });
        assert_eq!(m.describe(), "an even number");
        assert!(m.same_as(&ArgumentMatcher::external(inner)));
        assert!(!m.same_as(&ArgumentMatcher::external(Arc::new(EvenMatcher))));
    }

    #[test]
    fn matches_all_treats_none_as_wildcard() {
        let map = EquivalenceMap::new();
        with_ctx(&map, |ctx| {
            let mut set = vec![None, Some(ArgumentMatcher::eq(2))];
            assert!(matches_all(&mut set, &[Value::str("anything"), Value::Int(2)], ctx));
            assert!(!matches_all(&mut set, &[Value::Null, Value::Int(3)], ctx));
            assert!(!matches_all(&mut set, &[Value::Null], ctx));
        });
    }

    #[test]
    fn describe_renders_each_variant() {
        assert_eq!(ArgumentMatcher::ne(3).describe(), "not 3");
        assert_eq!(
            ArgumentMatcher::starts_with("ab").describe(),
            "a string starting with \"ab\""
        );
        assert_eq!(ArgumentMatcher::capture(&CaptureSink::new()).describe(), "any");
    }
}
