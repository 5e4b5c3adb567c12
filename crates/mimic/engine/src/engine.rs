//! The phase state machine: record, replay, verify.

use std::fmt;
use std::sync::Arc;

use mimic_types::{
    Condition, InstanceHandle, InterceptedCall, InvocationOutcome, MemberSignature, TypeDesc,
    TypeName, Value,
};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cascade::CascadingResolver;
use crate::config::EngineConfig;
use crate::constraint::InvocationConstraint;
use crate::diagnostics::{describe_call, MissingInvocation, UnexpectedInvocation};
use crate::equivalence::EquivalenceMap;
use crate::error::MockError;
use crate::expectation::{Expectation, ExpectationId, Origin, Target, Tier};
use crate::layer::InstrumentationLayer;
use crate::matchers::{ArgumentMatcher, MatchContext};
use crate::results::conversion::convert_return;
use crate::results::defaults::default_value;
use crate::results::delegate::{Delegate, DelegateContext};
use crate::results::{Production, ResultProducer};

/// Lifecycle of a test's mocking session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Recording,
    Replaying,
    Ended,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Recording => write!(f, "recording"),
            Phase::Replaying => write!(f, "replaying"),
            Phase::Ended => write!(f, "ended"),
        }
    }
}

/// An expectation to record, built up fluently.
///
/// Arguments given through [`with_args`](Self::with_args) are matched
/// leniently. Explicit matchers take precedence position by position; the
/// remaining positions fall back to the recorded arguments, or accept
/// anything when no argument was recorded there.
#[derive(Debug)]
pub struct RecordedCall {
    target: Target,
    member: MemberSignature,
    generic_signature: Option<String>,
    args: Vec<Value>,
    matchers: Vec<Option<ArgumentMatcher>>,
    min: Option<u32>,
    max: Option<u32>,
    producer: Option<ResultProducer>,
    returns: Option<(Value, Vec<Value>)>,
}

impl RecordedCall {
    pub fn new(target: Target, member: MemberSignature) -> Self {
        Self {
            target,
            member,
            generic_signature: None,
            args: Vec::new(),
            matchers: Vec::new(),
            min: None,
            max: None,
            producer: None,
            returns: None,
        }
    }

    /// Expect a call on `instance`.
    pub fn on(instance: &InstanceHandle, member: MemberSignature) -> Self {
        Self::new(Target::Instance(instance.clone()), member)
    }

    /// Expect a call of a static member.
    pub fn on_static(member: MemberSignature) -> Self {
        let owner = member.owner.clone();
        Self::new(Target::Static(owner), member)
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_matchers(mut self, matchers: Vec<Option<ArgumentMatcher>>) -> Self {
        self.matchers = matchers;
        self
    }

    pub fn with_generic_signature(mut self, signature: impl Into<String>) -> Self {
        self.generic_signature = Some(signature.into());
        self
    }

    pub fn min_times(mut self, min: u32) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max_times(mut self, max: u32) -> Self {
        self.max = Some(max);
        self
    }

    pub fn times(self, times: u32) -> Self {
        self.min_times(times).max_times(times)
    }

    pub fn returning(mut self, producer: ResultProducer) -> Self {
        self.producer = Some(producer);
        self.returns = None;
        self
    }

    /// Return `first`, then each of `rest`; container-typed members get all
    /// of them in one container instead.
    pub fn returns_values(mut self, first: impl Into<Value>, rest: Vec<Value>) -> Self {
        self.returns = Some((first.into(), rest));
        self.producer = None;
        self
    }

    pub fn throwing(self, condition: Condition) -> Self {
        self.returning(ResultProducer::Throw(condition))
    }

    pub fn delegating(self, delegate: Delegate) -> Self {
        self.returning(ResultProducer::Delegate(delegate))
    }
}

/// One call seen during replay, and the expectation it was counted against.
#[derive(Clone, Debug)]
pub struct ReplayedInvocation {
    pub expectation: ExpectationId,
    pub instance: Option<InstanceHandle>,
    pub member: MemberSignature,
    pub args: Vec<Value>,
}

impl fmt::Display for ReplayedInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&describe_call(self.instance.as_ref(), &self.member, &self.args))
    }
}

struct EngineState {
    phase: Phase,
    expectations: Vec<Expectation>,
    equivalence: EquivalenceMap,
    cascade: CascadingResolver,
    replayed: Vec<ReplayedInvocation>,
}

enum Selection {
    Matched(usize),
    /// Accepted, but only by expectations already at their maximum.
    Exhausted(usize),
    Unmatched,
}

/// Test-scoped mocking engine.
///
/// Every operation holds the engine lock for its full duration except while
/// a delegate callback runs; the callback may call back into the engine from
/// any thread.
pub struct MockEngine {
    state: Mutex<EngineState>,
    layer: Arc<dyn InstrumentationLayer>,
    config: EngineConfig,
}

impl MockEngine {
    pub fn new(layer: Arc<dyn InstrumentationLayer>, config: EngineConfig) -> Self {
        let cascade = CascadingResolver::new(config.non_cascading_prefixes.clone());
        Self {
            state: Mutex::new(EngineState {
                phase: Phase::Recording,
                expectations: Vec::new(),
                equivalence: EquivalenceMap::new(),
                cascade,
                replayed: Vec::new(),
            }),
            layer,
            config,
        }
    }

    pub fn with_defaults(layer: Arc<dyn InstrumentationLayer>) -> Self {
        Self::new(layer, EngineConfig::default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    // ── Recording ─────────────────────────────────────────────────

    /// Record an expectation.
    ///
    /// Recording the same target and member again with interchangeable
    /// matchers refines the earlier expectation instead of adding one.
    pub fn record_call(&self, call: RecordedCall) -> Result<ExpectationId, MockError> {
        let mut guard = self.state.lock();
        require_phase(&guard, Phase::Recording, "record_call")?;
        self.insert_recorded(&mut guard, call)
    }

    pub fn set_times(&self, id: ExpectationId, times: u32) -> Result<(), MockError> {
        self.refine(id, "set_times", |exp| exp.constraint.set_times(times))
    }

    pub fn set_min_times(&self, id: ExpectationId, min: u32) -> Result<(), MockError> {
        self.refine(id, "set_min_times", |exp| exp.constraint.set_min_times(min))
    }

    pub fn set_max_times(&self, id: ExpectationId, max: u32) -> Result<(), MockError> {
        self.refine(id, "set_max_times", |exp| exp.constraint.set_max_times(max))
    }

    /// Replace the result producer.
    pub fn set_result(&self, id: ExpectationId, producer: ResultProducer) -> Result<(), MockError> {
        self.refine(id, "set_result", |exp| {
            exp.producer = producer;
            Ok(())
        })
    }

    pub fn returns(
        &self,
        id: ExpectationId,
        first: impl Into<Value>,
        rest: Vec<Value>,
    ) -> Result<(), MockError> {
        let first = first.into();
        let layer = Arc::clone(&self.layer);
        self.refine(id, "returns", |exp| {
            let declared = resolve_return_type(
                layer.as_ref(),
                &exp.member,
                exp.generic_signature.as_deref(),
            );
            exp.producer = ResultProducer::returns(first, rest, &declared);
            Ok(())
        })
    }

    pub fn throws(&self, id: ExpectationId, condition: Condition) -> Result<(), MockError> {
        self.set_result(id, ResultProducer::Throw(condition))
    }

    pub fn delegate(&self, id: ExpectationId, delegate: Delegate) -> Result<(), MockError> {
        self.set_result(id, ResultProducer::Delegate(delegate))
    }

    /// Replace matchers position by position; `None` entries keep what is
    /// already there.
    pub fn set_matchers(
        &self,
        id: ExpectationId,
        matchers: Vec<Option<ArgumentMatcher>>,
    ) -> Result<(), MockError> {
        self.refine(id, "set_matchers", |exp| {
            check_arity(&exp.member, matchers.len())?;
            if exp.matchers.len() < matchers.len() {
                exp.matchers.resize(matchers.len(), None);
            }
            for (slot, matcher) in exp.matchers.iter_mut().zip(matchers) {
                if matcher.is_some() {
                    *slot = matcher;
                }
            }
            Ok(())
        })
    }

    fn refine<F>(&self, id: ExpectationId, operation: &'static str, f: F) -> Result<(), MockError>
    where
        F: FnOnce(&mut Expectation) -> Result<(), MockError>,
    {
        let mut guard = self.state.lock();
        require_phase(&guard, Phase::Recording, operation)?;
        let exp = guard
            .expectations
            .get_mut(id.0)
            .ok_or(MockError::UnknownExpectation(id))?;
        f(exp)?;
        debug!(expectation = %id, operation, "expectation refined");
        Ok(())
    }

    fn insert_recorded(
        &self,
        state: &mut EngineState,
        call: RecordedCall,
    ) -> Result<ExpectationId, MockError> {
        let matchers = build_matchers(&call.member, &call.args, call.matchers)?;
        let declared = resolve_return_type(
            self.layer.as_ref(),
            &call.member,
            call.generic_signature.as_deref(),
        );
        let producer = match call.returns {
            Some((first, rest)) => Some(ResultProducer::returns(first, rest, &declared)),
            None => call.producer,
        };

        let existing = state.expectations.iter().rposition(|exp| {
            exp.is_recorded()
                && exp.target == call.target
                && exp.member == call.member
                && exp.same_matchers(&matchers)
        });
        let (index, merged) = match existing {
            Some(index) => (index, true),
            None => {
                let index = state.expectations.len();
                state.expectations.push(Expectation {
                    id: ExpectationId(index),
                    target: call.target,
                    member: call.member,
                    generic_signature: call.generic_signature,
                    matchers,
                    constraint: InvocationConstraint::recorded(self.config.recorded_min_times),
                    producer: ResultProducer::Unconfigured,
                    origin: Origin::Recorded,
                });
                (index, false)
            }
        };

        let exp = &mut state.expectations[index];
        match (call.min, call.max) {
            (Some(min), max) => exp.constraint.set_limits(min, max.or(exp.constraint.max()))?,
            (None, Some(max)) => exp.constraint.set_max_times(max)?,
            (None, None) => {}
        }
        if let Some(producer) = producer {
            exp.producer = producer;
        }
        debug!(
            expectation = %exp.id,
            call = %exp.describe(),
            merged,
            min = exp.constraint.min(),
            max = ?exp.constraint.max(),
            "expectation recorded"
        );
        Ok(exp.id)
    }

    // ── Replay ────────────────────────────────────────────────────

    /// Switch from recording to replay.
    pub fn begin_replay(&self) -> Result<(), MockError> {
        let mut guard = self.state.lock();
        require_phase(&guard, Phase::Recording, "begin_replay")?;
        guard.phase = Phase::Replaying;
        info!(expectations = guard.expectations.len(), "replay started");
        Ok(())
    }

    /// Match a live call and produce its result.
    pub fn replay_call(&self, call: &InterceptedCall) -> Result<InvocationOutcome, MockError> {
        let guard = self.state.lock();
        require_phase(&guard, Phase::Replaying, "replay_call")?;
        self.replay_locked(guard, call)
    }

    /// Entry point for the instrumentation layer: records while recording,
    /// replays while replaying.
    pub fn on_intercepted_call(
        &self,
        call: &InterceptedCall,
    ) -> Result<InvocationOutcome, MockError> {
        let mut guard = self.state.lock();
        let phase = guard.phase;
        match phase {
            Phase::Recording => self.record_intercepted(&mut guard, call),
            Phase::Replaying => self.replay_locked(guard, call),
            Phase::Ended => Err(MockError::InvalidRecordingState {
                operation: "on_intercepted_call",
                phase: Phase::Ended,
            }),
        }
    }

    fn record_intercepted(
        &self,
        state: &mut EngineState,
        call: &InterceptedCall,
    ) -> Result<InvocationOutcome, MockError> {
        let target = Target::of(call.target.as_ref(), &call.member);
        let mut recorded =
            RecordedCall::new(target, call.member.clone()).with_args(call.args.clone());
        recorded.generic_signature = call.generic_signature.clone();
        self.insert_recorded(state, recorded)?;

        let declared = resolve_return_type(
            self.layer.as_ref(),
            &call.member,
            call.generic_signature.as_deref(),
        );
        let value = if self.config.record_returns_cascade {
            self.cascade_or_default(state, call.target.as_ref(), &call.member, &declared)
        } else {
            default_value(&declared)
        };
        Ok(InvocationOutcome::ReturnValue(value))
    }

    /// Replay under the held lock. The guard is released only around a
    /// delegate callback.
    fn replay_locked(
        &self,
        mut guard: MutexGuard<'_, EngineState>,
        call: &InterceptedCall,
    ) -> Result<InvocationOutcome, MockError> {
        let state = &mut *guard;
        let index = match select(
            &mut state.expectations,
            &state.equivalence,
            self.layer.as_ref(),
            call,
        ) {
            Selection::Matched(index) => index,
            Selection::Exhausted(index) => {
                let exp = &state.expectations[index];
                let err = UnexpectedInvocation {
                    expectation: exp.id,
                    invocation: describe_call(call.target.as_ref(), &call.member, &call.args),
                    max: exp.constraint.max().unwrap_or(u32::MAX),
                    count: exp.constraint.count(),
                };
                warn!(
                    expectation = %exp.id,
                    call = %err.invocation,
                    max = err.max,
                    "unexpected invocation"
                );
                return Err(err.into());
            }
            Selection::Unmatched => add_ad_hoc(state, call),
        };

        let exp = &mut state.expectations[index];
        let count = exp.constraint.increment();
        let id = exp.id;
        let origin = exp.origin;
        debug!(expectation = %id, count, call = %call.member, "invocation matched");

        if call.is_constructor() && origin == Origin::Recorded {
            if let (Some(recorded), Some(created)) = (exp.target.instance(), call.target.as_ref()) {
                if !recorded.same_instance(created) {
                    let recorded = recorded.clone();
                    state.equivalence.register(&recorded, created);
                    self.layer.register_equivalence(&recorded, created);
                    debug!(recorded = %recorded, created = %created, "constructor instance mapped");
                }
            }
        }

        let exp = &mut state.expectations[index];
        let production = exp.producer.next();
        let (min, max) = (exp.constraint.min(), exp.constraint.max());
        let generic_signature = call
            .generic_signature
            .as_deref()
            .or(exp.generic_signature.as_deref())
            .map(str::to_owned);

        state.replayed.push(ReplayedInvocation {
            expectation: id,
            instance: call.target.clone(),
            member: call.member.clone(),
            args: call.args.clone(),
        });

        if call.with_real_impl && origin == Origin::AdHoc {
            return Ok(InvocationOutcome::ProceedWithOriginalBehavior);
        }

        let declared = resolve_return_type(
            self.layer.as_ref(),
            &call.member,
            generic_signature.as_deref(),
        );
        let outcome = match production {
            Production::Value(v) => InvocationOutcome::ReturnValue(v),
            Production::Throw(c) => InvocationOutcome::ThrowCondition(c),
            Production::Default => InvocationOutcome::ReturnValue(default_value(&declared)),
            Production::CascadeOrDefault => InvocationOutcome::ReturnValue(
                self.cascade_or_default(state, call.target.as_ref(), &call.member, &declared),
            ),
            Production::Delegate(delegate) => {
                let ctx = DelegateContext {
                    instance: call.target.clone(),
                    member: call.member.clone(),
                    args: call.args.clone(),
                    invocation_count: count,
                    min_invocations: min,
                    max_invocations: max,
                };
                let result = MutexGuard::unlocked(&mut guard, || delegate.invoke(&ctx));
                match result {
                    Ok(value) => InvocationOutcome::ReturnValue(convert_return(
                        value,
                        &declared,
                        &call.member,
                        self.layer.as_ref(),
                    )?),
                    Err(condition) => InvocationOutcome::ThrowCondition(condition),
                }
            }
        };
        Ok(outcome)
    }

    fn cascade_or_default(
        &self,
        state: &mut EngineState,
        owner: Option<&InstanceHandle>,
        member: &MemberSignature,
        declared: &TypeDesc,
    ) -> Value {
        if self.config.cascading {
            // A replacement shares the nested mocks of the instance it replaces.
            let owner = owner.map(|o| state.equivalence.original_of(o).unwrap_or(o));
            if let Some(instance) =
                state.cascade.resolve(owner, member, declared, self.layer.as_ref())
            {
                return Value::Instance(instance);
            }
        }
        default_value(declared)
    }

    // ── Verification ──────────────────────────────────────────────

    /// End the test and report the first expectation short of its minimum.
    ///
    /// Allowed once, after replay has begun.
    pub fn verify(&self) -> Result<Option<MissingInvocation>, MockError> {
        let mut guard = self.state.lock();
        require_phase(&guard, Phase::Replaying, "verify")?;
        guard.phase = Phase::Ended;
        let state = &*guard;

        let Some(exp) = state
            .expectations
            .iter()
            .find(|exp| exp.constraint.is_below_minimum())
        else {
            info!(
                expectations = state.expectations.len(),
                invocations = state.replayed.len(),
                "verification passed"
            );
            return Ok(None);
        };

        let ctx = MatchContext {
            equivalence: &state.equivalence,
            layer: self.layer.as_ref(),
        };
        let near: Vec<String> = state
            .replayed
            .iter()
            .filter(|inv| {
                inv.expectation != exp.id
                    && exp.tier(inv.instance.as_ref(), &inv.member, &ctx).is_some()
            })
            .map(ToString::to_string)
            .collect();
        let shown = near.len().min(self.config.max_near_misses);
        let missing = MissingInvocation {
            expectation: exp.id,
            invocation: exp.describe(),
            min: exp.constraint.min(),
            count: exp.constraint.count(),
            omitted: near.len() - shown,
            near_misses: near.into_iter().take(shown).collect(),
        };
        warn!(
            expectation = %missing.expectation,
            call = %missing.invocation,
            missing = missing.missing(),
            near_misses = missing.near_misses.len() + missing.omitted,
            "missing invocation"
        );
        Ok(Some(missing))
    }

    /// [`verify`](Self::verify), turning a missing invocation into an error.
    pub fn assert_satisfied(&self) -> Result<(), MockError> {
        match self.verify()? {
            Some(missing) => Err(missing.into()),
            None => Ok(()),
        }
    }

    // ── Shared resources and inspection ──────────────────────────

    /// Make cascading return `instance` for members returning `type_name`.
    pub fn provide_instance(&self, type_name: impl Into<TypeName>, instance: InstanceHandle) {
        self.state.lock().cascade.provide(type_name.into(), instance);
    }

    /// Treat `new` as standing in for `old` in target and lenient matching.
    pub fn register_equivalence(&self, old: &InstanceHandle, new: &InstanceHandle) {
        self.state.lock().equivalence.register(old, new);
        self.layer.register_equivalence(old, new);
    }

    pub fn expectation_count(&self) -> usize {
        self.state.lock().expectations.len()
    }

    pub fn invocation_count(&self, id: ExpectationId) -> Result<u32, MockError> {
        self.state
            .lock()
            .expectations
            .get(id.0)
            .map(|exp| exp.constraint.count())
            .ok_or(MockError::UnknownExpectation(id))
    }

    /// Rendered expectation, as it appears in failure reports.
    pub fn describe_expectation(&self, id: ExpectationId) -> Result<String, MockError> {
        self.state
            .lock()
            .expectations
            .get(id.0)
            .map(Expectation::describe)
            .ok_or(MockError::UnknownExpectation(id))
    }

    /// Every replayed call so far, in arrival order.
    pub fn replayed_invocations(&self) -> Vec<ReplayedInvocation> {
        self.state.lock().replayed.clone()
    }

    /// Whether `instance` was created by cascading.
    pub fn is_cascaded(&self, instance: &InstanceHandle) -> bool {
        self.state.lock().cascade.is_cascaded(instance)
    }
}

fn require_phase(
    state: &EngineState,
    expected: Phase,
    operation: &'static str,
) -> Result<(), MockError> {
    if state.phase != expected {
        return Err(MockError::InvalidRecordingState {
            operation,
            phase: state.phase,
        });
    }
    Ok(())
}

fn check_arity(member: &MemberSignature, supplied: usize) -> Result<(), MockError> {
    if supplied > member.params.len() {
        return Err(MockError::ArgumentCountMismatch {
            member: member.to_string(),
            expected: member.params.len(),
            supplied,
        });
    }
    Ok(())
}

fn build_matchers(
    member: &MemberSignature,
    args: &[Value],
    explicit: Vec<Option<ArgumentMatcher>>,
) -> Result<Vec<Option<ArgumentMatcher>>, MockError> {
    check_arity(member, explicit.len().max(args.len()))?;
    let mut matchers = explicit;
    for (i, arg) in args.iter().enumerate() {
        match matchers.get_mut(i) {
            Some(slot @ None) => *slot = Some(ArgumentMatcher::LenientEquality(arg.clone())),
            Some(Some(_)) => {}
            None => matchers.push(Some(ArgumentMatcher::LenientEquality(arg.clone()))),
        }
    }
    Ok(matchers)
}

fn resolve_return_type(
    layer: &dyn InstrumentationLayer,
    member: &MemberSignature,
    generic_signature: Option<&str>,
) -> TypeDesc {
    generic_signature
        .and_then(|sig| layer.resolve_generic_return(member, sig))
        .unwrap_or_else(|| member.return_type.clone())
}

/// Pick the expectation a call counts against.
///
/// Exact targets are tried before class-level ones, each in registration
/// order. The first accepting expectation with room left wins.
fn select(
    expectations: &mut [Expectation],
    equivalence: &EquivalenceMap,
    layer: &dyn InstrumentationLayer,
    call: &InterceptedCall,
) -> Selection {
    let ctx = MatchContext { equivalence, layer };
    let mut exhausted = None;
    for tier in [Tier::Exact, Tier::ClassLevel] {
        for (index, exp) in expectations.iter_mut().enumerate() {
            if exp.tier(call.target.as_ref(), &call.member, &ctx) != Some(tier) {
                continue;
            }
            if !exp.accepts(&call.args, &ctx) {
                continue;
            }
            if exp.constraint.is_exhausted() {
                exhausted.get_or_insert(index);
                continue;
            }
            return Selection::Matched(index);
        }
    }
    match exhausted {
        Some(index) => Selection::Exhausted(index),
        None => Selection::Unmatched,
    }
}

fn add_ad_hoc(state: &mut EngineState, call: &InterceptedCall) -> usize {
    let target = call
        .target
        .as_ref()
        .map(|t| state.equivalence.original_of(t).unwrap_or(t));
    let index = state.expectations.len();
    let exp = Expectation {
        id: ExpectationId(index),
        target: Target::of(target, &call.member),
        member: call.member.clone(),
        generic_signature: call.generic_signature.clone(),
        matchers: call
            .args
            .iter()
            .map(|arg| Some(ArgumentMatcher::LenientEquality(arg.clone())))
            .collect(),
        constraint: InvocationConstraint::ad_hoc(),
        producer: ResultProducer::Unconfigured,
        origin: Origin::AdHoc,
    };
    debug!(expectation = %exp.id, call = %exp.describe(), "ad-hoc expectation created");
    state.expectations.push(exp);
    index
}
