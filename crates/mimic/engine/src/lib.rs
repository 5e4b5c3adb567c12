//! Mimic Engine: record, replay and verify calls on mocked members.
//!
//! The instrumentation layer turns calls on mockable members into
//! [`InterceptedCall`] events and hands them to a [`MockEngine`]. The engine
//! runs a three-phase state machine:
//!
//! 1. **Recording**: each call (or an explicit [`RecordedCall`]) becomes an
//!    [`Expectation`]: a target, a positional matcher set, an invocation
//!    constraint and a result producer.
//! 2. **Replaying**: each live call is matched against the registry in
//!    registration order. The first accepting expectation with room left is
//!    counted and produces the result. Unmatched calls get an ad-hoc
//!    expectation so they stay visible in the history.
//! 3. **Ended**: [`MockEngine::verify`] reports the first expectation that
//!    fell short of its minimum, together with the near misses.
//!
//! ## Invariants
//!
//! - Invocation counts only grow; a call past the maximum fails with
//!   `UnexpectedInvocation` and is not counted.
//! - Result producers can only be replaced while recording.
//! - Cascaded instances are cached per owner and member: resolving the same
//!   pair twice yields the same instance. A member returning its owner's own
//!   type resolves to the owner.
//! - The engine lock is released only around delegate callbacks.
//!
//! All state is test scoped: build one engine per test and drop it after.

pub mod cascade;
pub mod config;
pub mod constraint;
pub mod diagnostics;
pub mod engine;
pub mod equivalence;
pub mod error;
pub mod expectation;
pub mod layer;
pub mod matchers;
pub mod mocks;
pub mod results;

pub use cascade::{CascadeEntry, CascadeOwner, CascadingResolver};
pub use config::EngineConfig;
pub use constraint::InvocationConstraint;
pub use diagnostics::{ArgumentMismatch, MissingInvocation, UnexpectedInvocation};
pub use engine::{MockEngine, Phase, RecordedCall, ReplayedInvocation};
pub use equivalence::EquivalenceMap;
pub use error::MockError;
pub use expectation::{Expectation, ExpectationId, Origin, Target};
pub use layer::{CreationError, InstrumentationLayer};
pub use matchers::{
    ArgumentMatcher, CaptureSink, ExternalMatcher, MatchContext, SubstringKind,
};
pub use mocks::MockLayer;
pub use results::delegate::{Delegate, DelegateArity, DelegateContext, DelegateResult};
pub use results::sequence::ValueSequence;
pub use results::ResultProducer;

pub use mimic_types::{
    Condition, InstanceHandle, InstanceId, InterceptedCall, InvocationOutcome, MemberKind,
    MemberSignature, SharedIter, TypeDesc, TypeName, Value,
};
