use mimic_types::TypeDesc;
use thiserror::Error;

use crate::diagnostics::{MissingInvocation, UnexpectedInvocation};
use crate::engine::Phase;
use crate::expectation::ExpectationId;

/// Errors raised by the mocking engine.
#[derive(Error, Debug)]
pub enum MockError {
    #[error("{operation} is not allowed in the {phase} phase")]
    InvalidRecordingState {
        operation: &'static str,
        phase: Phase,
    },

    #[error(transparent)]
    UnexpectedInvocation(#[from] UnexpectedInvocation),

    #[error(transparent)]
    MissingInvocation(#[from] MissingInvocation),

    #[error("value {actual} returned for {member} is incompatible with return type {declared}")]
    IncompatibleReturnType {
        member: String,
        declared: TypeDesc,
        actual: String,
    },

    #[error("invalid invocation constraint: minimum {min} exceeds maximum {max}")]
    InvalidConstraint { min: u32, max: u32 },

    #[error("unknown expectation: {0}")]
    UnknownExpectation(ExpectationId),

    #[error("{member} takes {expected} argument(s) but {supplied} matcher(s) were supplied")]
    ArgumentCountMismatch {
        member: String,
        expected: usize,
        supplied: usize,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl MockError {
    /// Whether this error is a test failure rather than API misuse.
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            MockError::UnexpectedInvocation(_) | MockError::MissingInvocation(_)
        )
    }
}
