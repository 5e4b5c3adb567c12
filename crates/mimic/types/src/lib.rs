//! Core type definitions for the Mimic mocking engine.
//!
//! This crate provides the vocabulary shared between the engine and the
//! instrumentation layer that feeds it. No business logic, just types.
//!
//! - [`Value`]: a runtime argument or return value as seen by the engine
//! - [`TypeDesc`]: the declared shape of a parameter or return type
//! - [`MemberSignature`]: a mockable method, static function or constructor
//! - [`InstanceHandle`]: an identity-compared reference to a mocked object
//! - [`InterceptedCall`] / [`InvocationOutcome`]: the inbound event and its answer

pub mod call;
pub mod condition;
pub mod instance;
pub mod member;
pub mod types;
pub mod value;

// Re-export primary types at crate root for ergonomic use.
pub use call::{InterceptedCall, InvocationOutcome};
pub use condition::Condition;
pub use instance::{InstanceHandle, InstanceId};
pub use member::{MemberKind, MemberSignature};
pub use types::{TypeDesc, TypeName};
pub use value::{SharedIter, Value};
