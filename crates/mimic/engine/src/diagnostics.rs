//! Failure reports and the text sink matchers render into.

use std::fmt;

use mimic_types::{InstanceHandle, MemberSignature, Value};
use thiserror::Error;

use crate::expectation::ExpectationId;

/// Text sink a matcher describes its expectation into.
#[derive(Clone, Debug, Default)]
pub struct ArgumentMismatch {
    buf: String,
}

impl ArgumentMismatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, text: &str) -> &mut Self {
        self.buf.push_str(text);
        self
    }

    /// Append a value the way it is rendered in failure messages.
    pub fn append_formatted(&mut self, value: &Value) -> &mut Self {
        self.buf.push_str(&value.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

/// Render a concrete call: `Cart@7.add(5, "x")`, or `Cart#add(5)` for statics.
pub fn describe_call(
    target: Option<&InstanceHandle>,
    member: &MemberSignature,
    args: &[Value],
) -> String {
    let args: Vec<String> = args.iter().map(ToString::to_string).collect();
    match target {
        Some(instance) if !member.is_constructor() => {
            format!("{}.{}({})", instance, member.name, args.join(", "))
        }
        _ if member.is_constructor() => {
            format!("new {}({})", member.owner.simple_name(), args.join(", "))
        }
        _ => format!(
            "{}#{}({})",
            member.owner.simple_name(),
            member.name,
            args.join(", ")
        ),
    }
}

/// A replayed call went past its expectation's maximum.
#[derive(Clone, Debug, Error)]
#[error("Unexpected invocation of {invocation}: expected at most {max} call(s) for {expectation}, already had {count}")]
pub struct UnexpectedInvocation {
    pub expectation: ExpectationId,
    /// The offending call as it was made.
    pub invocation: String,
    pub max: u32,
    pub count: u32,
}

/// An expectation fell short of its minimum when the test ended.
#[derive(Clone, Debug)]
pub struct MissingInvocation {
    pub expectation: ExpectationId,
    /// The expectation as recorded.
    pub invocation: String,
    pub min: u32,
    pub count: u32,
    /// Replayed calls on the same target and member whose arguments did not match.
    pub near_misses: Vec<String>,
    /// Near misses left out of `near_misses` by the configured cap.
    pub omitted: usize,
}

impl MissingInvocation {
    pub fn missing(&self) -> u32 {
        self.min.saturating_sub(self.count)
    }
}

impl fmt::Display for MissingInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Missing {} invocation(s) to: {} (expected at least {}, got {})",
            self.missing(),
            self.invocation,
            self.min,
            self.count
        )?;
        if !self.near_misses.is_empty() {
            f.write_str("\ninstead got:")?;
            for call in &self.near_misses {
                write!(f, "\n  {}", call)?;
            }
            if self.omitted > 0 {
                write!(f, "\n  ... and {} more", self.omitted)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for MissingInvocation {}

#[cfg(test)]
mod tests {
    use super::*;
    use mimic_types::TypeDesc;

    #[test]
    fn describe_call_variants() {
        let method = MemberSignature::method("shop::Cart", "add", vec![TypeDesc::Int], TypeDesc::Bool);
        let cart = InstanceHandle::new("shop::Cart");
        let rendered = describe_call(Some(&cart), &method, &[Value::Int(5)]);
        assert!(rendered.starts_with("Cart@"));
        assert!(rendered.ends_with(".add(5)"));

        let stat = MemberSignature::static_fn("shop::Prices", "lookup", vec![TypeDesc::Str], TypeDesc::Long);
        assert_eq!(describe_call(None, &stat, &[Value::str("x")]), "Prices#lookup(\"x\")");

        let ctor = MemberSignature::constructor("shop::Cart", vec![]);
        assert_eq!(describe_call(Some(&cart), &ctor, &[]), "new Cart()");
    }

    #[test]
    fn missing_invocation_lists_near_misses() {
        let missing = MissingInvocation {
            expectation: ExpectationId(0),
            invocation: "Cart#add(5)".into(),
            min: 1,
            count: 0,
            near_misses: vec!["Cart@1.add(6)".into()],
            omitted: 2,
        };
        let text = missing.to_string();
        assert!(text.starts_with("Missing 1 invocation(s) to: Cart#add(5)"));
        assert!(text.contains("instead got:\n  Cart@1.add(6)"));
        assert!(text.contains("... and 2 more"));
    }
}
