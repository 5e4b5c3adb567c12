use std::fmt;
use std::sync::Arc;

use mimic_types::{Condition, InstanceHandle, MemberSignature, Value};

/// What a delegate callback hands back: a value, or a condition to throw.
pub type DelegateResult = Result<Value, Condition>;

/// Call context passed to context-aware delegates.
#[derive(Clone, Debug)]
pub struct DelegateContext {
    /// `None` for static members.
    pub instance: Option<InstanceHandle>,
    pub member: MemberSignature,
    pub args: Vec<Value>,
    /// Count including the call being served.
    pub invocation_count: u32,
    pub min_invocations: u32,
    pub max_invocations: Option<u32>,
}

/// Shape of the callback, fixed when the delegate is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DelegateArity {
    NoArgs,
    Args,
    WithContext,
}

type NoArgsFn = Arc<dyn Fn() -> DelegateResult + Send + Sync>;
type ArgsFn = Arc<dyn Fn(&[Value]) -> DelegateResult + Send + Sync>;
type ContextFn = Arc<dyn Fn(&DelegateContext, &[Value]) -> DelegateResult + Send + Sync>;

/// An externally supplied callback computing the result of a call.
///
/// The engine lock is released while it runs, so it may call back into
/// the engine.
#[derive(Clone)]
pub enum Delegate {
    NoArgs(NoArgsFn),
    Args(ArgsFn),
    WithContext(ContextFn),
}

impl Delegate {
    pub fn no_args<F>(f: F) -> Self
    where
        F: Fn() -> DelegateResult + Send + Sync + 'static,
    {
        Delegate::NoArgs(Arc::new(f))
    }

    pub fn with_args<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> DelegateResult + Send + Sync + 'static,
    {
        Delegate::Args(Arc::new(f))
    }

    pub fn with_context<F>(f: F) -> Self
    where
        F: Fn(&DelegateContext, &[Value]) -> DelegateResult + Send + Sync + 'static,
    {
        Delegate::WithContext(Arc::new(f))
    }

    pub fn arity(&self) -> DelegateArity {
        match self {
            Delegate::NoArgs(_) => DelegateArity::NoArgs,
            Delegate::Args(_) => DelegateArity::Args,
            Delegate::WithContext(_) => DelegateArity::WithContext,
        }
    }

    pub fn invoke(&self, ctx: &DelegateContext) -> DelegateResult {
        match self {
            Delegate::NoArgs(f) => f(),
            Delegate::Args(f) => f(&ctx.args),
            Delegate::WithContext(f) => f(ctx, &ctx.args),
        }
    }
}

impl fmt::Debug for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Delegate").field(&self.arity()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimic_types::TypeDesc;

    fn ctx(args: Vec<Value>) -> DelegateContext {
        DelegateContext {
            instance: None,
            member: MemberSignature::static_fn("m::Math", "sum", vec![TypeDesc::Int; 2], TypeDesc::Int),
            args,
            invocation_count: 1,
            min_invocations: 0,
            max_invocations: None,
        }
    }

    #[test]
    fn each_arity_sees_its_inputs() {
        let no_args = Delegate::no_args(|| Ok(Value::Int(7)));
        let args = Delegate::with_args(|a| {
            Ok(Value::Int(a.iter().filter_map(Value::as_i64).sum::<i64>() as i32))
        });
        let with_ctx = Delegate::with_context(|c, _| Ok(Value::Int(c.invocation_count as i32)));

        let c = ctx(vec![Value::Int(2), Value::Int(3)]);
        assert_eq!(no_args.invoke(&c), Ok(Value::Int(7)));
        assert_eq!(args.invoke(&c), Ok(Value::Int(5)));
        assert_eq!(with_ctx.invoke(&c), Ok(Value::Int(1)));
        assert_eq!(with_ctx.arity(), DelegateArity::WithContext);
    }

    #[test]
    fn delegate_may_throw() {
        let d = Delegate::no_args(|| Err(Condition::new("IOError", "disk full")));
        assert_eq!(d.invoke(&ctx(vec![])).unwrap_err().kind, "IOError");
    }
}
