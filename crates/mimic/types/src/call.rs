use crate::condition::Condition;
use crate::instance::InstanceHandle;
use crate::member::MemberSignature;
use crate::types::TypeName;
use crate::value::Value;

/// One call observed by the instrumentation layer.
///
/// `target` is `None` for static-like members. For constructors it is the
/// freshly created instance.
#[derive(Clone, Debug)]
pub struct InterceptedCall {
    pub target: Option<InstanceHandle>,
    pub member: MemberSignature,
    pub generic_signature: Option<String>,
    pub args: Vec<Value>,
    /// The intercepted member has a real implementation the call may proceed into.
    pub with_real_impl: bool,
}

impl InterceptedCall {
    pub fn new(member: MemberSignature) -> Self {
        Self {
            target: None,
            member,
            generic_signature: None,
            args: Vec::new(),
            with_real_impl: false,
        }
    }

    pub fn on(mut self, target: InstanceHandle) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_generic_signature(mut self, signature: impl Into<String>) -> Self {
        self.generic_signature = Some(signature.into());
        self
    }

    pub fn with_real_impl(mut self) -> Self {
        self.with_real_impl = true;
        self
    }

    pub fn declaring_type(&self) -> &TypeName {
        &self.member.owner
    }

    pub fn is_constructor(&self) -> bool {
        self.member.is_constructor()
    }
}

/// What the instrumentation layer should do with an intercepted call.
#[derive(Clone, Debug, PartialEq)]
pub enum InvocationOutcome {
    ProceedWithOriginalBehavior,
    ReturnValue(Value),
    ThrowCondition(Condition),
}

impl InvocationOutcome {
    /// The returned value, if the outcome is a return.
    pub fn value(&self) -> Option<&Value> {
        match self {
            InvocationOutcome::ReturnValue(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            InvocationOutcome::ReturnValue(v) => Some(v),
            _ => None,
        }
    }
}
