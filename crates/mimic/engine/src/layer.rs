use mimic_types::{InstanceHandle, MemberSignature, TypeDesc, TypeName};
use thiserror::Error;

/// The instrumentation layer could not produce an instance.
#[derive(Error, Debug, Clone)]
#[error("cannot create instance of {type_name}: {reason}")]
pub struct CreationError {
    pub type_name: TypeName,
    pub reason: String,
}

/// Capabilities the engine needs from the layer that intercepts calls.
///
/// Only `create_instance` is mandatory. The defaults treat types as
/// unrelated and generic signatures as unresolvable.
pub trait InstrumentationLayer: Send + Sync {
    /// Create a new mocked instance of `type_name` (used for cascading).
    fn create_instance(&self, type_name: &TypeName) -> Result<InstanceHandle, CreationError>;

    /// Told when `new` starts standing in for `old`.
    fn register_equivalence(&self, _old: &InstanceHandle, _new: &InstanceHandle) {}

    /// Whether a value of runtime type `source` may be used where `target` is declared.
    fn is_assignable(&self, target: &TypeName, source: &TypeName) -> bool {
        target == source
    }

    /// Resolve a member's generic return type against its owner.
    fn resolve_generic_return(
        &self,
        _member: &MemberSignature,
        _generic_signature: &str,
    ) -> Option<TypeDesc> {
        None
    }
}
