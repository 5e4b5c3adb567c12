use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::types::TypeName;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a mocked object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

impl InstanceId {
    pub fn next() -> Self {
        Self(NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Reference to a live object handed out by the instrumentation layer.
///
/// Equality and hashing use the identity only, never the runtime type, so two
/// handles are equal exactly when they denote the same object.
#[derive(Clone, Debug)]
pub struct InstanceHandle {
    id: InstanceId,
    type_name: TypeName,
}

impl InstanceHandle {
    /// Allocate a fresh identity for an object of the given runtime type.
    pub fn new(type_name: impl Into<TypeName>) -> Self {
        Self {
            id: InstanceId::next(),
            type_name: type_name.into(),
        }
    }

    /// Rebuild a handle for an identity the caller already owns.
    pub fn from_parts(id: InstanceId, type_name: TypeName) -> Self {
        Self { id, type_name }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn type_name(&self) -> &TypeName {
        &self.type_name
    }

    pub fn same_instance(&self, other: &InstanceHandle) -> bool {
        self.id == other.id
    }
}

impl PartialEq for InstanceHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for InstanceHandle {}

impl Hash for InstanceHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.type_name.simple_name(), self.id)
    }
}
