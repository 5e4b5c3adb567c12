use std::collections::{HashMap, HashSet};

use mimic_types::{InstanceHandle, MemberSignature, TypeDesc, TypeName};
use parking_lot::Mutex;

use crate::layer::{CreationError, InstrumentationLayer};

/// In-memory instrumentation layer for testing.
///
/// Knows a configurable subtype relation, can be told to fail instance
/// creation for specific types, and records what the engine asked of it.
pub struct MockLayer {
    supertypes: HashMap<TypeName, Vec<TypeName>>,
    failing: HashSet<TypeName>,
    generic_returns: HashMap<String, TypeDesc>,
    created: Mutex<Vec<InstanceHandle>>,
    equivalences: Mutex<Vec<(InstanceHandle, InstanceHandle)>>,
}

impl MockLayer {
    pub fn new() -> Self {
        Self {
            supertypes: HashMap::new(),
            failing: HashSet::new(),
            generic_returns: HashMap::new(),
            created: Mutex::new(Vec::new()),
            equivalences: Mutex::new(Vec::new()),
        }
    }

    /// Declare `sub` assignable to `sup`.
    pub fn with_supertype(mut self, sub: impl Into<TypeName>, sup: impl Into<TypeName>) -> Self {
        self.supertypes
            .entry(sub.into())
            .or_default()
            .push(sup.into());
        self
    }

    /// Make `create_instance` fail for a type.
    pub fn failing_for(mut self, type_name: impl Into<TypeName>) -> Self {
        self.failing.insert(type_name.into());
        self
    }

    /// Resolve a generic signature to a concrete return type.
    pub fn with_generic_return(mut self, signature: impl Into<String>, resolved: TypeDesc) -> Self {
        self.generic_returns.insert(signature.into(), resolved);
        self
    }

    /// Instances created so far, in creation order.
    pub fn created(&self) -> Vec<InstanceHandle> {
        self.created.lock().clone()
    }

    /// `(old, new)` pairs reported through `register_equivalence`.
    pub fn equivalences(&self) -> Vec<(InstanceHandle, InstanceHandle)> {
        self.equivalences.lock().clone()
    }

    fn is_subtype(&self, target: &TypeName, source: &TypeName, depth: usize) -> bool {
        if target == source {
            return true;
        }
        if depth == 0 {
            return false;
        }
        self.supertypes
            .get(source)
            .map(|sups| sups.iter().any(|s| self.is_subtype(target, s, depth - 1)))
            .unwrap_or(false)
    }
}

impl Default for MockLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl InstrumentationLayer for MockLayer {
    fn create_instance(&self, type_name: &TypeName) -> Result<InstanceHandle, CreationError> {
        if self.failing.contains(type_name) {
            return Err(CreationError {
                type_name: type_name.clone(),
                reason: "creation disabled for type".into(),
            });
        }
        let instance = InstanceHandle::new(type_name.clone());
        self.created.lock().push(instance.clone());
        Ok(instance)
    }

    fn register_equivalence(&self, old: &InstanceHandle, new: &InstanceHandle) {
        self.equivalences.lock().push((old.clone(), new.clone()));
    }

    fn is_assignable(&self, target: &TypeName, source: &TypeName) -> bool {
        self.is_subtype(target, source, 16)
    }

    fn resolve_generic_return(
        &self,
        _member: &MemberSignature,
        generic_signature: &str,
    ) -> Option<TypeDesc> {
        self.generic_returns.get(generic_signature).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtype_relation_is_transitive() {
        let layer = MockLayer::new()
            .with_supertype("a::Impl", "a::Base")
            .with_supertype("a::Base", "a::Root");
        let (imp, base, root) = (
            TypeName::new("a::Impl"),
            TypeName::new("a::Base"),
            TypeName::new("a::Root"),
        );
        assert!(layer.is_assignable(&root, &imp));
        assert!(layer.is_assignable(&base, &imp));
        assert!(!layer.is_assignable(&imp, &base));
    }

    #[test]
    fn failing_type_does_not_create() {
        let layer = MockLayer::new().failing_for("a::Broken");
        assert!(layer.create_instance(&TypeName::new("a::Broken")).is_err());
        assert!(layer.create_instance(&TypeName::new("a::Fine")).is_ok());
        assert_eq!(layer.created().len(), 1);
    }
}
