//! Lazily created nested mocks for chained calls.
//!
//! Each owner (an instance, or a type for static members) gets a
//! [`CascadeEntry`] the first time one of its members cascades. The entry
//! caches one nested instance per `(member, return type)` pair, so chains
//! like `a.b().c()` keep hitting the same objects and form a tree that grows
//! only as far as the test walks it.

use std::collections::{HashMap, HashSet};

use mimic_types::{InstanceHandle, InstanceId, MemberSignature, TypeDesc, TypeName};
use tracing::{debug, warn};

use crate::layer::InstrumentationLayer;

/// Key of a cascade entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CascadeOwner {
    Instance(InstanceId),
    Static(TypeName),
}

impl CascadeOwner {
    pub fn of(owner: Option<&InstanceHandle>, member: &MemberSignature) -> Self {
        match owner {
            Some(instance) => CascadeOwner::Instance(instance.id()),
            None => CascadeOwner::Static(member.owner.clone()),
        }
    }
}

/// Nested mocks reachable from one owner.
#[derive(Debug)]
pub struct CascadeEntry {
    pub owner_type: TypeName,
    nested: HashMap<(String, TypeName), InstanceHandle>,
    created: Vec<InstanceHandle>,
}

impl CascadeEntry {
    fn new(owner_type: TypeName) -> Self {
        Self {
            owner_type,
            nested: HashMap::new(),
            created: Vec::new(),
        }
    }

    /// Cached instance for a member and resolved return type.
    pub fn get(&self, member: &MemberSignature, return_type: &TypeName) -> Option<&InstanceHandle> {
        self.nested.get(&(member.descriptor(), return_type.clone()))
    }

    /// Instances created while cascading from this owner, oldest first.
    pub fn created(&self) -> &[InstanceHandle] {
        &self.created
    }

    pub fn len(&self) -> usize {
        self.nested.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nested.is_empty()
    }
}

/// Builds and caches nested mocks for reference-typed returns.
#[derive(Debug)]
pub struct CascadingResolver {
    entries: HashMap<CascadeOwner, CascadeEntry>,
    provided: HashMap<TypeName, InstanceHandle>,
    non_cascading_prefixes: Vec<String>,
    cascaded: HashSet<InstanceId>,
}

impl CascadingResolver {
    pub fn new(non_cascading_prefixes: Vec<String>) -> Self {
        Self {
            entries: HashMap::new(),
            provided: HashMap::new(),
            non_cascading_prefixes,
            cascaded: HashSet::new(),
        }
    }

    /// Only user reference types cascade. Value types, strings, containers
    /// and system types never do, nor do types under a configured prefix.
    pub fn is_eligible(&self, return_type: &TypeDesc) -> bool {
        match return_type {
            TypeDesc::Reference(name) => !self
                .non_cascading_prefixes
                .iter()
                .any(|prefix| name.as_str().starts_with(prefix.as_str())),
            _ => false,
        }
    }

    /// Use `instance` whenever a member cascades to `type_name`.
    pub fn provide(&mut self, type_name: TypeName, instance: InstanceHandle) {
        debug!(type_name = %type_name, instance = %instance, "cascade instance provided");
        self.provided.insert(type_name, instance);
    }

    /// Instance a call on `owner.member` should return, or `None` to fall
    /// back to the default value.
    ///
    /// Arguments play no part: every call of the member under the same owner
    /// resolves to the same instance.
    pub fn resolve(
        &mut self,
        owner: Option<&InstanceHandle>,
        member: &MemberSignature,
        return_type: &TypeDesc,
        layer: &dyn InstrumentationLayer,
    ) -> Option<InstanceHandle> {
        if !self.is_eligible(return_type) {
            return None;
        }
        let returned = return_type.type_name()?;

        if let Some(owner) = owner {
            if layer.is_assignable(returned, owner.type_name()) {
                debug!(owner = %owner, member = %member, "cascade resolves to owner");
                return Some(owner.clone());
            }
        }
        if let Some(instance) = self.provided.get(returned) {
            return Some(instance.clone());
        }

        let owner_type = owner.map_or(&member.owner, InstanceHandle::type_name).clone();
        let entry = self
            .entries
            .entry(CascadeOwner::of(owner, member))
            .or_insert_with(|| CascadeEntry::new(owner_type));
        let key = (member.descriptor(), returned.clone());
        if let Some(cached) = entry.nested.get(&key) {
            debug!(member = %member, instance = %cached, "cascade cache hit");
            return Some(cached.clone());
        }

        match layer.create_instance(returned) {
            Ok(instance) => {
                debug!(
                    owner_type = %entry.owner_type,
                    member = %member,
                    instance = %instance,
                    "cascade instance created"
                );
                entry.nested.insert(key, instance.clone());
                entry.created.push(instance.clone());
                self.cascaded.insert(instance.id());
                Some(instance)
            }
            Err(e) => {
                warn!(member = %member, error = %e, "cascade instance creation failed");
                None
            }
        }
    }

    /// Whether `instance` was created by cascading.
    pub fn is_cascaded(&self, instance: &InstanceHandle) -> bool {
        self.cascaded.contains(&instance.id())
    }

    pub fn entry(&self, owner: &CascadeOwner) -> Option<&CascadeEntry> {
        self.entries.get(owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockLayer;

    fn resolver() -> CascadingResolver {
        CascadingResolver::new(vec!["std::process::".into()])
    }

    fn getter(owner: &str, name: &str, ret: &str) -> MemberSignature {
        MemberSignature::method(owner, name, vec![], TypeDesc::reference(ret))
    }

    #[test]
    fn repeated_resolution_hits_the_cache() {
        let layer = MockLayer::new();
        let mut r = resolver();
        let owner = InstanceHandle::new("app::Session");
        let m = getter("app::Session", "user", "app::User");

        let first = r.resolve(Some(&owner), &m, &m.return_type, &layer).unwrap();
        let second = r.resolve(Some(&owner), &m, &m.return_type, &layer).unwrap();
        assert!(first.same_instance(&second));
        assert_eq!(layer.created().len(), 1);
        assert!(r.is_cascaded(&first));

        let entry = r.entry(&CascadeOwner::Instance(owner.id())).unwrap();
        assert_eq!(entry.created().len(), 1);
        assert!(entry.get(&m, &TypeName::new("app::User")).is_some());
    }

    #[test]
    fn self_typed_member_returns_owner() {
        let layer = MockLayer::new();
        let mut r = resolver();
        let builder = InstanceHandle::new("app::Builder");
        let m = getter("app::Builder", "with_name", "app::Builder");
        let resolved = r.resolve(Some(&builder), &m, &m.return_type, &layer).unwrap();
        assert!(resolved.same_instance(&builder));
        assert!(layer.created().is_empty());
    }

    #[test]
    fn supertype_return_resolves_to_owner() {
        let layer = MockLayer::new().with_supertype("app::FileStore", "app::Store");
        let mut r = resolver();
        let store = InstanceHandle::new("app::FileStore");
        let m = getter("app::FileStore", "me", "app::Store");
        let resolved = r.resolve(Some(&store), &m, &m.return_type, &layer).unwrap();
        assert!(resolved.same_instance(&store));
    }

    #[test]
    fn ineligible_types_do_not_cascade() {
        let layer = MockLayer::new();
        let mut r = resolver();
        let m = MemberSignature::static_fn("app::Env", "name", vec![], TypeDesc::Str);
        assert!(r.resolve(None, &m, &m.return_type, &layer).is_none());
        assert!(!r.is_eligible(&TypeDesc::list_of(TypeDesc::reference("app::User"))));
        assert!(!r.is_eligible(&TypeDesc::System("app::Thread".into())));
        assert!(!r.is_eligible(&TypeDesc::reference("std::process::Child")));
    }

    #[test]
    fn creation_failure_yields_none() {
        let layer = MockLayer::new().failing_for("app::User");
        let mut r = resolver();
        let m = getter("app::Session", "user", "app::User");
        assert!(r.resolve(None, &m, &m.return_type, &layer).is_none());
    }

    #[test]
    fn provided_instance_wins_over_creation() {
        let layer = MockLayer::new();
        let mut r = resolver();
        let user = InstanceHandle::new("app::User");
        r.provide("app::User".into(), user.clone());
        let m = getter("app::Session", "user", "app::User");
        let resolved = r.resolve(None, &m, &m.return_type, &layer).unwrap();
        assert!(resolved.same_instance(&user));
        assert!(layer.created().is_empty());
    }

    #[test]
    fn owners_have_separate_caches() {
        let layer = MockLayer::new();
        let mut r = resolver();
        let m = getter("app::Session", "user", "app::User");
        let a = r
            .resolve(Some(&InstanceHandle::new("app::Session")), &m, &m.return_type, &layer)
            .unwrap();
        let b = r
            .resolve(Some(&InstanceHandle::new("app::Session")), &m, &m.return_type, &layer)
            .unwrap();
        assert!(!a.same_instance(&b));
    }
}
