use std::collections::HashMap;

use mimic_types::{InstanceHandle, InstanceId};

/// Instances that stand in for each other during matching.
///
/// Maps a replacement instance to the one it replaces, e.g. the object built
/// by a real constructor call to the one recorded for that constructor.
#[derive(Debug, Default)]
pub struct EquivalenceMap {
    replacements: HashMap<InstanceId, InstanceHandle>,
}

impl EquivalenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `new` interchangeable with `old`. Registering an instance with
    /// itself, or two instances already related, is a no-op.
    pub fn register(&mut self, old: &InstanceHandle, new: &InstanceHandle) {
        let original = self.root(old);
        let replaced = self.root(new);
        if original.same_instance(&replaced) {
            return;
        }
        // Every entry points straight at its root, so lookups stay one hop
        // deep whatever order the pairs arrive in.
        for root in self.replacements.values_mut() {
            if root.same_instance(&replaced) {
                *root = original.clone();
            }
        }
        self.replacements.insert(replaced.id(), original);
    }

    fn root(&self, instance: &InstanceHandle) -> InstanceHandle {
        self.original_of(instance).unwrap_or(instance).clone()
    }

    /// The instance `instance` replaces, if any.
    pub fn original_of(&self, instance: &InstanceHandle) -> Option<&InstanceHandle> {
        self.replacements.get(&instance.id())
    }

    pub fn are_equivalent(&self, a: &InstanceHandle, b: &InstanceHandle) -> bool {
        if a.same_instance(b) {
            return true;
        }
        let root_a = self.original_of(a).map_or(a.id(), InstanceHandle::id);
        let root_b = self.original_of(b).map_or(b.id(), InstanceHandle::id);
        root_a == root_b
    }

    pub fn len(&self) -> usize {
        self.replacements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_relates_both_directions() {
        let mut map = EquivalenceMap::new();
        let old = InstanceHandle::new("a::Conn");
        let new = InstanceHandle::new("a::Conn");
        map.register(&old, &new);

        assert!(map.are_equivalent(&new, &old));
        assert!(map.are_equivalent(&old, &new));
        assert_eq!(map.original_of(&new), Some(&old));
        assert!(map.original_of(&old).is_none());
    }

    #[test]
    fn chains_collapse_to_the_original() {
        let mut map = EquivalenceMap::new();
        let first = InstanceHandle::new("a::Conn");
        let second = InstanceHandle::new("a::Conn");
        let third = InstanceHandle::new("a::Conn");
        map.register(&first, &second);
        map.register(&second, &third);

        assert_eq!(map.original_of(&third), Some(&first));
        assert!(map.are_equivalent(&third, &second));
    }

    #[test]
    fn later_registration_keeps_earlier_pairs() {
        let mut map = EquivalenceMap::new();
        let a = InstanceHandle::new("a::Conn");
        let b = InstanceHandle::new("a::Conn");
        let z = InstanceHandle::new("a::Conn");
        map.register(&a, &b);
        map.register(&z, &a);

        assert!(map.are_equivalent(&b, &a));
        assert!(map.are_equivalent(&a, &z));
        assert!(map.are_equivalent(&b, &z));
        assert_eq!(map.original_of(&b), Some(&z));
        assert_eq!(map.original_of(&a), Some(&z));
    }

    #[test]
    fn joining_two_groups_relates_every_member() {
        let mut map = EquivalenceMap::new();
        let a = InstanceHandle::new("a::Conn");
        let b = InstanceHandle::new("a::Conn");
        let c = InstanceHandle::new("a::Conn");
        let d = InstanceHandle::new("a::Conn");
        map.register(&a, &b);
        map.register(&c, &d);
        map.register(&b, &d);

        for x in [&a, &b, &c, &d] {
            for y in [&a, &b, &c, &d] {
                assert!(map.are_equivalent(x, y));
            }
        }
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn registering_related_pair_again_changes_nothing() {
        let mut map = EquivalenceMap::new();
        let a = InstanceHandle::new("a::Conn");
        let b = InstanceHandle::new("a::Conn");
        map.register(&a, &b);
        map.register(&b, &a);

        assert_eq!(map.original_of(&b), Some(&a));
        assert!(map.original_of(&a).is_none());
    }

    #[test]
    fn self_registration_is_ignored() {
        let mut map = EquivalenceMap::new();
        let only = InstanceHandle::new("a::Conn");
        map.register(&only, &only);
        assert!(map.is_empty());
    }

    #[test]
    fn unrelated_instances_are_not_equivalent() {
        let map = EquivalenceMap::new();
        assert!(!map.are_equivalent(&InstanceHandle::new("a::X"), &InstanceHandle::new("a::X")));
    }
}
