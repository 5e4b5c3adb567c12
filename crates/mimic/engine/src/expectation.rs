use std::fmt;

use mimic_types::{InstanceHandle, MemberSignature, TypeName, Value};
use serde::{Deserialize, Serialize};

use crate::constraint::InvocationConstraint;
use crate::matchers::{matches_all, ArgumentMatcher, MatchContext};
use crate::results::ResultProducer;

/// Registration-order index of an expectation within its engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExpectationId(pub usize);

impl fmt::Display for ExpectationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exp#{}", self.0)
    }
}

/// Which calls an expectation is about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// Static-like members of a type.
    Static(TypeName),
    /// One instance, or any instance standing in for it.
    Instance(InstanceHandle),
    /// Every instance whose runtime type is assignable to the given type.
    AnyInstance(TypeName),
}

impl Target {
    pub fn of(target: Option<&InstanceHandle>, member: &MemberSignature) -> Self {
        match target {
            Some(instance) => Target::Instance(instance.clone()),
            None => Target::Static(member.owner.clone()),
        }
    }

    pub fn instance(&self) -> Option<&InstanceHandle> {
        match self {
            Target::Instance(h) => Some(h),
            _ => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Static(t) => write!(f, "{}", t.simple_name()),
            Target::Instance(h) => write!(f, "{}", h),
            Target::AnyInstance(t) => write!(f, "any {}", t.simple_name()),
        }
    }
}

/// Where an expectation came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    Recorded,
    /// Created during replay for a call nothing expected.
    AdHoc,
}

/// How closely a target relates to a call; lower tiers win.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Tier {
    /// Same instance, an equivalent one, the same static owner, or a
    /// constructor of the instantiated type.
    Exact,
    /// A class-level expectation covering the instance's type.
    ClassLevel,
}

/// One expected call: target, positional matchers, count limits and result.
#[derive(Debug)]
pub struct Expectation {
    pub id: ExpectationId,
    pub target: Target,
    pub member: MemberSignature,
    pub generic_signature: Option<String>,
    /// Index-aligned with the member's parameters; `None` accepts anything.
    pub matchers: Vec<Option<ArgumentMatcher>>,
    pub constraint: InvocationConstraint,
    pub producer: ResultProducer,
    pub origin: Origin,
}

impl Expectation {
    pub fn is_recorded(&self) -> bool {
        self.origin == Origin::Recorded
    }

    /// Whether the target and member cover a call, and at which tier.
    pub(crate) fn tier(
        &self,
        target: Option<&InstanceHandle>,
        member: &MemberSignature,
        ctx: &MatchContext<'_>,
    ) -> Option<Tier> {
        if !self.member.same_member(member) {
            return None;
        }
        if self.member.is_constructor() {
            let instantiated = target.map_or(&member.owner, InstanceHandle::type_name);
            let owner = match &self.target {
                Target::AnyInstance(t) => t,
                Target::Static(_) | Target::Instance(_) => &self.member.owner,
            };
            return ctx
                .layer
                .is_assignable(owner, instantiated)
                .then_some(Tier::Exact);
        }
        match (&self.target, target) {
            (Target::Instance(expected), Some(actual)) => ctx
                .equivalence
                .are_equivalent(actual, expected)
                .then_some(Tier::Exact),
            (Target::Static(owner), None) => (owner == &member.owner).then_some(Tier::Exact),
            (Target::AnyInstance(t), Some(actual)) => ctx
                .layer
                .is_assignable(t, actual.type_name())
                .then_some(Tier::ClassLevel),
            (Target::AnyInstance(t), None) => (t == &member.owner).then_some(Tier::ClassLevel),
            _ => None,
        }
    }

    /// Run every positional matcher against `args`.
    pub fn accepts(&mut self, args: &[Value], ctx: &MatchContext<'_>) -> bool {
        matches_all(&mut self.matchers, args, ctx)
    }

    /// Whether `other` is interchangeable with this expectation's matchers.
    pub fn same_matchers(&self, other: &[Option<ArgumentMatcher>]) -> bool {
        self.matchers.len() == other.len()
            && self.matchers.iter().zip(other).all(|(a, b)| match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => a.same_as(b),
                _ => false,
            })
    }

    /// Render the expectation for failure reports: `Cart@3.add(5, any)`.
    pub fn describe(&self) -> String {
        let args: Vec<String> = self
            .matchers
            .iter()
            .map(|m| m.as_ref().map_or_else(|| "any".to_string(), ArgumentMatcher::describe))
            .collect();
        if self.member.is_constructor() {
            return format!("new {}({})", self.member.owner.simple_name(), args.join(", "));
        }
        let separator = match self.target {
            Target::Static(_) => "#",
            Target::Instance(_) | Target::AnyInstance(_) => ".",
        };
        format!(
            "{}{}{}({})",
            self.target,
            separator,
            self.member.name,
            args.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equivalence::EquivalenceMap;
    use crate::mocks::MockLayer;
    use mimic_types::TypeDesc;

    fn expectation(target: Target, member: MemberSignature) -> Expectation {
        Expectation {
            id: ExpectationId(0),
            target,
            member,
            generic_signature: None,
            matchers: vec![Some(ArgumentMatcher::eq(5))],
            constraint: InvocationConstraint::recorded(1),
            producer: ResultProducer::default(),
            origin: Origin::Recorded,
        }
    }

    fn add() -> MemberSignature {
        MemberSignature::method("shop::Cart", "add", vec![TypeDesc::Int], TypeDesc::Bool)
    }

    #[test]
    fn instance_target_requires_equivalent_instance() {
        let layer = MockLayer::new();
        let mut map = EquivalenceMap::new();
        let cart = InstanceHandle::new("shop::Cart");
        let other = InstanceHandle::new("shop::Cart");
        let exp = expectation(Target::Instance(cart.clone()), add());

        let ctx = MatchContext { equivalence: &map, layer: &layer };
        assert_eq!(exp.tier(Some(&cart), &add(), &ctx), Some(Tier::Exact));
        assert_eq!(exp.tier(Some(&other), &add(), &ctx), None);

        map.register(&cart, &other);
        let ctx = MatchContext { equivalence: &map, layer: &layer };
        assert_eq!(exp.tier(Some(&other), &add(), &ctx), Some(Tier::Exact));
    }

    #[test]
    fn class_level_target_uses_assignability() {
        let layer = MockLayer::new().with_supertype("shop::BigCart", "shop::Cart");
        let map = EquivalenceMap::new();
        let ctx = MatchContext { equivalence: &map, layer: &layer };
        let exp = expectation(Target::AnyInstance("shop::Cart".into()), add());

        let big = InstanceHandle::new("shop::BigCart");
        assert_eq!(exp.tier(Some(&big), &add(), &ctx), Some(Tier::ClassLevel));
        assert_eq!(exp.tier(Some(&InstanceHandle::new("shop::Bag")), &add(), &ctx), None);
    }

    #[test]
    fn same_matchers_compares_positionally() {
        let exp = expectation(Target::Static("shop::Cart".into()), add());
        assert!(exp.same_matchers(&[Some(ArgumentMatcher::eq(5))]));
        assert!(!exp.same_matchers(&[None]));
        assert!(!exp.same_matchers(&[Some(ArgumentMatcher::eq(6))]));
    }

    #[test]
    fn describe_renders_matchers() {
        let mut exp = expectation(Target::Static("shop::Cart".into()), add());
        exp.matchers.push(None);
        assert_eq!(exp.describe(), "Cart#add(5, any)");
        assert_eq!(ExpectationId(4).to_string(), "exp#4");
    }
}
