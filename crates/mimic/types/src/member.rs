use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{TypeDesc, TypeName};

/// How a member is dispatched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberKind {
    /// Instance method, invoked on a receiver.
    Method,
    /// Static-like function with no receiver.
    Static,
    Constructor,
}

/// Signature of a mockable member.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberSignature {
    /// Declaring type.
    pub owner: TypeName,
    pub name: String,
    pub params: Vec<TypeDesc>,
    pub return_type: TypeDesc,
    pub kind: MemberKind,
}

impl MemberSignature {
    pub fn method(
        owner: impl Into<TypeName>,
        name: impl Into<String>,
        params: Vec<TypeDesc>,
        return_type: TypeDesc,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            params,
            return_type,
            kind: MemberKind::Method,
        }
    }

    pub fn static_fn(
        owner: impl Into<TypeName>,
        name: impl Into<String>,
        params: Vec<TypeDesc>,
        return_type: TypeDesc,
    ) -> Self {
        Self {
            kind: MemberKind::Static,
            ..Self::method(owner, name, params, return_type)
        }
    }

    pub fn constructor(owner: impl Into<TypeName>, params: Vec<TypeDesc>) -> Self {
        Self {
            kind: MemberKind::Constructor,
            ..Self::method(owner, "<init>", params, TypeDesc::Void)
        }
    }

    pub fn is_constructor(&self) -> bool {
        self.kind == MemberKind::Constructor
    }

    pub fn is_static(&self) -> bool {
        self.kind == MemberKind::Static
    }

    /// Name plus parameter and return types, independent of the owner:
    /// `find(int,String)->Item`.
    pub fn descriptor(&self) -> String {
        let params: Vec<String> = self.params.iter().map(ToString::to_string).collect();
        format!("{}({})->{}", self.name, params.join(","), self.return_type)
    }

    /// Whether `other` denotes the same member, ignoring which type in a
    /// hierarchy declared it.
    pub fn same_member(&self, other: &MemberSignature) -> bool {
        self.kind == other.kind
            && self.name == other.name
            && self.params == other.params
            && self.return_type == other.return_type
    }
}

impl fmt::Display for MemberSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.params.iter().map(ToString::to_string).collect();
        match self.kind {
            MemberKind::Constructor => {
                write!(f, "{}({})", self.owner.simple_name(), params.join(", "))
            }
            _ => write!(
                f,
                "{}#{}({})",
                self.owner.simple_name(),
                self.name,
                params.join(", ")
            ),
        }
    }
}
