use std::fmt;

use serde::{Deserialize, Serialize};

/// Fully qualified name of a user-visible type, e.g. `shop::Cart`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeName(pub String);

impl TypeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment, used when rendering diagnostics.
    pub fn simple_name(&self) -> &str {
        self.0.rsplit("::").next().unwrap_or(&self.0)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TypeName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Declared type of a parameter or return value.
///
/// Container variants carry their element type. `Iterable` stands for a
/// generic collection whose concrete kind is left to the producer (list
/// semantics), while `List`, `Set` and `SortedSet` pin it down.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeDesc {
    Void,
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Char,
    Str,
    Array(Box<TypeDesc>),
    Iterator(Box<TypeDesc>),
    Iterable(Box<TypeDesc>),
    List(Box<TypeDesc>),
    /// Insertion-ordered set.
    Set(Box<TypeDesc>),
    SortedSet(Box<TypeDesc>),
    Optional(Box<TypeDesc>),
    /// A user-declared, mockable reference type.
    Reference(TypeName),
    /// Runtime control-flow types (processes, threads) that are never mocked.
    System(TypeName),
}

impl TypeDesc {
    pub fn reference(name: impl Into<String>) -> Self {
        TypeDesc::Reference(TypeName::new(name))
    }

    pub fn array_of(element: TypeDesc) -> Self {
        TypeDesc::Array(Box::new(element))
    }

    pub fn list_of(element: TypeDesc) -> Self {
        TypeDesc::List(Box::new(element))
    }

    pub fn set_of(element: TypeDesc) -> Self {
        TypeDesc::Set(Box::new(element))
    }

    pub fn sorted_set_of(element: TypeDesc) -> Self {
        TypeDesc::SortedSet(Box::new(element))
    }

    pub fn iterator_of(element: TypeDesc) -> Self {
        TypeDesc::Iterator(Box::new(element))
    }

    pub fn iterable_of(element: TypeDesc) -> Self {
        TypeDesc::Iterable(Box::new(element))
    }

    pub fn optional_of(element: TypeDesc) -> Self {
        TypeDesc::Optional(Box::new(element))
    }

    /// Primitive value types cannot hold null.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            TypeDesc::Bool
                | TypeDesc::Byte
                | TypeDesc::Short
                | TypeDesc::Int
                | TypeDesc::Long
                | TypeDesc::Float
                | TypeDesc::Double
                | TypeDesc::Char
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            TypeDesc::Byte
                | TypeDesc::Short
                | TypeDesc::Int
                | TypeDesc::Long
                | TypeDesc::Float
                | TypeDesc::Double
        )
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeDesc::Void)
    }

    /// Collection-like types a sequence of values can be poured into.
    pub fn is_iterable(&self) -> bool {
        matches!(
            self,
            TypeDesc::Iterable(_) | TypeDesc::List(_) | TypeDesc::Set(_) | TypeDesc::SortedSet(_)
        )
    }

    /// Element type for arrays, iterators, collections and optionals.
    pub fn element(&self) -> Option<&TypeDesc> {
        match self {
            TypeDesc::Array(e)
            | TypeDesc::Iterator(e)
            | TypeDesc::Iterable(e)
            | TypeDesc::List(e)
            | TypeDesc::Set(e)
            | TypeDesc::SortedSet(e)
            | TypeDesc::Optional(e) => Some(e),
            _ => None,
        }
    }

    /// Name of a reference or system type.
    pub fn type_name(&self) -> Option<&TypeName> {
        match self {
            TypeDesc::Reference(name) | TypeDesc::System(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Void => f.write_str("void"),
            TypeDesc::Bool => f.write_str("bool"),
            TypeDesc::Byte => f.write_str("byte"),
            TypeDesc::Short => f.write_str("short"),
            TypeDesc::Int => f.write_str("int"),
            TypeDesc::Long => f.write_str("long"),
            TypeDesc::Float => f.write_str("float"),
            TypeDesc::Double => f.write_str("double"),
            TypeDesc::Char => f.write_str("char"),
            TypeDesc::Str => f.write_str("String"),
            TypeDesc::Array(e) => write!(f, "{}[]", e),
            TypeDesc::Iterator(e) => write!(f, "Iterator<{}>", e),
            TypeDesc::Iterable(e) => write!(f, "Iterable<{}>", e),
            TypeDesc::List(e) => write!(f, "List<{}>", e),
            TypeDesc::Set(e) => write!(f, "Set<{}>", e),
            TypeDesc::SortedSet(e) => write!(f, "SortedSet<{}>", e),
            TypeDesc::Optional(e) => write!(f, "Optional<{}>", e),
            TypeDesc::Reference(name) | TypeDesc::System(name) => write!(f, "{}", name.simple_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_classification() {
        assert!(TypeDesc::Int.is_primitive());
        assert!(TypeDesc::Char.is_primitive());
        assert!(!TypeDesc::Str.is_primitive());
        assert!(!TypeDesc::reference("shop::Cart").is_primitive());
        assert!(!TypeDesc::Char.is_numeric());
    }

    #[test]
    fn display_renders_nested_types() {
        let ty = TypeDesc::list_of(TypeDesc::array_of(TypeDesc::reference("shop::Item")));
        assert_eq!(ty.to_string(), "List<Item[]>");
    }

    #[test]
    fn type_desc_serde_roundtrip() {
        let ty = TypeDesc::sorted_set_of(TypeDesc::Long);
        let json = serde_json::to_string(&ty).unwrap();
        let back: TypeDesc = serde_json::from_str(&json).unwrap();
        assert_eq!(ty, back);
    }
}
