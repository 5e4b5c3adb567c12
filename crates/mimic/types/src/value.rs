use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::instance::InstanceHandle;
use crate::types::{TypeDesc, TypeName};

/// Single-pass iterator shared by every clone of the value holding it.
///
/// Clones share the cursor, so a value handed out twice is consumed once.
#[derive(Clone)]
pub struct SharedIter(Arc<Mutex<VecDeque<Value>>>);

impl SharedIter {
    pub fn new(values: Vec<Value>) -> Self {
        Self(Arc::new(Mutex::new(values.into())))
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Take the next element; `None` once exhausted. There is no rewind.
    pub fn next(&self) -> Option<Value> {
        self.0.lock().pop_front()
    }

    pub fn remaining(&self) -> usize {
        self.0.lock().len()
    }

    pub fn ptr_eq(&self, other: &SharedIter) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for SharedIter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedIter")
            .field("remaining", &self.remaining())
            .finish()
    }
}

/// A runtime value crossing the interception boundary.
///
/// `Set` keeps insertion order with duplicates removed, `SortedSet` keeps
/// its elements in [`Value::total_cmp`] order. Instances compare by identity.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    /// Result of a member declared to return nothing.
    Void,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    Str(String),
    Array {
        element: TypeDesc,
        items: Vec<Value>,
    },
    List(Vec<Value>),
    Set(Vec<Value>),
    SortedSet(Vec<Value>),
    Iterator(SharedIter),
    Optional(Option<Box<Value>>),
    Instance(InstanceHandle),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn array(element: TypeDesc, items: Vec<Value>) -> Self {
        Value::Array { element, items }
    }

    /// Build an insertion-ordered set, dropping later duplicates.
    pub fn set_from(values: impl IntoIterator<Item = Value>) -> Self {
        let mut items: Vec<Value> = Vec::new();
        for v in values {
            if !items.iter().any(|existing| existing.equals(&v)) {
                items.push(v);
            }
        }
        Value::Set(items)
    }

    /// Build a sorted set, dropping duplicates.
    pub fn sorted_set_from(values: impl IntoIterator<Item = Value>) -> Self {
        let mut items: Vec<Value> = values.into_iter().collect();
        items.sort_by(Value::total_cmp);
        items.dedup_by(|a, b| a.equals(b));
        Value::SortedSet(items)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_instance(&self) -> Option<&InstanceHandle> {
        match self {
            Value::Instance(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integral view of numeric and char values.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(v) => Some(i64::from(*v)),
            Value::Short(v) => Some(i64::from(*v)),
            Value::Int(v) => Some(i64::from(*v)),
            Value::Long(v) => Some(*v),
            Value::Float(v) => Some(*v as i64),
            Value::Double(v) => Some(*v as i64),
            Value::Char(c) => Some(i64::from(u32::from(*c))),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            other => other.as_i64().map(|n| n as f64),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Byte(_)
                | Value::Short(_)
                | Value::Int(_)
                | Value::Long(_)
                | Value::Float(_)
                | Value::Double(_)
        )
    }

    /// Whether the value is already a container a sequence would be poured into.
    pub fn is_iterable(&self) -> bool {
        matches!(self, Value::List(_) | Value::Set(_) | Value::SortedSet(_))
    }

    /// Short name of the runtime kind, for diagnostics.
    pub fn kind_name(&self) -> String {
        match self {
            Value::Null => "null".into(),
            Value::Void => "void".into(),
            Value::Bool(_) => "bool".into(),
            Value::Byte(_) => "byte".into(),
            Value::Short(_) => "short".into(),
            Value::Int(_) => "int".into(),
            Value::Long(_) => "long".into(),
            Value::Float(_) => "float".into(),
            Value::Double(_) => "double".into(),
            Value::Char(_) => "char".into(),
            Value::Str(_) => "String".into(),
            Value::Array { element, .. } => format!("{}[]", element),
            Value::List(_) => "List".into(),
            Value::Set(_) => "Set".into(),
            Value::SortedSet(_) => "SortedSet".into(),
            Value::Iterator(_) => "Iterator".into(),
            Value::Optional(_) => "Optional".into(),
            Value::Instance(h) => h.type_name().simple_name().to_string(),
        }
    }

    /// Structural equality: same variant and same contents, instances by identity,
    /// iterators by shared cursor.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) | (Value::Void, Value::Void) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (
                Value::Array {
                    element: ea,
                    items: a,
                },
                Value::Array {
                    element: eb,
                    items: b,
                },
            ) => ea == eb && all_equal(a, b),
            (Value::List(a), Value::List(b)) | (Value::SortedSet(a), Value::SortedSet(b)) => {
                all_equal(a, b)
            }
            (Value::Set(a), Value::Set(b)) => {
                a.len() == b.len() && a.iter().all(|x| b.iter().any(|y| x.equals(y)))
            }
            (Value::Iterator(a), Value::Iterator(b)) => a.ptr_eq(b),
            (Value::Optional(a), Value::Optional(b)) => match (a, b) {
                (Some(x), Some(y)) => x.equals(y),
                (None, None) => true,
                _ => false,
            },
            (Value::Instance(a), Value::Instance(b)) => a.same_instance(b),
            _ => false,
        }
    }

    /// Total order used by sorted sets: first by kind, then by content.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        let by_rank = self.rank().cmp(&other.rank());
        if by_rank != Ordering::Equal {
            return by_rank;
        }
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Instance(a), Value::Instance(b)) => a.id().cmp(&b.id()),
            (a, b) if a.is_numeric() || matches!(a, Value::Char(_)) => {
                let x = a.as_f64().unwrap_or_default();
                let y = b.as_f64().unwrap_or_default();
                x.total_cmp(&y)
            }
            (a, b) => a.to_string().cmp(&b.to_string()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Void => 1,
            Value::Bool(_) => 2,
            Value::Byte(_)
            | Value::Short(_)
            | Value::Int(_)
            | Value::Long(_)
            | Value::Float(_)
            | Value::Double(_) => 3,
            Value::Char(_) => 4,
            Value::Str(_) => 5,
            Value::Array { .. } => 6,
            Value::List(_) => 7,
            Value::Set(_) => 8,
            Value::SortedSet(_) => 9,
            Value::Iterator(_) => 10,
            Value::Optional(_) => 11,
            Value::Instance(_) => 12,
        }
    }

    /// Whether this value may be returned where `declared` is expected without
    /// conversion. `assignable(target, source)` answers subtype questions for
    /// instance values.
    pub fn conforms_to(
        &self,
        declared: &TypeDesc,
        assignable: &dyn Fn(&TypeName, &TypeName) -> bool,
    ) -> bool {
        match (self, declared) {
            (Value::Void, TypeDesc::Void) => true,
            (Value::Null, ty) => !ty.is_primitive() && !ty.is_void(),
            (Value::Bool(_), TypeDesc::Bool)
            | (Value::Byte(_), TypeDesc::Byte)
            | (Value::Short(_), TypeDesc::Short)
            | (Value::Int(_), TypeDesc::Int)
            | (Value::Long(_), TypeDesc::Long)
            | (Value::Float(_), TypeDesc::Float)
            | (Value::Double(_), TypeDesc::Double)
            | (Value::Char(_), TypeDesc::Char)
            | (Value::Str(_), TypeDesc::Str)
            | (Value::Iterator(_), TypeDesc::Iterator(_))
            | (Value::Optional(_), TypeDesc::Optional(_))
            | (Value::List(_), TypeDesc::List(_) | TypeDesc::Iterable(_))
            | (Value::Set(_), TypeDesc::Set(_) | TypeDesc::Iterable(_))
            | (Value::SortedSet(_), TypeDesc::SortedSet(_) | TypeDesc::Set(_) | TypeDesc::Iterable(_)) => {
                true
            }
            (Value::Array { element, .. }, TypeDesc::Array(expected)) => {
                element == expected.as_ref()
                    || matches!(
                        (element, expected.as_ref()),
                        (TypeDesc::Reference(a), TypeDesc::Reference(b)) if assignable(b, a)
                    )
            }
            (Value::Instance(h), TypeDesc::Reference(name) | TypeDesc::System(name)) => {
                assignable(name, h.type_name())
            }
            _ => false,
        }
    }
}

fn all_equal(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<InstanceHandle> for Value {
    fn from(h: InstanceHandle) -> Self {
        Value::Instance(h)
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[Value], close: &str) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    f.write_str(close)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Void => f.write_str("void"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Short(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}L", v),
            Value::Float(v) => write!(f, "{}F", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Char(c) => write!(f, "'{}'", c),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Array { items, .. } => write_seq(f, "[", items, "]"),
            Value::List(items) | Value::Set(items) | Value::SortedSet(items) => {
                write_seq(f, "{", items, "}")
            }
            Value::Iterator(it) => write!(f, "<iterator, {} remaining>", it.remaining()),
            Value::Optional(Some(v)) => write!(f, "Optional[{}]", v),
            Value::Optional(None) => f.write_str("Optional.empty"),
            Value::Instance(h) => write!(f, "{}", h),
        }
    }
}
