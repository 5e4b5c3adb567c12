use mimic_types::{SharedIter, TypeDesc, Value};

/// Zero or empty value of a declared return type.
///
/// Reference and string types default to null; cascading, when enabled,
/// is tried by the engine before falling back here.
pub fn default_value(declared: &TypeDesc) -> Value {
    match declared {
        TypeDesc::Void => Value::Void,
        TypeDesc::Bool => Value::Bool(false),
        TypeDesc::Byte => Value::Byte(0),
        TypeDesc::Short => Value::Short(0),
        TypeDesc::Int => Value::Int(0),
        TypeDesc::Long => Value::Long(0),
        TypeDesc::Float => Value::Float(0.0),
        TypeDesc::Double => Value::Double(0.0),
        TypeDesc::Char => Value::Char('\0'),
        TypeDesc::Array(element) => Value::array(element.as_ref().clone(), Vec::new()),
        TypeDesc::Iterator(_) => Value::Iterator(SharedIter::empty()),
        TypeDesc::Iterable(_) | TypeDesc::List(_) => Value::List(Vec::new()),
        TypeDesc::Set(_) => Value::Set(Vec::new()),
        TypeDesc::SortedSet(_) => Value::SortedSet(Vec::new()),
        TypeDesc::Optional(_) => Value::Optional(None),
        TypeDesc::Str | TypeDesc::Reference(_) | TypeDesc::System(_) => Value::Null,
    }
}
