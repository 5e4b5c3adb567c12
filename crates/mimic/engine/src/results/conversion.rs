use mimic_types::{MemberSignature, TypeDesc, TypeName, Value};

use crate::error::MockError;
use crate::layer::InstrumentationLayer;
use crate::results::defaults::default_value;

/// Fit a delegate's value to the member's declared return type.
///
/// Conforming values pass through. Otherwise numeric widening/narrowing,
/// numeric parsing of strings, optional wrapping and list/array reshaping
/// are tried before giving up with `IncompatibleReturnType`.
pub fn convert_return(
    value: Value,
    declared: &TypeDesc,
    member: &MemberSignature,
    layer: &dyn InstrumentationLayer,
) -> Result<Value, MockError> {
    if let (Value::Null, TypeDesc::Optional(_)) = (&value, declared) {
        return Ok(Value::Optional(None));
    }
    let assignable = |t: &TypeName, s: &TypeName| layer.is_assignable(t, s);
    if value.conforms_to(declared, &assignable) {
        return Ok(value);
    }
    if declared.is_void() {
        return Ok(Value::Void);
    }
    if matches!(value, Value::Void) {
        if declared.is_primitive() {
            return Err(incompatible(member, declared, &value));
        }
        return Ok(default_value(declared));
    }
    convert(&value, declared, &assignable).ok_or_else(|| incompatible(member, declared, &value))
}

fn convert(
    value: &Value,
    declared: &TypeDesc,
    assignable: &dyn Fn(&TypeName, &TypeName) -> bool,
) -> Option<Value> {
    match (value, declared) {
        (Value::Null, TypeDesc::Optional(_)) => return Some(Value::Optional(None)),
        (v, ty) if v.conforms_to(ty, assignable) => return Some(v.clone()),
        _ => {}
    }
    match (value, declared) {
        (v, ty) if v.is_numeric() && ty.is_numeric() => numeric(v.as_f64()?, v.as_i64()?, ty),
        (Value::Str(s), ty) if ty.is_numeric() => {
            let s = s.trim();
            match ty {
                TypeDesc::Float | TypeDesc::Double => {
                    let f: f64 = s.parse().ok()?;
                    numeric(f, f as i64, ty)
                }
                _ => {
                    let n: i64 = s.parse().ok()?;
                    numeric(n as f64, n, ty)
                }
            }
        }
        (v, TypeDesc::Optional(inner)) => {
            let wrapped = convert(v, inner, assignable)?;
            Some(Value::Optional(Some(Box::new(wrapped))))
        }
        (Value::List(items) | Value::Set(items) | Value::SortedSet(items), TypeDesc::Array(element)) => {
            let converted = items
                .iter()
                .map(|item| convert(item, element, assignable))
                .collect::<Option<Vec<_>>>()?;
            Some(Value::array(element.as_ref().clone(), converted))
        }
        (Value::Array { items, .. }, TypeDesc::List(_) | TypeDesc::Iterable(_)) => {
            Some(Value::List(items.clone()))
        }
        (Value::Array { items, .. }, TypeDesc::Set(_)) => Some(Value::set_from(items.clone())),
        (Value::Array { items, .. }, TypeDesc::SortedSet(_)) => {
            Some(Value::sorted_set_from(items.clone()))
        }
        _ => None,
    }
}

fn numeric(f: f64, n: i64, declared: &TypeDesc) -> Option<Value> {
    Some(match declared {
        TypeDesc::Byte => Value::Byte(n as i8),
        TypeDesc::Short => Value::Short(n as i16),
        TypeDesc::Int => Value::Int(n as i32),
        TypeDesc::Long => Value::Long(n),
        TypeDesc::Float => Value::Float(f as f32),
        TypeDesc::Double => Value::Double(f),
        _ => return None,
    })
}

fn incompatible(member: &MemberSignature, declared: &TypeDesc, value: &Value) -> MockError {
    MockError::IncompatibleReturnType {
        member: member.to_string(),
        declared: declared.clone(),
        actual: format!("{} ({})", value, value.kind_name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockLayer;

    fn member(ret: TypeDesc) -> MemberSignature {
        MemberSignature::method("m::Svc", "get", vec![], ret)
    }

    fn run(value: Value, declared: TypeDesc) -> Result<Value, MockError> {
        let layer = MockLayer::new();
        convert_return(value, &declared, &member(declared.clone()), &layer)
    }

    #[test]
    fn conforming_values_pass_through() {
        assert_eq!(run(Value::Int(3), TypeDesc::Int).unwrap(), Value::Int(3));
        assert_eq!(run(Value::Null, TypeDesc::Str).unwrap(), Value::Null);
    }

    #[test]
    fn numerics_convert() {
        assert_eq!(run(Value::Int(3), TypeDesc::Long).unwrap(), Value::Long(3));
        assert_eq!(run(Value::Double(2.9), TypeDesc::Int).unwrap(), Value::Int(2));
        assert_eq!(run(Value::str("42"), TypeDesc::Int).unwrap(), Value::Int(42));
    }

    #[test]
    fn wraps_into_optional() {
        assert_eq!(
            run(Value::Int(1), TypeDesc::optional_of(TypeDesc::Long)).unwrap(),
            Value::Optional(Some(Box::new(Value::Long(1))))
        );
        assert_eq!(
            run(Value::Null, TypeDesc::optional_of(TypeDesc::Str)).unwrap(),
            Value::Optional(None)
        );
    }

    #[test]
    fn null_inside_a_list_becomes_an_empty_optional() {
        let converted = run(
            Value::List(vec![Value::Null, Value::Int(2)]),
            TypeDesc::array_of(TypeDesc::optional_of(TypeDesc::Int)),
        )
        .unwrap();
        assert_eq!(
            converted,
            Value::array(
                TypeDesc::optional_of(TypeDesc::Int),
                vec![Value::Optional(None), Value::Optional(Some(Box::new(Value::Int(2))))]
            )
        );
    }

    #[test]
    fn list_becomes_array() {
        let converted = run(
            Value::List(vec![Value::Int(1), Value::Int(2)]),
            TypeDesc::array_of(TypeDesc::Long),
        )
        .unwrap();
        assert_eq!(
            converted,
            Value::array(TypeDesc::Long, vec![Value::Long(1), Value::Long(2)])
        );
    }

    #[test]
    fn void_for_primitive_is_incompatible() {
        let err = run(Value::Void, TypeDesc::Int).unwrap_err();
        assert!(matches!(err, MockError::IncompatibleReturnType { .. }));
        assert_eq!(run(Value::Void, TypeDesc::Str).unwrap(), Value::Null);
    }

    #[test]
    fn unrelated_value_is_incompatible() {
        let err = run(Value::Bool(true), TypeDesc::Str).unwrap_err();
        let MockError::IncompatibleReturnType { actual, .. } = err else {
            panic!("wrong error");
        };
        assert_eq!(actual, "true (bool)");
        assert!(run(Value::str("abc"), TypeDesc::Int).is_err());
    }
}
