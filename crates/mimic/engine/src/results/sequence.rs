//! Multi-value results: container coercion and consecutive values.

use std::collections::VecDeque;

use mimic_types::{SharedIter, TypeDesc, Value};

/// Values handed out one per call. Once a single value is left it repeats
/// for every further call.
#[derive(Clone, Debug)]
pub struct ValueSequence {
    values: VecDeque<Value>,
}

impl ValueSequence {
    /// `None` when `values` is empty.
    pub fn new(values: Vec<Value>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        Some(Self {
            values: values.into(),
        })
    }

    /// Pour `first` and `rest` into the container shape `declared` asks for.
    ///
    /// Returns `None` when the declared type is not a container, or when
    /// `first` already is a ready-made container; the caller then treats the
    /// values as consecutive results. The input slice is never modified.
    pub fn coerce(first: &Value, rest: &[Value], declared: &TypeDesc) -> Option<Value> {
        if is_container(first) {
            return None;
        }
        let all = || std::iter::once(first).chain(rest).cloned();
        match declared {
            TypeDesc::Array(element) => {
                let items = all().map(|v| narrow(v, element)).collect();
                Some(Value::array(element.as_ref().clone(), items))
            }
            TypeDesc::Iterator(_) => Some(Value::Iterator(SharedIter::new(all().collect()))),
            TypeDesc::Iterable(_) | TypeDesc::List(_) => Some(Value::List(all().collect())),
            TypeDesc::Set(_) => Some(Value::set_from(all())),
            TypeDesc::SortedSet(_) => Some(Value::sorted_set_from(all())),
            _ => None,
        }
    }

    /// Next value; the last one is never consumed.
    pub fn next_value(&mut self) -> Value {
        if self.values.len() > 1 {
            if let Some(v) = self.values.pop_front() {
                return v;
            }
        }
        self.values.front().cloned().unwrap_or(Value::Null)
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Array { .. } | Value::Iterator(_)) || value.is_iterable()
}

/// Narrow integral values into byte and short arrays.
fn narrow(value: Value, element: &TypeDesc) -> Value {
    match (element, value.as_i64()) {
        (TypeDesc::Byte, Some(n)) if value.is_numeric() => Value::Byte(n as i8),
        (TypeDesc::Short, Some(n)) if value.is_numeric() => Value::Short(n as i16),
        _ => value,
    }
}
