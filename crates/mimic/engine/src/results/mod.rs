//! Result producers: what a matched call hands back.

pub mod conversion;
pub mod defaults;
pub mod delegate;
pub mod sequence;

use mimic_types::{Condition, TypeDesc, Value};

use self::delegate::Delegate;
use self::sequence::ValueSequence;

/// The active result strategy of an expectation.
#[derive(Clone, Debug, Default)]
pub enum ResultProducer {
    /// Nothing configured: cascade if possible, else the default value.
    #[default]
    Unconfigured,
    Fixed(Value),
    /// Consecutive values, the last one repeating.
    Sequence(ValueSequence),
    Throw(Condition),
    Delegate(Delegate),
    /// Always the declared return type's default, never cascaded.
    DefaultComputed,
}

/// One step of a producer, resolved by the engine.
#[derive(Debug)]
pub(crate) enum Production {
    Value(Value),
    Throw(Condition),
    Delegate(Delegate),
    Default,
    CascadeOrDefault,
}

impl ResultProducer {
    /// Build the producer for `returns(first, rest...)`.
    ///
    /// Container-typed members get every value poured into one container.
    /// Otherwise a single value is fixed and several become consecutive
    /// results.
    pub fn returns(first: Value, rest: Vec<Value>, declared: &TypeDesc) -> Self {
        if let Some(container) = ValueSequence::coerce(&first, &rest, declared) {
            return ResultProducer::Fixed(container);
        }
        if rest.is_empty() {
            return ResultProducer::Fixed(first);
        }
        let mut values = Vec::with_capacity(rest.len() + 1);
        values.push(first);
        values.extend(rest);
        match ValueSequence::new(values) {
            Some(seq) => ResultProducer::Sequence(seq),
            None => ResultProducer::Unconfigured,
        }
    }

    pub fn is_configured(&self) -> bool {
        !matches!(self, ResultProducer::Unconfigured)
    }

    pub(crate) fn next(&mut self) -> Production {
        match self {
            ResultProducer::Unconfigured => Production::CascadeOrDefault,
            ResultProducer::Fixed(v) => Production::Value(v.clone()),
            ResultProducer::Sequence(seq) => Production::Value(seq.next_value()),
            ResultProducer::Throw(c) => Production::Throw(c.clone()),
            ResultProducer::Delegate(d) => Production::Delegate(d.clone()),
            ResultProducer::DefaultComputed => Production::Default,
        }
    }
}
