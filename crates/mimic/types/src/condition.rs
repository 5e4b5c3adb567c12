use std::fmt;

use serde::{Deserialize, Serialize};

/// A failure to be raised in the intercepted code.
///
/// The instrumentation layer maps it onto the native failure mechanism of the
/// code under test.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Name of the failure kind, e.g. `io::Error`.
    pub kind: String,
    pub message: String,
}

impl Condition {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
