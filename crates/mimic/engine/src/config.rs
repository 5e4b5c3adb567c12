use serde::{Deserialize, Serialize};

use crate::error::MockError;

/// Configuration for a [`MockEngine`](crate::MockEngine).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Resolve unconfigured reference-typed returns to cascaded mocks (default: true)
    pub cascading: bool,
    /// Minimum invocation count for recorded expectations (default: 1)
    pub recorded_min_times: u32,
    /// Near misses rendered in a missing-invocation report (default: 8)
    pub max_near_misses: usize,
    /// Type name prefixes that are never cascaded.
    pub non_cascading_prefixes: Vec<String>,
    /// While recording, chained calls on reference-returning members yield the
    /// cascaded instance so the chain can be recorded further (default: true)
    pub record_returns_cascade: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cascading: true,
            recorded_min_times: 1,
            max_near_misses: 8,
            non_cascading_prefixes: vec!["std::process::".into(), "std::thread::".into()],
            record_returns_cascade: true,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, MockError> {
        serde_json::from_str(json).map_err(|e| MockError::Config(e.to_string()))
    }

    pub fn without_cascading(mut self) -> Self {
        self.cascading = false;
        self
    }
}
