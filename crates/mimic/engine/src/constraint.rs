use serde::{Deserialize, Serialize};

use crate::error::MockError;

/// Minimum / maximum permitted call counts plus the count so far.
///
/// The count only ever grows within a test. `max == None` means unbounded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationConstraint {
    min: u32,
    max: Option<u32>,
    count: u32,
}

impl InvocationConstraint {
    /// Constraint for an expectation recorded during setup.
    pub fn recorded(min: u32) -> Self {
        Self {
            min,
            max: None,
            count: 0,
        }
    }

    /// Constraint for an expectation created on the fly during replay.
    pub fn ad_hoc() -> Self {
        Self::recorded(0)
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> Option<u32> {
        self.max
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Replace both limits, rejecting `min > max`.
    pub fn set_limits(&mut self, min: u32, max: Option<u32>) -> Result<(), MockError> {
        if let Some(max) = max {
            if min > max {
                return Err(MockError::InvalidConstraint { min, max });
            }
        }
        self.min = min;
        self.max = max;
        Ok(())
    }

    pub fn set_min_times(&mut self, min: u32) -> Result<(), MockError> {
        self.set_limits(min, self.max)
    }

    pub fn set_max_times(&mut self, max: u32) -> Result<(), MockError> {
        self.set_limits(self.min.min(max), Some(max))
    }

    /// Exactly `times` calls.
    pub fn set_times(&mut self, times: u32) -> Result<(), MockError> {
        self.set_limits(times, Some(times))
    }

    /// No further call fits under the maximum.
    pub fn is_exhausted(&self) -> bool {
        self.max.is_some_and(|max| self.count >= max)
    }

    pub fn is_below_minimum(&self) -> bool {
        self.count < self.min
    }

    /// Count one call; returns the new count.
    pub fn increment(&mut self) -> u32 {
        self.count = self.count.saturating_add(1);
        self.count
    }
}
