//! Evaluation windows (business time).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The time window one evaluation pass reasons over.
///
/// Signal providers are queried for this window, and an OPEN suggestion whose
/// window end has passed without a decision expires.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl EvaluationWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, DomainError> {
        if end <= start {
            return Err(DomainError::validation(
                "evaluation window end must be after start",
            ));
        }
        Ok(Self { start, end })
    }

    /// Window of `duration` starting at `start`.
    pub fn starting_at(start: DateTime<Utc>, duration: Duration) -> Result<Self, DomainError> {
        Self::new(start, start + duration)
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// True once the window end has passed (time-driven expiry trigger).
    pub fn has_elapsed(&self, now: DateTime<Utc>) -> bool {
        now >= self.end
    }
}
