//! Factor vocabulary: the independently-sourced signals a score is built from.

use serde::{Deserialize, Serialize};

/// One independently-sourced signal contributing to a suggestion's score.
///
/// The set is fixed here but extensible without changing the scoring
/// contract: the scorer, explainer, and feedback adapter only ever iterate
/// whatever kinds appear in a factor vector or weight table. Enumeration
/// order is the deterministic tie-break everywhere ordering matters.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    /// Forecast demand pressure at the subject's location.
    Demand,
    /// How hard the unit/fleet slice is currently working.
    Utilization,
    /// Machine health from telematics/anomaly scoring.
    Health,
    /// Distance/effort to act (transport cost proxy).
    Proximity,
    /// Risk of breaching a service-level commitment.
    SlaRisk,
    /// Local inventory surplus or deficit.
    Inventory,
    /// Contract calendar pressure (rental end, bookings).
    Calendar,
    /// Carbon cost or saving of the action.
    Carbon,
}

impl FactorKind {
    pub const ALL: [FactorKind; 8] = [
        FactorKind::Demand,
        FactorKind::Utilization,
        FactorKind::Health,
        FactorKind::Proximity,
        FactorKind::SlaRisk,
        FactorKind::Inventory,
        FactorKind::Calendar,
        FactorKind::Carbon,
    ];

    /// Short human label used in explanation clauses.
    pub fn label(&self) -> &'static str {
        match self {
            FactorKind::Demand => "demand",
            FactorKind::Utilization => "utilization",
            FactorKind::Health => "health",
            FactorKind::Proximity => "proximity",
            FactorKind::SlaRisk => "SLA risk",
            FactorKind::Inventory => "inventory",
            FactorKind::Calendar => "calendar",
            FactorKind::Carbon => "carbon",
        }
    }
}

impl core::fmt::Display for FactorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// Categorical machine-health state, ordered by severity.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Warning,
    Critical,
}

impl HealthState {
    pub const COUNT: usize = 4;

    /// Position in the ordered severity table (0 = healthy).
    pub fn severity_rank(&self) -> usize {
        match self {
            HealthState::Healthy => 0,
            HealthState::Degraded => 1,
            HealthState::Warning => 2,
            HealthState::Critical => 3,
        }
    }
}

/// Raw provider output before normalization.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RawSignal {
    /// Numeric magnitude or ratio; range semantics are per-kind config.
    Numeric(f64),
    /// Categorical health state.
    Health(HealthState),
    /// Boolean condition (e.g. "SLA breach imminent").
    Flag(bool),
}

/// A normalized factor: what the scorer actually consumes.
///
/// `normalized` is always in `[-1, 1]`, `confidence` in `[0, 1]`. A factor
/// defaulted for an unavailable provider carries `raw = None`,
/// `normalized = 0`, `confidence = 0`. Absence of one signal never aborts
/// scoring of a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorValue {
    pub kind: FactorKind,
    pub raw: Option<RawSignal>,
    pub normalized: f64,
    pub confidence: f64,
}

impl FactorValue {
    /// Neutral placeholder for a missing/unreachable provider.
    pub fn neutral(kind: FactorKind) -> Self {
        Self {
            kind,
            raw: None,
            normalized: 0.0,
            confidence: 0.0,
        }
    }

    /// True if this factor was defaulted rather than observed.
    pub fn is_defaulted(&self) -> bool {
        self.raw.is_none()
    }
}

/// One factor's signed share of a score.
///
/// Contributions are the exact decomposition the scorer summed (not an
/// approximation), so they can be replayed by the explainer and the feedback
/// adapter without re-deriving anything.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorContribution {
    pub kind: FactorKind,
    pub contribution: f64,
}

impl FactorContribution {
    pub fn new(kind: FactorKind, contribution: f64) -> Self {
        Self { kind, contribution }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ranks_are_strictly_ordered() {
        let ranks: Vec<usize> = [
            HealthState::Healthy,
            HealthState::Degraded,
            HealthState::Warning,
            HealthState::Critical,
        ]
        .iter()
        .map(|s| s.severity_rank())
        .collect();
        assert_eq!(ranks, vec![0, 1, 2, 3]);
    }

    #[test]
    fn neutral_factor_is_flagged_defaulted() {
        let f = FactorValue::neutral(FactorKind::Demand);
        assert!(f.is_defaulted());
        assert_eq!(f.normalized, 0.0);
        assert_eq!(f.confidence, 0.0);
    }
}
