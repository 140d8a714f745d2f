//! Signal normalization: heterogeneous provider outputs onto `[-1, 1]`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::factor::{FactorKind, FactorValue, HealthState, RawSignal};
use crate::provider::Reading;

/// Normalization failure. Malformed readings skip the candidate they belong
/// to; they never abort the cycle.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("non-finite numeric reading for {kind}: {value}")]
    NonFinite { kind: FactorKind, value: f64 },

    #[error("non-finite confidence for {kind}")]
    BadConfidence { kind: FactorKind },

    #[error("reading shape does not match the configured {kind} transform")]
    Mismatched { kind: FactorKind },

    #[error("no transform configured for {kind}")]
    Unconfigured { kind: FactorKind },
}

/// Per-kind transform from a raw reading onto the common factor scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transform {
    /// Linear clamp: `lo` maps to -1, `hi` to +1, outside values saturate.
    /// For bounded ratios (utilization, SLA risk).
    Linear { lo: f64, hi: f64 },
    /// tanh saturation: ±`half_scale` maps to ±tanh(1) ≈ ±0.76, larger
    /// magnitudes approach ±1. For unbounded magnitudes (demand deltas,
    /// distances, inventory imbalance).
    Saturating { half_scale: f64 },
    /// Ordered severity table indexed by `HealthState` rank; entries must be
    /// in `[-1, 1]`.
    Severity { levels: [f64; HealthState::COUNT] },
    /// Boolean mapping. Default: a raised flag argues for action (+1), an
    /// unraised one is neutral (0), not counter-evidence.
    Flag { on: f64, off: f64 },
}

impl Transform {
    fn apply(&self, kind: FactorKind, signal: RawSignal) -> Result<f64, NormalizeError> {
        match (self, signal) {
            (Transform::Linear { lo, hi }, RawSignal::Numeric(x)) => {
                if !x.is_finite() {
                    return Err(NormalizeError::NonFinite { kind, value: x });
                }
                let unit = (x - lo) / (hi - lo);
                Ok((unit * 2.0 - 1.0).clamp(-1.0, 1.0))
            }
            (Transform::Saturating { half_scale }, RawSignal::Numeric(x)) => {
                if !x.is_finite() {
                    return Err(NormalizeError::NonFinite { kind, value: x });
                }
                Ok((x / half_scale).tanh())
            }
            (Transform::Severity { levels }, RawSignal::Health(state)) => {
                Ok(levels[state.severity_rank()])
            }
            (Transform::Flag { on, off }, RawSignal::Flag(raised)) => {
                Ok(if raised { *on } else { *off })
            }
            _ => Err(NormalizeError::Mismatched { kind }),
        }
    }
}

/// Per-kind transform table.
///
/// The defaults cover every `FactorKind`; deployments override per kind via
/// configuration. Scale constants are calibration choices, not inferred from
/// anything; they are deliberately configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    pub transforms: BTreeMap<FactorKind, Transform>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        let mut transforms = BTreeMap::new();
        // Relative demand delta vs. forecast baseline.
        transforms.insert(
            FactorKind::Demand,
            Transform::Saturating { half_scale: 1.0 },
        );
        // Utilization ratio over the window; 0.5 is neutral.
        transforms.insert(FactorKind::Utilization, Transform::Linear { lo: 0.0, hi: 1.0 });
        transforms.insert(
            FactorKind::Health,
            Transform::Severity {
                levels: [-1.0, 0.25, 0.6, 1.0],
            },
        );
        // Kilometres to the nearest site that wants the unit.
        transforms.insert(
            FactorKind::Proximity,
            Transform::Saturating { half_scale: 50.0 },
        );
        // Breach probability in [0, 1].
        transforms.insert(FactorKind::SlaRisk, Transform::Linear { lo: 0.0, hi: 1.0 });
        // Units of surplus (negative: deficit) at the subject site.
        transforms.insert(
            FactorKind::Inventory,
            Transform::Saturating { half_scale: 5.0 },
        );
        // Days of calendar pressure (bookings minus availability).
        transforms.insert(
            FactorKind::Calendar,
            Transform::Saturating { half_scale: 14.0 },
        );
        // kg CO2e saved (negative: emitted) by acting.
        transforms.insert(
            FactorKind::Carbon,
            Transform::Saturating { half_scale: 100.0 },
        );
        Self { transforms }
    }
}

impl NormalizerConfig {
    /// Reject configurations that cannot produce values in `[-1, 1]`.
    pub fn validate(&self) -> Result<(), String> {
        for (kind, t) in &self.transforms {
            match t {
                Transform::Linear { lo, hi } => {
                    if !lo.is_finite() || !hi.is_finite() || hi <= lo {
                        return Err(format!("{kind}: linear transform needs finite lo < hi"));
                    }
                }
                Transform::Saturating { half_scale } => {
                    if !half_scale.is_finite() || *half_scale <= 0.0 {
                        return Err(format!("{kind}: half_scale must be finite and positive"));
                    }
                }
                Transform::Severity { levels } => {
                    if levels.iter().any(|l| !l.is_finite() || l.abs() > 1.0) {
                        return Err(format!("{kind}: severity levels must lie in [-1, 1]"));
                    }
                }
                Transform::Flag { on, off } => {
                    if on.abs() > 1.0 || off.abs() > 1.0 || !on.is_finite() || !off.is_finite() {
                        return Err(format!("{kind}: flag values must lie in [-1, 1]"));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Maps raw provider readings into `FactorValue`s.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Normalize one reading.
    ///
    /// Confidence is clamped into `[0, 1]`; a non-finite confidence is
    /// malformed (the provider is misbehaving, not merely absent).
    pub fn normalize(
        &self,
        kind: FactorKind,
        reading: &Reading,
    ) -> Result<FactorValue, NormalizeError> {
        if !reading.confidence.is_finite() {
            return Err(NormalizeError::BadConfidence { kind });
        }
        let transform = self
            .config
            .transforms
            .get(&kind)
            .ok_or(NormalizeError::Unconfigured { kind })?;

        let normalized = transform.apply(kind, reading.signal)?;

        Ok(FactorValue {
            kind,
            raw: Some(reading.signal),
            normalized,
            confidence: reading.confidence.clamp(0.0, 1.0),
        })
    }

    /// Neutral fallback for an unreachable provider or an empty window.
    pub fn neutral(&self, kind: FactorKind) -> FactorValue {
        FactorValue::neutral(kind)
    }
}
