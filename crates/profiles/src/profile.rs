//! Weight profiles: how much each factor matters, per scope and kind.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use fleetiq_core::{Scope, SuggestionKind};
use fleetiq_signals::FactorKind;

/// Signed factor weights and the activation threshold for one suggestion
/// kind.
///
/// The threshold is in raw-score units: a candidate whose weighted sum
/// reaches it maps exactly onto the kind's minimum actionable score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindWeights {
    pub weights: BTreeMap<FactorKind, f64>,
    pub threshold: f64,
}

impl KindWeights {
    pub fn new(weights: BTreeMap<FactorKind, f64>, threshold: f64) -> Self {
        Self { weights, threshold }
    }

    /// Weight for a factor; unlisted factors weigh nothing.
    pub fn weight(&self, kind: FactorKind) -> f64 {
        self.weights.get(&kind).copied().unwrap_or(0.0)
    }

    /// Sum of |weight|: how signal-driven this kind is. Used as the score
    /// tie-break.
    pub fn aggregate_abs_weight(&self) -> f64 {
        self.weights.values().map(|w| w.abs()).sum()
    }
}

/// Scoped weight configuration, versioned for optimistic concurrency.
///
/// Owned by exactly one scope. The revision counter moves only through the
/// profile store; readers within an evaluation cycle treat the loaded value
/// as immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightProfile {
    pub scope: Scope,
    pub kinds: BTreeMap<SuggestionKind, KindWeights>,

    /// Feedback nudge step (η), in (0, 1].
    pub learning_rate: f64,
    /// Hard clamp for every weight: |w| ≤ bound, preventing runaway drift.
    pub weight_bound: f64,

    revision: u64,
}

impl WeightProfile {
    /// Fresh, unstored profile at revision 0.
    pub fn new(scope: Scope, kinds: BTreeMap<SuggestionKind, KindWeights>) -> Self {
        Self {
            scope,
            kinds,
            learning_rate: 0.05,
            weight_bound: 100.0,
            revision: 0,
        }
    }

    /// Starter profile with the documented default weight tables.
    ///
    /// These are seeds, not truths: the feedback loop reshapes them per
    /// scope. Every kind leads with the factor operators reach for first
    /// (demand for repositioning, health for service actions, utilization
    /// for rental-term actions).
    pub fn seed(scope: Scope) -> Self {
        use FactorKind::*;
        use SuggestionKind::*;

        let table = |pairs: &[(FactorKind, f64)], threshold: f64| {
            KindWeights::new(pairs.iter().copied().collect(), threshold)
        };

        let mut kinds = BTreeMap::new();
        kinds.insert(
            Reposition,
            table(
                &[
                    (Demand, 40.0),
                    (Inventory, 25.0),
                    (Utilization, 10.0),
                    (Proximity, -15.0),
                    (Carbon, 5.0),
                ],
                25.0,
            ),
        );
        kinds.insert(
            ScheduleMaintenance,
            table(
                &[
                    (Health, 45.0),
                    (SlaRisk, 20.0),
                    (Utilization, 15.0),
                    (Calendar, 10.0),
                ],
                30.0,
            ),
        );
        kinds.insert(
            ExtendRental,
            table(
                &[(Utilization, 30.0), (Calendar, 25.0), (Demand, 20.0)],
                25.0,
            ),
        );
        kinds.insert(
            EndRental,
            table(
                &[
                    (Utilization, -35.0),
                    (Calendar, 20.0),
                    (Demand, -15.0),
                    (Inventory, 10.0),
                ],
                25.0,
            ),
        );
        kinds.insert(
            SwapUnit,
            table(
                &[(Health, 50.0), (SlaRisk, 25.0), (Proximity, -10.0)],
                30.0,
            ),
        );

        Self::new(scope, kinds)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Weights for a suggestion kind, if configured.
    pub fn kind_weights(&self, kind: SuggestionKind) -> Option<&KindWeights> {
        self.kinds.get(&kind)
    }

    /// Deterministic validation; the store runs this on every write.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(format!(
                "learning_rate must be in (0, 1], got {}",
                self.learning_rate
            ));
        }
        if !(self.weight_bound.is_finite() && self.weight_bound > 0.0) {
            return Err(format!(
                "weight_bound must be finite and positive, got {}",
                self.weight_bound
            ));
        }
        for (kind, kw) in &self.kinds {
            if !(kw.threshold.is_finite() && kw.threshold > 0.0) {
                return Err(format!(
                    "{kind}: threshold must be finite and positive, got {}",
                    kw.threshold
                ));
            }
            for (factor, w) in &kw.weights {
                if !w.is_finite() {
                    return Err(format!("{kind}/{factor}: weight must be finite"));
                }
                if w.abs() > self.weight_bound {
                    return Err(format!(
                        "{kind}/{factor}: |{w}| exceeds weight_bound {}",
                        self.weight_bound
                    ));
                }
            }
        }
        Ok(())
    }

    /// Store-internal: advance the revision on a committed write.
    pub(crate) fn committed_at(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }
}
