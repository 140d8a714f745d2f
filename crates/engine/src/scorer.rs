//! Weighted scoring with confidence.

use serde::{Deserialize, Serialize};

use fleetiq_core::{EvaluationWindow, SubjectRef, SuggestionKind};
use fleetiq_profiles::KindWeights;
use fleetiq_signals::{FactorContribution, FactorValue};

use crate::candidate::Candidate;

/// A raw weighted sum of exactly 0 maps here.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Calibration of the raw-score → `[0, 100]` affine mapping.
///
/// The source material leaves the exact mapping open, so it is configuration:
/// raw 0 maps to `NEUTRAL_SCORE`, and a raw sum equal to the kind's threshold
/// maps to exactly `min_actionable`. Larger sums clamp at 100, strongly
/// negative ones at 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCalibration {
    /// The lowest score worth surfacing to a human. Scores below it are
    /// discarded. That is the expected outcome of most cycles.
    pub min_actionable: f64,
    /// Candidates must exceed this confidence to survive; the default keeps
    /// only candidates with at least one observed factor behind them.
    pub min_confidence: f64,
}

impl Default for ScoreCalibration {
    fn default() -> Self {
        Self {
            min_actionable: 65.0,
            min_confidence: 0.0,
        }
    }
}

impl ScoreCalibration {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.min_actionable > NEUTRAL_SCORE && self.min_actionable <= 100.0) {
            return Err(format!(
                "min_actionable must lie in ({NEUTRAL_SCORE}, 100], got {}",
                self.min_actionable
            ));
        }
        if !(self.min_confidence >= 0.0 && self.min_confidence < 1.0) {
            return Err(format!(
                "min_confidence must lie in [0, 1), got {}",
                self.min_confidence
            ));
        }
        Ok(())
    }
}

/// A scored candidate, ready for explanation + ledger append.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
    pub subject: SubjectRef,
    pub kind: SuggestionKind,
    pub window: EvaluationWindow,
    pub score: f64,
    pub confidence: f64,
    /// Descending |contribution|, ties broken by factor enumeration order.
    pub contributions: Vec<FactorContribution>,
    /// Sum of |weight| of the kind that produced this score; ranking
    /// tie-break.
    pub signal_mass: f64,
}

impl Scored {
    /// Sum of the signed contributions: the raw score before the affine
    /// mapping. Kept recomputable so audits can verify the decomposition.
    pub fn raw_score(&self) -> f64 {
        self.contributions.iter().map(|c| c.contribution).sum()
    }
}

/// Applies a weight table to a candidate's factor vector.
///
/// Pure and deterministic: same `(factor_vector, weights)` always produces
/// the same output, independent of factor order (factors are sorted by kind
/// before any floating-point accumulation).
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    calibration: ScoreCalibration,
}

impl Scorer {
    pub fn new(calibration: ScoreCalibration) -> Self {
        Self { calibration }
    }

    pub fn calibration(&self) -> &ScoreCalibration {
        &self.calibration
    }

    /// Score a candidate against its kind's weight table.
    pub fn score(&self, candidate: &Candidate, weights: &KindWeights) -> Scored {
        // Deterministic accumulation order regardless of input order.
        let mut factors: Vec<&FactorValue> = candidate.factors.iter().collect();
        factors.sort_by_key(|f| f.kind);

        let mut contributions: Vec<FactorContribution> = Vec::with_capacity(factors.len());
        let mut raw = 0.0;
        let mut weighted_confidence = 0.0;
        let mut total_abs_weight = 0.0;

        for factor in factors {
            let weight = weights.weight(factor.kind);
            let contribution = weight * factor.normalized * factor.confidence;
            raw += contribution;
            weighted_confidence += weight.abs() * factor.confidence;
            total_abs_weight += weight.abs();
            contributions.push(FactorContribution::new(factor.kind, contribution));
        }

        // Zero-weight factors contribute nothing to confidence either.
        let confidence = if total_abs_weight > 0.0 {
            weighted_confidence / total_abs_weight
        } else {
            0.0
        };

        let slope = (self.calibration.min_actionable - NEUTRAL_SCORE) / weights.threshold;
        let score = (NEUTRAL_SCORE + slope * raw).clamp(0.0, 100.0);

        contributions.sort_by(|a, b| {
            b.contribution
                .abs()
                .partial_cmp(&a.contribution.abs())
                .unwrap_or(core::cmp::Ordering::Equal)
                .then(a.kind.cmp(&b.kind))
        });

        Scored {
            subject: candidate.subject.clone(),
            kind: candidate.kind,
            window: candidate.window,
            score,
            confidence,
            contributions,
            signal_mass: weights.aggregate_abs_weight(),
        }
    }

    /// Score and filter: `None` for candidates that don't clear the
    /// actionable score or carry no confidence. Not an error; this is the
    /// expected outcome of most cycles.
    pub fn actionable(&self, candidate: &Candidate, weights: &KindWeights) -> Option<Scored> {
        let scored = self.score(candidate, weights);
        if scored.confidence <= self.calibration.min_confidence {
            return None;
        }
        if scored.score < self.calibration.min_actionable {
            return None;
        }
        Some(scored)
    }
}

/// Presentation order for two scored candidates: score descending, then the
/// more signal-driven kind (higher sum of |weight|), then kind enumeration
/// order; never a mechanically newer entry.
pub fn ranking(a: &Scored, b: &Scored) -> core::cmp::Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(core::cmp::Ordering::Equal)
        .then(
            b.signal_mass
                .partial_cmp(&a.signal_mass)
                .unwrap_or(core::cmp::Ordering::Equal),
        )
        .then(a.kind.cmp(&b.kind))
}

/// Rank scored candidates in place.
pub fn rank(scored: &mut [Scored]) {
    scored.sort_by(ranking);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use fleetiq_core::EquipmentId;
    use fleetiq_signals::{FactorKind, RawSignal};
    use std::collections::BTreeMap;

    fn window() -> EvaluationWindow {
        EvaluationWindow::starting_at(Utc::now(), Duration::hours(24)).unwrap()
    }

    fn factor(kind: FactorKind, normalized: f64, confidence: f64) -> FactorValue {
        FactorValue {
            kind,
            raw: Some(RawSignal::Numeric(normalized)),
            normalized,
            confidence,
        }
    }

    fn weights(pairs: &[(FactorKind, f64)], threshold: f64) -> KindWeights {
        KindWeights::new(pairs.iter().copied().collect::<BTreeMap<_, _>>(), threshold)
    }

    fn candidate(factors: Vec<FactorValue>) -> Candidate {
        Candidate::new(
            SubjectRef::equipment(EquipmentId::new()),
            SuggestionKind::Reposition,
            window(),
            factors,
        )
    }

    /// The worked example from the design notes: raw 38.3, score above
    /// neutral, confidence is the |weight|-weighted average, demand leads.
    #[test]
    fn worked_example_scores_above_neutral() {
        let weights = weights(
            &[
                (FactorKind::Demand, 40.0),
                (FactorKind::Utilization, 25.0),
                (FactorKind::Health, 15.0),
            ],
            25.0,
        );
        let candidate = candidate(vec![
            factor(FactorKind::Demand, 0.8, 0.9),
            factor(FactorKind::Utilization, 0.4, 0.8),
            factor(FactorKind::Health, 0.2, 0.5),
        ]);

        let scored = Scorer::default().score(&candidate, &weights);

        assert!((scored.raw_score() - 38.3).abs() < 1e-9);
        assert!(scored.score > NEUTRAL_SCORE);
        let expected_confidence = (40.0 * 0.9 + 25.0 * 0.8 + 15.0 * 0.5) / 80.0;
        assert!((scored.confidence - expected_confidence).abs() < 1e-9);
        assert_eq!(scored.contributions[0].kind, FactorKind::Demand);
    }

    #[test]
    fn zero_raw_score_is_neutral() {
        let weights = weights(&[(FactorKind::Demand, 40.0)], 25.0);
        let candidate = candidate(vec![factor(FactorKind::Demand, 0.0, 1.0)]);
        let scored = Scorer::default().score(&candidate, &weights);
        assert_eq!(scored.score, NEUTRAL_SCORE);
    }

    #[test]
    fn threshold_raw_score_maps_to_min_actionable() {
        let weights = weights(&[(FactorKind::Demand, 25.0)], 25.0);
        let candidate = candidate(vec![factor(FactorKind::Demand, 1.0, 1.0)]);
        let scorer = Scorer::default();
        let scored = scorer.score(&candidate, &weights);
        assert!((scored.score - scorer.calibration().min_actionable).abs() < 1e-9);
        assert!(scorer.actionable(&candidate, &weights).is_some());
    }

    #[test]
    fn strongly_negative_raw_score_clamps_at_zero() {
        let weights = weights(&[(FactorKind::Demand, 100.0)], 10.0);
        let candidate = candidate(vec![factor(FactorKind::Demand, -1.0, 1.0)]);
        let scored = Scorer::default().score(&candidate, &weights);
        assert_eq!(scored.score, 0.0);
    }

    #[test]
    fn all_unavailable_vector_is_discarded_regardless_of_score() {
        let weights = weights(&[(FactorKind::Demand, 40.0)], 25.0);
        let candidate = candidate(
            FactorKind::ALL
                .iter()
                .map(|k| FactorValue::neutral(*k))
                .collect(),
        );
        let scorer = Scorer::default();
        let scored = scorer.score(&candidate, &weights);
        assert_eq!(scored.confidence, 0.0);
        assert!(scorer.actionable(&candidate, &weights).is_none());
    }

    #[test]
    fn below_threshold_candidate_is_filtered_not_errored() {
        let weights = weights(&[(FactorKind::Demand, 40.0)], 25.0);
        let candidate = candidate(vec![factor(FactorKind::Demand, 0.1, 0.5)]);
        assert!(Scorer::default().actionable(&candidate, &weights).is_none());
    }

    #[test]
    fn zero_weight_factors_do_not_affect_confidence() {
        let weights = weights(&[(FactorKind::Demand, 40.0)], 25.0);
        let with_unweighted = candidate(vec![
            factor(FactorKind::Demand, 0.8, 0.9),
            factor(FactorKind::Carbon, 1.0, 0.1),
        ]);
        let without = candidate(vec![factor(FactorKind::Demand, 0.8, 0.9)]);

        let scorer = Scorer::default();
        let a = scorer.score(&with_unweighted, &weights);
        let b = scorer.score(&without, &weights);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.score, b.score);
    }

    #[test]
    fn ranking_prefers_signal_driven_kind_on_score_tie() {
        let subject = SubjectRef::equipment(EquipmentId::new());
        let mk = |kind, score, signal_mass| Scored {
            subject: subject.clone(),
            kind,
            window: window(),
            score,
            confidence: 0.8,
            contributions: vec![],
            signal_mass,
        };
        let mut scored = vec![
            mk(SuggestionKind::SwapUnit, 70.0, 30.0),
            mk(SuggestionKind::ScheduleMaintenance, 70.0, 90.0),
            mk(SuggestionKind::Reposition, 80.0, 10.0),
        ];
        rank(&mut scored);
        assert_eq!(scored[0].kind, SuggestionKind::Reposition);
        assert_eq!(scored[1].kind, SuggestionKind::ScheduleMaintenance);
        assert_eq!(scored[2].kind, SuggestionKind::SwapUnit);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn factor_vector() -> impl Strategy<Value = Vec<FactorValue>> {
            // One optional reading per kind: unique kinds, arbitrary order later.
            proptest::collection::vec(
                (0usize..FactorKind::ALL.len(), -1.0..1.0f64, 0.0..1.0f64),
                0..8,
            )
            .prop_map(|entries| {
                let mut seen = std::collections::BTreeSet::new();
                entries
                    .into_iter()
                    .filter(|(i, _, _)| seen.insert(*i))
                    .map(|(i, n, c)| factor(FactorKind::ALL[i], n, c))
                    .collect()
            })
        }

        fn weight_table() -> impl Strategy<Value = KindWeights> {
            (
                proptest::collection::btree_map(
                    (0usize..FactorKind::ALL.len()).prop_map(|i| FactorKind::ALL[i]),
                    -50.0..50.0f64,
                    1..8,
                ),
                1.0..60.0f64,
            )
                .prop_map(|(map, threshold)| KindWeights::new(map, threshold))
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 512,
                ..ProptestConfig::default()
            })]

            /// Property: scoring is a pure function, independent of the order
            /// the factor vector arrives in.
            #[test]
            fn score_is_order_independent(
                factors in factor_vector(),
                weights in weight_table(),
            ) {
                let forward = candidate(factors.clone());
                let mut reversed_factors = factors;
                reversed_factors.reverse();
                let reversed = candidate(reversed_factors);

                let scorer = Scorer::default();
                let a = scorer.score(&forward, &weights);
                let b = scorer.score(&reversed, &weights);

                prop_assert_eq!(a.score, b.score);
                prop_assert_eq!(a.confidence, b.confidence);
                prop_assert_eq!(a.contributions, b.contributions);
            }

            /// Property: defaulting any subset of factors to neutral never
            /// increases confidence.
            #[test]
            fn confidence_never_rises_as_factors_default(
                factors in factor_vector(),
                weights in weight_table(),
                mask in proptest::collection::vec(any::<bool>(), 8),
            ) {
                let full = candidate(factors.clone());
                let degraded: Vec<FactorValue> = factors
                    .iter()
                    .enumerate()
                    .map(|(i, f)| {
                        if mask.get(i).copied().unwrap_or(false) {
                            FactorValue::neutral(f.kind)
                        } else {
                            f.clone()
                        }
                    })
                    .collect();
                let partial = candidate(degraded);

                let scorer = Scorer::default();
                let a = scorer.score(&full, &weights);
                let b = scorer.score(&partial, &weights);

                prop_assert!(b.confidence <= a.confidence + 1e-12);
            }

            /// Property: the signed contributions always sum back to the raw
            /// score that produced the mapped score.
            #[test]
            fn contributions_decompose_the_raw_score(
                factors in factor_vector(),
                weights in weight_table(),
            ) {
                let scored = Scorer::default().score(&candidate(factors), &weights);
                let slope = (Scorer::default().calibration().min_actionable - NEUTRAL_SCORE)
                    / weights.threshold;
                let remapped = (NEUTRAL_SCORE + slope * scored.raw_score()).clamp(0.0, 100.0);
                prop_assert!((scored.score - remapped).abs() < 1e-9);
            }
        }
    }
}
