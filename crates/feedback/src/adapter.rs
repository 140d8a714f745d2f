//! Weight adaptation: one decided suggestion → one bounded profile nudge.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use fleetiq_core::{ExpectedRevision, Scope, SuggestionKind};
use fleetiq_ledger::{DecisionAction, SuggestionRecord};
use fleetiq_profiles::{KindWeights, ProfileStore, ProfileStoreError, WeightProfile};
use fleetiq_signals::FactorContribution;

#[derive(Debug, Error)]
pub enum FeedbackError {
    /// CAS retries exhausted; the nudge was parked on the deferred queue and
    /// will be reapplied on a later pass, not dropped.
    #[error("profile update retries exhausted for scope {scope} after {attempts} attempts")]
    RetriesExhausted { scope: Scope, attempts: u32 },

    #[error(transparent)]
    Store(ProfileStoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// CAS attempts per nudge before deferring.
    pub max_attempts: u32,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

/// A nudge that could not be applied yet (revision conflicts outlasted the
/// retry budget). Carries everything needed to reapply later.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingNudge {
    pub scope: Scope,
    pub kind: SuggestionKind,
    pub contributions: Vec<FactorContribution>,
    pub action: DecisionAction,
}

/// Nudge each factor's weight by its share of the decided suggestion:
///
/// `weight ← clamp(weight + η × sign(decision) × share × bound, ±bound)`
///
/// where `share` is the factor's signed contribution over the total absolute
/// contribution. Returns `false` (no mutation) when the total absolute
/// contribution is zero; there is nothing to learn from.
pub fn nudge_weights(
    weights: &mut KindWeights,
    contributions: &[FactorContribution],
    action: DecisionAction,
    learning_rate: f64,
    weight_bound: f64,
) -> bool {
    let total_abs: f64 = contributions.iter().map(|c| c.contribution.abs()).sum();
    if !(total_abs > 0.0) {
        return false;
    }

    for c in contributions {
        let share = c.contribution / total_abs;
        let step = learning_rate * action.sign() * share * weight_bound;
        let entry = weights.weights.entry(c.kind).or_insert(0.0);
        *entry = (*entry + step).clamp(-weight_bound, weight_bound);
    }
    true
}

/// Applies decided suggestions to weight profiles.
///
/// Read-modify-write against the profile's revision counter: on conflict the
/// profile is reloaded and the nudge recomputed from scratch, never a blind
/// overwrite of someone else's update.
#[derive(Debug)]
pub struct FeedbackAdapter<S> {
    store: S,
    config: FeedbackConfig,
    deferred: Mutex<VecDeque<PendingNudge>>,
}

impl<S> FeedbackAdapter<S>
where
    S: ProfileStore,
{
    pub fn new(store: S, config: FeedbackConfig) -> Self {
        Self {
            store,
            config,
            deferred: Mutex::new(VecDeque::new()),
        }
    }

    /// Apply one decided suggestion's nudge.
    pub fn apply(
        &self,
        record: &SuggestionRecord,
        action: DecisionAction,
    ) -> Result<WeightProfile, FeedbackError> {
        self.apply_nudge(PendingNudge {
            scope: record.scope,
            kind: record.kind,
            contributions: record.factors.clone(),
            action,
        })
    }

    /// Reapply parked nudges. Returns how many were applied; whatever fails
    /// again stays parked.
    pub fn drain_deferred(&self) -> usize {
        let parked: Vec<PendingNudge> = {
            let mut queue = self.deferred.lock().expect("deferred queue poisoned");
            queue.drain(..).collect()
        };

        let mut applied = 0;
        for nudge in parked {
            match self.apply_nudge(nudge) {
                Ok(_) => applied += 1,
                Err(e) => {
                    // RetriesExhausted re-parks itself; store errors re-park here.
                    if let FeedbackError::Store(_) = e {
                        warn!(error = %e, "deferred feedback still failing");
                    }
                }
            }
        }
        applied
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.lock().expect("deferred queue poisoned").len()
    }

    fn apply_nudge(&self, nudge: PendingNudge) -> Result<WeightProfile, FeedbackError> {
        for attempt in 1..=self.config.max_attempts {
            let mut profile = self
                .store
                .load(&nudge.scope)
                .map_err(FeedbackError::Store)?;
            let revision = profile.revision();
            let learning_rate = profile.learning_rate;
            let weight_bound = profile.weight_bound;

            let Some(weights) = profile.kinds.get_mut(&nudge.kind) else {
                // Kind no longer configured for this scope; nothing to adapt.
                debug!(scope = %nudge.scope, kind = %nudge.kind, "no weight table for decided kind");
                return Ok(profile);
            };

            if !nudge_weights(
                weights,
                &nudge.contributions,
                nudge.action,
                learning_rate,
                weight_bound,
            ) {
                // Zero total contribution: nothing to learn, revision untouched.
                return Ok(profile);
            }

            match self
                .store
                .update(profile, ExpectedRevision::Exact(revision))
            {
                Ok(stored) => return Ok(stored),
                Err(ProfileStoreError::Conflict(msg)) => {
                    debug!(scope = %nudge.scope, attempt, %msg, "profile revision moved, retrying nudge");
                    continue;
                }
                Err(e) => return Err(FeedbackError::Store(e)),
            }
        }

        let scope = nudge.scope;
        let attempts = self.config.max_attempts;
        self.deferred
            .lock()
            .expect("deferred queue poisoned")
            .push_back(nudge);
        warn!(%scope, attempts, "feedback nudge deferred after exhausting retries");
        Err(FeedbackError::RetriesExhausted { scope, attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetiq_core::TenantId;
    use fleetiq_profiles::InMemoryProfileStore;
    use fleetiq_signals::FactorKind;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn seeded(scope: Scope) -> Arc<InMemoryProfileStore> {
        let store = InMemoryProfileStore::arc();
        store.put(WeightProfile::seed(scope)).unwrap();
        store
    }

    fn maintenance_record(scope: Scope) -> SuggestionRecord {
        use chrono::Utc;
        use fleetiq_core::{EquipmentId, SubjectRef, SuggestionId};
        use fleetiq_ledger::SuggestionState;

        SuggestionRecord {
            id: SuggestionId::new(),
            kind: SuggestionKind::ScheduleMaintenance,
            scope,
            subject: SubjectRef::equipment(EquipmentId::new()),
            score: 78.0,
            confidence: 0.8,
            factors: vec![
                FactorContribution::new(FactorKind::Health, 30.0),
                FactorContribution::new(FactorKind::SlaRisk, 10.0),
            ],
            explanation: "health is deteriorating".to_string(),
            state: SuggestionState::Accepted,
            created_at: Utc::now(),
            decided_at: Some(Utc::now()),
            decided_by: None,
            decision_reason: None,
        }
    }

    #[test]
    fn accept_raises_the_dominant_weight() {
        let scope = Scope::tenant(TenantId::new());
        let store = seeded(scope);
        let adapter = FeedbackAdapter::new(store.clone(), FeedbackConfig::default());
        let record = maintenance_record(scope);

        let before = store
            .load(&scope)
            .unwrap()
            .kind_weights(SuggestionKind::ScheduleMaintenance)
            .unwrap()
            .weight(FactorKind::Health);

        adapter.apply(&record, DecisionAction::Accept).unwrap();

        let after = store
            .load(&scope)
            .unwrap()
            .kind_weights(SuggestionKind::ScheduleMaintenance)
            .unwrap()
            .weight(FactorKind::Health);
        assert!(after > before);
    }

    #[test]
    fn repeated_accepts_are_monotonic_and_bounded() {
        let scope = Scope::tenant(TenantId::new());
        let store = seeded(scope);
        let adapter = FeedbackAdapter::new(store.clone(), FeedbackConfig::default());
        let record = maintenance_record(scope);

        let bound = store.load(&scope).unwrap().weight_bound;
        let mut last = f64::MIN;
        for _ in 0..600 {
            adapter.apply(&record, DecisionAction::Accept).unwrap();
            let w = store
                .load(&scope)
                .unwrap()
                .kind_weights(SuggestionKind::ScheduleMaintenance)
                .unwrap()
                .weight(FactorKind::Health);
            assert!(w >= last);
            assert!(w <= bound);
            last = w;
        }
        // Enough accepts saturate at the clamp.
        assert!((last - bound).abs() < 1e-6);
    }

    #[test]
    fn decline_lowers_the_dominant_weight() {
        let scope = Scope::tenant(TenantId::new());
        let store = seeded(scope);
        let adapter = FeedbackAdapter::new(store.clone(), FeedbackConfig::default());
        let record = maintenance_record(scope);

        let before = store
            .load(&scope)
            .unwrap()
            .kind_weights(SuggestionKind::ScheduleMaintenance)
            .unwrap()
            .weight(FactorKind::Health);
        adapter.apply(&record, DecisionAction::Decline).unwrap();
        let after = store
            .load(&scope)
            .unwrap()
            .kind_weights(SuggestionKind::ScheduleMaintenance)
            .unwrap()
            .weight(FactorKind::Health);
        assert!(after < before);
    }

    #[test]
    fn zero_contributions_leave_the_revision_alone() {
        let scope = Scope::tenant(TenantId::new());
        let store = seeded(scope);
        let adapter = FeedbackAdapter::new(store.clone(), FeedbackConfig::default());
        let mut record = maintenance_record(scope);
        record.factors = vec![FactorContribution::new(FactorKind::Health, 0.0)];

        let before = store.load(&scope).unwrap().revision();
        adapter.apply(&record, DecisionAction::Accept).unwrap();
        assert_eq!(store.load(&scope).unwrap().revision(), before);
    }

    /// Store wrapper that simulates another writer slipping in before the
    /// first `n` update attempts.
    struct ContentiousStore {
        inner: Arc<InMemoryProfileStore>,
        remaining_races: AtomicU32,
    }

    impl ProfileStore for ContentiousStore {
        fn load(&self, scope: &Scope) -> Result<WeightProfile, ProfileStoreError> {
            self.inner.load(scope)
        }

        fn update(
            &self,
            profile: WeightProfile,
            expected: ExpectedRevision,
        ) -> Result<WeightProfile, ProfileStoreError> {
            if self
                .remaining_races
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                // Competing writer bumps the revision first.
                let current = self.inner.load(&profile.scope)?;
                self.inner.put(current)?;
            }
            self.inner.update(profile, expected)
        }

        fn put(&self, profile: WeightProfile) -> Result<WeightProfile, ProfileStoreError> {
            self.inner.put(profile)
        }
    }

    #[test]
    fn conflicts_are_retried_with_a_fresh_profile() {
        let scope = Scope::tenant(TenantId::new());
        let inner = seeded(scope);
        let store = ContentiousStore {
            inner: inner.clone(),
            remaining_races: AtomicU32::new(2),
        };
        let adapter = FeedbackAdapter::new(store, FeedbackConfig::default());

        adapter
            .apply(&maintenance_record(scope), DecisionAction::Accept)
            .unwrap();
        assert_eq!(adapter.deferred_len(), 0);
    }

    #[test]
    fn exhausted_retries_defer_instead_of_dropping() {
        let scope = Scope::tenant(TenantId::new());
        let inner = seeded(scope);
        let store = ContentiousStore {
            inner: inner.clone(),
            remaining_races: AtomicU32::new(u32::MAX),
        };
        let adapter = FeedbackAdapter::new(store, FeedbackConfig { max_attempts: 3 });

        let err = adapter
            .apply(&maintenance_record(scope), DecisionAction::Accept)
            .unwrap_err();
        assert!(matches!(err, FeedbackError::RetriesExhausted { .. }));
        assert_eq!(adapter.deferred_len(), 1);
    }

    #[test]
    fn deferred_nudges_apply_once_contention_clears() {
        let scope = Scope::tenant(TenantId::new());
        let inner = seeded(scope);
        let store = ContentiousStore {
            inner: inner.clone(),
            remaining_races: AtomicU32::new(3),
        };
        let adapter = FeedbackAdapter::new(store, FeedbackConfig { max_attempts: 2 });

        let record = maintenance_record(scope);
        assert!(adapter.apply(&record, DecisionAction::Accept).is_err());
        assert_eq!(adapter.deferred_len(), 1);

        // Contention has burned out (3 races, 2 consumed + 1 on the drain's
        // first attempt); the drain succeeds on its retry.
        let applied = adapter.drain_deferred();
        assert_eq!(applied, 1);
        assert_eq!(adapter.deferred_len(), 0);
    }
}
