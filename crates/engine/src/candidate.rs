//! Candidate generation: which (subject, kind) pairs are worth scoring.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fleetiq_core::{EvaluationWindow, Scope, SubjectRef, SuggestionId, SuggestionKind};
use fleetiq_profiles::WeightProfile;
use fleetiq_signals::FactorValue;

/// An unscored, ephemeral (subject, kind) pair under evaluation in one cycle.
///
/// Candidates exist only during one evaluation pass and are never persisted;
/// everything durable about a decision lives in the suggestion ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub subject: SubjectRef,
    pub kind: SuggestionKind,
    pub window: EvaluationWindow,
    pub factors: Vec<FactorValue>,
}

impl Candidate {
    pub fn new(
        subject: SubjectRef,
        kind: SuggestionKind,
        window: EvaluationWindow,
        factors: Vec<FactorValue>,
    ) -> Self {
        Self {
            subject,
            kind,
            window,
            factors,
        }
    }
}

/// What the generator needs to know about an existing OPEN suggestion.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenSuggestionInfo {
    pub suggestion_id: SuggestionId,
    pub created_at: DateTime<Utc>,
}

/// Lookup seam over the ledger's open-suggestion index.
///
/// The generator never touches storage directly; infra implements this
/// against the suggestion ledger.
pub trait OpenSuggestions {
    fn open_for(
        &self,
        scope: &Scope,
        subject: &SubjectRef,
        kind: SuggestionKind,
    ) -> Option<OpenSuggestionInfo>;
}

impl<T> OpenSuggestions for std::sync::Arc<T>
where
    T: OpenSuggestions + ?Sized,
{
    fn open_for(
        &self,
        scope: &Scope,
        subject: &SubjectRef,
        kind: SuggestionKind,
    ) -> Option<OpenSuggestionInfo> {
        (**self).open_for(scope, subject, kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// How long an OPEN suggestion blocks re-evaluation of its key. A
    /// material state change (external trigger) bypasses this.
    pub reevaluation_interval: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            reevaluation_interval: Duration::from_secs(6 * 60 * 60),
        }
    }
}

/// Output of one generation pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenerationPlan {
    /// Exactly one entry per admitted (subject, kind) pair, in deterministic
    /// order (input subject order, then kind enumeration order).
    pub admitted: Vec<(SubjectRef, SuggestionKind)>,
    /// OPEN suggestions to expire before their keys are re-scored, so the
    /// one-OPEN-per-key invariant holds at every instant.
    pub superseded: Vec<SuggestionId>,
}

/// Enumerates (subject, kind) pairs worth scoring this cycle, deduplicated
/// against already-open suggestions.
#[derive(Debug, Clone, Default)]
pub struct CandidateGenerator {
    config: GeneratorConfig,
}

impl CandidateGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Decide which pairs to evaluate.
    ///
    /// Dedup rule: a pair with an existing OPEN suggestion is skipped unless
    /// the re-evaluation interval has elapsed since that suggestion was
    /// created, or the subject appears in `changed` (material state change).
    /// In either bypass case the stale OPEN suggestion is superseded.
    /// Within a cycle, duplicate pairs are impossible: admitted keys are
    /// tracked in a set even if the subject list repeats itself.
    pub fn plan(
        &self,
        profile: &WeightProfile,
        subjects: &[SubjectRef],
        changed: &HashSet<SubjectRef>,
        open: &dyn OpenSuggestions,
        now: DateTime<Utc>,
    ) -> GenerationPlan {
        let reevaluate_after = chrono::Duration::from_std(self.config.reevaluation_interval)
            .unwrap_or_else(|_| chrono::Duration::MAX);

        let mut seen: HashSet<(SubjectRef, SuggestionKind)> = HashSet::new();
        let mut plan = GenerationPlan::default();

        for subject in subjects {
            // BTreeMap keys: deterministic kind order.
            for kind in profile.kinds.keys().copied() {
                if !kind.admits(subject) {
                    continue;
                }
                if !seen.insert((subject.clone(), kind)) {
                    continue;
                }

                match open.open_for(&profile.scope, subject, kind) {
                    None => plan.admitted.push((subject.clone(), kind)),
                    Some(info) => {
                        let gone_stale = now - info.created_at >= reevaluate_after;
                        let materially_changed = changed.contains(subject);
                        if gone_stale || materially_changed {
                            plan.superseded.push(info.suggestion_id);
                            plan.admitted.push((subject.clone(), kind));
                        }
                    }
                }
            }
        }

        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetiq_core::{EquipmentId, TenantId};
    use std::collections::HashMap;

    struct FakeOpenIndex {
        open: HashMap<(SubjectRef, SuggestionKind), OpenSuggestionInfo>,
    }

    impl OpenSuggestions for FakeOpenIndex {
        fn open_for(
            &self,
            _scope: &Scope,
            subject: &SubjectRef,
            kind: SuggestionKind,
        ) -> Option<OpenSuggestionInfo> {
            self.open.get(&(subject.clone(), kind)).cloned()
        }
    }

    fn setup() -> (WeightProfile, SubjectRef, FakeOpenIndex) {
        let profile = WeightProfile::seed(Scope::tenant(TenantId::new()));
        let subject = SubjectRef::equipment(EquipmentId::new());
        (
            profile,
            subject,
            FakeOpenIndex {
                open: HashMap::new(),
            },
        )
    }

    #[test]
    fn admits_every_configured_kind_for_a_unit() {
        let (profile, subject, index) = setup();
        let plan = CandidateGenerator::default().plan(
            &profile,
            &[subject],
            &HashSet::new(),
            &index,
            Utc::now(),
        );
        // A single unit admits all five seeded kinds.
        assert_eq!(plan.admitted.len(), SuggestionKind::ALL.len());
        assert!(plan.superseded.is_empty());
    }

    #[test]
    fn repeated_subjects_produce_no_duplicate_pairs() {
        let (profile, subject, index) = setup();
        let plan = CandidateGenerator::default().plan(
            &profile,
            &[subject.clone(), subject],
            &HashSet::new(),
            &index,
            Utc::now(),
        );
        let unique: HashSet<_> = plan.admitted.iter().cloned().collect();
        assert_eq!(unique.len(), plan.admitted.len());
    }

    #[test]
    fn fresh_open_suggestion_blocks_its_key() {
        let (profile, subject, mut index) = setup();
        let now = Utc::now();
        index.open.insert(
            (subject.clone(), SuggestionKind::Reposition),
            OpenSuggestionInfo {
                suggestion_id: SuggestionId::new(),
                created_at: now - chrono::Duration::minutes(5),
            },
        );

        let plan = CandidateGenerator::default().plan(
            &profile,
            &[subject.clone()],
            &HashSet::new(),
            &index,
            now,
        );
        assert!(
            !plan
                .admitted
                .contains(&(subject, SuggestionKind::Reposition))
        );
        assert!(plan.superseded.is_empty());
    }

    #[test]
    fn stale_open_suggestion_is_superseded() {
        let (profile, subject, mut index) = setup();
        let now = Utc::now();
        let stale_id = SuggestionId::new();
        index.open.insert(
            (subject.clone(), SuggestionKind::Reposition),
            OpenSuggestionInfo {
                suggestion_id: stale_id,
                created_at: now - chrono::Duration::hours(7),
            },
        );

        let plan = CandidateGenerator::default().plan(
            &profile,
            &[subject.clone()],
            &HashSet::new(),
            &index,
            now,
        );
        assert_eq!(plan.superseded, vec![stale_id]);
        assert!(
            plan.admitted
                .contains(&(subject, SuggestionKind::Reposition))
        );
    }

    #[test]
    fn material_change_bypasses_the_reevaluation_interval() {
        let (profile, subject, mut index) = setup();
        let now = Utc::now();
        let open_id = SuggestionId::new();
        index.open.insert(
            (subject.clone(), SuggestionKind::Reposition),
            OpenSuggestionInfo {
                suggestion_id: open_id,
                created_at: now - chrono::Duration::minutes(1),
            },
        );

        let changed: HashSet<_> = [subject.clone()].into_iter().collect();
        let plan =
            CandidateGenerator::default().plan(&profile, &[subject], &changed, &index, now);
        assert_eq!(plan.superseded, vec![open_id]);
    }

    #[test]
    fn site_subjects_only_get_site_capable_kinds() {
        let (profile, _, index) = setup();
        let site = SubjectRef::site(fleetiq_core::SiteId::new());
        let plan = CandidateGenerator::default().plan(
            &profile,
            &[site],
            &HashSet::new(),
            &index,
            Utc::now(),
        );
        // No seeded kind admits a bare site subject.
        assert!(plan.admitted.is_empty());
    }
}
