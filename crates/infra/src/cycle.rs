//! One evaluation cycle, end to end.
//!
//! Pipeline: profile load → expiry sweep → generation plan → supersede →
//! fetch/normalize → score → explain → ledger append → ranked report.
//! Distinct candidates are independent; a failure on one never aborts the
//! rest of the cycle. Only a missing weight profile is fatal.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use fleetiq_core::{EvaluationWindow, Scope, SubjectRef, SuggestionId};
use fleetiq_engine::{
    Candidate, CandidateGenerator, Explainer, ExplainerConfig, GeneratorConfig, ScoreCalibration,
    Scored, Scorer, ranking,
};
use fleetiq_ledger::{ExpireSuggestion, RecordSuggestion, SuggestionRecord};
use fleetiq_profiles::{ProfileStore, ProfileStoreError};

use crate::ledger_store::{LedgerError, SuggestionLedger};
use crate::providers::ProviderRegistry;

#[derive(Debug, Error)]
pub enum CycleError {
    /// The weight profile could not be loaded. Fatal for the whole cycle:
    /// generating suggestions against a stale-beyond-policy profile is worse
    /// than waiting for the next tick.
    #[error("weight profile unavailable: {0}")]
    ProfileUnavailable(ProfileStoreError),

    /// The ledger itself failed (not a duplicate/stale condition; those are
    /// handled inline).
    #[error("ledger failure: {0}")]
    Ledger(LedgerError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleConfig {
    /// Evaluation window length for fresh candidates.
    pub window_length: Duration,
    pub generator: GeneratorConfig,
    pub calibration: ScoreCalibration,
    pub explainer: ExplainerConfig,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            window_length: Duration::from_secs(24 * 60 * 60),
            generator: GeneratorConfig::default(),
            calibration: ScoreCalibration::default(),
            explainer: ExplainerConfig::default(),
        }
    }
}

/// What one cycle did. Logged and returned to the caller.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Candidates actually scored.
    pub evaluated: usize,
    /// Suggestions appended this cycle, ranked (score desc, then the more
    /// signal-driven kind).
    pub recorded: Vec<SuggestionRecord>,
    /// OPEN suggestions expired by the window sweep.
    pub expired: Vec<SuggestionId>,
    /// Stale OPEN suggestions replaced via the re-evaluation/material-change
    /// path.
    pub superseded: usize,
    /// Candidates skipped for malformed factor readings.
    pub skipped_malformed: usize,
    /// Appends suppressed by the idempotency key (concurrent cycle won).
    pub suppressed_duplicates: usize,
    /// Candidates scored but below the actionable bar (the normal case).
    pub discarded: usize,
    /// True if the cycle was cancelled between candidates.
    pub cancelled: bool,
}

/// Orchestrates one scope's evaluation pass. Cheap to share behind an `Arc`;
/// all mutable state lives in the stores.
#[derive(Debug)]
pub struct EvaluationCycle<L, P> {
    ledger: L,
    profiles: P,
    registry: Arc<ProviderRegistry>,
    generator: CandidateGenerator,
    scorer: Scorer,
    explainer: Explainer,
    config: CycleConfig,
}

impl<L, P> EvaluationCycle<L, P>
where
    L: SuggestionLedger,
    P: ProfileStore,
{
    pub fn new(ledger: L, profiles: P, registry: Arc<ProviderRegistry>, config: CycleConfig) -> Self {
        Self {
            ledger,
            profiles,
            generator: CandidateGenerator::new(config.generator.clone()),
            scorer: Scorer::new(config.calibration.clone()),
            explainer: Explainer::new(config.explainer.clone()),
            registry,
            config,
        }
    }

    /// Run one cycle for `scope`.
    ///
    /// `subjects` is the active-subject list from the surrounding
    /// application; `changed` marks subjects with a material state change
    /// since the last cycle. `cancel` is observed between candidates: an
    /// aborted cycle leaves no partial state because each candidate's ledger
    /// append is atomic and independent.
    pub fn run(
        &self,
        scope: &Scope,
        subjects: &[SubjectRef],
        changed: &HashSet<SubjectRef>,
        now: DateTime<Utc>,
        cancel: &AtomicBool,
    ) -> Result<CycleReport, CycleError> {
        let mut report = CycleReport::default();

        // 1) Load the scope's profile. Read-only for the rest of the cycle.
        let profile = self
            .profiles
            .load(scope)
            .map_err(CycleError::ProfileUnavailable)?;

        // 2) Expire OPEN suggestions whose window has elapsed.
        report.expired = self
            .ledger
            .expire_due(scope, now)
            .map_err(CycleError::Ledger)?;

        // 3) Decide which (subject, kind) pairs to evaluate.
        let plan = self
            .generator
            .plan(&profile, subjects, changed, &self.ledger, now);

        // 4) Supersede stale OPEN suggestions before re-scoring their keys.
        for id in &plan.superseded {
            match self.ledger.expire(ExpireSuggestion {
                tenant_id: scope.tenant_id,
                suggestion_id: *id,
                occurred_at: now,
            }) {
                Ok(_) => report.superseded += 1,
                // Another cycle got there first; the key is free either way.
                Err(e) if e.is_stale() => report.superseded += 1,
                Err(e) => return Err(CycleError::Ledger(e)),
            }
        }

        // 5) Fetch, normalize, score, explain, append. One candidate at a
        //    time, independently.
        let window_length = chrono::Duration::from_std(self.config.window_length)
            .unwrap_or_else(|_| chrono::Duration::hours(24));
        let mut appended: Vec<(Scored, SuggestionRecord)> = Vec::new();

        for (subject, kind) in plan.admitted {
            if cancel.load(Ordering::Relaxed) {
                report.cancelled = true;
                break;
            }

            let Some(weights) = profile.kind_weights(kind) else {
                continue;
            };
            let Ok(window) = EvaluationWindow::new(now, now + window_length) else {
                continue;
            };

            let factors = match self.registry.factor_vector(&subject, window) {
                Ok(factors) => factors,
                Err(e) => {
                    warn!(%subject, %kind, error = %e, "skipping candidate with malformed factor");
                    report.skipped_malformed += 1;
                    continue;
                }
            };

            report.evaluated += 1;
            let candidate = Candidate::new(subject, kind, window, factors);
            let Some(scored) = self.scorer.actionable(&candidate, weights) else {
                report.discarded += 1;
                continue;
            };

            let explanation =
                self.explainer
                    .explain(scored.kind, &scored.subject, &scored.contributions);

            match self.ledger.record(RecordSuggestion {
                scope: *scope,
                suggestion_id: SuggestionId::new(),
                subject: scored.subject.clone(),
                kind: scored.kind,
                score: scored.score,
                confidence: scored.confidence,
                contributions: scored.contributions.clone(),
                explanation,
                window,
                occurred_at: now,
            }) {
                Ok(record) => appended.push((scored, record)),
                Err(LedgerError::DuplicateOpen(key)) => {
                    debug!(%key, "suggestion suppressed by idempotency key");
                    report.suppressed_duplicates += 1;
                }
                Err(e) => return Err(CycleError::Ledger(e)),
            }
        }

        // 6) Rank the cycle's output.
        appended.sort_by(|a, b| ranking(&a.0, &b.0));
        report.recorded = appended.into_iter().map(|(_, record)| record).collect();

        info!(
            %scope,
            evaluated = report.evaluated,
            recorded = report.recorded.len(),
            expired = report.expired.len(),
            superseded = report.superseded,
            discarded = report.discarded,
            skipped = report.skipped_malformed,
            cancelled = report.cancelled,
            "evaluation cycle finished"
        );

        Ok(report)
    }
}
