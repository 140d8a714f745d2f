//! The stable external representation of a suggestion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fleetiq_core::{ActorId, Scope, SubjectRef, SuggestionId, SuggestionKind};
use fleetiq_signals::FactorContribution;

use crate::suggestion::{Suggestion, SuggestionState};

/// What dashboards and APIs consume.
///
/// This field set is a published contract: extend it, never rename or
/// repurpose fields. On the wire the record uses camelCase keys and calls
/// the kind `type`, matching what the consuming application already ships.
/// `factors` preserves the scorer's ordering (descending |contribution|).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRecord {
    pub id: SuggestionId,
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    pub scope: Scope,
    pub subject: SubjectRef,
    pub score: f64,
    pub confidence: f64,
    pub factors: Vec<FactorContribution>,
    pub explanation: String,
    pub state: SuggestionState,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_by: Option<ActorId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_reason: Option<String>,
}

impl SuggestionRecord {
    /// Project the aggregate's current state. `None` until the suggestion
    /// has actually been recorded.
    pub fn from_aggregate(suggestion: &Suggestion) -> Option<Self> {
        if !suggestion.is_recorded() {
            return None;
        }
        Some(Self {
            id: suggestion.id_typed(),
            kind: suggestion.kind()?,
            scope: suggestion.scope()?,
            subject: suggestion.subject()?.clone(),
            score: suggestion.score(),
            confidence: suggestion.confidence(),
            factors: suggestion.contributions().to_vec(),
            explanation: suggestion.explanation().to_string(),
            state: suggestion.state(),
            created_at: suggestion.created_at()?,
            decided_at: suggestion.decided_at(),
            decided_by: suggestion.decided_by(),
            decision_reason: suggestion.decision_reason().map(str::to_string),
        })
    }
}
