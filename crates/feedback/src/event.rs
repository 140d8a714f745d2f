//! Feedback events: consumer decisions on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fleetiq_core::{ActorId, SuggestionId, TenantId};
use fleetiq_events::{Event, TenantScoped};
use fleetiq_ledger::DecisionAction;

/// A consumer's decision on a suggestion.
///
/// Created by the consuming application (dashboard, API) and published on
/// the bus; the per-scope feedback worker is the single consumer that turns
/// it into a ledger transition plus one weight nudge. Queuing feedback this
/// way serializes conflicting updates per scope without locks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub tenant_id: TenantId,
    pub suggestion_id: SuggestionId,
    pub action: DecisionAction,
    pub reason: Option<String>,
    pub actor: ActorId,
    pub occurred_at: DateTime<Utc>,
}

impl TenantScoped for FeedbackEvent {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

impl Event for FeedbackEvent {
    fn event_type(&self) -> &'static str {
        match self.action {
            DecisionAction::Accept => "feedback.accepted",
            DecisionAction::Decline => "feedback.declined",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}
