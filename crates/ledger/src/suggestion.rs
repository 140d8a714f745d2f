use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fleetiq_core::{
    ActorId, Aggregate, AggregateRoot, DomainError, EvaluationWindow, Scope, SubjectRef,
    SuggestionId, SuggestionKind, TenantId,
};
use fleetiq_events::Event;
use fleetiq_signals::FactorContribution;

/// Lifecycle state of a suggestion.
///
/// `Open` is initial; the other three are terminal. No transition leaves a
/// terminal state; a decision or expiry against one fails with
/// `StaleSuggestion`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuggestionState {
    Open,
    Accepted,
    Declined,
    Expired,
}

impl SuggestionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SuggestionState::Open)
    }
}

impl core::fmt::Display for SuggestionState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            SuggestionState::Open => "OPEN",
            SuggestionState::Accepted => "ACCEPTED",
            SuggestionState::Declined => "DECLINED",
            SuggestionState::Expired => "EXPIRED",
        };
        f.write_str(s)
    }
}

/// Accept or decline: the two consumer decisions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionAction {
    Accept,
    Decline,
}

impl DecisionAction {
    /// +1 for accept, -1 for decline; the sign of the weight nudge.
    pub fn sign(&self) -> f64 {
        match self {
            DecisionAction::Accept => 1.0,
            DecisionAction::Decline => -1.0,
        }
    }
}

/// Aggregate root: Suggestion.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    id: SuggestionId,
    scope: Option<Scope>,
    subject: Option<SubjectRef>,
    kind: Option<SuggestionKind>,
    score: f64,
    confidence: f64,
    contributions: Vec<FactorContribution>,
    explanation: String,
    window: Option<EvaluationWindow>,
    state: SuggestionState,
    created_at: Option<DateTime<Utc>>,
    decided_at: Option<DateTime<Utc>>,
    decided_by: Option<ActorId>,
    decision_reason: Option<String>,
    version: u64,
    recorded: bool,
}

impl Suggestion {
    /// Create an empty, not-yet-recorded aggregate instance for rehydration.
    pub fn empty(id: SuggestionId) -> Self {
        Self {
            id,
            scope: None,
            subject: None,
            kind: None,
            score: 0.0,
            confidence: 0.0,
            contributions: Vec::new(),
            explanation: String::new(),
            window: None,
            state: SuggestionState::Open,
            created_at: None,
            decided_at: None,
            decided_by: None,
            decision_reason: None,
            version: 0,
            recorded: false,
        }
    }

    pub fn id_typed(&self) -> SuggestionId {
        self.id
    }

    pub fn is_recorded(&self) -> bool {
        self.recorded
    }

    pub fn scope(&self) -> Option<Scope> {
        self.scope
    }

    pub fn subject(&self) -> Option<&SubjectRef> {
        self.subject.as_ref()
    }

    pub fn kind(&self) -> Option<SuggestionKind> {
        self.kind
    }

    pub fn state(&self) -> SuggestionState {
        self.state
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn contributions(&self) -> &[FactorContribution] {
        &self.contributions
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    pub fn window(&self) -> Option<EvaluationWindow> {
        self.window
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn decided_at(&self) -> Option<DateTime<Utc>> {
        self.decided_at
    }

    pub fn decided_by(&self) -> Option<ActorId> {
        self.decided_by
    }

    pub fn decision_reason(&self) -> Option<&str> {
        self.decision_reason.as_deref()
    }
}

impl AggregateRoot for Suggestion {
    type Id = SuggestionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: record a freshly scored suggestion (creates the OPEN entry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSuggestion {
    pub scope: Scope,
    pub suggestion_id: SuggestionId,
    pub subject: SubjectRef,
    pub kind: SuggestionKind,
    pub score: f64,
    pub confidence: f64,
    pub contributions: Vec<FactorContribution>,
    pub explanation: String,
    pub window: EvaluationWindow,
    pub occurred_at: DateTime<Utc>,
}

/// Command: consumer decision (accept/decline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecideSuggestion {
    pub tenant_id: TenantId,
    pub suggestion_id: SuggestionId,
    pub action: DecisionAction,
    pub actor: ActorId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: time-driven expiry (window elapsed, or superseded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpireSuggestion {
    pub tenant_id: TenantId,
    pub suggestion_id: SuggestionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SuggestionCommand {
    Record(RecordSuggestion),
    Decide(DecideSuggestion),
    Expire(ExpireSuggestion),
}

/// Event: SuggestionRecorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionRecorded {
    pub scope: Scope,
    pub suggestion_id: SuggestionId,
    pub subject: SubjectRef,
    pub kind: SuggestionKind,
    pub score: f64,
    pub confidence: f64,
    pub contributions: Vec<FactorContribution>,
    pub explanation: String,
    pub window: EvaluationWindow,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SuggestionDecided (accepted or declined).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionDecided {
    pub tenant_id: TenantId,
    pub suggestion_id: SuggestionId,
    pub action: DecisionAction,
    pub actor: ActorId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SuggestionExpired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionExpired {
    pub tenant_id: TenantId,
    pub suggestion_id: SuggestionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SuggestionEvent {
    Recorded(SuggestionRecorded),
    Decided(SuggestionDecided),
    Expired(SuggestionExpired),
}

impl SuggestionEvent {
    pub fn suggestion_id(&self) -> SuggestionId {
        match self {
            SuggestionEvent::Recorded(e) => e.suggestion_id,
            SuggestionEvent::Decided(e) => e.suggestion_id,
            SuggestionEvent::Expired(e) => e.suggestion_id,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        match self {
            SuggestionEvent::Recorded(e) => e.scope.tenant_id,
            SuggestionEvent::Decided(e) => e.tenant_id,
            SuggestionEvent::Expired(e) => e.tenant_id,
        }
    }
}

impl Event for SuggestionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SuggestionEvent::Recorded(_) => "suggestion.recorded",
            SuggestionEvent::Decided(e) => match e.action {
                DecisionAction::Accept => "suggestion.accepted",
                DecisionAction::Decline => "suggestion.declined",
            },
            SuggestionEvent::Expired(_) => "suggestion.expired",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SuggestionEvent::Recorded(e) => e.occurred_at,
            SuggestionEvent::Decided(e) => e.occurred_at,
            SuggestionEvent::Expired(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Suggestion {
    type Command = SuggestionCommand;
    type Event = SuggestionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SuggestionEvent::Recorded(e) => {
                self.id = e.suggestion_id;
                self.scope = Some(e.scope);
                self.subject = Some(e.subject.clone());
                self.kind = Some(e.kind);
                self.score = e.score;
                self.confidence = e.confidence;
                self.contributions = e.contributions.clone();
                self.explanation = e.explanation.clone();
                self.window = Some(e.window);
                self.state = SuggestionState::Open;
                self.created_at = Some(e.occurred_at);
                self.recorded = true;
            }
            SuggestionEvent::Decided(e) => {
                self.state = match e.action {
                    DecisionAction::Accept => SuggestionState::Accepted,
                    DecisionAction::Decline => SuggestionState::Declined,
                };
                self.decided_at = Some(e.occurred_at);
                self.decided_by = Some(e.actor);
                self.decision_reason = e.reason.clone();
            }
            SuggestionEvent::Expired(e) => {
                self.state = SuggestionState::Expired;
                self.decided_at = Some(e.occurred_at);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SuggestionCommand::Record(cmd) => self.handle_record(cmd),
            SuggestionCommand::Decide(cmd) => self.handle_decide(cmd),
            SuggestionCommand::Expire(cmd) => self.handle_expire(cmd),
        }
    }
}

impl Suggestion {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        match self.scope {
            Some(scope) if scope.tenant_id != tenant_id => {
                Err(DomainError::invariant("tenant mismatch"))
            }
            _ => Ok(()),
        }
    }

    fn ensure_suggestion_id(&self, suggestion_id: SuggestionId) -> Result<(), DomainError> {
        if self.id != suggestion_id {
            return Err(DomainError::invariant("suggestion_id mismatch"));
        }
        Ok(())
    }

    fn ensure_open(&self, what: &str) -> Result<(), DomainError> {
        if self.state.is_terminal() {
            return Err(DomainError::stale_suggestion(format!(
                "{what} targets suggestion {} already in terminal state {}",
                self.id, self.state
            )));
        }
        Ok(())
    }

    fn handle_record(&self, cmd: &RecordSuggestion) -> Result<Vec<SuggestionEvent>, DomainError> {
        if self.recorded {
            return Err(DomainError::conflict("suggestion already recorded"));
        }
        if !cmd.kind.admits(&cmd.subject) {
            return Err(DomainError::validation(format!(
                "{} suggestions cannot target {}",
                cmd.kind, cmd.subject
            )));
        }
        if !(cmd.score.is_finite() && (0.0..=100.0).contains(&cmd.score)) {
            return Err(DomainError::validation(format!(
                "score must lie in [0, 100], got {}",
                cmd.score
            )));
        }
        if !(cmd.confidence.is_finite() && (0.0..=1.0).contains(&cmd.confidence)) {
            return Err(DomainError::validation(format!(
                "confidence must lie in [0, 1], got {}",
                cmd.confidence
            )));
        }
        if cmd.explanation.trim().is_empty() {
            return Err(DomainError::validation("explanation cannot be empty"));
        }

        Ok(vec![SuggestionEvent::Recorded(SuggestionRecorded {
            scope: cmd.scope,
            suggestion_id: cmd.suggestion_id,
            subject: cmd.subject.clone(),
            kind: cmd.kind,
            score: cmd.score,
            confidence: cmd.confidence,
            contributions: cmd.contributions.clone(),
            explanation: cmd.explanation.clone(),
            window: cmd.window,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_decide(&self, cmd: &DecideSuggestion) -> Result<Vec<SuggestionEvent>, DomainError> {
        if !self.recorded {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_suggestion_id(cmd.suggestion_id)?;
        self.ensure_open("decision")?;

        Ok(vec![SuggestionEvent::Decided(SuggestionDecided {
            tenant_id: cmd.tenant_id,
            suggestion_id: cmd.suggestion_id,
            action: cmd.action,
            actor: cmd.actor,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_expire(&self, cmd: &ExpireSuggestion) -> Result<Vec<SuggestionEvent>, DomainError> {
        if !self.recorded {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_suggestion_id(cmd.suggestion_id)?;
        self.ensure_open("expiry")?;

        Ok(vec![SuggestionEvent::Expired(SuggestionExpired {
            tenant_id: cmd.tenant_id,
            suggestion_id: cmd.suggestion_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use fleetiq_core::EquipmentId;
    use fleetiq_events::execute;
    use fleetiq_signals::FactorKind;

    fn record_cmd(scope: Scope, id: SuggestionId) -> RecordSuggestion {
        let now = Utc::now();
        RecordSuggestion {
            scope,
            suggestion_id: id,
            subject: SubjectRef::equipment(EquipmentId::new()),
            kind: SuggestionKind::ScheduleMaintenance,
            score: 78.0,
            confidence: 0.84,
            contributions: vec![
                FactorContribution::new(FactorKind::Health, 31.5),
                FactorContribution::new(FactorKind::SlaRisk, 9.0),
            ],
            explanation: "health is deteriorating and SLA risk is elevated".to_string(),
            window: EvaluationWindow::starting_at(now, Duration::hours(24)).unwrap(),
            occurred_at: now,
        }
    }

    fn open_suggestion() -> (Suggestion, Scope) {
        let scope = Scope::tenant(TenantId::new());
        let id = SuggestionId::new();
        let mut suggestion = Suggestion::empty(id);
        execute(
            &mut suggestion,
            &SuggestionCommand::Record(record_cmd(scope, id)),
        )
        .unwrap();
        (suggestion, scope)
    }

    #[test]
    fn record_creates_open_suggestion() {
        let (suggestion, _) = open_suggestion();
        assert_eq!(suggestion.state(), SuggestionState::Open);
        assert_eq!(suggestion.version(), 1);
        assert!(suggestion.created_at().is_some());
        assert!(suggestion.decided_at().is_none());
    }

    #[test]
    fn double_record_is_a_conflict() {
        let (suggestion, scope) = open_suggestion();
        let err = suggestion
            .handle(&SuggestionCommand::Record(record_cmd(
                scope,
                suggestion.id_typed(),
            )))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn accept_transitions_to_terminal_state() {
        let (mut suggestion, scope) = open_suggestion();
        let actor = ActorId::new();
        let suggestion_id = suggestion.id_typed();
        execute(
            &mut suggestion,
            &SuggestionCommand::Decide(DecideSuggestion {
                tenant_id: scope.tenant_id,
                suggestion_id,
                action: DecisionAction::Accept,
                actor,
                reason: Some("makes sense".to_string()),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        assert_eq!(suggestion.state(), SuggestionState::Accepted);
        assert_eq!(suggestion.decided_by(), Some(actor));
        assert_eq!(suggestion.version(), 2);
    }

    #[test]
    fn decision_on_declined_suggestion_is_stale() {
        let (mut suggestion, scope) = open_suggestion();
        let suggestion_id = suggestion.id_typed();
        let decide = |action| {
            SuggestionCommand::Decide(DecideSuggestion {
                tenant_id: scope.tenant_id,
                suggestion_id,
                action,
                actor: ActorId::new(),
                reason: None,
                occurred_at: Utc::now(),
            })
        };

        execute(&mut suggestion, &decide(DecisionAction::Decline)).unwrap();
        let err = suggestion.handle(&decide(DecisionAction::Accept)).unwrap_err();
        assert!(matches!(err, DomainError::StaleSuggestion(_)));
        // handle() never mutates: state and version are untouched.
        assert_eq!(suggestion.state(), SuggestionState::Declined);
        assert_eq!(suggestion.version(), 2);
    }

    #[test]
    fn expire_only_applies_to_open() {
        let (mut suggestion, scope) = open_suggestion();
        let expire = SuggestionCommand::Expire(ExpireSuggestion {
            tenant_id: scope.tenant_id,
            suggestion_id: suggestion.id_typed(),
            occurred_at: Utc::now(),
        });

        execute(&mut suggestion, &expire).unwrap();
        assert_eq!(suggestion.state(), SuggestionState::Expired);

        let err = suggestion.handle(&expire).unwrap_err();
        assert!(matches!(err, DomainError::StaleSuggestion(_)));
    }

    #[test]
    fn cross_tenant_decision_is_rejected() {
        let (suggestion, _) = open_suggestion();
        let err = suggestion
            .handle(&SuggestionCommand::Decide(DecideSuggestion {
                tenant_id: TenantId::new(),
                suggestion_id: suggestion.id_typed(),
                action: DecisionAction::Accept,
                actor: ActorId::new(),
                reason: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn record_rejects_out_of_range_score() {
        let scope = Scope::tenant(TenantId::new());
        let id = SuggestionId::new();
        let mut cmd = record_cmd(scope, id);
        cmd.score = 140.0;
        let err = Suggestion::empty(id)
            .handle(&SuggestionCommand::Record(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn record_rejects_inadmissible_subject() {
        let scope = Scope::tenant(TenantId::new());
        let id = SuggestionId::new();
        let mut cmd = record_cmd(scope, id);
        cmd.subject = SubjectRef::site(fleetiq_core::SiteId::new());
        let err = Suggestion::empty(id)
            .handle(&SuggestionCommand::Record(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
