//! Append-only suggestion ledger storage with the per-key open index.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use fleetiq_core::{
    Aggregate, DomainError, Scope, SubjectRef, SuggestionId, SuggestionKind, TenantId,
};
use fleetiq_engine::{OpenSuggestionInfo, OpenSuggestions};
use fleetiq_events::{EventBus, EventEnvelope};
use fleetiq_ledger::{
    DecideSuggestion, ExpireSuggestion, RecordSuggestion, Suggestion, SuggestionCommand,
    SuggestionEvent, SuggestionRecord,
};

/// Ledger operation error.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// An OPEN suggestion already holds this (subject, kind) key. Expected
    /// during concurrent cycles; callers suppress it, they don't surface it.
    #[error("open suggestion already exists for {0}")]
    DuplicateOpen(String),

    /// Deterministic domain failure, including `StaleSuggestion`.
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("ledger storage error: {0}")]
    Storage(String),

    /// Entries were appended but publication failed (at-least-once; the
    /// ledger remains the source of truth).
    #[error("ledger publish failed: {0}")]
    Publish(String),
}

impl LedgerError {
    pub fn is_stale(&self) -> bool {
        matches!(self, LedgerError::Domain(DomainError::StaleSuggestion(_)))
    }
}

/// One committed ledger entry (append-only; never rewritten).
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub entry_id: Uuid,
    pub tenant_id: TenantId,
    pub suggestion_id: SuggestionId,
    /// Monotonically increasing position in the suggestion's stream.
    pub sequence_number: u64,
    pub event: SuggestionEvent,
}

impl LedgerEntry {
    pub fn to_envelope(&self) -> EventEnvelope<SuggestionEvent> {
        EventEnvelope::new(
            self.entry_id,
            self.tenant_id,
            *self.suggestion_id.as_uuid(),
            "suggestion",
            self.sequence_number,
            self.event.clone(),
        )
    }
}

/// The suggestion ledger: append-only lifecycle storage plus the
/// open-suggestion index the candidate generator dedups against.
pub trait SuggestionLedger: OpenSuggestions + Send + Sync {
    /// Record a new OPEN suggestion. The dedup check and the append are
    /// serialized per `(subject, kind)` key: concurrent cycles can never
    /// create two OPEN suggestions for one key.
    fn record(&self, cmd: RecordSuggestion) -> Result<SuggestionRecord, LedgerError>;

    /// Apply a consumer decision. Fails with `StaleSuggestion` (via
    /// `DomainError`) when the suggestion is already terminal.
    fn decide(&self, cmd: DecideSuggestion) -> Result<SuggestionRecord, LedgerError>;

    /// Expire one OPEN suggestion (window elapsed or superseded).
    fn expire(&self, cmd: ExpireSuggestion) -> Result<SuggestionRecord, LedgerError>;

    /// Expire every OPEN suggestion in the scope whose window end has
    /// passed. Returns the expired ids.
    fn expire_due(
        &self,
        scope: &Scope,
        now: DateTime<Utc>,
    ) -> Result<Vec<SuggestionId>, LedgerError>;

    /// Current projected state of one suggestion.
    fn record_of(&self, id: SuggestionId) -> Result<Option<SuggestionRecord>, LedgerError>;

    /// All suggestions for a scope (dashboard feed), newest first.
    fn records(&self, scope: &Scope) -> Result<Vec<SuggestionRecord>, LedgerError>;
}

impl<L> SuggestionLedger for Arc<L>
where
    L: SuggestionLedger + ?Sized,
{
    fn record(&self, cmd: RecordSuggestion) -> Result<SuggestionRecord, LedgerError> {
        (**self).record(cmd)
    }

    fn decide(&self, cmd: DecideSuggestion) -> Result<SuggestionRecord, LedgerError> {
        (**self).decide(cmd)
    }

    fn expire(&self, cmd: ExpireSuggestion) -> Result<SuggestionRecord, LedgerError> {
        (**self).expire(cmd)
    }

    fn expire_due(
        &self,
        scope: &Scope,
        now: DateTime<Utc>,
    ) -> Result<Vec<SuggestionId>, LedgerError> {
        (**self).expire_due(scope, now)
    }

    fn record_of(&self, id: SuggestionId) -> Result<Option<SuggestionRecord>, LedgerError> {
        (**self).record_of(id)
    }

    fn records(&self, scope: &Scope) -> Result<Vec<SuggestionRecord>, LedgerError> {
        (**self).records(scope)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct OpenKey {
    scope: Scope,
    subject: SubjectRef,
    kind: SuggestionKind,
}

#[derive(Debug, Clone)]
struct OpenEntry {
    suggestion_id: SuggestionId,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    streams: HashMap<SuggestionId, Vec<LedgerEntry>>,
    open_index: HashMap<OpenKey, OpenEntry>,
}

/// In-memory append-only suggestion ledger.
///
/// Intended for tests/dev; a relational backend would enforce the open index
/// with a partial unique constraint on `(scope, subject, kind)` instead of
/// the single mutex. Committed entries are published on the bus after the
/// append (at-least-once).
#[derive(Debug)]
pub struct InMemorySuggestionLedger<B> {
    inner: Mutex<Inner>,
    bus: B,
}

impl<B> InMemorySuggestionLedger<B>
where
    B: EventBus<EventEnvelope<SuggestionEvent>>,
{
    pub fn new(bus: B) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            bus,
        }
    }

    fn rehydrate(inner: &Inner, id: SuggestionId) -> Suggestion {
        let mut aggregate = Suggestion::empty(id);
        if let Some(stream) = inner.streams.get(&id) {
            for entry in stream {
                aggregate.apply(&entry.event);
            }
        }
        aggregate
    }

    /// Decide-then-append against a rehydrated aggregate, maintaining the
    /// open index. Caller must hold the inner lock.
    fn execute_locked(
        inner: &mut Inner,
        id: SuggestionId,
        command: &SuggestionCommand,
    ) -> Result<(Suggestion, Vec<LedgerEntry>), LedgerError> {
        let mut aggregate = Self::rehydrate(inner, id);
        let events = aggregate.handle(command)?;

        let stream = inner.streams.entry(id).or_default();
        let mut next = stream.last().map(|e| e.sequence_number).unwrap_or(0) + 1;
        let mut committed = Vec::with_capacity(events.len());

        for event in events {
            let entry = LedgerEntry {
                entry_id: Uuid::now_v7(),
                tenant_id: event.tenant_id(),
                suggestion_id: id,
                sequence_number: next,
                event: event.clone(),
            };
            next += 1;
            stream.push(entry.clone());
            aggregate.apply(&event);
            committed.push(entry);
        }

        // Keep the open index in lockstep with the stream.
        match aggregate.state() {
            fleetiq_ledger::SuggestionState::Open => {
                if let (Some(scope), Some(subject), Some(kind)) =
                    (aggregate.scope(), aggregate.subject(), aggregate.kind())
                {
                    inner.open_index.insert(
                        OpenKey {
                            scope,
                            subject: subject.clone(),
                            kind,
                        },
                        OpenEntry {
                            suggestion_id: id,
                            created_at: aggregate.created_at().unwrap_or_else(Utc::now),
                            expires_at: aggregate
                                .window()
                                .map(|w| w.end)
                                .unwrap_or_else(Utc::now),
                        },
                    );
                }
            }
            _ => {
                if let (Some(scope), Some(subject), Some(kind)) =
                    (aggregate.scope(), aggregate.subject(), aggregate.kind())
                {
                    inner.open_index.remove(&OpenKey {
                        scope,
                        subject: subject.clone(),
                        kind,
                    });
                }
            }
        }

        Ok((aggregate, committed))
    }

    fn publish(&self, entries: &[LedgerEntry]) -> Result<(), LedgerError> {
        for entry in entries {
            self.bus
                .publish(entry.to_envelope())
                .map_err(|e| LedgerError::Publish(format!("{e:?}")))?;
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, LedgerError> {
        self.inner
            .lock()
            .map_err(|_| LedgerError::Storage("lock poisoned".to_string()))
    }
}

impl<B> OpenSuggestions for InMemorySuggestionLedger<B>
where
    B: EventBus<EventEnvelope<SuggestionEvent>>,
{
    fn open_for(
        &self,
        scope: &Scope,
        subject: &SubjectRef,
        kind: SuggestionKind,
    ) -> Option<OpenSuggestionInfo> {
        let inner = self.inner.lock().ok()?;
        inner
            .open_index
            .get(&OpenKey {
                scope: *scope,
                subject: subject.clone(),
                kind,
            })
            .map(|e| OpenSuggestionInfo {
                suggestion_id: e.suggestion_id,
                created_at: e.created_at,
            })
    }
}

impl<B> SuggestionLedger for InMemorySuggestionLedger<B>
where
    B: EventBus<EventEnvelope<SuggestionEvent>> + Send + Sync,
{
    fn record(&self, cmd: RecordSuggestion) -> Result<SuggestionRecord, LedgerError> {
        let id = cmd.suggestion_id;
        let (aggregate, committed) = {
            let mut inner = self.lock()?;

            // Idempotency check and append under one lock: the key is
            // serialized, so two racing cycles cannot both pass this gate.
            let key = OpenKey {
                scope: cmd.scope,
                subject: cmd.subject.clone(),
                kind: cmd.kind,
            };
            if inner.open_index.contains_key(&key) {
                return Err(LedgerError::DuplicateOpen(format!(
                    "{}/{}",
                    cmd.subject, cmd.kind
                )));
            }

            Self::execute_locked(&mut inner, id, &SuggestionCommand::Record(cmd))?
        };

        self.publish(&committed)?;
        SuggestionRecord::from_aggregate(&aggregate)
            .ok_or_else(|| LedgerError::Storage("recorded aggregate has no record".to_string()))
    }

    fn decide(&self, cmd: DecideSuggestion) -> Result<SuggestionRecord, LedgerError> {
        let id = cmd.suggestion_id;
        let (aggregate, committed) = {
            let mut inner = self.lock()?;
            Self::execute_locked(&mut inner, id, &SuggestionCommand::Decide(cmd))?
        };

        self.publish(&committed)?;
        SuggestionRecord::from_aggregate(&aggregate)
            .ok_or_else(|| LedgerError::Storage("decided aggregate has no record".to_string()))
    }

    fn expire(&self, cmd: ExpireSuggestion) -> Result<SuggestionRecord, LedgerError> {
        let id = cmd.suggestion_id;
        let (aggregate, committed) = {
            let mut inner = self.lock()?;
            Self::execute_locked(&mut inner, id, &SuggestionCommand::Expire(cmd))?
        };

        self.publish(&committed)?;
        SuggestionRecord::from_aggregate(&aggregate)
            .ok_or_else(|| LedgerError::Storage("expired aggregate has no record".to_string()))
    }

    fn expire_due(
        &self,
        scope: &Scope,
        now: DateTime<Utc>,
    ) -> Result<Vec<SuggestionId>, LedgerError> {
        let (expired, committed) = {
            let mut inner = self.lock()?;

            let due: Vec<(SuggestionId, TenantId)> = inner
                .open_index
                .iter()
                .filter(|(key, entry)| key.scope == *scope && entry.expires_at <= now)
                .map(|(key, entry)| (entry.suggestion_id, key.scope.tenant_id))
                .collect();

            let mut expired = Vec::with_capacity(due.len());
            let mut committed = Vec::new();
            for (id, tenant_id) in due {
                let (_, mut entries) = Self::execute_locked(
                    &mut inner,
                    id,
                    &SuggestionCommand::Expire(ExpireSuggestion {
                        tenant_id,
                        suggestion_id: id,
                        occurred_at: now,
                    }),
                )?;
                committed.append(&mut entries);
                expired.push(id);
            }
            (expired, committed)
        };

        self.publish(&committed)?;
        Ok(expired)
    }

    fn record_of(&self, id: SuggestionId) -> Result<Option<SuggestionRecord>, LedgerError> {
        let inner = self.lock()?;
        if !inner.streams.contains_key(&id) {
            return Ok(None);
        }
        let aggregate = Self::rehydrate(&inner, id);
        Ok(SuggestionRecord::from_aggregate(&aggregate))
    }

    fn records(&self, scope: &Scope) -> Result<Vec<SuggestionRecord>, LedgerError> {
        let inner = self.lock()?;
        let mut records: Vec<SuggestionRecord> = inner
            .streams
            .keys()
            .map(|id| Self::rehydrate(&inner, *id))
            .filter_map(|aggregate| SuggestionRecord::from_aggregate(&aggregate))
            .filter(|record| record.scope == *scope)
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }
}
