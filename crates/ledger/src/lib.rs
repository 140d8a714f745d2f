//! `fleetiq-ledger`
//!
//! **Responsibility:** the suggestion lifecycle, as an event-sourced
//! aggregate.
//!
//! A suggestion is immutable once recorded except for state transitions, and
//! every transition is a new ledger event referencing the suggestion id,
//! never a destructive overwrite. The small explicit state machine lives
//! here; the append-only storage and per-key idempotency index live in infra.

pub mod record;
pub mod suggestion;

pub use record::SuggestionRecord;
pub use suggestion::{
    DecideSuggestion, DecisionAction, ExpireSuggestion, RecordSuggestion, Suggestion,
    SuggestionCommand, SuggestionDecided, SuggestionEvent, SuggestionExpired,
    SuggestionRecorded, SuggestionState,
};
