//! Suggestion kinds: the operational actions the engine can recommend.

use serde::{Deserialize, Serialize};

use crate::subject::SubjectRef;

/// Operational action a suggestion recommends.
///
/// The enumeration order is load-bearing: it is the deterministic final
/// tie-break for ranking and explanation ordering.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    /// Move a unit (or units of a type) to where demand is.
    Reposition,
    /// Pull a unit in for service before it fails on rent.
    ScheduleMaintenance,
    /// Offer the customer a rental extension.
    ExtendRental,
    /// End a rental that is no longer earning its keep.
    EndRental,
    /// Swap a failing unit on rent for a healthy one.
    SwapUnit,
}

impl SuggestionKind {
    pub const ALL: [SuggestionKind; 5] = [
        SuggestionKind::Reposition,
        SuggestionKind::ScheduleMaintenance,
        SuggestionKind::ExtendRental,
        SuggestionKind::EndRental,
        SuggestionKind::SwapUnit,
    ];

    /// Whether this kind of suggestion can be made about the given subject.
    ///
    /// Reposition works at unit granularity and at site/equipment-type
    /// granularity (fleet balancing); the rental- and service-oriented kinds
    /// only make sense for a single unit.
    pub fn admits(&self, subject: &SubjectRef) -> bool {
        match self {
            SuggestionKind::Reposition => !matches!(subject, SubjectRef::Site { .. }),
            SuggestionKind::ScheduleMaintenance
            | SuggestionKind::ExtendRental
            | SuggestionKind::EndRental
            | SuggestionKind::SwapUnit => matches!(subject, SubjectRef::Equipment { .. }),
        }
    }

    /// Stable identifier used in ledger event types and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionKind::Reposition => "reposition",
            SuggestionKind::ScheduleMaintenance => "schedule_maintenance",
            SuggestionKind::ExtendRental => "extend_rental",
            SuggestionKind::EndRental => "end_rental",
            SuggestionKind::SwapUnit => "swap_unit",
        }
    }

    /// Human verb phrase used by the explanation synthesizer.
    pub fn verb_phrase(&self) -> &'static str {
        match self {
            SuggestionKind::Reposition => "reposition",
            SuggestionKind::ScheduleMaintenance => "schedule maintenance for",
            SuggestionKind::ExtendRental => "extend the rental of",
            SuggestionKind::EndRental => "end the rental of",
            SuggestionKind::SwapUnit => "swap out",
        }
    }
}

impl core::fmt::Display for SuggestionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
