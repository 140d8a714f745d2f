//! Explanation synthesis: contributions → one human-readable sentence.

use serde::{Deserialize, Serialize};

use fleetiq_core::{SubjectRef, SuggestionKind};
use fleetiq_signals::FactorContribution;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainerConfig {
    /// How many factors the rationale names, by descending |contribution|.
    pub top_factors: usize,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self { top_factors: 4 }
    }
}

/// Renders the ranked rationale for a scored candidate.
///
/// Deterministic by construction: contributions are re-sorted here by
/// descending magnitude with ties broken by factor enumeration order, clause
/// wording depends only on the contribution sign, and numbers are formatted
/// with a fixed precision. Same contributions, same sentence.
#[derive(Debug, Clone, Default)]
pub struct Explainer {
    config: ExplainerConfig,
}

impl Explainer {
    pub fn new(config: ExplainerConfig) -> Self {
        Self { config }
    }

    pub fn explain(
        &self,
        kind: SuggestionKind,
        subject: &SubjectRef,
        contributions: &[FactorContribution],
    ) -> String {
        let mut ranked: Vec<&FactorContribution> = contributions
            .iter()
            .filter(|c| c.contribution != 0.0)
            .collect();
        ranked.sort_by(|a, b| {
            b.contribution
                .abs()
                .partial_cmp(&a.contribution.abs())
                .unwrap_or(core::cmp::Ordering::Equal)
                .then(a.kind.cmp(&b.kind))
        });
        ranked.truncate(self.config.top_factors);

        if ranked.is_empty() {
            return format!(
                "Suggest {} {subject}; no individual factor stands out.",
                kind.verb_phrase()
            );
        }

        let clauses: Vec<String> = ranked
            .iter()
            .map(|c| {
                let direction = if c.contribution > 0.0 {
                    "pushes for it"
                } else {
                    "weighs against it"
                };
                format!("{} {direction} ({:+.1})", c.kind.label(), c.contribution)
            })
            .collect();

        format!(
            "Suggest {} {subject}: {}.",
            kind.verb_phrase(),
            clauses.join(", ")
        )
    }
}
