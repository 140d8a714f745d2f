//! `fleetiq-engine`
//!
//! **Responsibility:** the pure middle of the suggestion pipeline.
//!
//! Candidate generation (with idempotent dedup against open suggestions),
//! weighted scoring with confidence, and explanation synthesis. Everything
//! here is deterministic and side-effect free: the weight profile is passed
//! in read-only, signal fetching happens upstream, and ledger writes happen
//! downstream. That keeps distinct candidates free to score in parallel.

pub mod candidate;
pub mod explain;
pub mod scorer;

pub use candidate::{
    Candidate, CandidateGenerator, GenerationPlan, GeneratorConfig, OpenSuggestionInfo,
    OpenSuggestions,
};
pub use explain::{Explainer, ExplainerConfig};
pub use scorer::{rank, ranking, NEUTRAL_SCORE, ScoreCalibration, Scored, Scorer};
