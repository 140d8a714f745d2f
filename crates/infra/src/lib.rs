//! `fleetiq-infra`
//!
//! **Responsibility:** wiring the pure engine to the world.
//!
//! The append-only suggestion ledger store with its per-key open index, the
//! deadline-bounded signal provider registry, the evaluation-cycle
//! orchestration and its recurring runner, and the per-scope feedback worker.
//! Everything here composes the domain crates through their traits; swap the
//! in-memory backends for real ones without touching domain code.

pub mod cycle;
pub mod feedback_worker;
pub mod ledger_store;
pub mod providers;
pub mod runner;


pub use cycle::{CycleConfig, CycleError, CycleReport, EvaluationCycle};
pub use feedback_worker::{FeedbackWorker, FeedbackWorkerHandle};
pub use ledger_store::{InMemorySuggestionLedger, LedgerEntry, LedgerError, SuggestionLedger};
pub use providers::ProviderRegistry;
pub use runner::{CycleRunner, CycleRunnerHandle, SubjectSource, SubjectSourceError};
