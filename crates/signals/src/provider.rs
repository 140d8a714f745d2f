//! Inbound signal-provider contract.
//!
//! One provider per factor kind. Providers are external systems (forecasters,
//! telematics health scorers, routing services); this trait is the only shape
//! the engine depends on. Transport, caching, and modeling are the provider's
//! concern.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use fleetiq_core::{EvaluationWindow, SubjectRef};

use crate::factor::{FactorKind, RawSignal};

/// One raw observation for a subject over a window.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub signal: RawSignal,
    /// Provider's own reliability estimate, expected in `[0, 1]`.
    pub confidence: f64,
}

/// Provider failure. Every variant degrades to the neutral factor at the
/// call site; a missing signal is never a reason to fail a candidate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Provider reachable but has no data for this subject/window.
    #[error("no data for window: {0}")]
    Unavailable(String),

    /// Provider unreachable or errored.
    #[error("provider failed: {0}")]
    Failed(String),
}

/// A signal source for exactly one factor kind.
///
/// `fetch` is synchronous and expected to be fast; the provider registry
/// enforces a deadline around it and treats overruns as unavailable.
pub trait SignalProvider: Send + Sync + 'static {
    /// The factor this provider feeds.
    fn factor_kind(&self) -> FactorKind;

    /// Observe the subject over the window.
    fn fetch(
        &self,
        subject: &SubjectRef,
        window: EvaluationWindow,
    ) -> Result<Reading, ProviderError>;
}
