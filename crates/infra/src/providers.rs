//! Deadline-bounded signal retrieval.

use std::collections::HashMap;
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use tracing::warn;

use fleetiq_core::{EvaluationWindow, SubjectRef};
use fleetiq_signals::{
    FactorKind, FactorValue, NormalizeError, Normalizer, ProviderError, Reading, SignalProvider,
};

/// One registered provider per factor kind, each call bounded by a deadline.
///
/// Signal retrieval is the only latency-bound step of a cycle. A provider
/// that errors, has no data, or fails to answer within the deadline degrades
/// to the neutral factor (`normalized = 0`, `confidence = 0`) plus a warning;
/// it never stalls or fails the cycle. Only a malformed reading (non-finite
/// numeric, wrong shape) is surfaced, and that skips a single candidate.
pub struct ProviderRegistry {
    providers: HashMap<FactorKind, Arc<dyn SignalProvider>>,
    normalizer: Normalizer,
    deadline: Duration,
}

impl ProviderRegistry {
    pub fn new(normalizer: Normalizer, deadline: Duration) -> Self {
        Self {
            providers: HashMap::new(),
            normalizer,
            deadline,
        }
    }

    /// Register a provider under its own factor kind. Last registration per
    /// kind wins.
    pub fn register(&mut self, provider: Arc<dyn SignalProvider>) -> &mut Self {
        self.providers.insert(provider.factor_kind(), provider);
        self
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Assemble the full factor vector for one candidate: every kind, in
    /// enumeration order, with neutral placeholders wherever a provider is
    /// missing, unavailable, or over deadline.
    pub fn factor_vector(
        &self,
        subject: &SubjectRef,
        window: EvaluationWindow,
    ) -> Result<Vec<FactorValue>, NormalizeError> {
        let mut factors = Vec::with_capacity(FactorKind::ALL.len());
        for kind in FactorKind::ALL {
            let factor = match self.providers.get(&kind) {
                None => self.normalizer.neutral(kind),
                Some(provider) => match self.fetch_bounded(provider.clone(), subject, window) {
                    Ok(reading) => self.normalizer.normalize(kind, &reading)?,
                    Err(e) => {
                        warn!(%kind, %subject, error = %e, "signal provider degraded to neutral");
                        self.normalizer.neutral(kind)
                    }
                },
            };
            factors.push(factor);
        }
        Ok(factors)
    }

    /// Run one fetch on a worker thread and give up at the deadline. A hung
    /// provider keeps its thread until it returns; the result is discarded.
    fn fetch_bounded(
        &self,
        provider: Arc<dyn SignalProvider>,
        subject: &SubjectRef,
        window: EvaluationWindow,
    ) -> Result<Reading, ProviderError> {
        let (tx, rx) = mpsc::sync_channel::<Result<Reading, ProviderError>>(1);
        let subject = subject.clone();
        let builder = thread::Builder::new().name(format!("signal-{}", provider.factor_kind()));
        let spawned = builder.spawn(move || {
            let result = provider.fetch(&subject, window);
            let _ = tx.send(result);
        });

        if spawned.is_err() {
            return Err(ProviderError::Failed("failed to spawn fetch thread".to_string()));
        }

        match rx.recv_timeout(self.deadline) {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Unavailable(format!(
                "no answer within {:?}",
                self.deadline
            ))),
        }
    }
}

impl core::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("kinds", &self.providers.keys().collect::<Vec<_>>())
            .field("deadline", &self.deadline)
            .finish()
    }
}
