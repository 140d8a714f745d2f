//! Per-scope feedback worker: the single consumer that closes the loop.

use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use fleetiq_core::Scope;
use fleetiq_events::{EventBus, Subscription, TenantScoped};
use fleetiq_feedback::{FeedbackAdapter, FeedbackError, FeedbackEvent};
use fleetiq_ledger::DecideSuggestion;
use fleetiq_profiles::ProfileStore;

use crate::ledger_store::SuggestionLedger;

/// Config for the feedback worker.
#[derive(Debug, Clone)]
pub struct FeedbackWorker {
    /// Poll interval; also paces deferred-queue drains.
    pub idle_wait: Duration,
}

impl Default for FeedbackWorker {
    fn default() -> Self {
        Self {
            idle_wait: Duration::from_millis(250),
        }
    }
}

/// Handle for the running worker.
#[derive(Debug)]
pub struct FeedbackWorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl FeedbackWorkerHandle {
    /// Gracefully stop the worker thread.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

impl FeedbackWorker {
    /// Spawn a scope-pinned worker consuming feedback events from the bus.
    ///
    /// One worker per scope is the serialization story for weight updates:
    /// within a scope, nudges apply one at a time; across scopes, workers
    /// never contend. The worker also drains the adapter's deferred queue on
    /// idle ticks.
    pub fn spawn_for_scope<L, P, B>(
        &self,
        name: &'static str,
        scope: Scope,
        ledger: Arc<L>,
        adapter: Arc<FeedbackAdapter<P>>,
        bus: &B,
    ) -> FeedbackWorkerHandle
    where
        L: SuggestionLedger + 'static,
        P: ProfileStore + 'static,
        B: EventBus<FeedbackEvent>,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let subscription = bus.subscribe();

        let cfg = self.clone();
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(name, scope, cfg, shutdown_rx, subscription, ledger, adapter))
            .expect("failed to spawn feedback worker thread");

        FeedbackWorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        }
    }
}

fn worker_loop<L, P>(
    name: &'static str,
    scope: Scope,
    cfg: FeedbackWorker,
    shutdown_rx: mpsc::Receiver<()>,
    subscription: Subscription<FeedbackEvent>,
    ledger: Arc<L>,
    adapter: Arc<FeedbackAdapter<P>>,
) where
    L: SuggestionLedger + 'static,
    P: ProfileStore + 'static,
{
    info!(worker = name, %scope, "feedback worker started");

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match subscription.recv_timeout(cfg.idle_wait) {
            Ok(event) => process_event(name, &scope, &event, &ledger, &adapter),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if adapter.deferred_len() > 0 {
                    let applied = adapter.drain_deferred();
                    if applied > 0 {
                        info!(worker = name, %scope, applied, "reapplied deferred feedback");
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    info!(worker = name, %scope, "feedback worker stopped");
}

fn process_event<L, P>(
    name: &'static str,
    scope: &Scope,
    event: &FeedbackEvent,
    ledger: &Arc<L>,
    adapter: &Arc<FeedbackAdapter<P>>,
) where
    L: SuggestionLedger + 'static,
    P: ProfileStore + 'static,
{
    // Scope pinning, first line: cheap tenant filter on the event itself.
    if TenantScoped::tenant_id(event) != scope.tenant_id {
        return;
    }

    // Second line: the suggestion's own scope decides which worker owns it.
    match ledger.record_of(event.suggestion_id) {
        Ok(Some(record)) if record.scope != *scope => return,
        Ok(Some(_)) => {}
        Ok(None) => {
            warn!(worker = name, suggestion = %event.suggestion_id, "feedback for unknown suggestion");
            return;
        }
        Err(e) => {
            warn!(worker = name, error = %e, "failed to load suggestion for feedback");
            return;
        }
    }

    // Ledger transition first: a stale suggestion must not nudge weights.
    let decided = match ledger.decide(DecideSuggestion {
        tenant_id: event.tenant_id,
        suggestion_id: event.suggestion_id,
        action: event.action,
        actor: event.actor,
        reason: event.reason.clone(),
        occurred_at: event.occurred_at,
    }) {
        Ok(record) => record,
        Err(e) if e.is_stale() => {
            debug!(worker = name, suggestion = %event.suggestion_id, "stale feedback ignored");
            return;
        }
        Err(e) => {
            warn!(worker = name, suggestion = %event.suggestion_id, error = %e, "feedback transition failed");
            return;
        }
    };

    match adapter.apply(&decided, event.action) {
        Ok(profile) => {
            debug!(
                worker = name,
                suggestion = %event.suggestion_id,
                revision = profile.revision(),
                "weights nudged"
            );
        }
        // Already parked on the deferred queue; the next idle tick retries.
        Err(FeedbackError::RetriesExhausted { .. }) => {}
        Err(e) => {
            warn!(worker = name, suggestion = %event.suggestion_id, error = %e, "weight nudge failed");
        }
    }

    // At-least-once delivery: a second copy of this event finds the
    // suggestion terminal and stops at the stale gate above.
}
