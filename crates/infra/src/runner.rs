//! Recurring evaluation-cycle runner.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use fleetiq_core::{Scope, SubjectRef};
use fleetiq_profiles::ProfileStore;

use crate::cycle::EvaluationCycle;
use crate::ledger_store::SuggestionLedger;

/// Where the runner learns which subjects are active for a scope.
///
/// The surrounding application owns the fleet inventory; this seam keeps the
/// engine from assuming anything about its storage.
pub trait SubjectSource: Send + Sync + 'static {
    fn active_subjects(&self, scope: &Scope) -> Result<Vec<SubjectRef>, SubjectSourceError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("subject source failed: {0}")]
pub struct SubjectSourceError(pub String);

/// Config for the cycle runner.
#[derive(Debug, Clone)]
pub struct CycleRunner {
    pub interval: Duration,
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for CycleRunner {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            max_retries: 5,
            base_backoff: Duration::from_millis(250),
        }
    }
}

/// Handle for the running cycle runner (shutdown + trigger hook).
#[derive(Debug)]
pub struct CycleRunnerHandle {
    shutdown: mpsc::Sender<()>,
    trigger: mpsc::SyncSender<()>,
    changed: Arc<Mutex<HashSet<SubjectRef>>>,
    cancel: Arc<AtomicBool>,
    join: Option<thread::JoinHandle<()>>,
}

impl CycleRunnerHandle {
    /// Material-state-change hook: call when a subject's world moved
    /// (check-in/out, breakdown report, booking change).
    ///
    /// Backpressure: triggers are coalesced (bounded queue); the changed-set
    /// accumulates subjects until the next pass drains it.
    pub fn trigger(&self, subject: SubjectRef) {
        if let Ok(mut changed) = self.changed.lock() {
            changed.insert(subject);
        }
        // Coalesce: channel capacity=1; ignore if already full.
        let _ = self.trigger.try_send(());
    }

    /// Gracefully stop the runner thread. An in-flight cycle is cancelled
    /// between candidates.
    pub fn shutdown(mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

impl CycleRunner {
    /// Spawn a scope-pinned runner.
    ///
    /// - Schedule: runs every `interval`
    /// - Event-trigger: call `handle.trigger(subject)` on material changes
    /// - Failures: logged + retried with bounded exponential backoff; never
    ///   propagate
    pub fn spawn_for_scope<L, P, R>(
        &self,
        name: &'static str,
        scope: Scope,
        cycle: Arc<EvaluationCycle<L, P>>,
        subjects: Arc<R>,
    ) -> CycleRunnerHandle
    where
        L: SuggestionLedger + 'static,
        P: ProfileStore + 'static,
        R: SubjectSource + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let (trigger_tx, trigger_rx) = mpsc::sync_channel::<()>(1);
        let changed: Arc<Mutex<HashSet<SubjectRef>>> = Arc::new(Mutex::new(HashSet::new()));
        let cancel = Arc::new(AtomicBool::new(false));

        let cfg = self.clone();
        let changed_for_loop = changed.clone();
        let cancel_for_loop = cancel.clone();
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                runner_loop(
                    name,
                    scope,
                    cfg,
                    shutdown_rx,
                    trigger_rx,
                    changed_for_loop,
                    cancel_for_loop,
                    cycle,
                    subjects,
                )
            })
            .expect("failed to spawn evaluation cycle runner thread");

        CycleRunnerHandle {
            shutdown: shutdown_tx,
            trigger: trigger_tx,
            changed,
            cancel,
            join: Some(join),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn runner_loop<L, P, R>(
    name: &'static str,
    scope: Scope,
    cfg: CycleRunner,
    shutdown_rx: mpsc::Receiver<()>,
    trigger_rx: mpsc::Receiver<()>,
    changed: Arc<Mutex<HashSet<SubjectRef>>>,
    cancel: Arc<AtomicBool>,
    cycle: Arc<EvaluationCycle<L, P>>,
    subjects: Arc<R>,
) where
    L: SuggestionLedger + 'static,
    P: ProfileStore + 'static,
    R: SubjectSource + 'static,
{
    info!(runner = name, %scope, "evaluation cycle runner started");

    let mut next_tick = Instant::now() + cfg.interval;
    let mut pending = true; // run once on startup
    let mut failures: u32 = 0;
    let mut backoff_until: Option<Instant> = None;

    loop {
        // Shutdown has priority.
        if shutdown_rx.try_recv().is_ok() || cancel.load(Ordering::Relaxed) {
            break;
        }

        let now = Instant::now();
        if now >= next_tick {
            pending = true;
            // Keep a stable cadence even if we were delayed.
            while next_tick <= now {
                next_tick += cfg.interval;
            }
        }

        // Event-trigger: non-blocking drain to coalesce multiple triggers.
        while trigger_rx.try_recv().is_ok() {
            pending = true;
        }

        // Backoff gate.
        if let Some(until) = backoff_until {
            if Instant::now() < until {
                thread::sleep(Duration::from_millis(50));
                continue;
            }
            backoff_until = None;
        }

        if !pending {
            // Wait until next tick or trigger or shutdown.
            let sleep_for = next_tick
                .saturating_duration_since(Instant::now())
                .min(Duration::from_millis(250));
            thread::sleep(sleep_for);
            continue;
        }

        pending = false;

        // Snapshot and clear the material-change set for this pass.
        let changed_now: HashSet<SubjectRef> = changed
            .lock()
            .map(|mut set| set.drain().collect())
            .unwrap_or_default();

        // 1) Active subjects from the surrounding application.
        let active = match subjects.active_subjects(&scope) {
            Ok(subjects) => subjects,
            Err(e) => {
                warn!(runner = name, %scope, error = %e, "failed to list active subjects");
                failures += 1;
                if failures <= cfg.max_retries {
                    pending = true;
                    backoff_until = Some(Instant::now() + backoff(cfg.base_backoff, failures));
                } else {
                    failures = 0;
                }
                continue;
            }
        };

        // 2) Run the cycle.
        match cycle.run(&scope, &active, &changed_now, Utc::now(), &cancel) {
            Ok(_report) => {
                failures = 0;
            }
            Err(e) => {
                warn!(runner = name, %scope, error = %e, "evaluation cycle failed");
                failures += 1;
                if failures <= cfg.max_retries {
                    pending = true;
                    backoff_until = Some(Instant::now() + backoff(cfg.base_backoff, failures));
                } else {
                    failures = 0;
                }
            }
        }
    }

    info!(runner = name, %scope, "evaluation cycle runner stopped");
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    // Exponential backoff: base * 2^(attempt-1), capped.
    let pow = 1u32 << attempt.saturating_sub(1).min(10);
    let ms = base.as_millis().saturating_mul(pow as u128);
    Duration::from_millis(ms.min(10_000) as u64)
}
