use fleetiq_core::Aggregate;

/// Execute an aggregate command deterministically (no IO, no async).
///
/// Canonical event-sourced lifecycle in one step:
///
/// 1. **Decide**: `aggregate.handle(command)` produces events (no mutation).
/// 2. **Evolve**: each event is applied via `aggregate.apply(event)`.
///
/// Useful for unit tests and inline processing that doesn't need persistence
/// or publication; the ledger store performs the same sequence with an
/// optimistic append in between.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
