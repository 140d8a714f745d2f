//! `fleetiq-observability`
//!
//! **Responsibility:** process-wide tracing/logging setup.
//!
//! Cycle runners and feedback workers emit structured `tracing` events; this
//! crate owns how those get formatted and filtered.

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, layers).
pub mod tracing;
