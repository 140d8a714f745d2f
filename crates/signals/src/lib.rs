//! `fleetiq-signals`
//!
//! **Responsibility:** the factor vocabulary and the signal boundary.
//!
//! Signal providers (demand forecasters, health scorers, routing services)
//! live outside this codebase; this crate owns what crosses the boundary: the
//! fixed factor enumeration, raw provider readings, the configuration-driven
//! normalizer that maps every reading onto the common `[-1, 1]` factor scale,
//! and the provider contract itself. Provider internals are out of scope by
//! design: the engine only ever sees `FactorValue`s.

pub mod factor;
pub mod normalize;
pub mod provider;

pub use factor::{FactorContribution, FactorKind, FactorValue, HealthState, RawSignal};
pub use normalize::{NormalizeError, Normalizer, NormalizerConfig, Transform};
pub use provider::{ProviderError, Reading, SignalProvider};
