//! `fleetiq-events`
//!
//! **Responsibility:** domain-agnostic eventing mechanics.
//!
//! Suggestion lifecycle entries and feedback events both travel this layer:
//! an `Event` trait (stable type id, schema version, business time), a
//! tenant-scoped `EventEnvelope`, a transport-agnostic `EventBus`, and an
//! in-memory bus for tests/dev. The event *store* lives in infra; this crate
//! is distribution only.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod executor;
pub mod in_memory_bus;
pub mod scoped;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use executor::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use scoped::TenantScoped;
