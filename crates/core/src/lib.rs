//! `fleetiq-core`
//!
//! **Responsibility:** shared domain vocabulary and abstractions.
//!
//! This crate holds the strongly-typed identifiers, scope/subject references,
//! the suggestion-kind enumeration, evaluation windows, the domain error
//! model, and the aggregate/optimistic-revision contracts the ledger and
//! profile store build on. It contains no IO and no scoring logic.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod kind;
pub mod scope;
pub mod subject;
pub mod window;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedRevision};
pub use error::{DomainError, DomainResult};
pub use id::{ActorId, CustomerId, DealerId, EquipmentId, SiteId, SuggestionId, TenantId};
pub use kind::SuggestionKind;
pub use scope::Scope;
pub use subject::{EquipmentType, SubjectRef};
pub use window::EvaluationWindow;
