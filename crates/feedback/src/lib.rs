//! `fleetiq-feedback`
//!
//! **Responsibility:** closing the loop: decisions become weight changes.
//!
//! Accept/decline actions from the consuming application arrive as
//! `FeedbackEvent`s and trigger exactly one bounded weight nudge against the
//! suggestion's scope profile. Updates are read-modify-write under optimistic
//! concurrency with bounded retries; exhausted retries park the nudge on a
//! deferred queue instead of dropping it.

pub mod adapter;
pub mod event;

pub use adapter::{FeedbackAdapter, FeedbackConfig, FeedbackError, PendingNudge, nudge_weights};
pub use event::FeedbackEvent;
