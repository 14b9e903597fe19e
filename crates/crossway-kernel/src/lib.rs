//! Crossway intersection admission controller.
//!
//! This crate decides which vehicles may be inside a shared four-way
//! intersection at the same time:
//!
//! - **[`direction`]** -- compass directions, trajectories, right turns.
//! - **[`registry`]** -- the bounded list of admitted vehicles and the
//!   pairwise compatibility rules.
//! - **[`gate`]** -- [`Intersection`], the blocking entry / non-blocking exit
//!   protocol built on one [`std::sync::Mutex`] and one [`std::sync::Condvar`].
//! - **[`events`]** -- optional admission event stream backed by
//!   [`tokio::sync::broadcast`].
//! - **[`error`]** -- [`GateError`] via [`thiserror`].
//!
//! Vehicles are plain OS threads.  Share one [`Intersection`] between them
//! with an [`std::sync::Arc`]; nothing here needs an async runtime.

pub mod direction;
pub mod error;
pub mod events;
pub mod gate;
pub mod registry;

pub use direction::{Direction, Trajectory};
pub use error::{GateError, Result};
pub use events::{EventBus, GateEvent};
pub use gate::{GateStats, Intersection, Passage, Ticket};
pub use registry::{
    Admission, CompatibilityRule, MAX_ADMITTED, Registry, TicketId, compatibility, compatible,
};
