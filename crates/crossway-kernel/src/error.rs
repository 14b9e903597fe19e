//! Kernel error types.
//!
//! Every public gate operation surfaces failures through [`GateError`].
//! Conflicts between trajectories are never errors: [`crate::Intersection::enter`]
//! blocks until it can admit the caller.  The variants here cover driver
//! misuse and lifecycle problems only.
//!
//! Capacity overflow is deliberately absent.  Exceeding the registry bound is
//! an internal logic defect and panics instead of returning.

use uuid::Uuid;

use crate::direction::Trajectory;

/// Unified error type for the intersection admission controller.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    // -- Lifecycle ----------------------------------------------------------
    /// The gate has been shut down and will not admit new vehicles.
    #[error("intersection is closed")]
    Closed,

    /// A thread panicked while holding the gate lock.  The registry can no
    /// longer be trusted.
    #[error("intersection lock poisoned")]
    Poisoned,

    /// Shutdown was requested while vehicles were still admitted.
    #[error("intersection still has {remaining} admitted vehicle(s)")]
    NotEmpty { remaining: usize },

    // -- Departure ----------------------------------------------------------
    /// `after_exit` was called for a trajectory with no admitted entry.
    #[error("no admitted vehicle on trajectory {trajectory}")]
    NotAdmitted { trajectory: Trajectory },

    /// `exit` was called with a ticket the registry does not hold.
    #[error("unknown admission ticket: {ticket_id}")]
    UnknownTicket {
        /// The ticket id that was looked up.
        ticket_id: Uuid,
    },

    // -- Parsing ------------------------------------------------------------
    /// A string could not be parsed as a compass direction.
    #[error("invalid direction `{input}` (expected north, south, east or west)")]
    InvalidDirection { input: String },
}

/// Convenience alias used throughout the kernel crate.
pub type Result<T> = std::result::Result<T, GateError>;
