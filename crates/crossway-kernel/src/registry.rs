//! Admission registry.
//!
//! The registry is the ordered list of vehicles currently inside the
//! intersection.  It is a plain bounded `Vec` scanned linearly; with at most
//! [`MAX_ADMITTED`] entries nothing cleverer pays for itself.
//!
//! The registry itself is not synchronized.  It lives inside the
//! [`crate::gate::Intersection`] mutex and every method assumes the caller
//! holds that lock.
//!
//! # Compatibility
//!
//! A candidate may enter only if it is [`compatible`] with every admitted
//! entry.  Two trajectories are compatible when any of these holds:
//!
//! 1. they are exact reverses of each other,
//! 2. they share an origin,
//! 3. both are right turns into different destinations.
//!
//! Each clause is symmetric, so the order of the two arguments never changes
//! the answer.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::direction::Trajectory;

/// Hard ceiling on simultaneously admitted vehicles.
pub const MAX_ADMITTED: usize = 10;

/// Unique, time-ordered admission identifier (UUID v7).
pub type TicketId = Uuid;

// ---------------------------------------------------------------------------
// Compatibility predicate
// ---------------------------------------------------------------------------

/// The clause that allowed two trajectories to coexist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompatibilityRule {
    /// The two paths are exact reverses (e.g. north→south and south→north).
    Reverse,
    /// Both vehicles arrive from the same side.
    SameOrigin,
    /// Both are right turns and they leave by different sides.
    DisjointRightTurns,
}

impl fmt::Display for CompatibilityRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompatibilityRule::Reverse => "reverse pair",
            CompatibilityRule::SameOrigin => "same origin",
            CompatibilityRule::DisjointRightTurns => "right turns into different destinations",
        };
        f.write_str(s)
    }
}

/// Which rule, if any, lets `candidate` enter while `existing` is admitted.
///
/// Rules are checked in the order listed on [`CompatibilityRule`] and the
/// first match wins.
pub fn compatibility(candidate: Trajectory, existing: Trajectory) -> Option<CompatibilityRule> {
    if existing.destination == candidate.origin && existing.origin == candidate.destination {
        Some(CompatibilityRule::Reverse)
    } else if existing.origin == candidate.origin {
        Some(CompatibilityRule::SameOrigin)
    } else if candidate.is_right_turn()
        && existing.is_right_turn()
        && candidate.destination != existing.destination
    {
        Some(CompatibilityRule::DisjointRightTurns)
    } else {
        None
    }
}

/// `true` if `candidate` may share the intersection with `existing`.
pub fn compatible(candidate: Trajectory, existing: Trajectory) -> bool {
    compatibility(candidate, existing).is_some()
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// One admitted vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admission {
    pub ticket_id: TicketId,
    pub trajectory: Trajectory,
    pub admitted_at: DateTime<Utc>,
}

/// Bounded, insertion-ordered set of admitted trajectories.
#[derive(Debug)]
pub struct Registry {
    entries: Vec<Admission>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(MAX_ADMITTED),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        MAX_ADMITTED
    }

    pub fn iter(&self) -> impl Iterator<Item = &Admission> {
        self.entries.iter()
    }

    /// Copy of the current entries, oldest first.
    pub fn entries(&self) -> Vec<Admission> {
        self.entries.clone()
    }

    /// The earliest admitted entry that `candidate` conflicts with.
    pub fn first_conflict(&self, candidate: Trajectory) -> Option<&Admission> {
        self.entries
            .iter()
            .find(|admitted| !compatible(candidate, admitted.trajectory))
    }

    /// `true` if at least one admitted entry is incompatible with
    /// `candidate`, meaning the candidate has to wait.
    pub fn is_full(&self, candidate: Trajectory) -> bool {
        self.first_conflict(candidate).is_some()
    }

    /// Append a new admission and return its ticket id.
    ///
    /// # Panics
    ///
    /// Panics if the registry already holds [`MAX_ADMITTED`] entries.  That
    /// can only happen through a capacity-accounting bug in the caller.
    pub fn insert(&mut self, trajectory: Trajectory) -> TicketId {
        assert!(
            self.entries.len() < MAX_ADMITTED,
            "admission registry overflow: {} entries, capacity {}",
            self.entries.len(),
            MAX_ADMITTED
        );

        let ticket_id = Uuid::now_v7();
        self.entries.push(Admission {
            ticket_id,
            trajectory,
            admitted_at: Utc::now(),
        });
        ticket_id
    }

    /// Remove the entry holding `ticket_id`, keeping the others in order.
    pub fn remove_ticket(&mut self, ticket_id: TicketId) -> Option<Admission> {
        let pos = self.entries.iter().position(|a| a.ticket_id == ticket_id)?;
        Some(self.entries.remove(pos))
    }

    /// Remove the earliest entry on `trajectory`, keeping the others in
    /// order.
    ///
    /// With duplicate trajectories admitted this may not be the entry the
    /// departing vehicle created.  Prefer [`Registry::remove_ticket`].
    pub fn remove_first_matching(&mut self, trajectory: Trajectory) -> Option<Admission> {
        let pos = self
            .entries
            .iter()
            .position(|a| a.trajectory == trajectory)?;
        Some(self.entries.remove(pos))
    }

    /// Check that every pair of admitted entries is compatible, each later
    /// entry against every earlier one.
    pub fn is_pairwise_compatible(&self) -> bool {
        self.entries.iter().enumerate().all(|(i, later)| {
            self.entries[..i]
                .iter()
                .all(|earlier| compatible(later.trajectory, earlier.trajectory))
        })
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
