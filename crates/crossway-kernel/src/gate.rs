//! Admission gate.
//!
//! [`Intersection`] is the blocking entry / non-blocking exit protocol that
//! vehicle threads run around their traversal:
//!
//! ```text
//! Requesting  --enter-->  Admitted  --exit-->  Done
//!      ^          |
//!      +--wait----+   (while some admitted trajectory conflicts)
//! ```
//!
//! All shared state (the [`Registry`], counters, the closed flag) sits behind
//! one [`Mutex`].  A vehicle that conflicts with an admitted trajectory parks
//! on a single [`Condvar`]; every departure wakes *all* parked vehicles and
//! each re-checks its own trajectory.  There is no FIFO or fairness
//! guarantee: whichever waiter becomes compatible and reacquires the lock
//! first gets in.
//!
//! # Example
//!
//! ```rust
//! # use crossway_kernel::{Direction, Intersection, Trajectory};
//! let gate = Intersection::new();
//! let ticket = gate.enter(Trajectory::new(Direction::North, Direction::South))?;
//! assert_eq!(gate.occupancy()?, 1);
//!
//! gate.exit(ticket)?;
//! gate.shutdown()?;
//! # Ok::<(), crossway_kernel::GateError>(())
//! ```

use std::sync::{Condvar, Mutex, MutexGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::direction::{Direction, Trajectory};
use crate::error::{GateError, Result};
use crate::events::{EventBus, GateEvent};
use crate::registry::{Admission, MAX_ADMITTED, Registry, TicketId};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Proof of admission returned by [`Intersection::enter`].
///
/// A ticket is neither `Clone` nor `Copy`, so each admission can be released
/// exactly once, and releasing it removes that admission even when other
/// vehicles share the same trajectory.
#[derive(Debug, PartialEq, Eq)]
pub struct Ticket {
    id: TicketId,
    trajectory: Trajectory,
}

impl Ticket {
    pub fn id(&self) -> TicketId {
        self.id
    }

    pub fn trajectory(&self) -> Trajectory {
        self.trajectory
    }
}

/// Running counters kept alongside the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateStats {
    /// Vehicles admitted since the gate was created.
    pub admitted: u64,
    /// Vehicles that have exited.
    pub departed: u64,
    /// Entries that had to wait at least once.
    pub blocked: u64,
    /// Times a parked vehicle woke up and re-checked.
    pub wakeups: u64,
    /// Highest occupancy ever observed.
    pub peak_occupancy: usize,
}

struct GateState {
    registry: Registry,
    stats: GateStats,
    closed: bool,
}

impl GateState {
    fn assert_capacity(&self) {
        assert!(
            self.registry.len() < MAX_ADMITTED,
            "intersection capacity exceeded: {} vehicles admitted, limit {}",
            self.registry.len(),
            MAX_ADMITTED
        );
    }
}

// ---------------------------------------------------------------------------
// Intersection
// ---------------------------------------------------------------------------

/// Admission controller for one four-way intersection.
///
/// `Send + Sync`; share it between vehicle threads with an `Arc`.
pub struct Intersection {
    state: Mutex<GateState>,
    /// Signalled on every departure and on shutdown.
    changed: Condvar,
    events: Option<EventBus>,
}

impl Intersection {
    /// Create an open intersection with an empty registry.
    #[must_use]
    pub fn new() -> Self {
        tracing::info!(capacity = MAX_ADMITTED, "intersection opened");
        Self {
            state: Mutex::new(GateState {
                registry: Registry::new(),
                stats: GateStats::default(),
                closed: false,
            }),
            changed: Condvar::new(),
            events: None,
        }
    }

    /// Create an intersection that publishes every state change to `bus`.
    #[must_use]
    pub fn with_events(bus: EventBus) -> Self {
        Self {
            events: Some(bus),
            ..Self::new()
        }
    }

    /// Block until `trajectory` is compatible with every admitted vehicle,
    /// then admit it.
    ///
    /// # Errors
    ///
    /// [`GateError::Closed`] if the gate is (or becomes, while waiting) shut
    /// down, and [`GateError::Poisoned`] if another thread panicked while
    /// holding the lock.
    ///
    /// # Panics
    ///
    /// Panics if the registry is already at [`MAX_ADMITTED`].  The driver
    /// must never run more vehicles than that.
    pub fn enter(&self, trajectory: Trajectory) -> Result<Ticket> {
        let mut state = self.lock()?;
        state.assert_capacity();

        let mut waited = false;
        loop {
            if state.closed {
                tracing::warn!(%trajectory, "entry refused: intersection closed");
                return Err(GateError::Closed);
            }

            let Some(conflict) = state.registry.first_conflict(trajectory).map(|a| a.trajectory)
            else {
                break;
            };

            if !waited {
                waited = true;
                state.stats.blocked += 1;
                tracing::debug!(%trajectory, conflicts_with = %conflict, "vehicle waiting");
                self.publish(GateEvent::Blocked {
                    trajectory,
                    conflicts_with: conflict,
                    timestamp: Utc::now(),
                });
            }

            state = self.changed.wait(state).map_err(|_| GateError::Poisoned)?;
            state.stats.wakeups += 1;
            tracing::trace!(%trajectory, "vehicle woke, re-checking");
        }

        state.assert_capacity();
        let id = state.registry.insert(trajectory);
        let occupancy = state.registry.len();
        state.stats.admitted += 1;
        state.stats.peak_occupancy = state.stats.peak_occupancy.max(occupancy);

        tracing::debug!(ticket_id = %id, %trajectory, occupancy, "vehicle admitted");
        // Published under the lock so subscribers see registry order.
        self.publish(GateEvent::Admitted {
            ticket_id: id,
            trajectory,
            occupancy,
            timestamp: Utc::now(),
        });

        Ok(Ticket { id, trajectory })
    }

    /// Driver entry point: [`Intersection::enter`] for `origin -> destination`.
    ///
    /// A caller that leaves through [`Intersection::after_exit`] may discard
    /// the returned ticket.
    pub fn before_entry(&self, origin: Direction, destination: Direction) -> Result<Ticket> {
        self.enter(Trajectory::new(origin, destination))
    }

    /// Release an admission and wake every waiting vehicle.
    ///
    /// # Errors
    ///
    /// [`GateError::UnknownTicket`] if the ticket is not held by this
    /// intersection.
    pub fn exit(&self, ticket: Ticket) -> Result<Trajectory> {
        let mut state = self.lock()?;
        let removed = state
            .registry
            .remove_ticket(ticket.id)
            .ok_or(GateError::UnknownTicket {
                ticket_id: ticket.id,
            })?;

        self.depart(&mut state, &removed);
        Ok(removed.trajectory)
    }

    /// Driver exit point keyed by trajectory alone.
    ///
    /// Removes the *earliest* admitted entry on `origin -> destination`.  When
    /// several vehicles share that trajectory this need not be the caller's
    /// own entry; the occupancy count is still right.  Callers holding a
    /// [`Ticket`] should use [`Intersection::exit`].
    ///
    /// # Errors
    ///
    /// [`GateError::NotAdmitted`] if no vehicle on that trajectory is inside.
    pub fn after_exit(&self, origin: Direction, destination: Direction) -> Result<()> {
        let trajectory = Trajectory::new(origin, destination);
        let mut state = self.lock()?;
        let Some(removed) = state.registry.remove_first_matching(trajectory) else {
            tracing::warn!(%trajectory, "exit without matching entry");
            return Err(GateError::NotAdmitted { trajectory });
        };

        self.depart(&mut state, &removed);
        Ok(())
    }

    /// [`Intersection::enter`], returning a guard that exits on drop.
    pub fn pass(&self, trajectory: Trajectory) -> Result<Passage<'_>> {
        let ticket = self.enter(trajectory)?;
        Ok(Passage {
            gate: self,
            trajectory,
            ticket: Some(ticket),
        })
    }

    /// Close the intersection.  Later entries fail with [`GateError::Closed`].
    ///
    /// # Errors
    ///
    /// [`GateError::NotEmpty`] if vehicles are still admitted.  The gate stays
    /// open in that case.
    pub fn shutdown(&self) -> Result<()> {
        let mut state = self.lock()?;
        if !state.registry.is_empty() {
            return Err(GateError::NotEmpty {
                remaining: state.registry.len(),
            });
        }
        if state.closed {
            return Ok(());
        }

        state.closed = true;
        self.publish(GateEvent::Closed {
            timestamp: Utc::now(),
        });
        self.changed.notify_all();

        tracing::info!(
            admitted = state.stats.admitted,
            blocked = state.stats.blocked,
            peak_occupancy = state.stats.peak_occupancy,
            "intersection closed"
        );
        Ok(())
    }

    /// Number of vehicles currently inside.
    pub fn occupancy(&self) -> Result<usize> {
        Ok(self.lock()?.registry.len())
    }

    /// Copy of the admitted entries, oldest first.
    pub fn snapshot(&self) -> Result<Vec<Admission>> {
        Ok(self.lock()?.registry.entries())
    }

    pub fn stats(&self) -> Result<GateStats> {
        Ok(self.lock()?.stats)
    }

    pub fn is_closed(&self) -> Result<bool> {
        Ok(self.lock()?.closed)
    }

    // -- Private helpers ----------------------------------------------------

    fn lock(&self) -> Result<MutexGuard<'_, GateState>> {
        self.state.lock().map_err(|_| GateError::Poisoned)
    }

    /// Bookkeeping shared by both exit paths.  Caller holds the lock.
    fn depart(&self, state: &mut GateState, removed: &Admission) {
        state.stats.departed += 1;
        let occupancy = state.registry.len();

        tracing::debug!(
            ticket_id = %removed.ticket_id,
            trajectory = %removed.trajectory,
            occupancy,
            "vehicle departed"
        );
        self.publish(GateEvent::Departed {
            ticket_id: removed.ticket_id,
            trajectory: removed.trajectory,
            occupancy,
            timestamp: Utc::now(),
        });

        self.changed.notify_all();
    }

    fn publish(&self, event: GateEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

impl Default for Intersection {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Passage guard
// ---------------------------------------------------------------------------

/// A vehicle inside the intersection.  Exits when dropped.
#[must_use = "dropping a Passage immediately releases the admission"]
pub struct Passage<'a> {
    gate: &'a Intersection,
    trajectory: Trajectory,
    /// `None` only once released.
    ticket: Option<Ticket>,
}

impl Passage<'_> {
    pub fn trajectory(&self) -> Trajectory {
        self.trajectory
    }

    /// Exit now and report the result instead of logging it on drop.
    pub fn leave(mut self) -> Result<Trajectory> {
        match self.ticket.take() {
            Some(ticket) => self.gate.exit(ticket),
            None => Ok(self.trajectory),
        }
    }
}

impl Drop for Passage<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            if let Err(err) = self.gate.exit(ticket) {
                tracing::warn!(error = %err, "passage release failed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::Direction::*;
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    const SETTLE: Duration = Duration::from_millis(100);

    fn wait_until(cond: impl Fn() -> bool) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(std::time::Instant::now() < deadline, "condition not reached");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn intersection_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Intersection>();
    }

    #[test]
    fn enter_exit_round_trip() {
        let gate = Intersection::new();
        let t = Trajectory::new(North, South);

        let ticket = gate.enter(t).expect("enter");
        assert_eq!(ticket.trajectory(), t);
        assert_eq!(gate.occupancy().unwrap(), 1);

        assert_eq!(gate.exit(ticket).expect("exit"), t);
        assert_eq!(gate.occupancy().unwrap(), 0);

        let stats = gate.stats().unwrap();
        assert_eq!(stats.admitted, 1);
        assert_eq!(stats.departed, 1);
        assert_eq!(stats.blocked, 0);
    }

    #[test]
    fn compatible_vehicles_enter_together() {
        let gate = Intersection::new();
        let _a = gate.before_entry(North, South).unwrap();
        let _b = gate.before_entry(North, East).unwrap();
        let _c = gate.before_entry(North, West).unwrap();
        assert_eq!(gate.occupancy().unwrap(), 3);
        assert_eq!(gate.stats().unwrap().peak_occupancy, 3);
    }

    #[test]
    fn conflicting_vehicle_waits_for_exit() {
        let gate = Arc::new(Intersection::new());
        let ticket = gate.before_entry(North, South).unwrap();

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                let ticket = gate.before_entry(East, South).unwrap();
                tx.send(()).unwrap();
                gate.exit(ticket).unwrap();
            })
        };

        wait_until(|| gate.stats().unwrap().blocked == 1);
        assert!(rx.recv_timeout(SETTLE).is_err(), "east->south must block");

        gate.exit(ticket).unwrap();
        rx.recv_timeout(Duration::from_secs(5))
            .expect("waiter admitted after exit");
        waiter.join().unwrap();

        assert_eq!(gate.occupancy().unwrap(), 0);
        assert!(gate.stats().unwrap().wakeups >= 1);
    }

    #[test]
    fn after_exit_releases_waiting_vehicle() {
        let gate = Arc::new(Intersection::new());
        gate.before_entry(North, South).unwrap();

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                gate.before_entry(West, South).unwrap();
                tx.send(()).unwrap();
                gate.after_exit(West, South).unwrap();
            })
        };

        wait_until(|| gate.stats().unwrap().blocked == 1);
        assert!(rx.recv_timeout(SETTLE).is_err(), "west->south must block");

        gate.after_exit(North, South).unwrap();
        rx.recv_timeout(Duration::from_secs(5))
            .expect("waiter admitted after trajectory exit");
        waiter.join().unwrap();

        assert_eq!(gate.occupancy().unwrap(), 0);
        assert_eq!(gate.stats().unwrap().departed, 2);
    }

    #[test]
    fn after_exit_removes_first_match() {
        let gate = Intersection::new();
        let first = gate.before_entry(West, East).unwrap();
        let second = gate.before_entry(West, East).unwrap();

        gate.after_exit(West, East).unwrap();

        let left = gate.snapshot().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].ticket_id, second.id());
        assert_ne!(left[0].ticket_id, first.id());
    }

    #[test]
    fn exit_by_ticket_removes_that_admission() {
        let gate = Intersection::new();
        let first = gate.before_entry(West, East).unwrap();
        let first_id = first.id();
        let second = gate.before_entry(West, East).unwrap();

        gate.exit(second).unwrap();

        let left = gate.snapshot().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].ticket_id, first_id);
        gate.exit(first).unwrap();
    }

    #[test]
    fn after_exit_without_entry_is_rejected() {
        let gate = Intersection::new();
        let err = gate.after_exit(South, West).unwrap_err();
        assert!(matches!(err, GateError::NotAdmitted { .. }));
        assert_eq!(gate.stats().unwrap().departed, 0);
    }

    #[test]
    fn ticket_from_another_gate_is_unknown() {
        let a = Intersection::new();
        let b = Intersection::new();
        let ticket = a.before_entry(North, West).unwrap();

        let err = b.exit(ticket).unwrap_err();
        assert!(matches!(err, GateError::UnknownTicket { .. }));
        assert_eq!(a.occupancy().unwrap(), 1);
    }

    #[test]
    fn passage_exits_on_drop() {
        let gate = Intersection::new();
        {
            let passage = gate.pass(Trajectory::new(East, North)).unwrap();
            assert_eq!(passage.trajectory(), Trajectory::new(East, North));
            assert_eq!(gate.occupancy().unwrap(), 1);
        }
        assert_eq!(gate.occupancy().unwrap(), 0);

        let passage = gate.pass(Trajectory::new(South, East)).unwrap();
        assert_eq!(passage.leave().unwrap(), Trajectory::new(South, East));
        assert_eq!(gate.stats().unwrap().departed, 2);
    }

    #[test]
    fn shutdown_requires_empty_registry() {
        let gate = Intersection::new();
        let ticket = gate.before_entry(North, South).unwrap();

        assert!(matches!(
            gate.shutdown(),
            Err(GateError::NotEmpty { remaining: 1 })
        ));
        assert!(!gate.is_closed().unwrap());

        gate.exit(ticket).unwrap();
        gate.shutdown().expect("empty gate shuts down");
        assert!(gate.is_closed().unwrap());
        assert!(matches!(
            gate.before_entry(North, South),
            Err(GateError::Closed)
        ));
    }

    #[test]
    #[should_panic(expected = "intersection capacity exceeded")]
    fn overflowing_capacity_is_fatal() {
        let gate = Intersection::new();
        let mut tickets = Vec::new();
        for _ in 0..=MAX_ADMITTED {
            tickets.push(gate.before_entry(North, South).unwrap());
        }
    }

    #[test]
    fn events_follow_admissions() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let gate = Intersection::with_events(bus);

        let ticket = gate.before_entry(North, West).unwrap();
        gate.exit(ticket).unwrap();
        gate.shutdown().unwrap();

        assert!(matches!(*rx.try_recv().unwrap(), GateEvent::Admitted { occupancy: 1, .. }));
        assert!(matches!(*rx.try_recv().unwrap(), GateEvent::Departed { occupancy: 0, .. }));
        assert!(matches!(*rx.try_recv().unwrap(), GateEvent::Closed { .. }));
    }
}
