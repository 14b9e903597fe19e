//! Simulation results.
//!
//! Vehicle threads send one [`TripRecord`] per trip; [`SimulationReport`]
//! folds them together with the gate counters and the safety monitor's
//! verdict.  Waits are summarised per origin.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

use crossway_kernel::{Direction, GateStats, Trajectory};
use serde::Serialize;

/// One completed trip.
#[derive(Debug, Clone, Copy)]
pub struct TripRecord {
    pub trajectory: Trajectory,
    /// Time from calling `enter` to being admitted.
    pub waited: Duration,
}

/// What the safety monitor saw while replaying gate events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorOutcome {
    /// Admissions that overlapped an incompatible vehicle.
    pub violations: usize,
    /// Highest number of vehicles the monitor saw inside at once.
    pub max_occupancy: usize,
    /// Events missed because the monitor fell behind.  Non-zero means the
    /// replay is incomplete.
    pub lagged: u64,
}

/// Wait statistics for vehicles arriving from one side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OriginSummary {
    pub trips: usize,
    pub mean_wait_ms: f64,
    pub max_wait_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub seed: u64,
    pub vehicles: usize,
    pub trips: usize,
    pub elapsed_ms: f64,
    pub gate: GateStats,
    pub monitor: MonitorOutcome,
    pub by_origin: BTreeMap<Direction, OriginSummary>,
}

impl SimulationReport {
    pub fn new(
        seed: u64,
        vehicles: usize,
        trips: &[TripRecord],
        elapsed: Duration,
        gate: GateStats,
        monitor: MonitorOutcome,
    ) -> Self {
        let mut by_origin: BTreeMap<Direction, OriginSummary> = BTreeMap::new();
        let mut totals: BTreeMap<Direction, f64> = BTreeMap::new();

        for trip in trips {
            let wait_ms = millis(trip.waited);
            let summary = by_origin.entry(trip.trajectory.origin).or_default();
            summary.trips += 1;
            summary.max_wait_ms = summary.max_wait_ms.max(wait_ms);
            *totals.entry(trip.trajectory.origin).or_default() += wait_ms;
        }
        for (origin, summary) in &mut by_origin {
            summary.mean_wait_ms = totals[origin] / summary.trips as f64;
        }

        Self {
            seed,
            vehicles,
            trips: trips.len(),
            elapsed_ms: millis(elapsed),
            gate,
            monitor,
            by_origin,
        }
    }

    /// No overlap of incompatible vehicles was seen, and the monitor saw
    /// every event.
    pub fn is_safe(&self) -> bool {
        self.monitor.violations == 0 && self.monitor.lagged == 0
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Crossway simulation (seed {})", self.seed);
        let _ = writeln!(
            out,
            "  {} vehicles, {} trips in {:.1} ms",
            self.vehicles, self.trips, self.elapsed_ms
        );
        let _ = writeln!(
            out,
            "  admitted {}  blocked {}  wakeups {}  peak occupancy {}",
            self.gate.admitted, self.gate.blocked, self.gate.wakeups, self.gate.peak_occupancy
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "  {:<8}{:>8}{:>14}{:>14}", "origin", "trips", "mean wait", "max wait");
        for (origin, s) in &self.by_origin {
            let _ = writeln!(
                out,
                "  {:<8}{:>8}{:>11.2} ms{:>11.2} ms",
                origin.as_str(),
                s.trips,
                s.mean_wait_ms,
                s.max_wait_ms
            );
        }
        let _ = writeln!(out);

        let verdict = if self.is_safe() {
            "safe".to_string()
        } else if self.monitor.lagged > 0 {
            format!("UNVERIFIED ({} events missed)", self.monitor.lagged)
        } else {
            format!("UNSAFE ({} conflicting overlaps)", self.monitor.violations)
        };
        let _ = writeln!(
            out,
            "  safety: {verdict}, max observed occupancy {}",
            self.monitor.max_occupancy
        );
        out
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
