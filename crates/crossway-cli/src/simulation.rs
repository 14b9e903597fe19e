//! Traffic simulation driver.
//!
//! Spawns one OS thread per vehicle.  Each vehicle repeatedly waits a random
//! arrival delay, picks a random trajectory, enters the shared
//! [`Intersection`], lingers for a random crossing time and exits.  Trip
//! records flow back to the driver over a [`crossbeam::channel`].
//!
//! A separate safety monitor thread subscribes to the gate's [`EventBus`] and
//! replays every admission and departure into its own view of who is inside.
//! Events are published under the gate lock, so the replay sees the registry
//! in the order it actually changed, and any incompatible overlap shows up as
//! a violation in the report.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Sender};
use crossway_kernel::{
    Direction, EventBus, GateError, GateEvent, Intersection, TicketId, Trajectory, compatible,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};

use crate::config::{DelayRange, SimulationConfig};
use crate::error::{Result, SimulationError};
use crate::report::{MonitorOutcome, SimulationReport, TripRecord};

/// Run a full simulation and return its report.
///
/// With `trace` set, every gate event is logged at `info` level.
pub fn run(config: &SimulationConfig, trace: bool) -> Result<SimulationReport> {
    config.validate()?;
    let seed = config.seed.unwrap_or_else(rand::random);

    info!(
        vehicles = config.vehicles,
        trips_per_vehicle = config.trips_per_vehicle,
        seed,
        "simulation starting"
    );

    let bus = EventBus::new(event_buffer(config));
    let events = bus.subscribe();
    let gate = Arc::new(Intersection::with_events(bus));

    let monitor = spawn_named("safety-monitor".to_string(), move || watch(events, trace))?;

    let started = Instant::now();
    let (trip_tx, trip_rx) = channel::unbounded();
    let mut vehicles = Vec::with_capacity(config.vehicles);
    for vehicle in 0..config.vehicles {
        let gate = Arc::clone(&gate);
        let trip_tx = trip_tx.clone();
        let config = config.clone();
        let vehicle_seed = seed.wrapping_add(vehicle as u64);

        vehicles.push(spawn_named(format!("vehicle-{vehicle}"), move || {
            drive(vehicle, &gate, &config, vehicle_seed, &trip_tx)
        })?);
    }
    drop(trip_tx);

    let trips: Vec<TripRecord> = trip_rx.iter().collect();

    let mut failure = None;
    for (vehicle, handle) in vehicles.into_iter().enumerate() {
        let err = match handle.join() {
            Ok(Ok(())) => continue,
            Ok(Err(err)) => SimulationError::from(err),
            Err(_) => SimulationError::VehiclePanicked { vehicle },
        };
        error!(vehicle, error = %err, "vehicle failed");
        failure.get_or_insert(err);
    }
    let elapsed = started.elapsed();

    if let Some(err) = failure {
        // Dropping the last gate handle closes the bus and stops the monitor.
        drop(gate);
        let _ = monitor.join();
        return Err(err);
    }

    let stats = gate.stats()?;
    gate.shutdown()?;
    drop(gate);
    let outcome = monitor
        .join()
        .map_err(|_| SimulationError::MonitorPanicked)?;

    info!(
        trips = trips.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        violations = outcome.violations,
        "simulation finished"
    );

    Ok(SimulationReport::new(
        seed,
        config.vehicles,
        &trips,
        elapsed,
        stats,
        outcome,
    ))
}

/// Smallest and largest event buffer handed to the bus.
const MIN_EVENT_BUFFER: usize = 1024;
const MAX_EVENT_BUFFER: usize = 16_384;

/// One slot per admission, block and departure, bounded.  The broadcast ring
/// is allocated up front, so a long run relies on the monitor keeping up and
/// reports `lagged` when it does not.
fn event_buffer(config: &SimulationConfig) -> usize {
    config
        .total_trips()
        .saturating_mul(3)
        .clamp(MIN_EVENT_BUFFER, MAX_EVENT_BUFFER)
}

fn spawn_named<T, F>(name: String, f: F) -> Result<thread::JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn(f)
        .map_err(|source| SimulationError::Spawn {
            thread: name,
            source,
        })
}

// ---------------------------------------------------------------------------
// Vehicles
// ---------------------------------------------------------------------------

/// One vehicle's life: `trips_per_vehicle` passes through the gate.
fn drive(
    vehicle: usize,
    gate: &Intersection,
    config: &SimulationConfig,
    seed: u64,
    trips: &Sender<TripRecord>,
) -> std::result::Result<(), GateError> {
    let mut rng = StdRng::seed_from_u64(seed);

    for trip in 0..config.trips_per_vehicle {
        pause(&mut rng, config.arrival_delay_ms);

        let trajectory = random_trajectory(&mut rng);
        let requested = Instant::now();
        let ticket = gate.enter(trajectory)?;
        let waited = requested.elapsed();

        debug!(vehicle, trip, %trajectory, waited_us = waited.as_micros() as u64, "crossing");
        pause(&mut rng, config.crossing_time_ms);
        gate.exit(ticket)?;

        if trips.send(TripRecord { trajectory, waited }).is_err() {
            break;
        }
    }
    Ok(())
}

/// Uniform over the twelve non-U-turn trajectories.
pub fn random_trajectory(rng: &mut impl Rng) -> Trajectory {
    let origin = rng.gen_range(0..Direction::ALL.len());
    let destination = (origin + rng.gen_range(1..Direction::ALL.len())) % Direction::ALL.len();
    Trajectory::new(Direction::ALL[origin], Direction::ALL[destination])
}

fn pause(rng: &mut impl Rng, range: DelayRange) {
    let ms = rng.gen_range(range.min..=range.max);
    if ms > 0 {
        thread::sleep(Duration::from_millis(ms));
    }
}

// ---------------------------------------------------------------------------
// Safety monitor
// ---------------------------------------------------------------------------

/// Replay gate events until the gate closes or the bus goes away.
fn watch(mut events: broadcast::Receiver<Arc<GateEvent>>, trace: bool) -> MonitorOutcome {
    let mut outcome = MonitorOutcome::default();
    let mut inside: HashMap<TicketId, Trajectory> = HashMap::new();

    loop {
        let event = match events.blocking_recv() {
            Ok(event) => event,
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "safety monitor fell behind");
                outcome.lagged += missed;
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        match &*event {
            GateEvent::Admitted {
                ticket_id,
                trajectory,
                occupancy,
                ..
            } => {
                if trace {
                    info!(%ticket_id, %trajectory, occupancy, "admitted");
                }
                if let Some(other) = inside.values().find(|other| !compatible(*trajectory, **other)) {
                    error!(%trajectory, conflicts_with = %other, "unsafe admission");
                    outcome.violations += 1;
                }
                inside.insert(*ticket_id, *trajectory);
                outcome.max_occupancy = outcome.max_occupancy.max(inside.len());
            }
            GateEvent::Departed {
                ticket_id,
                trajectory,
                occupancy,
                ..
            } => {
                if trace {
                    info!(%ticket_id, %trajectory, occupancy, "departed");
                }
                inside.remove(ticket_id);
            }
            GateEvent::Blocked {
                trajectory,
                conflicts_with,
                ..
            } => {
                if trace {
                    info!(%trajectory, %conflicts_with, "blocked");
                }
            }
            GateEvent::Closed { .. } => break,
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crossway_kernel::Direction::*;
    use uuid::Uuid;

    fn admitted(ticket_id: TicketId, trajectory: Trajectory, occupancy: usize) -> GateEvent {
        GateEvent::Admitted {
            ticket_id,
            trajectory,
            occupancy,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn monitor_flags_conflicting_overlap() {
        let bus = EventBus::new(16);
        let rx = bus.subscribe();
        let (a, b, c) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());

        bus.publish(admitted(a, Trajectory::new(North, South), 1));
        bus.publish(admitted(b, Trajectory::new(South, North), 2));
        // Conflicts with north->south; the gate would never allow this.
        bus.publish(admitted(c, Trajectory::new(East, South), 3));
        bus.publish(GateEvent::Departed {
            ticket_id: c,
            trajectory: Trajectory::new(East, South),
            occupancy: 2,
            timestamp: Utc::now(),
        });
        bus.publish(GateEvent::Closed {
            timestamp: Utc::now(),
        });

        let outcome = watch(rx, false);
        assert_eq!(outcome.violations, 1);
        assert_eq!(outcome.max_occupancy, 3);
        assert_eq!(outcome.lagged, 0);
    }

    #[test]
    fn monitor_stops_when_bus_is_dropped() {
        let bus = EventBus::new(16);
        let rx = bus.subscribe();
        bus.publish(admitted(Uuid::now_v7(), Trajectory::new(West, East), 1));
        drop(bus);

        let outcome = watch(rx, true);
        assert_eq!(outcome.violations, 0);
        assert_eq!(outcome.max_occupancy, 1);
    }

    #[test]
    fn small_simulation_is_safe() {
        let config = SimulationConfig::new()
            .with_vehicles(4)
            .with_trips_per_vehicle(5)
            .with_arrival_delay_ms(DelayRange::new(0, 1))
            .with_crossing_time_ms(DelayRange::new(0, 2))
            .with_seed(11);

        let report = run(&config, false).expect("simulation runs");
        assert!(report.is_safe());
        assert_eq!(report.seed, 11);
        assert_eq!(report.trips, 20);
        assert_eq!(report.gate.admitted, 20);
        assert_eq!(report.gate.departed, 20);
        assert!(report.monitor.max_occupancy <= crossway_kernel::MAX_ADMITTED);
    }

    #[test]
    fn invalid_config_is_rejected_before_spawning() {
        let config = SimulationConfig::new().with_vehicles(0);
        assert!(matches!(
            run(&config, false),
            Err(SimulationError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn event_buffer_is_bounded_for_long_runs() {
        let long = SimulationConfig::new()
            .with_vehicles(1)
            .with_trips_per_vehicle(400_000_000);
        assert!(long.validate().is_ok());
        assert_eq!(event_buffer(&long), MAX_EVENT_BUFFER);

        let short = SimulationConfig::new()
            .with_vehicles(1)
            .with_trips_per_vehicle(1);
        assert_eq!(event_buffer(&short), MIN_EVENT_BUFFER);

        let medium = SimulationConfig::new()
            .with_vehicles(10)
            .with_trips_per_vehicle(100);
        assert_eq!(event_buffer(&medium), 3000);
    }

    #[test]
    fn random_trajectories_never_u_turn() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..500 {
            let t = random_trajectory(&mut rng);
            assert_ne!(t.origin, t.destination);
        }
    }
}
