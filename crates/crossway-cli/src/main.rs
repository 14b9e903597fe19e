//! CLI entry point for Crossway.
//!
//! This binary provides the `crossway` command: a multi-threaded traffic
//! simulation that drives the intersection admission gate, plus two
//! subcommands for inspecting the compatibility rules.

mod cli;
mod config;
mod error;
mod helpers;
mod matrix;
mod report;
mod simulation;

use anyhow::{Context, Result, bail};
use clap::Parser;
use crossway_kernel::Trajectory;
use tracing::info;

use crate::cli::{Cli, Commands};
use crate::config::SimulationConfig;

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    helpers::init_tracing(&cli.log_level, cli.log_format);

    match cli.command {
        Commands::Simulate {
            config,
            vehicles,
            trips,
            seed,
            arrival_ms,
            crossing_ms,
            trace,
            json,
        } => {
            let mut cfg = match config {
                Some(path) => SimulationConfig::load(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => {
                    info!("no config file given, using defaults");
                    SimulationConfig::new()
                }
            };
            if let Some(vehicles) = vehicles {
                cfg = cfg.with_vehicles(vehicles);
            }
            if let Some(trips) = trips {
                cfg = cfg.with_trips_per_vehicle(trips);
            }
            if let Some(seed) = seed {
                cfg = cfg.with_seed(seed);
            }
            if let Some(range) = arrival_ms {
                cfg = cfg.with_arrival_delay_ms(range);
            }
            if let Some(range) = crossing_ms {
                cfg = cfg.with_crossing_time_ms(range);
            }
            cmd_simulate(&cfg, trace, json)
        }
        Commands::Check {
            origin,
            destination,
            inside_origin,
            inside_destination,
        } => {
            println!(
                "{}",
                matrix::describe(
                    Trajectory::new(origin, destination),
                    Trajectory::new(inside_origin, inside_destination),
                )
            );
            Ok(())
        }
        Commands::Table => {
            print!("{}", matrix::render_table());
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommand: simulate
// ---------------------------------------------------------------------------

fn cmd_simulate(config: &SimulationConfig, trace: bool, json: bool) -> Result<()> {
    let report = simulation::run(config, trace).context("simulation failed")?;

    if json {
        let out = serde_json::to_string_pretty(&report).context("failed to encode report")?;
        println!("{out}");
    } else {
        print!("{}", report.render_text());
    }

    if !report.is_safe() {
        bail!(
            "safety check failed: {} conflicting overlap(s), {} event(s) missed",
            report.monitor.violations,
            report.monitor.lagged
        );
    }
    Ok(())
}
