//! CLI argument definitions for Crossway.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use crossway_kernel::Direction;

use crate::config::DelayRange;

/// Crossway -- four-way intersection admission controller.
#[derive(Parser)]
#[command(
    name = "crossway",
    version,
    about = "Crossway -- four-way intersection admission controller",
    long_about = "Simulates vehicles crossing a shared intersection and shows which \
                  trajectories the admission gate lets in together."
)]
pub struct Cli {
    /// Default log level when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Log line format on stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable single-line records.
    Compact,
    /// One JSON object per record.
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a multi-threaded traffic simulation and print a report.
    Simulate {
        /// TOML file with simulation settings.
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Number of concurrent vehicles (1-10).
        #[arg(long)]
        vehicles: Option<usize>,

        /// Trips per vehicle.
        #[arg(long)]
        trips: Option<u32>,

        /// RNG seed for a reproducible run.
        #[arg(long)]
        seed: Option<u64>,

        /// Delay before each arrival, as MIN:MAX milliseconds.
        #[arg(long, value_name = "MIN:MAX")]
        arrival_ms: Option<DelayRange>,

        /// Time spent inside the intersection, as MIN:MAX milliseconds.
        #[arg(long, value_name = "MIN:MAX")]
        crossing_ms: Option<DelayRange>,

        /// Log every admission, block and departure.
        #[arg(long)]
        trace: bool,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Check whether one trajectory may enter while another is inside.
    Check {
        /// Origin of the arriving vehicle.
        origin: Direction,
        /// Destination of the arriving vehicle.
        destination: Direction,
        /// Origin of the vehicle already inside.
        inside_origin: Direction,
        /// Destination of the vehicle already inside.
        inside_destination: Direction,
    },

    /// Print the full compatibility matrix.
    Table,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_simulate_overrides() {
        let cli = Cli::try_parse_from([
            "crossway",
            "simulate",
            "--vehicles",
            "6",
            "--seed",
            "9",
            "--crossing-ms",
            "2:8",
            "--json",
        ])
        .unwrap();
        match cli.command {
            Commands::Simulate {
                vehicles,
                seed,
                crossing_ms,
                arrival_ms,
                json,
                trace,
                ..
            } => {
                assert_eq!(vehicles, Some(6));
                assert_eq!(seed, Some(9));
                assert_eq!(crossing_ms, Some(DelayRange::new(2, 8)));
                assert!(arrival_ms.is_none());
                assert!(json);
                assert!(!trace);
            }
            _ => panic!("expected simulate"),
        }
    }

    #[test]
    fn parses_directions_for_check() {
        let cli = Cli::try_parse_from(["crossway", "check", "n", "east", "west", "S"]).unwrap();
        match cli.command {
            Commands::Check {
                origin,
                destination,
                inside_origin,
                inside_destination,
            } => {
                assert_eq!(origin, Direction::North);
                assert_eq!(destination, Direction::East);
                assert_eq!(inside_origin, Direction::West);
                assert_eq!(inside_destination, Direction::South);
            }
            _ => panic!("expected check"),
        }
    }

    #[test]
    fn log_format_defaults_to_compact_and_accepts_json() {
        let cli = Cli::try_parse_from(["crossway", "table"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Compact);

        let cli = Cli::try_parse_from(["crossway", "table", "--log-format", "json"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);

        assert!(Cli::try_parse_from(["crossway", "--log-format", "xml", "table"]).is_err());
    }

    #[test]
    fn rejects_unknown_direction() {
        assert!(Cli::try_parse_from(["crossway", "check", "up", "n", "s", "e"]).is_err());
    }
}
