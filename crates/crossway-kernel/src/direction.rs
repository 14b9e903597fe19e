//! Compass directions and trajectories.
//!
//! A [`Trajectory`] is the path a vehicle takes through the intersection:
//! the side it arrives from and the side it leaves by.  Only four
//! trajectories count as right turns, namely the 90° clockwise turns
//! listed in [`Trajectory::is_right_turn`].
//!
//! ```rust
//! # use crossway_kernel::direction::{Direction, Trajectory};
//! let t = Trajectory::new(Direction::West, Direction::South);
//! assert!(t.is_right_turn());
//! assert!(!t.reversed().is_right_turn());
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GateError;

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// One side of the four-way intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// All four directions, in a fixed order.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// Lowercase name, as used in config files and CLI arguments.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "north" | "n" => Ok(Direction::North),
            "south" | "s" => Ok(Direction::South),
            "east" | "e" => Ok(Direction::East),
            "west" | "w" => Ok(Direction::West),
            _ => Err(GateError::InvalidDirection {
                input: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Trajectory
// ---------------------------------------------------------------------------

/// An (origin, destination) pair describing one vehicle's path.
///
/// U-turns (`origin == destination`) are not part of the model.  Callers are
/// responsible for never constructing one; the gate does not validate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Trajectory {
    pub origin: Direction,
    pub destination: Direction,
}

impl Trajectory {
    pub const fn new(origin: Direction, destination: Direction) -> Self {
        Self {
            origin,
            destination,
        }
    }

    /// The same path driven the other way.
    pub const fn reversed(self) -> Self {
        Self::new(self.destination, self.origin)
    }

    /// `true` for the four clockwise 90° turns:
    /// west→south, south→east, east→north, north→west.
    pub fn is_right_turn(self) -> bool {
        use Direction::*;
        matches!(
            (self.origin, self.destination),
            (West, South) | (South, East) | (East, North) | (North, West)
        )
    }

    /// Every trajectory except U-turns (12 in total).
    pub fn all() -> impl Iterator<Item = Trajectory> {
        Direction::ALL.into_iter().flat_map(|origin| {
            Direction::ALL
                .into_iter()
                .filter(move |destination| *destination != origin)
                .map(move |destination| Trajectory::new(origin, destination))
        })
    }
}

impl From<(Direction, Direction)> for Trajectory {
    fn from((origin, destination): (Direction, Direction)) -> Self {
        Self::new(origin, destination)
    }
}

impl fmt::Display for Trajectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.origin, self.destination)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
