//! Evacuation Grid Topology
//!
//! Square-grid topology for crowd evacuation: coordinates, orientations,
//! neighborhoods, rooms, and the static floor fields that drive navigation.
//!
//! # Connectivity
//!
//! Movement happens on the 8-connected (Moore) grid:
//! - 4 axis neighbors, step cost 1
//! - 4 diagonal neighbors, step cost √2
//!
//! Rigid pairs only form across the 4 axis connections.
//!
//! # Floor Fields
//!
//! A floor field maps every cell to its walking distance to a target cell.
//! Fields are precomputed per topology and cached by target in a
//! [`FieldTable`], which is bound to the room's [`Fingerprint`].

mod coord;
mod error;
mod field;
mod neighbors;
mod room;

pub use coord::{GridCoord, Orientation};
pub use error::{Error, Result};
pub use field::{FieldTable, FloorField};
pub use neighbors::{are_axis_adjacent, are_moore_adjacent, count_moore_neighbors, Neighbors};
pub use room::{Fingerprint, Region, Room, Tile};

/// Connections per cell on the Moore grid.
pub const MOORE_CONNECTIONS: usize = 8;

/// Axis connections per cell.
pub const AXIS_CONNECTIONS: usize = 4;

/// Diagonal connections per cell.
pub const DIAGONAL_CONNECTIONS: usize = 4;

const _: () = assert!(AXIS_CONNECTIONS + DIAGONAL_CONNECTIONS == MOORE_CONNECTIONS);
