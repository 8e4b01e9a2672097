//! Error types for evac-topology.

use thiserror::Error;

use crate::GridCoord;

/// Result type for topology operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building rooms or computing floor fields.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A floor-field target lies outside the room.
    #[error("target {0} is outside the room")]
    TargetOutOfBounds(GridCoord),

    /// A floor-field target coincides with an obstacle.
    #[error("target {0} is an obstacle")]
    TargetIsObstacle(GridCoord),

    /// Room dimensions are unusable.
    #[error("invalid room dimensions {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },

    /// ASCII room text could not be parsed.
    #[error("parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// The room has no exit cell.
    #[error("room has no exit")]
    MissingExit,
}
