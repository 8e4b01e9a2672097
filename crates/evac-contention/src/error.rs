//! Error types for evac-contention.

use evac_topology::GridCoord;
use thiserror::Error;

use crate::AgentId;

/// Result type for contention operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Protocol violations. Losing a contest is not one of them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Tried to place an agent on a cell that already has a resident.
    #[error("cell {cell} already holds agent {resident}, cannot place {incoming}")]
    CellOccupied {
        cell: GridCoord,
        resident: AgentId,
        incoming: AgentId,
    },

    /// Tried to vacate or evacuate a cell with no resident.
    #[error("cell {0} has no resident")]
    CellEmpty(GridCoord),

    /// Coordinate outside the board.
    #[error("cell {0} is outside the board")]
    OutOfBounds(GridCoord),

    /// An agent registered more than one claim in a single round.
    #[error("agent {0} already holds a claim this round")]
    DuplicateClaim(AgentId),

    /// No claim is registered for this agent in the current round.
    #[error("agent {0} holds no claim this round")]
    UnknownClaim(AgentId),

    /// A leg's origin is not where the board says the agent is.
    #[error("agent {agent} does not reside at {from}")]
    NotResident { agent: AgentId, from: GridCoord },
}
