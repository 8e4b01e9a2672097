//! Error types for evac-sim.

use evac_contention::AgentId;
use evac_topology::GridCoord;
use thiserror::Error;

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that halt a simulation step or reject a setup call.
///
/// Losing a cell contest, breaking a ring of claims and finding nobody to
/// pair with are ordinary tick outcomes and never show up here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("topology error: {0}")]
    Topology(#[from] evac_topology::Error),

    #[error("contention error: {0}")]
    Contention(#[from] evac_contention::Error),

    /// An occupied cell has no path to a newly activated target.
    #[error("target {target} is unreachable from {from}")]
    UnreachableTarget { target: GridCoord, from: GridCoord },

    /// A bond request was rejected; nothing changed.
    #[error("cannot pair {first} with {second}: {reason}")]
    InvalidPairing {
        first: AgentId,
        second: AgentId,
        reason: PairingRejection,
    },

    /// Evacuation was attempted on an exit cell without a resident.
    #[error("exit {0} has no resident to evacuate")]
    EmptyEvacuation(GridCoord),

    /// An agent cannot be placed on this cell.
    #[error("cannot place an agent on {0}")]
    InvalidPlacement(GridCoord),

    #[error("unknown agent {0}")]
    UnknownAgent(AgentId),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("config parse error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Why two agents cannot form a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PairingRejection {
    #[error("an agent cannot pair with itself")]
    SameAgent,
    #[error("agents are not side by side")]
    NotAdjacent,
    #[error("already paired")]
    AlreadyPaired,
    #[error("agent kind cannot pair")]
    NotPairable,
}
