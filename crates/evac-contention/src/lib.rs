//! Grid Cell Contention
//!
//! Agents on a grid never share a cell. Each tick every moving agent asks for
//! one neighbouring cell, and this crate decides who actually moves.
//!
//! # Core Insight
//!
//! A cell is not free or taken for the whole tick. If its resident is leaving
//! too, a newcomer can follow it in, so a whole queue of agents can shuffle
//! forward in one tick like dominoes.
//!
//! # Protocol
//!
//! 1. **Intent**: movers register legs, each leg queues on its target cell
//! 2. **Arbitrate**: one uniformly random winner per cell
//! 3. **Confirm**: follow dependency chains to their front, break rings,
//!    confirm what can move and enforce rigid movers
//! 4. **Commit**: apply moves front-first so no cell ever holds two agents
//!
//! Losing a contest is not an error; the loser simply asks again next tick.
//!
//! # Matching
//!
//! [`PairingGraph`] reduces the side-adjacency graph of willing agents to a
//! matching, used to bond solitary agents into rigid pairs.

mod board;
mod error;
mod ids;
mod matching;
mod random;
mod round;

pub use board::{Board, Cell};
pub use error::{Error, Result};
pub use ids::AgentId;
pub use matching::PairingGraph;
pub use random::{FirstChoice, RandomSource, SeededRandom};
pub use round::{Chain, Claim, Committed, Contest, Leg, Resolution, RingBreak, Round};
