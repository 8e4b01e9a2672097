//! Crowd Evacuation Simulation
//!
//! Tick-driven evacuation of a single-floor room through one exit.
//!
//! # Architecture
//!
//! - **Navigation**: agents descend a floor field stochastically, weighing
//!   distance, diagonals, crowding and turning around
//! - **Pairs**: side-by-side neighbours bond and move as one rigid body
//! - **Leaders**: a physical leader paces itself by the stragglers; a virtual
//!   leader walks ahead and waits for the crowd
//! - **Contention**: every tick's moves go through one
//!   [`Round`](evac_contention::Round), so no cell ever holds two agents
//! - **Timeline**: every change is recorded as a [`SimEvent`]
//!
//! # Usage
//!
//! ```ignore
//! let scenario = Scenario::demo(40, 42)?;
//! let mut sim = scenario.build(SimulationConfig::default())?;
//! let outcome = sim.run(5_000)?;
//! println!("{} evacuated in {} ticks", sim.evacuated(), outcome.ticks());
//! ```

mod agent;
mod config;
mod error;
mod events;
mod goal;
mod maneuver;
mod scenario;
mod scheduler;
mod simulation;

pub mod leader;
pub mod navigation;
pub mod pairing;

pub use agent::{Agent, AgentKind, Agents, CanNavigate, CanPair};
pub use config::{AreaGoalConfig, NavigationParams, SimulationConfig, SpeedControl, VirtualLeaderConfig};
pub use error::{Error, PairingRejection, Result};
pub use events::{AgentState, NoopObserver, SimEvent, SimSnapshot, TickObserver, TickReport};
pub use goal::{AreaGoal, ExitGoal, Goal, GoalQueue, GoalView};
pub use maneuver::{CostClass, Maneuver, Placement};
pub use scenario::Scenario;
pub use simulation::{Outcome, Simulation, TopologyProvider};

pub use evac_contention::{AgentId, FirstChoice, RandomSource, SeededRandom};
pub use evac_topology::{GridCoord, Orientation, Region, Room};
