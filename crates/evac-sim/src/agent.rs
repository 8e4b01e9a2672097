//! Agents and the arena that owns them.
//!
//! Agents refer to each other only by [`AgentId`]. Partners, chain links and
//! leaders are ids into the [`Agents`] arena, never references, so removing
//! an evacuated agent cannot leave anything dangling.

use std::collections::BTreeMap;

use evac_contention::AgentId;
use evac_topology::{GridCoord, Orientation};
use serde::{Deserialize, Serialize};

use crate::config::{NavigationParams, SimulationConfig};

/// What an agent is, which decides what it can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgentKind {
    /// Walks alone and may be paired
    Solitary,
    /// Decision-making half of a pair
    PairedLeader,
    /// Passive half of a pair; moves with its leader
    PairedPartner,
    /// Physical leader heading for the current goal
    Leader,
    /// Pace setter that occupies no cell
    VirtualLeader,
}

/// Navigation capabilities.
pub trait CanNavigate {
    /// Issues its own intents.
    fn decides(&self) -> bool;

    /// Takes the best candidate instead of sampling.
    fn deterministic(&self) -> bool;

    /// Stands on a grid cell and can be evacuated.
    fn embodied(&self) -> bool;

    /// Attraction coefficients for this kind.
    fn navigation<'a>(&self, config: &'a SimulationConfig) -> &'a NavigationParams;
}

/// Pair-bond capabilities.
pub trait CanPair {
    /// May be bonded to a neighbour.
    fn pairable(&self) -> bool;

    /// Currently half of a pair.
    fn bonded(&self) -> bool;
}

impl CanNavigate for AgentKind {
    fn decides(&self) -> bool {
        !matches!(self, Self::PairedPartner)
    }

    fn deterministic(&self) -> bool {
        matches!(self, Self::VirtualLeader)
    }

    fn embodied(&self) -> bool {
        !matches!(self, Self::VirtualLeader)
    }

    fn navigation<'a>(&self, config: &'a SimulationConfig) -> &'a NavigationParams {
        match self {
            Self::Leader => &config.leader,
            Self::VirtualLeader => &config.virtual_leader.navigation,
            Self::Solitary | Self::PairedLeader | Self::PairedPartner => &config.follower,
        }
    }
}

impl CanPair for AgentKind {
    fn pairable(&self) -> bool {
        matches!(self, Self::Solitary)
    }

    fn bonded(&self) -> bool {
        matches!(self, Self::PairedLeader | Self::PairedPartner)
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Solitary => "solitary",
            Self::PairedLeader => "pair-leader",
            Self::PairedPartner => "pair-partner",
            Self::Leader => "leader",
            Self::VirtualLeader => "virtual-leader",
        };
        f.write_str(name)
    }
}

/// Persistent per-agent state. Tick-scoped claim state lives in the round.
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    pub id: AgentId,
    pub kind: AgentKind,
    pub position: GridCoord,
    pub orientation: Orientation,
    pub partner: Option<AgentId>,
    /// Readiness clock: the agent acts again once the tick reaches it
    pub readiness: u64,
    /// Ticks consumed by the last maneuver
    pub movement_cost: u32,
    /// Nominal step duration, in ticks
    pub duration: u32,
}

impl Agent {
    pub fn is_leader_of_pair(&self) -> bool {
        self.kind == AgentKind::PairedLeader
    }

    pub fn is_ready(&self, now: u64) -> bool {
        self.readiness <= now
    }

    /// Record a completed maneuver and push the readiness clock.
    pub fn spend(&mut self, now: u64, cost: u32) {
        self.movement_cost = cost;
        self.readiness = self.readiness.max(now) + u64::from(cost);
    }
}

impl CanNavigate for Agent {
    fn decides(&self) -> bool {
        self.kind.decides()
    }

    fn deterministic(&self) -> bool {
        self.kind.deterministic()
    }

    fn embodied(&self) -> bool {
        self.kind.embodied()
    }

    fn navigation<'a>(&self, config: &'a SimulationConfig) -> &'a NavigationParams {
        self.kind.navigation(config)
    }
}

impl CanPair for Agent {
    fn pairable(&self) -> bool {
        self.kind.pairable() && self.partner.is_none()
    }

    fn bonded(&self) -> bool {
        self.kind.bonded() && self.partner.is_some()
    }
}

/// Arena of live agents, iterated in id order.
#[derive(Debug, Clone, Default)]
pub struct Agents {
    agents: BTreeMap<AgentId, Agent>,
    next_id: u32,
}

impl Agents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an agent and hand out its id.
    pub fn insert(
        &mut self,
        kind: AgentKind,
        position: GridCoord,
        orientation: Orientation,
        duration: u32,
    ) -> AgentId {
        let id = AgentId(self.next_id);
        self.next_id += 1;
        self.agents.insert(
            id,
            Agent {
                id,
                kind,
                position,
                orientation,
                partner: None,
                readiness: 0,
                movement_cost: 0,
                duration,
            },
        );
        id
    }

    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(&id)
    }

    pub fn remove(&mut self, id: AgentId) -> Option<Agent> {
        self.agents.remove(&id)
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.agents.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agent> + '_ {
        self.agents.values()
    }

    pub fn ids(&self) -> Vec<AgentId> {
        self.agents.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Agents standing on the grid.
    pub fn embodied(&self) -> impl Iterator<Item = &Agent> + '_ {
        self.agents.values().filter(|a| a.embodied())
    }

    pub fn embodied_count(&self) -> usize {
        self.embodied().count()
    }

    pub fn first_of_kind(&self, kind: AgentKind) -> Option<&Agent> {
        self.agents.values().find(|a| a.kind == kind)
    }

    /// Number of bonded pairs.
    pub fn pair_count(&self) -> usize {
        self.agents.values().filter(|a| a.is_leader_of_pair()).count()
    }
}
