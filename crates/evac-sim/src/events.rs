//! Simulation events, snapshots and per-tick reports.

use std::collections::BTreeMap;

use evac_contention::AgentId;
use evac_topology::{GridCoord, Orientation};
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentKind};
use crate::maneuver::Maneuver;

/// Things that happen during a run, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SimEvent {
    /// An agent was placed on the grid
    AgentSpawned {
        agent: AgentId,
        kind: AgentKind,
        position: GridCoord,
        orientation: Orientation,
        tick: u64,
    },

    /// An agent changed cell
    AgentMoved {
        agent: AgentId,
        from: GridCoord,
        to: GridCoord,
        orientation: Orientation,
        tick: u64,
    },

    /// A pair performed a maneuver
    PairManeuvered {
        leader: AgentId,
        partner: AgentId,
        maneuver: Maneuver,
        tick: u64,
    },

    /// Several agents asked for the same cell
    ContentionResolved {
        cell: GridCoord,
        winner: AgentId,
        losers: Vec<AgentId>,
        tick: u64,
    },

    /// A ring of waiting agents was opened
    RingBroken {
        origin: AgentId,
        severed: AgentId,
        size: usize,
        tick: u64,
    },

    /// Two solitary agents bonded
    PairFormed {
        leader: AgentId,
        partner: AgentId,
        orientation: Orientation,
        tick: u64,
    },

    /// A pair dissolved near the exit or lost a member
    PairSplit {
        leader: AgentId,
        partner: AgentId,
        tick: u64,
    },

    /// An agent left through the exit
    AgentEvacuated {
        agent: AgentId,
        kind: AgentKind,
        tick: u64,
    },

    /// The virtual leader moved
    VirtualLeaderMoved {
        from: GridCoord,
        to: GridCoord,
        tick: u64,
    },

    /// The active goal was completed
    CheckpointReached { goal: String, tick: u64 },

    /// The last goal was completed
    EvacuationFinished { evacuated: usize, tick: u64 },
}

impl SimEvent {
    /// Tick this event happened in.
    pub fn tick(&self) -> u64 {
        match self {
            SimEvent::AgentSpawned { tick, .. } => *tick,
            SimEvent::AgentMoved { tick, .. } => *tick,
            SimEvent::PairManeuvered { tick, .. } => *tick,
            SimEvent::ContentionResolved { tick, .. } => *tick,
            SimEvent::RingBroken { tick, .. } => *tick,
            SimEvent::PairFormed { tick, .. } => *tick,
            SimEvent::PairSplit { tick, .. } => *tick,
            SimEvent::AgentEvacuated { tick, .. } => *tick,
            SimEvent::VirtualLeaderMoved { tick, .. } => *tick,
            SimEvent::CheckpointReached { tick, .. } => *tick,
            SimEvent::EvacuationFinished { tick, .. } => *tick,
        }
    }
}

/// State of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub id: AgentId,
    pub kind: AgentKind,
    pub position: GridCoord,
    pub orientation: Orientation,
    pub partner: Option<AgentId>,
    pub readiness: u64,
    pub duration: u32,
}

impl From<&Agent> for AgentState {
    fn from(agent: &Agent) -> Self {
        Self {
            id: agent.id,
            kind: agent.kind,
            position: agent.position,
            orientation: agent.orientation,
            partner: agent.partner,
            readiness: agent.readiness,
            duration: agent.duration,
        }
    }
}

/// Snapshot of the simulation at a tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub tick: u64,
    /// Agents on the grid, in id order
    pub agents: Vec<AgentState>,
    pub on_grid: usize,
    pub evacuated: usize,
    pub pairs: usize,
    pub virtual_leader: Option<GridCoord>,
}

impl SimSnapshot {
    /// Cell of every agent on the grid.
    pub fn positions(&self) -> BTreeMap<AgentId, GridCoord> {
        self.agents.iter().map(|a| (a.id, a.position)).collect()
    }

    /// Rebuild positions and counters from the first `up_to` events.
    ///
    /// Only what the timeline records is restored: kinds reflect spawns and
    /// bonds, and readiness and durations are left at zero.
    pub fn from_events(events: &[SimEvent], up_to: usize) -> Self {
        let mut agents: BTreeMap<AgentId, AgentState> = BTreeMap::new();
        let mut tick = 0;
        let mut evacuated = 0;
        let mut virtual_leader = None;

        for event in events.iter().take(up_to) {
            tick = event.tick();
            match event {
                SimEvent::AgentSpawned {
                    agent,
                    kind,
                    position,
                    orientation,
                    ..
                } => {
                    if *kind == AgentKind::VirtualLeader {
                        virtual_leader = Some(*position);
                        continue;
                    }
                    agents.insert(
                        *agent,
                        AgentState {
                            id: *agent,
                            kind: *kind,
                            position: *position,
                            orientation: *orientation,
                            partner: None,
                            readiness: 0,
                            duration: 0,
                        },
                    );
                }
                SimEvent::AgentMoved {
                    agent,
                    to,
                    orientation,
                    ..
                } => {
                    if let Some(a) = agents.get_mut(agent) {
                        a.position = *to;
                        a.orientation = *orientation;
                    }
                }
                SimEvent::PairFormed {
                    leader,
                    partner,
                    orientation,
                    ..
                } => {
                    for (id, kind, other) in [
                        (leader, AgentKind::PairedLeader, partner),
                        (partner, AgentKind::PairedPartner, leader),
                    ] {
                        if let Some(a) = agents.get_mut(id) {
                            a.kind = kind;
                            a.partner = Some(*other);
                            a.orientation = *orientation;
                        }
                    }
                }
                SimEvent::PairSplit {
                    leader, partner, ..
                } => {
                    for id in [leader, partner] {
                        if let Some(a) = agents.get_mut(id) {
                            a.kind = AgentKind::Solitary;
                            a.partner = None;
                        }
                    }
                }
                SimEvent::AgentEvacuated { agent, .. } => {
                    agents.remove(agent);
                    evacuated += 1;
                }
                SimEvent::VirtualLeaderMoved { to, .. } => {
                    virtual_leader = Some(*to);
                }
                SimEvent::PairManeuvered { .. }
                | SimEvent::ContentionResolved { .. }
                | SimEvent::RingBroken { .. }
                | SimEvent::CheckpointReached { .. }
                | SimEvent::EvacuationFinished { .. } => {}
            }
        }

        let agents: Vec<AgentState> = agents.into_values().collect();
        let pairs = agents
            .iter()
            .filter(|a| a.kind == AgentKind::PairedLeader)
            .count();
        SimSnapshot {
            tick,
            on_grid: agents.len(),
            agents,
            evacuated,
            pairs,
            virtual_leader,
        }
    }
}

/// Read-only counters published after every tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// Ticks completed, this one included
    pub tick: u64,
    /// Agents that changed cell
    pub moved: usize,
    /// Cells with more than one request
    pub contested: usize,
    pub rings_broken: usize,
    pub pairs_formed: usize,
    pub pairs_split: usize,
    pub evacuated_this_tick: usize,
    pub evacuated_total: usize,
    /// Agents still on the grid
    pub remaining: usize,
    /// Set once the last goal is completed
    pub finished: bool,
}

/// Receives a report after every tick. Observers cannot fail a tick.
pub trait TickObserver {
    fn on_tick(&mut self, report: &TickReport);
}

impl<F> TickObserver for F
where
    F: FnMut(&TickReport),
{
    fn on_tick(&mut self, report: &TickReport) {
        self(report)
    }
}

/// Observer that ignores every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl TickObserver for NoopObserver {
    fn on_tick(&mut self, _report: &TickReport) {}
}
