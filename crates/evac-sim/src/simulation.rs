//! The simulation context: room, agents, goals and the tick clock.

use std::collections::BTreeMap;
use std::sync::Arc;

use evac_contention::{AgentId, Board, RandomSource, SeededRandom};
use evac_topology::{FieldTable, FloorField, GridCoord, Orientation, Region, Room};
use tracing::{debug, info};

use crate::agent::{Agent, AgentKind, Agents};
use crate::config::SimulationConfig;
use crate::events::{AgentState, NoopObserver, SimEvent, SimSnapshot, TickObserver, TickReport};
use crate::goal::{AreaGoal, Goal, GoalQueue};
use crate::{pairing, scheduler, Error, Result};

/// Source of a room, its exit and the intermediate areas to gather in.
pub trait TopologyProvider {
    fn room(&self) -> &Room;

    fn exit(&self) -> Result<GridCoord> {
        Ok(self.room().require_exit()?)
    }

    /// Areas visited in order before heading for the exit.
    fn goal_areas(&self) -> Vec<Region> {
        Vec::new()
    }
}

impl TopologyProvider for Room {
    fn room(&self) -> &Room {
        self
    }
}

/// How a bounded run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every goal was completed
    Evacuated { ticks: u64 },
    /// Ran out of ticks with agents still on the grid
    TickLimit { ticks: u64, remaining: usize },
}

impl Outcome {
    pub fn ticks(&self) -> u64 {
        match self {
            Outcome::Evacuated { ticks } | Outcome::TickLimit { ticks, .. } => *ticks,
        }
    }

    pub fn is_evacuated(&self) -> bool {
        matches!(self, Outcome::Evacuated { .. })
    }
}

/// A crowd evacuation in progress.
///
/// Everything the tick phases touch lives here; each phase borrows it
/// mutably in turn.
pub struct Simulation {
    pub(crate) config: SimulationConfig,
    pub(crate) room: Room,
    pub(crate) exit: GridCoord,
    pub(crate) fields: FieldTable,
    pub(crate) board: Board,
    pub(crate) agents: Agents,
    pub(crate) goals: GoalQueue,
    /// Cell the active goal resolves to
    pub(crate) goal_target: GridCoord,
    pub(crate) goal_field: Arc<FloorField>,
    /// Field followers descend: the goal field, or the virtual leader's
    pub(crate) follower_field: Arc<FloorField>,
    pub(crate) rng: Box<dyn RandomSource>,
    pub(crate) tick: u64,
    pub(crate) spawned: usize,
    pub(crate) evacuated: usize,
    pub(crate) evacuated_by_kind: BTreeMap<AgentKind, usize>,
    pub(crate) events: Vec<SimEvent>,
    pub(crate) finished: bool,
}

impl Simulation {
    /// Start an empty simulation whose only goal is the room's exit.
    pub fn new(room: Room, config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let exit = room.require_exit()?;
        let mut fields = FieldTable::new(&room);
        let goal_field = fields.get_or_compute(&room, exit)?;
        let rng = Box::new(SeededRandom::new(config.seed));
        info!(width = room.width(), height = room.height(), %exit, seed = config.seed, "simulation created");

        Ok(Self {
            board: Board::for_room(&room),
            goals: GoalQueue::evacuation([], exit),
            goal_target: exit,
            follower_field: Arc::clone(&goal_field),
            goal_field,
            config,
            room,
            exit,
            fields,
            agents: Agents::new(),
            rng,
            tick: 0,
            spawned: 0,
            evacuated: 0,
            evacuated_by_kind: BTreeMap::new(),
            events: Vec::new(),
            finished: false,
        })
    }

    /// Start from a topology provider, visiting its goal areas first.
    pub fn from_topology<T>(topology: &T, config: SimulationConfig) -> Result<Self>
    where
        T: TopologyProvider + ?Sized,
    {
        let exit = topology.exit()?;
        let mut sim = Self::new(topology.room().clone(), config)?;
        let areas: Vec<AreaGoal> = topology
            .goal_areas()
            .into_iter()
            .map(|a| sim.area_goal(a))
            .collect();
        sim.set_goals(GoalQueue::evacuation_with(areas, exit))?;
        Ok(sim)
    }

    /// Area goal shaped by the configured area options.
    fn area_goal(&self, area: Region) -> AreaGoal {
        let mut goal = AreaGoal::new(area);
        if let Some(factor) = self.config.areas.booster {
            goal = goal.with_booster(factor);
        }
        if self.config.areas.rotate_focus {
            goal = goal.with_focus_rotation();
        }
        goal
    }

    /// Replace the random source.
    #[must_use]
    pub fn with_random(mut self, rng: impl RandomSource + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    /// Replace the goal queue and activate its first goal.
    ///
    /// The queue is only installed once its first goal checks out; on error
    /// the previous goals stay active.
    pub fn set_goals(&mut self, goals: GoalQueue) -> Result<()> {
        let field = match goals.current() {
            Some(goal) => Some(self.field_toward(goal)?),
            None => None,
        };
        self.goals = goals;
        if let Some((target, field)) = field {
            self.install_goal_field(target, field);
        }
        Ok(())
    }

    /// Point navigation at the current goal's focus.
    ///
    /// Fails with [`Error::UnreachableTarget`] if an agent on the grid has no
    /// path to it, leaving the previous field in place.
    pub(crate) fn activate_goal(&mut self) -> Result<()> {
        let Some(goal) = self.goals.current() else {
            return Ok(());
        };
        let (focus, area, booster) = (goal.focus(), goal.target(), goal.booster());
        let (target, field) = self.field_for(focus, area, booster)?;
        self.install_goal_field(target, field);
        Ok(())
    }

    fn field_toward(&mut self, goal: &dyn Goal) -> Result<(GridCoord, Arc<FloorField>)> {
        self.field_for(goal.focus(), goal.target(), goal.booster())
    }

    fn field_for(
        &mut self,
        focus: GridCoord,
        area: Region,
        booster: Option<f64>,
    ) -> Result<(GridCoord, Arc<FloorField>)> {
        let field = self.fields.get_or_compute(&self.room, focus)?;
        if let Some(stuck) = self.agents.embodied().find(|a| !field.reaches(a.position)) {
            return Err(Error::UnreachableTarget {
                target: focus,
                from: stuck.position,
            });
        }
        let field = match booster {
            Some(factor) => Arc::new(field.boosted(area, factor)),
            None => field,
        };
        Ok((focus, field))
    }

    fn install_goal_field(&mut self, target: GridCoord, field: Arc<FloorField>) {
        debug!(%target, "goal activated");
        self.goal_target = target;
        self.goal_field = field;
        if !self.virtual_leader_active() {
            self.follower_field = Arc::clone(&self.goal_field);
        }
    }

    pub(crate) fn virtual_leader_active(&self) -> bool {
        self.config.virtual_leader.enabled
            && self.agents.first_of_kind(AgentKind::VirtualLeader).is_some()
    }

    pub(crate) fn record(&mut self, event: SimEvent) {
        if self.config.record_events {
            self.events.push(event);
        }
    }

    /// Place an agent with its kind's default step duration.
    pub fn spawn(
        &mut self,
        kind: AgentKind,
        position: GridCoord,
        orientation: Orientation,
    ) -> Result<AgentId> {
        let duration = match kind {
            AgentKind::Leader | AgentKind::VirtualLeader => self.config.leader_duration,
            _ => self.config.agent_duration,
        };
        self.spawn_with_duration(kind, position, orientation, duration)
    }

    /// Place an agent with an explicit step duration.
    ///
    /// Pairs cannot be spawned directly; spawn two solitary agents and
    /// [`pair`](Self::pair) them. Only one virtual leader may exist.
    pub fn spawn_with_duration(
        &mut self,
        kind: AgentKind,
        position: GridCoord,
        orientation: Orientation,
        duration: u32,
    ) -> Result<AgentId> {
        if matches!(kind, AgentKind::PairedLeader | AgentKind::PairedPartner) {
            return Err(Error::InvalidConfig(format!(
                "{kind} agents are formed by pairing, not spawned"
            )));
        }
        if duration == 0 {
            return Err(Error::InvalidConfig("step duration must be positive".into()));
        }
        if !self.room.is_passable(position) {
            return Err(Error::InvalidPlacement(position));
        }

        if !self.goal_field.reaches(position) {
            return Err(Error::UnreachableTarget {
                target: self.goal_target,
                from: position,
            });
        }

        if kind == AgentKind::VirtualLeader {
            if self.agents.first_of_kind(AgentKind::VirtualLeader).is_some() {
                return Err(Error::InvalidConfig("only one virtual leader is allowed".into()));
            }
            if self.config.virtual_leader.enabled {
                self.follower_field = self.fields.get_or_compute(&self.room, position)?;
            }
            let id = self.agents.insert(kind, position, orientation, duration);
            self.announce(id, kind, position, orientation);
            return Ok(id);
        }

        let id = self.agents.insert(kind, position, orientation, duration);
        if let Err(e) = self.board.occupy(position, id) {
            self.agents.remove(id);
            return Err(e.into());
        }
        self.spawned += 1;
        self.announce(id, kind, position, orientation);
        Ok(id)
    }

    fn announce(&mut self, agent: AgentId, kind: AgentKind, position: GridCoord, orientation: Orientation) {
        debug!(%agent, %kind, %position, "agent spawned");
        self.record(SimEvent::AgentSpawned {
            agent,
            kind,
            position,
            orientation,
            tick: self.tick,
        });
    }

    /// Bond two side-by-side solitary agents. On error nothing changes.
    pub fn pair(&mut self, a: AgentId, b: AgentId) -> Result<pairing::Bond> {
        let bond = pairing::bond(&mut self.agents, a, b, &self.follower_field)?;
        self.record(SimEvent::PairFormed {
            leader: bond.leader,
            partner: bond.partner,
            orientation: bond.orientation,
            tick: self.tick,
        });
        Ok(bond)
    }

    /// Remove the agent standing on the exit.
    ///
    /// Fails with [`Error::EmptyEvacuation`] when the exit is empty.
    pub fn evacuate_exit(&mut self) -> Result<AgentId> {
        let exit = self.exit;
        scheduler::evacuate_cell(self, exit)
    }

    /// Run one tick.
    pub fn step(&mut self) -> Result<TickReport> {
        self.step_with(&mut NoopObserver)
    }

    /// Run one tick and hand its report to `observer`.
    pub fn step_with<O>(&mut self, observer: &mut O) -> Result<TickReport>
    where
        O: TickObserver + ?Sized,
    {
        let report = scheduler::run_tick(self)?;
        observer.on_tick(&report);
        Ok(report)
    }

    /// Step until every goal is done or `max_ticks` ticks have run.
    pub fn run(&mut self, max_ticks: u64) -> Result<Outcome> {
        self.run_with(max_ticks, &mut NoopObserver)
    }

    pub fn run_with<O>(&mut self, max_ticks: u64, observer: &mut O) -> Result<Outcome>
    where
        O: TickObserver + ?Sized,
    {
        let mut ran = 0;
        while !self.finished && ran < max_ticks {
            self.step_with(observer)?;
            ran += 1;
        }
        Ok(if self.finished {
            Outcome::Evacuated { ticks: self.tick }
        } else {
            Outcome::TickLimit {
                ticks: self.tick,
                remaining: self.remaining(),
            }
        })
    }

    /// Ticks run so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Agents placed on the grid since the start.
    pub fn spawned(&self) -> usize {
        self.spawned
    }

    pub fn evacuated(&self) -> usize {
        self.evacuated
    }

    /// Evacuated agents by the kind they had when leaving.
    pub fn evacuated_by_kind(&self) -> &BTreeMap<AgentKind, usize> {
        &self.evacuated_by_kind
    }

    /// Agents still on the grid.
    pub fn remaining(&self) -> usize {
        self.agents.embodied_count()
    }

    pub fn agent(&self, id: AgentId) -> Result<&Agent> {
        self.agents.get(id).ok_or(Error::UnknownAgent(id))
    }

    pub fn agents(&self) -> &Agents {
        &self.agents
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn exit(&self) -> GridCoord {
        self.exit
    }

    /// Cell the active goal steers toward.
    pub fn goal_target(&self) -> GridCoord {
        self.goal_target
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Recorded timeline; empty when event recording is off.
    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    pub fn virtual_leader(&self) -> Option<GridCoord> {
        self.agents
            .first_of_kind(AgentKind::VirtualLeader)
            .map(|a| a.position)
    }

    /// Current state of every embodied agent.
    pub fn snapshot(&self) -> SimSnapshot {
        let agents: Vec<AgentState> = self.agents.embodied().map(AgentState::from).collect();
        SimSnapshot {
            tick: self.tick,
            on_grid: agents.len(),
            agents,
            evacuated: self.evacuated,
            pairs: self.agents.pair_count(),
            virtual_leader: self.virtual_leader(),
        }
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("tick", &self.tick)
            .field("exit", &self.exit)
            .field("goal_target", &self.goal_target)
            .field("agents", &self.agents.len())
            .field("evacuated", &self.evacuated)
            .field("finished", &self.finished)
            .finish()
    }
}
