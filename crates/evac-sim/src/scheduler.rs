//! The tick pipeline.
//!
//! Each tick runs these phases in order:
//!
//! 1. **Evacuate**: whoever stands on the exit leaves the grid.
//! 2. **Goals**: a rotating area focus moves off an occupied cell; a reached
//!    checkpoint activates the next goal, or ends the run.
//! 3. **Regroup**: pairs near the exit split, eligible neighbours pair up.
//! 4. **Virtual leader**: steps along the goal field unless the crowd lags,
//!    and followers retarget to its cell.
//! 5. **Intents**: every ready decision maker picks a cell or a maneuver.
//! 6. **Resolve**: one [`Round`] arbitrates, confirms and commits the moves.
//! 7. **Apply**: orientations, readiness clocks and events are updated.

use std::collections::BTreeSet;

use evac_contention::{AgentId, Error as ContentionError, Leg, Resolution, Round};
use evac_topology::GridCoord;
use tracing::{debug, info, trace, warn};

use crate::agent::{Agent, AgentKind, CanNavigate};
use crate::events::{SimEvent, TickReport};
use crate::goal::GoalView;
use crate::leader;
use crate::maneuver::{CostClass, Maneuver, Placement};
use crate::navigation::{
    adapt_speed, attraction, effective_k_s, pair_attraction, select_candidates, Selection,
    Surroundings,
};
use crate::pairing;
use crate::simulation::Simulation;
use crate::{Error, Result};

/// What one mover asked for this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Plan {
    Solo {
        agent: AgentId,
        from: GridCoord,
        to: GridCoord,
    },
    Pair {
        leader: AgentId,
        partner: AgentId,
        from: Placement,
        maneuver: Maneuver,
    },
}

impl Plan {
    fn mover(&self) -> AgentId {
        match self {
            Plan::Solo { agent, .. } => *agent,
            Plan::Pair { leader, .. } => *leader,
        }
    }

    fn legs(&self) -> Vec<Leg> {
        match *self {
            Plan::Solo { agent, from, to } => vec![Leg::new(agent, from, to)],
            Plan::Pair {
                leader,
                partner,
                from,
                maneuver,
            } => {
                let to = maneuver.apply(from);
                vec![
                    Leg::new(leader, from.leader, to.leader),
                    Leg::new(partner, from.partner, to.partner),
                ]
            }
        }
    }
}

fn selection_for(agent: &Agent) -> Selection {
    if agent.deterministic() {
        Selection::ArgMax
    } else {
        Selection::Stochastic
    }
}

/// Advance the simulation by one tick.
pub(crate) fn run_tick(sim: &mut Simulation) -> Result<TickReport> {
    let mut report = TickReport::default();
    if sim.finished {
        report.tick = sim.tick;
        report.evacuated_total = sim.evacuated;
        report.finished = true;
        return Ok(report);
    }

    report.evacuated_this_tick = evacuate(sim)?;
    if check_goal(sim)? {
        let (split, formed) = regroup(sim)?;
        report.pairs_split = split;
        report.pairs_formed = formed;

        move_virtual_leader(sim)?;

        let mut round = Round::new();
        let plans = collect_intents(sim, &mut round)?;
        let resolution = round.resolve(&mut sim.board, &mut *sim.rng)?;
        report.contested = record_contention(sim, &resolution);
        report.rings_broken = resolution.ring_breaks.len();
        report.moved = apply(sim, &plans, &resolution)?;
    }

    sim.tick += 1;
    report.tick = sim.tick;
    report.evacuated_total = sim.evacuated;
    report.remaining = sim.remaining();
    report.finished = sim.finished;
    debug!(
        tick = report.tick,
        moved = report.moved,
        contested = report.contested,
        remaining = report.remaining,
        "tick complete"
    );
    Ok(report)
}

fn evacuate(sim: &mut Simulation) -> Result<usize> {
    let exit = sim.exit;
    if !sim.board.is_occupied(exit) {
        return Ok(0);
    }
    evacuate_cell(sim, exit)?;
    Ok(1)
}

/// Take the resident of `cell` off the grid, dissolving its pair.
pub(crate) fn evacuate_cell(sim: &mut Simulation, cell: GridCoord) -> Result<AgentId> {
    let id = sim.board.vacate(cell).map_err(|e| match e {
        ContentionError::CellEmpty(c) => Error::EmptyEvacuation(c),
        other => other.into(),
    })?;
    let kind = sim.agents.get(id).map(|a| a.kind).ok_or(Error::UnknownAgent(id))?;
    let tick = sim.tick;

    if let Some((leader, partner)) = pairing::dissolve(&mut sim.agents, id) {
        sim.record(SimEvent::PairSplit {
            leader,
            partner,
            tick,
        });
    }
    sim.agents.remove(id);
    sim.evacuated += 1;
    *sim.evacuated_by_kind.entry(kind).or_insert(0) += 1;

    debug!(agent = %id, %kind, %cell, "agent evacuated");
    sim.record(SimEvent::AgentEvacuated {
        agent: id,
        kind,
        tick,
    });
    Ok(id)
}

/// Returns false once the last goal is done.
fn check_goal(sim: &mut Simulation) -> Result<bool> {
    let positions: Vec<GridCoord> = sim.agents.embodied().map(|a| a.position).collect();
    rotate_focus(sim, &positions)?;
    let view = GoalView {
        positions: &positions,
        evacuated: sim.evacuated,
    };
    let (reached, name) = match sim.goals.current() {
        Some(goal) => (goal.reached_checkpoint(&view), goal.name()),
        None => {
            sim.finished = true;
            return Ok(false);
        }
    };
    if !reached {
        return Ok(true);
    }

    let tick = sim.tick;
    info!(goal = %name, tick, "checkpoint reached");
    sim.record(SimEvent::CheckpointReached { goal: name, tick });

    if sim.goals.advance().is_some() {
        sim.activate_goal()?;
        return Ok(true);
    }

    sim.finished = true;
    info!(evacuated = sim.evacuated, tick, "evacuation finished");
    sim.record(SimEvent::EvacuationFinished {
        evacuated: sim.evacuated,
        tick,
    });
    Ok(false)
}

/// Move a rotating goal's focus off an occupied cell.
///
/// Focus cells the crowd cannot reach are skipped. After a full cycle the
/// goal is back on its previous focus, whose field is still active.
fn rotate_focus(sim: &mut Simulation, positions: &[GridCoord]) -> Result<()> {
    let Some(goal) = sim.goals.current() else {
        return Ok(());
    };
    if !positions.contains(&goal.focus()) {
        return Ok(());
    }
    for _ in 0..goal.focus_points() {
        let Some(goal) = sim.goals.current_mut() else {
            return Ok(());
        };
        if !goal.next_focus() {
            return Ok(());
        }
        match sim.activate_goal() {
            Ok(()) => return Ok(()),
            Err(Error::UnreachableTarget { target, .. }) => {
                debug!(%target, "focus unreachable, skipping");
            }
            Err(Error::Topology(e)) => debug!(error = %e, "focus unusable, skipping"),
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Split pairs close to the exit, then bond new ones.
fn regroup(sim: &mut Simulation) -> Result<(usize, usize)> {
    let tick = sim.tick;
    let mut split = 0;
    for leader in pairing::due_for_split(&sim.agents, sim.exit, sim.config.split_distance) {
        if let Some((leader, partner)) = pairing::dissolve(&mut sim.agents, leader) {
            sim.record(SimEvent::PairSplit {
                leader,
                partner,
                tick,
            });
            split += 1;
        }
    }

    if !sim.config.pairing {
        return Ok((split, 0));
    }
    let bonds = pairing::form_pairs(
        &mut sim.agents,
        &sim.follower_field,
        sim.exit,
        sim.config.split_distance,
    )?;
    for bond in &bonds {
        sim.record(SimEvent::PairFormed {
            leader: bond.leader,
            partner: bond.partner,
            orientation: bond.orientation,
            tick,
        });
    }
    Ok((split, bonds.len()))
}

fn move_virtual_leader(sim: &mut Simulation) -> Result<()> {
    if !sim.config.virtual_leader.enabled {
        return Ok(());
    }
    let Some(v) = sim.agents.first_of_kind(AgentKind::VirtualLeader).cloned() else {
        return Ok(());
    };
    let tick = sim.tick;
    let mut position = v.position;

    if v.is_ready(tick) {
        let straggler = leader::most_distant(&sim.agents, &sim.goal_field, None).map(|(_, p)| p);
        let around = Surroundings {
            room: &sim.room,
            board: &sim.board,
            field: &sim.goal_field,
        };
        let step = leader::step_virtual_leader(
            &around,
            &sim.config.virtual_leader.navigation,
            v.id,
            v.position,
            v.orientation,
            straggler,
            sim.config.virtual_leader.max_gap,
            &mut *sim.rng,
        );
        if step.waiting {
            trace!(at = %v.position, "virtual leader waiting for stragglers");
        }
        if step.to != v.position {
            let cost = CostClass::of_step(step.to - v.position, v.orientation).ticks(v.duration);
            let agent = sim.agents.get_mut(v.id).ok_or(Error::UnknownAgent(v.id))?;
            agent.position = step.to;
            agent.orientation = step.orientation;
            agent.spend(tick, cost);
            position = step.to;
            sim.record(SimEvent::VirtualLeaderMoved {
                from: v.position,
                to: step.to,
                tick,
            });
        }
    }

    sim.follower_field = sim.fields.get_or_compute(&sim.room, position)?;
    Ok(())
}

/// Let every ready decision maker register its legs, in id order.
fn collect_intents(sim: &mut Simulation, round: &mut Round) -> Result<Vec<Plan>> {
    let now = sim.tick;
    let reference = leader::reference_position(&sim.agents);
    let mut plans = Vec::new();

    for id in sim.agents.ids() {
        let Some(agent) = sim.agents.get(id).cloned() else {
            continue;
        };
        if !agent.embodied() || !agent.decides() || !agent.is_ready(now) {
            continue;
        }
        let plan = match agent.kind {
            AgentKind::Solitary => plan_solo(sim, &agent, reference),
            AgentKind::Leader => plan_leader(sim, &agent),
            AgentKind::PairedLeader => plan_pair(sim, &agent, reference)?,
            AgentKind::PairedPartner | AgentKind::VirtualLeader => None,
        };
        if let Some(plan) = plan {
            round.register(&mut sim.board, plan.mover(), &plan.legs())?;
            plans.push(plan);
        }
    }
    Ok(plans)
}

fn discipline_distance(agent: &Agent, reference: Option<(AgentId, GridCoord)>) -> Option<f64> {
    reference
        .filter(|(id, _)| *id != agent.id)
        .map(|(_, at)| agent.position.euclidean(&at))
}

fn plan_solo(
    sim: &mut Simulation,
    agent: &Agent,
    reference: Option<(AgentId, GridCoord)>,
) -> Option<Plan> {
    let params = agent.navigation(&sim.config);
    let k_s = effective_k_s(params, discipline_distance(agent, reference));
    let around = Surroundings {
        room: &sim.room,
        board: &sim.board,
        field: &sim.follower_field,
    };
    let candidates = attraction(&around, params, k_s, agent.id, agent.position, agent.orientation);
    let to = select_candidates(&candidates, selection_for(agent), &mut *sim.rng, agent.position);
    (to != agent.position).then_some(Plan::Solo {
        agent: agent.id,
        from: agent.position,
        to,
    })
}

/// The physical leader heads straight for the goal and paces itself by the
/// gap to the agent furthest behind.
fn plan_leader(sim: &mut Simulation, agent: &Agent) -> Option<Plan> {
    let gap = leader::gap_to_straggler(&sim.agents, &sim.goal_field, agent.id, agent.position);
    let duration = adapt_speed(agent.duration, gap, &sim.config.speed);
    if duration != agent.duration {
        trace!(leader = %agent.id, gap, duration, "leader pace adjusted");
        if let Some(a) = sim.agents.get_mut(agent.id) {
            a.duration = duration;
        }
    }

    let params = agent.navigation(&sim.config);
    let around = Surroundings {
        room: &sim.room,
        board: &sim.board,
        field: &sim.goal_field,
    };
    let candidates = attraction(&around, params, params.k_s, agent.id, agent.position, agent.orientation);
    let to = select_candidates(&candidates, selection_for(agent), &mut *sim.rng, agent.position);
    (to != agent.position).then_some(Plan::Solo {
        agent: agent.id,
        from: agent.position,
        to,
    })
}

fn plan_pair(
    sim: &mut Simulation,
    agent: &Agent,
    reference: Option<(AgentId, GridCoord)>,
) -> Result<Option<Plan>> {
    let Some(partner) = agent.partner else {
        return Ok(None);
    };
    let partner_at = sim
        .agents
        .get(partner)
        .map(|a| a.position)
        .ok_or(Error::UnknownAgent(partner))?;
    let from = Placement {
        leader: agent.position,
        partner: partner_at,
        orientation: agent.orientation,
    };
    if from != Placement::of(agent.position, agent.orientation) {
        warn!(leader = %agent.id, %partner, "pair out of formation, splitting");
        if let Some((leader, partner)) = pairing::dissolve(&mut sim.agents, agent.id) {
            let tick = sim.tick;
            sim.record(SimEvent::PairSplit {
                leader,
                partner,
                tick,
            });
        }
        return Ok(None);
    }

    let params = agent.navigation(&sim.config);
    let k_s = effective_k_s(params, discipline_distance(agent, reference));
    let around = Surroundings {
        room: &sim.room,
        board: &sim.board,
        field: &sim.follower_field,
    };
    let candidates = pair_attraction(&around, params, k_s, [agent.id, partner], from);
    let maneuver = select_candidates(&candidates, selection_for(agent), &mut *sim.rng, Maneuver::Stay);
    Ok((maneuver != Maneuver::Stay).then_some(Plan::Pair {
        leader: agent.id,
        partner,
        from,
        maneuver,
    }))
}

fn record_contention(sim: &mut Simulation, resolution: &Resolution) -> usize {
    let tick = sim.tick;
    let mut contested = 0;
    for contest in resolution.contests.iter().filter(|c| !c.losers.is_empty()) {
        contested += 1;
        sim.record(SimEvent::ContentionResolved {
            cell: contest.cell,
            winner: contest.winner,
            losers: contest.losers.clone(),
            tick,
        });
    }
    for ring in &resolution.ring_breaks {
        trace!(origin = %ring.origin, severed = %ring.severed, size = ring.members.len(), "ring broken");
        sim.record(SimEvent::RingBroken {
            origin: ring.origin,
            severed: ring.severed,
            size: ring.members.len(),
            tick,
        });
    }
    contested
}

/// Bring agents in line with the committed moves and charge their clocks.
///
/// Movers that stayed or lost their move keep their readiness.
fn apply(sim: &mut Simulation, plans: &[Plan], resolution: &Resolution) -> Result<usize> {
    let now = sim.tick;
    let moved: BTreeSet<AgentId> = resolution.moves.iter().map(|m| m.agent).collect();
    for m in &resolution.moves {
        let agent = sim.agents.get_mut(m.agent).ok_or(Error::UnknownAgent(m.agent))?;
        agent.position = m.to;
    }

    for plan in plans {
        match *plan {
            Plan::Solo { agent, from, to } => {
                if !moved.contains(&agent) {
                    continue;
                }
                let a = sim.agents.get_mut(agent).ok_or(Error::UnknownAgent(agent))?;
                let step = to - from;
                let cost = CostClass::of_step(step, a.orientation).ticks(a.duration);
                a.orientation = a.orientation.after_step(step);
                a.spend(now, cost);
            }
            Plan::Pair {
                leader,
                partner,
                from,
                maneuver,
            } => {
                let to = maneuver.apply(from);
                let legs = [
                    (leader, from.leader != to.leader),
                    (partner, from.partner != to.partner),
                ];
                let wanted = legs.iter().filter(|(_, moving)| *moving).count();
                let done = legs
                    .iter()
                    .filter(|(id, moving)| *moving && moved.contains(id))
                    .count();
                if done == 0 {
                    continue;
                }
                if done != wanted {
                    warn!(%leader, %partner, %maneuver, "pair moved partially");
                }
                let duration = sim
                    .agents
                    .get(leader)
                    .map(|a| a.duration)
                    .ok_or(Error::UnknownAgent(leader))?;
                let cost = maneuver.cost_class().ticks(duration);
                for id in [leader, partner] {
                    let a = sim.agents.get_mut(id).ok_or(Error::UnknownAgent(id))?;
                    a.orientation = to.orientation;
                    a.spend(now, cost);
                }
                pairing::refresh_roles(&mut sim.agents, leader)?;
                sim.record(SimEvent::PairManeuvered {
                    leader,
                    partner,
                    maneuver,
                    tick: now,
                });
            }
        }
    }

    for m in &resolution.moves {
        let orientation = sim
            .agents
            .get(m.agent)
            .map(|a| a.orientation)
            .ok_or(Error::UnknownAgent(m.agent))?;
        sim.record(SimEvent::AgentMoved {
            agent: m.agent,
            from: m.from,
            to: m.to,
            orientation,
            tick: now,
        });
    }
    Ok(resolution.moves.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use evac_contention::FirstChoice;
    use crate::goal::{AreaGoal, GoalQueue};
    use evac_topology::{Orientation, Region, Room};

    fn g(x: i32, y: i32) -> GridCoord {
        GridCoord::new(x, y)
    }

    fn corridor(config: SimulationConfig) -> Simulation {
        let room = Room::walled(8, 3, g(7, 1)).unwrap();
        Simulation::new(room, config).unwrap().with_random(FirstChoice)
    }

    fn quiet() -> SimulationConfig {
        SimulationConfig::default().with_pairing(false)
    }

    #[test]
    fn occupied_focus_moves_to_next_corner() {
        let room = Room::walled(12, 7, g(11, 3)).unwrap();
        let mut sim = Simulation::new(room, quiet()).unwrap().with_random(FirstChoice);
        sim.spawn(AgentKind::Solitary, g(5, 3), Orientation::East).unwrap();
        sim.spawn(AgentKind::Solitary, g(1, 1), Orientation::East).unwrap();
        let area = Region::new(g(4, 2), g(6, 4));
        let goals = GoalQueue::evacuation_with([AreaGoal::new(area).with_focus_rotation()], g(11, 3));
        sim.set_goals(goals).unwrap();
        assert_eq!(sim.goal_target(), g(5, 3));

        sim.step().unwrap();
        assert_eq!(sim.goal_target(), g(4, 2));
        assert_eq!(sim.goal_field.target(), g(4, 2));
    }

    #[test]
    fn unreachable_corner_is_skipped() {
        let room = Room::parse(
            "\
############
#..........#
#..........G
#..........#
#...#......#
############",
        )
        .unwrap();
        let mut sim = Simulation::new(room, quiet()).unwrap().with_random(FirstChoice);
        sim.spawn(AgentKind::Solitary, g(5, 2), Orientation::East).unwrap();
        sim.spawn(AgentKind::Solitary, g(1, 4), Orientation::East).unwrap();
        let area = Region::new(g(4, 1), g(6, 3));
        let goals = GoalQueue::evacuation_with([AreaGoal::new(area).with_focus_rotation()], g(11, 3));
        sim.set_goals(goals).unwrap();

        sim.step().unwrap();
        assert_eq!(sim.goal_target(), g(6, 1));
    }

    #[test]
    fn pair_legs_follow_maneuver() {
        let from = Placement::of(g(2, 2), Orientation::North);
        let plan = Plan::Pair {
            leader: AgentId(0),
            partner: AgentId(1),
            from,
            maneuver: Maneuver::Forward,
        };
        assert_eq!(plan.mover(), AgentId(0));
        assert_eq!(
            plan.legs(),
            vec![
                Leg::new(AgentId(0), g(2, 2), g(2, 3)),
                Leg::new(AgentId(1), g(3, 2), g(3, 3)),
            ]
        );
    }

    #[test]
    fn lone_agent_walks_out() {
        let mut sim = corridor(quiet());
        let a = sim.spawn(AgentKind::Solitary, g(5, 1), Orientation::East).unwrap();

        let first = sim.step().unwrap();
        assert_eq!(first.moved, 1);
        assert_eq!(sim.agent(a).unwrap().position, g(6, 1));
        assert_eq!(sim.agent(a).unwrap().readiness, 3);

        // Waits out its step duration.
        sim.step().unwrap();
        sim.step().unwrap();
        assert_eq!(sim.agent(a).unwrap().position, g(6, 1));

        sim.step().unwrap();
        assert_eq!(sim.agent(a).unwrap().position, g(7, 1));

        let report = sim.step().unwrap();
        assert_eq!(report.evacuated_this_tick, 1);
        assert!(report.finished);
        assert_eq!(sim.evacuated_by_kind()[&AgentKind::Solitary], 1);
    }

    #[test]
    fn reverse_step_costs_double() {
        let mut sim = corridor(quiet());
        let a = sim.spawn(AgentKind::Solitary, g(5, 1), Orientation::West).unwrap();
        sim.step().unwrap();
        let agent = sim.agent(a).unwrap();
        assert_eq!(agent.position, g(6, 1));
        assert_eq!(agent.orientation, Orientation::East);
        assert_eq!(agent.movement_cost, 6);
    }

    #[test]
    fn queue_moves_up_behind_leaver() {
        let mut sim = corridor(quiet());
        // The front agent steps onto the exit and the one behind follows.
        let front = sim.spawn(AgentKind::Solitary, g(6, 1), Orientation::East).unwrap();
        let back = sim.spawn(AgentKind::Solitary, g(5, 1), Orientation::East).unwrap();
        let report = sim.step().unwrap();
        assert_eq!(report.moved, 2);
        assert_eq!(sim.agent(front).unwrap().position, g(7, 1));
        assert_eq!(sim.agent(back).unwrap().position, g(6, 1));
    }

    #[test]
    fn blocked_agent_keeps_readiness() {
        let mut sim = corridor(quiet());
        let front = sim.spawn(AgentKind::Solitary, g(6, 1), Orientation::East).unwrap();
        let back = sim.spawn(AgentKind::Solitary, g(5, 1), Orientation::East).unwrap();
        sim.agents.get_mut(front).unwrap().readiness = 10;

        let report = sim.step().unwrap();
        assert_eq!(report.moved, 0);
        let agent = sim.agent(back).unwrap();
        assert_eq!(agent.position, g(5, 1));
        assert_eq!(agent.readiness, 0);
    }

    #[test]
    fn finished_simulation_stays_put() {
        let mut sim = corridor(quiet());
        let report = sim.step().unwrap();
        assert!(report.finished);
        let again = sim.step().unwrap();
        assert_eq!(again.tick, report.tick);
        assert!(matches!(
            sim.events().last(),
            Some(SimEvent::EvacuationFinished { evacuated: 0, .. })
        ));
    }

    #[test]
    fn virtual_leader_pulls_followers() {
        let mut sim = corridor(quiet());
        sim.spawn(AgentKind::VirtualLeader, g(2, 1), Orientation::East).unwrap();
        let a = sim.spawn(AgentKind::Solitary, g(1, 1), Orientation::East).unwrap();
        sim.step().unwrap();
        assert_eq!(sim.virtual_leader(), Some(g(3, 1)));
        assert_eq!(sim.agent(a).unwrap().position, g(2, 1));
    }
}
