use std::collections::BTreeMap;

use evac_sim::{
    AgentId, AgentKind, AreaGoalConfig, Error, GridCoord, Maneuver, Orientation, PairingRejection,
    Placement, Room, Scenario, SimEvent, SimSnapshot, Simulation, SimulationConfig,
};
use proptest::prelude::*;

fn demo(agents: usize, seed: u64) -> Simulation {
    Scenario::demo(agents, seed)
        .unwrap()
        .build(SimulationConfig::default().with_seed(seed))
        .unwrap()
}

fn assert_board_consistent(sim: &Simulation) {
    assert_eq!(sim.remaining() + sim.evacuated(), sim.spawned(), "conservation");
    assert_eq!(sim.board().occupied_count(), sim.remaining());
    for agent in sim.agents().iter().filter(|a| a.kind != AgentKind::VirtualLeader) {
        assert_eq!(
            sim.board().resident(agent.position),
            Some(agent.id),
            "agent {} not resident at {}",
            agent.id,
            agent.position
        );
        assert!(sim.room().is_passable(agent.position));
    }
}

/// Pair placements keyed by leader.
fn pairs(snapshot: &SimSnapshot) -> BTreeMap<AgentId, (AgentId, Placement)> {
    let positions = snapshot.positions();
    snapshot
        .agents
        .iter()
        .filter(|a| a.kind == AgentKind::PairedLeader)
        .filter_map(|a| {
            let partner = a.partner?;
            Some((
                a.id,
                (
                    partner,
                    Placement {
                        leader: a.position,
                        partner: positions[&partner],
                        orientation: a.orientation,
                    },
                ),
            ))
        })
        .collect()
}

#[test]
fn every_tick_conserves_agents_and_cells() {
    let mut sim = demo(40, 42);
    assert_eq!(sim.spawned(), 40);
    for _ in 0..400 {
        let report = sim.step().unwrap();
        assert_board_consistent(&sim);
        assert_eq!(report.remaining + report.evacuated_total, 40);
        if report.finished {
            break;
        }
    }
}

#[test]
fn pairs_move_as_one_body() {
    let mut sim = demo(40, 7);
    let mut bonded_moves = 0;
    for _ in 0..600 {
        let before = pairs(&sim.snapshot());
        sim.step().unwrap();
        let after = pairs(&sim.snapshot());

        for (leader, (partner, placement)) in &after {
            assert_eq!(
                placement.partner,
                placement.leader + placement.orientation.right(),
                "pair {leader} out of formation"
            );
            let Some((old_partner, old)) = before.get(leader) else {
                continue;
            };
            assert_eq!(old_partner, partner);
            let explained = Maneuver::ALL.iter().any(|m| m.apply(*old) == *placement);
            assert!(explained, "pair {leader} moved from {old:?} to {placement:?}");
            if old != placement {
                bonded_moves += 1;
            }
        }
        if sim.is_finished() {
            break;
        }
    }
    assert!(bonded_moves > 0, "no pair ever moved");
}

#[test]
fn demo_crowd_evacuates_completely() {
    let mut sim = demo(30, 11);
    let outcome = sim.run(50_000).unwrap();
    assert!(outcome.is_evacuated(), "{outcome:?}");
    assert_eq!(sim.evacuated(), 30);
    assert_eq!(sim.remaining(), 0);
    assert_eq!(sim.board().occupied_count(), 0);
    assert_eq!(sim.evacuated_by_kind().values().sum::<usize>(), 30);
    assert!(matches!(
        sim.events().last(),
        Some(SimEvent::EvacuationFinished { evacuated: 30, .. })
    ));
}

#[test]
fn replayed_timeline_matches_live_state() {
    let mut sim = demo(25, 5);
    for _ in 0..250 {
        sim.step().unwrap();
    }
    let live = sim.snapshot();
    let replayed = SimSnapshot::from_events(sim.events(), sim.events().len());
    assert_eq!(replayed.positions(), live.positions());
    assert_eq!(replayed.evacuated, live.evacuated);
    assert_eq!(replayed.pairs, live.pairs);
}

#[test]
fn area_checkpoint_comes_before_exit() {
    let text = "\
##########
#a.a.....#
#........G
#a...a...#
##########
area 5 1 7 3
";
    let mut sim = Scenario::parse(text)
        .unwrap()
        .build(SimulationConfig::default())
        .unwrap();
    assert_eq!(sim.goal_target(), GridCoord::new(6, 2));

    let outcome = sim.run(20_000).unwrap();
    assert!(outcome.is_evacuated(), "{outcome:?}");

    let checkpoints: Vec<&str> = sim
        .events()
        .iter()
        .filter_map(|e| match e {
            SimEvent::CheckpointReached { goal, .. } => Some(goal.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(checkpoints.len(), 2);
    assert!(checkpoints[0].starts_with("area"));
    assert!(checkpoints[1].starts_with("exit"));
}

#[test]
fn boosted_rotating_area_still_gathers_everyone() {
    let text = "\
##########
#a.a.....#
#........G
#a...a...#
##########
area 5 1 7 3
";
    let areas = AreaGoalConfig {
        booster: Some(5.0),
        rotate_focus: true,
    };
    let mut sim = Scenario::parse(text)
        .unwrap()
        .build(SimulationConfig::default().with_area_goals(areas))
        .unwrap();

    let outcome = sim.run(20_000).unwrap();
    assert!(outcome.is_evacuated(), "{outcome:?}");
    assert_eq!(sim.evacuated(), 4);
    let checkpoints = sim
        .events()
        .iter()
        .filter(|e| matches!(e, SimEvent::CheckpointReached { .. }))
        .count();
    assert_eq!(checkpoints, 2);
}

#[test]
fn virtual_leader_guides_crowd_out() {
    let text = "\
############
#a.a......V#
#.a...#....G
#a..a.#....#
############
";
    let mut sim = Scenario::parse(text)
        .unwrap()
        .build(SimulationConfig::default().with_pairing(false))
        .unwrap();
    let outcome = sim.run(20_000).unwrap();
    assert!(outcome.is_evacuated(), "{outcome:?}");
    assert_eq!(sim.evacuated(), 5);
    assert!(sim.virtual_leader().is_some());
}

#[test]
fn explicit_pairing_is_validated() {
    let room = Room::walled(10, 6, GridCoord::new(9, 3)).unwrap();
    let mut sim = Simulation::new(room, SimulationConfig::default()).unwrap();
    let a = sim.spawn(AgentKind::Solitary, GridCoord::new(2, 2), Orientation::East).unwrap();
    let b = sim.spawn(AgentKind::Solitary, GridCoord::new(2, 3), Orientation::East).unwrap();
    let c = sim.spawn(AgentKind::Solitary, GridCoord::new(3, 2), Orientation::East).unwrap();
    let leader = sim.spawn(AgentKind::Leader, GridCoord::new(5, 2), Orientation::East).unwrap();

    let bond = sim.pair(a, b).unwrap();
    assert_eq!(bond.orientation, Orientation::East);
    assert_eq!(sim.agent(bond.leader).unwrap().kind, AgentKind::PairedLeader);

    let before = sim.snapshot();
    for (x, y, reason) in [
        (a, a, PairingRejection::SameAgent),
        (a, c, PairingRejection::AlreadyPaired),
        (c, leader, PairingRejection::NotPairable),
    ] {
        match sim.pair(x, y) {
            Err(Error::InvalidPairing { reason: got, .. }) => assert_eq!(got, reason),
            other => panic!("expected rejection, got {other:?}"),
        }
    }
    assert_eq!(sim.snapshot(), before);
}

#[test]
fn config_from_json_drives_the_run() {
    let config = SimulationConfig::from_json_str(r#"{ "seed": 99, "pairing": false }"#).unwrap();
    assert_eq!(config.agent_duration, 3);
    let mut sim = Scenario::demo(10, 1).unwrap().build(config).unwrap();
    for _ in 0..200 {
        let report = sim.step().unwrap();
        assert_eq!(report.pairs_formed, 0);
    }
    assert_eq!(sim.snapshot().pairs, 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn random_crowds_keep_invariants(agents in 2usize..30, seed in any::<u64>()) {
        let mut sim = demo(agents, seed);
        for _ in 0..150 {
            let report = sim.step().unwrap();
            prop_assert_eq!(report.remaining + report.evacuated_total, agents);
            prop_assert_eq!(sim.board().occupied_count(), sim.remaining());
            if report.finished {
                break;
            }
        }
    }
}
