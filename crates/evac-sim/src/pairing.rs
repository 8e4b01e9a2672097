//! Pair bonds: forming, laying out, refreshing and splitting.
//!
//! Once per tick, before any intent, the solitary agents that are allowed to
//! pair are matched on the side-adjacency graph and every match becomes a
//! rigid pair. Pairs whose leader gets within `split_distance` of the exit
//! fall apart again so members can file through the gate one by one.

use std::collections::BTreeMap;

use evac_contention::{AgentId, PairingGraph};
use evac_topology::{are_axis_adjacent, FloorField, GridCoord, Orientation};
use tracing::debug;

use crate::agent::{AgentKind, Agents, CanPair};
use crate::error::PairingRejection;
use crate::{Error, Result};

/// A freshly formed pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bond {
    pub leader: AgentId,
    pub partner: AgentId,
    pub orientation: Orientation,
}

/// Shared orientation and leader side for two side-by-side agents.
///
/// Two orientations put one agent on the other's right. The one whose
/// forward cells are closer to the target wins; ties go to `a` leading.
pub fn layout(
    a: (AgentId, GridCoord),
    b: (AgentId, GridCoord),
    field: &FloorField,
) -> Option<Bond> {
    let forward_sum = |leader: GridCoord, partner: GridCoord, o: Orientation| {
        field.get(leader + o.vector()) + field.get(partner + o.vector())
    };
    Orientation::ALL
        .into_iter()
        .filter_map(|o| {
            if a.1 + o.right() == b.1 {
                Some((a, b, o))
            } else if b.1 + o.right() == a.1 {
                Some((b, a, o))
            } else {
                None
            }
        })
        .map(|(leader, partner, o)| (forward_sum(leader.1, partner.1, o), leader.0, partner.0, o))
        .fold(None, |best: Option<(f64, AgentId, AgentId, Orientation)>, c| match best {
            Some(kept) if kept.0 <= c.0 || c.0.is_nan() => Some(kept),
            _ => Some(c),
        })
        .map(|(_, leader, partner, orientation)| Bond {
            leader,
            partner,
            orientation,
        })
}

fn rejection(first: AgentId, second: AgentId, reason: PairingRejection) -> Error {
    Error::InvalidPairing {
        first,
        second,
        reason,
    }
}

/// Check that `a` and `b` may bond, without changing anything.
pub fn validate(agents: &Agents, a: AgentId, b: AgentId) -> Result<()> {
    if a == b {
        return Err(rejection(a, b, PairingRejection::SameAgent));
    }
    let first = agents.get(a).ok_or(Error::UnknownAgent(a))?;
    let second = agents.get(b).ok_or(Error::UnknownAgent(b))?;
    if first.bonded() || second.bonded() {
        return Err(rejection(a, b, PairingRejection::AlreadyPaired));
    }
    if !first.pairable() || !second.pairable() {
        return Err(rejection(a, b, PairingRejection::NotPairable));
    }
    if !are_axis_adjacent(first.position, second.position) {
        return Err(rejection(a, b, PairingRejection::NotAdjacent));
    }
    Ok(())
}

/// Bond `a` and `b` into a pair.
pub fn bond(agents: &mut Agents, a: AgentId, b: AgentId, field: &FloorField) -> Result<Bond> {
    validate(agents, a, b)?;
    let pa = agents.get(a).map(|x| x.position).ok_or(Error::UnknownAgent(a))?;
    let pb = agents.get(b).map(|x| x.position).ok_or(Error::UnknownAgent(b))?;
    let bond = layout((a, pa), (b, pb), field)
        .ok_or_else(|| rejection(a, b, PairingRejection::NotAdjacent))?;

    for (id, kind, other) in [
        (bond.leader, AgentKind::PairedLeader, bond.partner),
        (bond.partner, AgentKind::PairedPartner, bond.leader),
    ] {
        let agent = agents.get_mut(id).ok_or(Error::UnknownAgent(id))?;
        agent.kind = kind;
        agent.partner = Some(other);
        agent.orientation = bond.orientation;
    }
    debug!(leader = %bond.leader, partner = %bond.partner, orientation = %bond.orientation, "pair formed");
    Ok(bond)
}

/// Dissolve the pair `member` belongs to. Both halves keep the pair's
/// orientation. Returns `(leader, partner)` as they were.
pub fn dissolve(agents: &mut Agents, member: AgentId) -> Option<(AgentId, AgentId)> {
    let agent = agents.get(member)?;
    let other = agent.partner?;
    let pair = if agent.is_leader_of_pair() {
        (member, other)
    } else {
        (other, member)
    };
    for id in [member, other] {
        if let Some(a) = agents.get_mut(id) {
            a.kind = AgentKind::Solitary;
            a.partner = None;
        }
    }
    debug!(leader = %pair.0, partner = %pair.1, "pair split");
    Some(pair)
}

/// Re-derive which member leads from positions and shared orientation.
///
/// The leader is the member whose right-hand neighbour is its partner.
pub fn refresh_roles(agents: &mut Agents, member: AgentId) -> Result<()> {
    let agent = agents.get(member).ok_or(Error::UnknownAgent(member))?;
    let Some(other_id) = agent.partner else {
        return Ok(());
    };
    let other = agents.get(other_id).ok_or(Error::UnknownAgent(other_id))?;
    let (leader, partner) = if agent.position + agent.orientation.right() == other.position {
        (member, other_id)
    } else {
        (other_id, member)
    };
    if let Some(a) = agents.get_mut(leader) {
        a.kind = AgentKind::PairedLeader;
    }
    if let Some(a) = agents.get_mut(partner) {
        a.kind = AgentKind::PairedPartner;
    }
    Ok(())
}

/// Solitary agents far enough from the exit to pair.
pub fn candidates(agents: &Agents, exit: GridCoord, split_distance: f64) -> Vec<(AgentId, GridCoord)> {
    agents
        .iter()
        .filter(|a| a.pairable() && a.position.euclidean(&exit) > split_distance)
        .map(|a| (a.id, a.position))
        .collect()
}

/// Match eligible solitary agents and bond every match.
pub fn form_pairs(
    agents: &mut Agents,
    field: &FloorField,
    exit: GridCoord,
    split_distance: f64,
) -> Result<Vec<Bond>> {
    let eligible = candidates(agents, exit, split_distance);
    if eligible.len() < 2 {
        return Ok(Vec::new());
    }
    let by_cell: BTreeMap<GridCoord, AgentId> = eligible.iter().map(|&(id, c)| (c, id)).collect();
    let matching = PairingGraph::matching(by_cell.keys().copied());

    let mut bonds = Vec::with_capacity(matching.len());
    for (ca, cb) in matching {
        if let (Some(&a), Some(&b)) = (by_cell.get(&ca), by_cell.get(&cb)) {
            bonds.push(bond(agents, a, b, field)?);
        }
    }
    Ok(bonds)
}

/// Leaders of pairs that should split this tick.
pub fn due_for_split(agents: &Agents, exit: GridCoord, split_distance: f64) -> Vec<AgentId> {
    agents
        .iter()
        .filter(|a| a.is_leader_of_pair() && a.position.euclidean(&exit) <= split_distance)
        .map(|a| a.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use evac_topology::Room;

    fn g(x: i32, y: i32) -> GridCoord {
        GridCoord::new(x, y)
    }

    fn field_to(target: GridCoord) -> FloorField {
        let room = Room::walled(10, 8, g(9, 4)).unwrap();
        FloorField::compute(&room, target).unwrap()
    }

    fn solo(agents: &mut Agents, at: GridCoord) -> AgentId {
        agents.insert(AgentKind::Solitary, at, Orientation::North, 3)
    }

    #[test]
    fn layout_faces_the_target() {
        let field = field_to(g(9, 4));
        // Stacked vertically, the pair can face east or west; east is closer.
        let bond = layout((AgentId(0), g(3, 4)), (AgentId(1), g(3, 3)), &field).unwrap();
        assert_eq!(bond.orientation, Orientation::East);
        // Facing east the right-hand side is south, so the upper agent leads.
        assert_eq!(bond.leader, AgentId(0));
        assert_eq!(bond.partner, AgentId(1));
    }

    #[test]
    fn layout_requires_side_adjacency() {
        let field = field_to(g(9, 4));
        assert!(layout((AgentId(0), g(3, 4)), (AgentId(1), g(4, 5)), &field).is_none());
        assert!(layout((AgentId(0), g(3, 4)), (AgentId(1), g(5, 4)), &field).is_none());
    }

    #[test]
    fn bond_sets_symmetric_partners() {
        let field = field_to(g(9, 4));
        let mut agents = Agents::new();
        let a = solo(&mut agents, g(3, 4));
        let b = solo(&mut agents, g(3, 3));
        let bond = bond(&mut agents, a, b, &field).unwrap();

        let leader = agents.get(bond.leader).unwrap();
        let partner = agents.get(bond.partner).unwrap();
        assert_eq!(leader.partner, Some(bond.partner));
        assert_eq!(partner.partner, Some(bond.leader));
        assert!(leader.is_leader_of_pair());
        assert!(!partner.is_leader_of_pair());
        assert_eq!(leader.position + leader.orientation.right(), partner.position);
        assert_eq!(partner.orientation, leader.orientation);
    }

    #[test]
    fn invalid_bonds_are_rejected_without_change() {
        let field = field_to(g(9, 4));
        let mut agents = Agents::new();
        let a = solo(&mut agents, g(3, 4));
        let b = solo(&mut agents, g(5, 4));
        let c = solo(&mut agents, g(3, 3));
        let leader = agents.insert(AgentKind::Leader, g(2, 4), Orientation::East, 2);

        let reason = |r: Result<Bond>| match r {
            Err(Error::InvalidPairing { reason, .. }) => Some(reason),
            _ => None,
        };
        assert_eq!(reason(bond(&mut agents, a, a, &field)), Some(PairingRejection::SameAgent));
        assert_eq!(reason(bond(&mut agents, a, b, &field)), Some(PairingRejection::NotAdjacent));
        assert_eq!(reason(bond(&mut agents, a, leader, &field)), Some(PairingRejection::NotPairable));
        assert!(agents.get(a).unwrap().partner.is_none());

        bond(&mut agents, a, c, &field).unwrap();
        let d = solo(&mut agents, g(4, 4));
        assert_eq!(reason(bond(&mut agents, a, d, &field)), Some(PairingRejection::AlreadyPaired));
        assert!(matches!(
            bond(&mut agents, a, AgentId(99), &field),
            Err(Error::UnknownAgent(AgentId(99)))
        ));
    }

    #[test]
    fn dissolve_keeps_orientation() {
        let field = field_to(g(9, 4));
        let mut agents = Agents::new();
        let a = solo(&mut agents, g(3, 4));
        let b = solo(&mut agents, g(3, 3));
        let bond = bond(&mut agents, a, b, &field).unwrap();

        assert_eq!(dissolve(&mut agents, bond.partner), Some((bond.leader, bond.partner)));
        for id in [a, b] {
            let agent = agents.get(id).unwrap();
            assert_eq!(agent.kind, AgentKind::Solitary);
            assert_eq!(agent.partner, None);
            assert_eq!(agent.orientation, bond.orientation);
        }
        assert_eq!(dissolve(&mut agents, a), None);
    }

    #[test]
    fn refresh_roles_follows_positions() {
        let field = field_to(g(9, 4));
        let mut agents = Agents::new();
        let a = solo(&mut agents, g(3, 4));
        let b = solo(&mut agents, g(3, 3));
        let bond = bond(&mut agents, a, b, &field).unwrap();

        // Swap the members physically and turn them around.
        for (id, at) in [(bond.leader, g(3, 3)), (bond.partner, g(3, 4))] {
            let agent = agents.get_mut(id).unwrap();
            agent.position = at;
            agent.orientation = Orientation::East;
        }
        refresh_roles(&mut agents, bond.leader).unwrap();
        assert!(agents.get(bond.partner).unwrap().is_leader_of_pair());
        assert_eq!(agents.get(bond.leader).unwrap().kind, AgentKind::PairedPartner);
    }

    #[test]
    fn form_pairs_skips_agents_near_exit() {
        let field = field_to(g(9, 4));
        let mut agents = Agents::new();
        solo(&mut agents, g(2, 2));
        solo(&mut agents, g(2, 3));
        solo(&mut agents, g(8, 4));
        solo(&mut agents, g(8, 3));

        let bonds = form_pairs(&mut agents, &field, g(9, 4), 2.0).unwrap();
        assert_eq!(bonds.len(), 1);
        assert_eq!(agents.pair_count(), 1);
        assert!(agents.get(AgentId(2)).unwrap().partner.is_none());
    }

    #[test]
    fn no_candidates_no_pairs() {
        let field = field_to(g(9, 4));
        let mut agents = Agents::new();
        solo(&mut agents, g(2, 2));
        solo(&mut agents, g(4, 4));
        assert!(form_pairs(&mut agents, &field, g(9, 4), 2.0).unwrap().is_empty());
    }

    #[test]
    fn split_due_near_exit() {
        let field = field_to(g(9, 4));
        let mut agents = Agents::new();
        let a = solo(&mut agents, g(7, 4));
        let b = solo(&mut agents, g(7, 3));
        let bond = bond(&mut agents, a, b, &field).unwrap();
        assert!(due_for_split(&agents, g(9, 4), 1.5).is_empty());
        assert_eq!(due_for_split(&agents, g(9, 4), 2.5), vec![bond.leader]);
    }
}
