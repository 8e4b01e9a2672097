//! Leaders: the physical pace setter and the virtual one.
//!
//! The virtual leader walks the goal field deterministically but waits
//! whenever the agent furthest behind falls more than `max_gap` away. It
//! never stands on a cell; followers simply navigate toward wherever it is.

use evac_contention::{AgentId, RandomSource};
use evac_topology::{FloorField, GridCoord, Orientation};

use crate::agent::{AgentKind, Agents};
use crate::config::NavigationParams;
use crate::navigation::{attraction, select_candidates, Selection, Surroundings};

/// The embodied agent furthest from the target on `field`, skipping
/// `exclude`. Agents that cannot reach the target are ignored; ties go to
/// the lowest id.
pub fn most_distant(
    agents: &Agents,
    field: &FloorField,
    exclude: Option<AgentId>,
) -> Option<(AgentId, GridCoord)> {
    agents
        .embodied()
        .filter(|a| Some(a.id) != exclude)
        .map(|a| (a.id, a.position, field.get(a.position)))
        .filter(|(_, _, d)| d.is_finite())
        .fold(None, |best: Option<(AgentId, GridCoord, f64)>, c| match best {
            Some(b) if b.2 >= c.2 => Some(b),
            _ => Some(c),
        })
        .map(|(id, pos, _)| (id, pos))
}

/// Euclidean gap between `from` and the straggler on `field`, 0 without one.
pub fn gap_to_straggler(
    agents: &Agents,
    field: &FloorField,
    me: AgentId,
    from: GridCoord,
) -> f64 {
    most_distant(agents, field, Some(me)).map_or(0.0, |(_, pos)| from.euclidean(&pos))
}

/// Position discipline is measured against: the physical leader if there
/// is one, otherwise the virtual leader.
pub fn reference_position(agents: &Agents) -> Option<(AgentId, GridCoord)> {
    agents
        .first_of_kind(AgentKind::Leader)
        .or_else(|| agents.first_of_kind(AgentKind::VirtualLeader))
        .map(|a| (a.id, a.position))
}

/// Where the virtual leader wants to be after this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaderStep {
    pub to: GridCoord,
    pub orientation: Orientation,
    /// Held back by the gap to the straggler
    pub waiting: bool,
}

/// One arg-max step of the virtual leader, or a pause while the crowd is
/// too far behind.
#[allow(clippy::too_many_arguments)]
pub fn step_virtual_leader<R>(
    around: &Surroundings<'_>,
    params: &NavigationParams,
    me: AgentId,
    position: GridCoord,
    orientation: Orientation,
    straggler: Option<GridCoord>,
    max_gap: f64,
    rng: &mut R,
) -> LeaderStep
where
    R: RandomSource + ?Sized,
{
    if straggler.is_some_and(|s| s.euclidean(&position) > max_gap) {
        return LeaderStep {
            to: position,
            orientation,
            waiting: true,
        };
    }
    let candidates = attraction(around, params, params.k_s, me, position, orientation);
    let to = select_candidates(&candidates, Selection::ArgMax, rng, position);
    LeaderStep {
        to,
        orientation: orientation.after_step(to - position),
        waiting: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evac_contention::{Board, FirstChoice};
    use evac_topology::Room;

    fn g(x: i32, y: i32) -> GridCoord {
        GridCoord::new(x, y)
    }

    fn corridor() -> Room {
        Room::walled(12, 5, g(11, 2)).unwrap()
    }

    #[test]
    fn most_distant_is_furthest_from_target() {
        let room = corridor();
        let field = FloorField::compute(&room, g(11, 2)).unwrap();
        let mut agents = Agents::new();
        let near = agents.insert(AgentKind::Solitary, g(9, 2), Orientation::East, 3);
        let far = agents.insert(AgentKind::Solitary, g(2, 3), Orientation::East, 3);
        agents.insert(AgentKind::VirtualLeader, g(1, 1), Orientation::East, 1);

        assert_eq!(most_distant(&agents, &field, None), Some((far, g(2, 3))));
        assert_eq!(most_distant(&agents, &field, Some(far)), Some((near, g(9, 2))));
        assert_eq!(gap_to_straggler(&agents, &field, near, g(9, 2)), g(9, 2).euclidean(&g(2, 3)));
    }

    #[test]
    fn physical_leader_is_the_reference() {
        let mut agents = Agents::new();
        agents.insert(AgentKind::VirtualLeader, g(1, 1), Orientation::East, 1);
        assert_eq!(reference_position(&agents).map(|r| r.1), Some(g(1, 1)));
        let leader = agents.insert(AgentKind::Leader, g(3, 3), Orientation::East, 2);
        assert_eq!(reference_position(&agents), Some((leader, g(3, 3))));
    }

    #[test]
    fn virtual_leader_advances_along_field() {
        let room = corridor();
        let field = FloorField::compute(&room, g(11, 2)).unwrap();
        let board = Board::for_room(&room);
        let around = Surroundings {
            room: &room,
            board: &board,
            field: &field,
        };
        let params = NavigationParams::virtual_leader();
        let step = step_virtual_leader(
            &around,
            &params,
            AgentId(0),
            g(3, 2),
            Orientation::North,
            Some(g(2, 2)),
            6.0,
            &mut FirstChoice,
        );
        assert!(!step.waiting);
        assert_eq!(step.to, g(4, 2));
        assert_eq!(step.orientation, Orientation::East);
    }

    #[test]
    fn virtual_leader_waits_for_stragglers() {
        let room = corridor();
        let field = FloorField::compute(&room, g(11, 2)).unwrap();
        let board = Board::for_room(&room);
        let around = Surroundings {
            room: &room,
            board: &board,
            field: &field,
        };
        let params = NavigationParams::virtual_leader();
        let step = step_virtual_leader(
            &around,
            &params,
            AgentId(0),
            g(9, 2),
            Orientation::East,
            Some(g(1, 2)),
            6.0,
            &mut FirstChoice,
        );
        assert!(step.waiting);
        assert_eq!(step.to, g(9, 2));
    }
}
