//! Pair maneuvers and movement costs.
//!
//! A pair stands side by side: the partner is always on the leader's right,
//! `partner = leader + orientation.right()`. Every maneuver keeps that layout,
//! so the member that leads before a maneuver still leads after it.
//!
//! ```text
//!   TurnLeft  (pivot on leader)      TurnRight (pivot on partner)
//!   . P .        . . .               . . .        . L .
//!   . L .   <-   L P .               L P .   ->   . P .
//! ```

use evac_topology::{GridCoord, Orientation};
use serde::{Deserialize, Serialize};

/// Cost class of a movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CostClass {
    /// Staying put
    Null,
    /// One axis or diagonal step
    Simple,
    /// A turn or a step against the current orientation
    Wide,
}

impl CostClass {
    /// Ticks consumed for an agent with the given nominal duration.
    pub const fn ticks(&self, duration: u32) -> u32 {
        match self {
            Self::Null => 0,
            Self::Simple => duration,
            Self::Wide => duration * 2,
        }
    }

    /// Cost class of a solitary step taken while facing `orientation`.
    pub fn of_step(step: GridCoord, orientation: Orientation) -> Self {
        if step == GridCoord::ORIGIN {
            Self::Null
        } else if orientation.is_reverse_step(step) {
            Self::Wide
        } else {
            Self::Simple
        }
    }
}

/// The seven things a pair can do in one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Maneuver {
    Stay,
    Forward,
    Backward,
    ShiftLeft,
    ShiftRight,
    TurnLeft,
    TurnRight,
}

/// Where a pair ends up after a maneuver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub leader: GridCoord,
    pub partner: GridCoord,
    pub orientation: Orientation,
}

impl Placement {
    /// Layout of a pair whose leader stands at `leader`.
    pub fn of(leader: GridCoord, orientation: Orientation) -> Self {
        Self {
            leader,
            partner: leader + orientation.right(),
            orientation,
        }
    }
}

impl Maneuver {
    pub const ALL: [Self; 7] = [
        Self::Stay,
        Self::Forward,
        Self::Backward,
        Self::ShiftLeft,
        Self::ShiftRight,
        Self::TurnLeft,
        Self::TurnRight,
    ];

    pub const fn cost_class(&self) -> CostClass {
        match self {
            Self::Stay => CostClass::Null,
            Self::Forward | Self::Backward | Self::ShiftLeft | Self::ShiftRight => {
                CostClass::Simple
            }
            Self::TurnLeft | Self::TurnRight => CostClass::Wide,
        }
    }

    pub const fn is_turn(&self) -> bool {
        matches!(self, Self::TurnLeft | Self::TurnRight)
    }

    pub const fn is_reverse(&self) -> bool {
        matches!(self, Self::Backward)
    }

    /// Placement after performing this maneuver from `from`.
    pub fn apply(&self, from: Placement) -> Placement {
        let o = from.orientation;
        let forward = o.vector();
        let right = o.right();
        match self {
            Self::Stay => from,
            Self::Forward => Placement::of(from.leader + forward, o),
            Self::Backward => Placement::of(from.leader - forward, o),
            Self::ShiftLeft => Placement::of(from.leader - right, o),
            Self::ShiftRight => Placement::of(from.leader + right, o),
            Self::TurnLeft => Placement::of(from.leader, o.rotate_ccw()),
            Self::TurnRight => Placement::of(from.partner + forward, o.rotate_cw()),
        }
    }
}

impl std::fmt::Display for Maneuver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evac_topology::{are_axis_adjacent, are_moore_adjacent};

    fn g(x: i32, y: i32) -> GridCoord {
        GridCoord::new(x, y)
    }

    #[test]
    fn partner_stands_on_the_right() {
        let p = Placement::of(g(2, 2), Orientation::North);
        assert_eq!(p.partner, g(3, 2));
        let p = Placement::of(g(2, 2), Orientation::East);
        assert_eq!(p.partner, g(2, 1));
    }

    #[test]
    fn simple_maneuvers_translate() {
        let start = Placement::of(g(2, 2), Orientation::North);
        assert_eq!(Maneuver::Forward.apply(start).leader, g(2, 3));
        assert_eq!(Maneuver::Backward.apply(start).partner, g(3, 1));
        assert_eq!(Maneuver::ShiftLeft.apply(start).partner, g(2, 2));
        assert_eq!(Maneuver::ShiftRight.apply(start).leader, g(3, 2));
        assert_eq!(Maneuver::Stay.apply(start), start);
    }

    #[test]
    fn turn_left_pivots_on_leader() {
        let start = Placement::of(g(2, 2), Orientation::North);
        let end = Maneuver::TurnLeft.apply(start);
        assert_eq!(end.leader, g(2, 2));
        assert_eq!(end.partner, g(2, 3));
        assert_eq!(end.orientation, Orientation::West);
    }

    #[test]
    fn turn_right_pivots_on_partner() {
        let start = Placement::of(g(2, 2), Orientation::North);
        let end = Maneuver::TurnRight.apply(start);
        assert_eq!(end.partner, g(3, 2));
        assert_eq!(end.leader, g(3, 3));
        assert_eq!(end.orientation, Orientation::East);
    }

    #[test]
    fn every_maneuver_keeps_members_adjacent_and_moves_one_cell() {
        for o in Orientation::ALL {
            let start = Placement::of(g(5, 5), o);
            for m in Maneuver::ALL {
                let end = m.apply(start);
                assert!(are_axis_adjacent(end.leader, end.partner), "{m} from {o}");
                assert_eq!(end.partner, end.leader + end.orientation.right());
                for (a, b) in [(start.leader, end.leader), (start.partner, end.partner)] {
                    assert!(a == b || are_moore_adjacent(a, b), "{m} from {o}");
                }
            }
        }
    }

    #[test]
    fn cost_classes() {
        assert_eq!(Maneuver::Stay.cost_class().ticks(3), 0);
        assert_eq!(Maneuver::Forward.cost_class().ticks(3), 3);
        assert_eq!(Maneuver::TurnRight.cost_class().ticks(3), 6);

        let north = Orientation::North;
        assert_eq!(CostClass::of_step(GridCoord::ORIGIN, north), CostClass::Null);
        assert_eq!(CostClass::of_step(g(1, 1), north), CostClass::Simple);
        assert_eq!(CostClass::of_step(g(1, 0), north), CostClass::Simple);
        assert_eq!(CostClass::of_step(g(0, -1), north), CostClass::Wide);
        assert_eq!(CostClass::of_step(g(-1, -1), north), CostClass::Wide);
    }
}
