//! Square grid coordinates and cardinal orientations.
//!
//! The grid is indexed with `x` growing east and `y` growing north, so an
//! ASCII room drawn top-down has its first text row at the highest `y`.
//! A coordinate doubles as a step offset, the same way the hex topology
//! treats directions as coordinates.

use std::ops::{Add, Neg, Sub};

/// A cell position (or a step offset) on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridCoord {
    /// Column, growing east
    pub x: i32,
    /// Row, growing north
    pub y: i32,
}

impl GridCoord {
    /// Origin of the grid.
    pub const ORIGIN: Self = Self { x: 0, y: 0 };

    /// Create a new coordinate.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance between two coordinates.
    pub fn euclidean(&self, other: &Self) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        dx.hypot(dy)
    }

    /// Chebyshev (king-move) distance.
    pub fn chebyshev(&self, other: &Self) -> u32 {
        let dx = (self.x - other.x).unsigned_abs();
        let dy = (self.y - other.y).unsigned_abs();
        dx.max(dy)
    }

    /// Manhattan distance.
    pub fn manhattan(&self, other: &Self) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }

    /// True for the four diagonal unit steps.
    pub const fn is_diagonal_step(&self) -> bool {
        self.x != 0 && self.y != 0 && self.x.abs() == 1 && self.y.abs() == 1
    }

    /// True for the four axis unit steps.
    pub const fn is_axis_step(&self) -> bool {
        (self.x.abs() == 1 && self.y == 0) || (self.x == 0 && self.y.abs() == 1)
    }

    /// Cost of a single unit step: 1 along an axis, √2 diagonally.
    pub fn step_cost(&self) -> f64 {
        if self.is_diagonal_step() {
            std::f64::consts::SQRT_2
        } else {
            1.0
        }
    }

    /// Dot product, treating both coordinates as vectors.
    pub const fn dot(&self, other: &Self) -> i32 {
        self.x * other.x + self.y * other.y
    }
}

impl Add for GridCoord {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl Sub for GridCoord {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

impl Neg for GridCoord {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

impl std::fmt::Display for GridCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One of the four cardinal directions an agent can face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Orientation {
    #[default]
    North,
    East,
    South,
    West,
}

impl Orientation {
    /// All orientations in clockwise order starting at north.
    pub const ALL: [Self; 4] = [Self::North, Self::East, Self::South, Self::West];

    /// Unit step pointing the way this orientation faces.
    pub const fn vector(&self) -> GridCoord {
        match self {
            Self::North => GridCoord::new(0, 1),
            Self::East => GridCoord::new(1, 0),
            Self::South => GridCoord::new(0, -1),
            Self::West => GridCoord::new(-1, 0),
        }
    }

    /// Quarter turn clockwise.
    pub const fn rotate_cw(&self) -> Self {
        match self {
            Self::North => Self::East,
            Self::East => Self::South,
            Self::South => Self::West,
            Self::West => Self::North,
        }
    }

    /// Quarter turn counter-clockwise.
    pub const fn rotate_ccw(&self) -> Self {
        match self {
            Self::North => Self::West,
            Self::West => Self::South,
            Self::South => Self::East,
            Self::East => Self::North,
        }
    }

    /// Half turn.
    pub const fn opposite(&self) -> Self {
        match self {
            Self::North => Self::South,
            Self::East => Self::West,
            Self::South => Self::North,
            Self::West => Self::East,
        }
    }

    /// Unit step to the right-hand side of this orientation.
    pub const fn right(&self) -> GridCoord {
        self.rotate_cw().vector()
    }

    /// Orientation of an axis unit step, `None` for anything else.
    pub fn from_step(step: GridCoord) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.vector() == step)
    }

    /// Orientation after a unit step taken while facing `self`.
    ///
    /// Axis steps face the step direction. A diagonal step keeps the current
    /// orientation when it shares a component with it, otherwise the agent
    /// faces the vertical component of the step.
    pub fn after_step(&self, step: GridCoord) -> Self {
        if let Some(facing) = Self::from_step(step) {
            return facing;
        }
        if !step.is_diagonal_step() {
            return *self;
        }
        let forward = self.vector();
        if forward.dot(&step) > 0 {
            *self
        } else if step.y > 0 {
            Self::North
        } else {
            Self::South
        }
    }

    /// True when the step points (partly) against this orientation.
    pub const fn is_reverse_step(&self, step: GridCoord) -> bool {
        self.vector().dot(&step) < 0
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::North => "north",
            Self::East => "east",
            Self::South => "south",
            Self::West => "west",
        };
        f.write_str(name)
    }
}
