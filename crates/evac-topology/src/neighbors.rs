//! Moore and axis neighborhoods.
//!
//! Navigation looks at the 8-connected Moore neighborhood plus the cell
//! itself ("stay"); pairing only ever bonds axis-adjacent agents.

use crate::{GridCoord, AXIS_CONNECTIONS, MOORE_CONNECTIONS};

/// Neighbor offsets on the square grid.
#[derive(Debug, Clone, Copy)]
pub struct Neighbors;

impl Neighbors {
    /// The 4 axis directions (east, north, west, south).
    pub const AXIS_DIRECTIONS: [GridCoord; AXIS_CONNECTIONS] = [
        GridCoord { x: 1, y: 0 },
        GridCoord { x: 0, y: 1 },
        GridCoord { x: -1, y: 0 },
        GridCoord { x: 0, y: -1 },
    ];

    /// The 4 diagonal directions.
    pub const DIAGONAL_DIRECTIONS: [GridCoord; 4] = [
        GridCoord { x: 1, y: 1 },
        GridCoord { x: -1, y: 1 },
        GridCoord { x: -1, y: -1 },
        GridCoord { x: 1, y: -1 },
    ];

    /// All 8 Moore directions, axis first.
    pub fn moore_directions() -> [GridCoord; MOORE_CONNECTIONS] {
        let mut result = [GridCoord::ORIGIN; MOORE_CONNECTIONS];
        result[..4].copy_from_slice(&Self::AXIS_DIRECTIONS);
        result[4..].copy_from_slice(&Self::DIAGONAL_DIRECTIONS);
        result
    }

    /// The 8 Moore neighbors of a coordinate.
    pub fn moore_of(coord: GridCoord) -> [GridCoord; MOORE_CONNECTIONS] {
        Self::moore_directions().map(|dir| coord + dir)
    }

    /// The Moore neighborhood including the center, center first.
    pub fn moore_with_center(coord: GridCoord) -> [GridCoord; MOORE_CONNECTIONS + 1] {
        let mut result = [coord; MOORE_CONNECTIONS + 1];
        result[1..].copy_from_slice(&Self::moore_of(coord));
        result
    }

    /// The 4 axis neighbors of a coordinate.
    pub fn axis_of(coord: GridCoord) -> [GridCoord; AXIS_CONNECTIONS] {
        Self::AXIS_DIRECTIONS.map(|dir| coord + dir)
    }
}

/// True if `a` and `b` share an edge.
pub fn are_axis_adjacent(a: GridCoord, b: GridCoord) -> bool {
    (b - a).is_axis_step()
}

/// True if `a` and `b` touch (edge or corner).
pub fn are_moore_adjacent(a: GridCoord, b: GridCoord) -> bool {
    a != b && a.chebyshev(&b) == 1
}

/// Count how many of a coordinate's Moore neighbors satisfy a predicate.
pub fn count_moore_neighbors<F>(coord: GridCoord, is_present: F) -> usize
where
    F: Fn(GridCoord) -> bool,
{
    Neighbors::moore_of(coord)
        .iter()
        .filter(|&&n| is_present(n))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_8_directions() {
        assert_eq!(Neighbors::moore_directions().len(), 8);
    }

    #[test]
    fn directions_are_unique() {
        let dirs = Neighbors::moore_directions();
        for i in 0..dirs.len() {
            for j in (i + 1)..dirs.len() {
                assert_ne!(dirs[i], dirs[j], "Duplicate direction at {} and {}", i, j);
            }
        }
    }

    #[test]
    fn center_comes_first() {
        let c = GridCoord::new(4, 7);
        let hood = Neighbors::moore_with_center(c);
        assert_eq!(hood[0], c);
        assert!(hood[1..].iter().all(|n| are_moore_adjacent(*n, c)));
    }

    #[test]
    fn axis_adjacency_symmetric() {
        let a = GridCoord::new(3, 2);
        let b = GridCoord::new(3, 3);

        assert!(are_axis_adjacent(a, b));
        assert!(are_axis_adjacent(b, a));
        assert!(!are_axis_adjacent(a, GridCoord::new(4, 3)));
        assert!(!are_axis_adjacent(a, a));
    }

    #[test]
    fn count_neighbors_partial() {
        let count = count_moore_neighbors(GridCoord::ORIGIN, |c| c.y == 0);
        assert_eq!(count, 2);
        assert_eq!(count_moore_neighbors(GridCoord::ORIGIN, |_| true), 8);
    }
}
