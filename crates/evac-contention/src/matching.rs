//! Greedy adjacency matching for pair formation.
//!
//! Vertices are the cells of agents willing to pair; edges join cells that
//! share a side. [`PairingGraph::reduce`] thins the graph until every vertex
//! has degree ≤ 1, always cutting at the busiest vertex toward its busiest
//! neighbour. The result is a valid matching, not a maximum one.

use std::collections::{BTreeMap, BTreeSet};

use evac_topology::{GridCoord, Neighbors};

/// Axis-adjacency graph over candidate cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairingGraph {
    adjacency: BTreeMap<GridCoord, BTreeSet<GridCoord>>,
}

impl PairingGraph {
    /// Graph over `cells`, with an edge for every axis-adjacent pair.
    pub fn build<I>(cells: I) -> Self
    where
        I: IntoIterator<Item = GridCoord>,
    {
        let vertices: BTreeSet<GridCoord> = cells.into_iter().collect();
        let adjacency = vertices
            .iter()
            .map(|&v| {
                let edges = Neighbors::axis_of(v)
                    .into_iter()
                    .filter(|n| vertices.contains(n))
                    .collect();
                (v, edges)
            })
            .collect();
        Self { adjacency }
    }

    pub fn vertex_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum::<usize>() / 2
    }

    pub fn degree(&self, v: GridCoord) -> usize {
        self.adjacency.get(&v).map_or(0, BTreeSet::len)
    }

    pub fn has_edge(&self, a: GridCoord, b: GridCoord) -> bool {
        self.adjacency.get(&a).is_some_and(|e| e.contains(&b))
    }

    /// Highest-degree vertex, lowest coordinate on ties.
    fn busiest(&self) -> Option<(GridCoord, usize)> {
        self.adjacency
            .iter()
            .map(|(&v, e)| (v, e.len()))
            .fold(None, |best, (v, d)| match best {
                Some((_, bd)) if bd >= d => best,
                _ => Some((v, d)),
            })
    }

    fn remove_edge(&mut self, a: GridCoord, b: GridCoord) {
        if let Some(e) = self.adjacency.get_mut(&a) {
            e.remove(&b);
        }
        if let Some(e) = self.adjacency.get_mut(&b) {
            e.remove(&a);
        }
    }

    /// Cut edges until every vertex has degree ≤ 1. Returns the edges removed.
    pub fn reduce(&mut self) -> usize {
        let mut removed = 0;
        while let Some((v, degree)) = self.busiest() {
            if degree <= 1 {
                break;
            }
            let neighbour = self.adjacency[&v]
                .iter()
                .map(|&n| (n, self.degree(n)))
                .fold(None, |best: Option<(GridCoord, usize)>, (n, d)| match best {
                    Some((_, bd)) if bd >= d => best,
                    _ => Some((n, d)),
                });
            match neighbour {
                Some((n, _)) => {
                    self.remove_edge(v, n);
                    removed += 1;
                }
                None => break,
            }
        }
        removed
    }

    /// Remaining edges, each once as `(lower, higher)`.
    pub fn pairs(&self) -> Vec<(GridCoord, GridCoord)> {
        self.adjacency
            .iter()
            .flat_map(|(&a, e)| e.iter().filter(move |&&b| a < b).map(move |&b| (a, b)))
            .collect()
    }

    /// Build, reduce and return the matching in one call.
    pub fn matching<I>(cells: I) -> Vec<(GridCoord, GridCoord)>
    where
        I: IntoIterator<Item = GridCoord>,
    {
        let mut graph = Self::build(cells);
        graph.reduce();
        graph.pairs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evac_topology::are_axis_adjacent;
    use proptest::prelude::*;

    fn g(x: i32, y: i32) -> GridCoord {
        GridCoord::new(x, y)
    }

    #[test]
    fn empty_graph_has_no_pairs() {
        let mut graph = PairingGraph::build(std::iter::empty());
        assert_eq!(graph.reduce(), 0);
        assert!(graph.pairs().is_empty());
    }

    #[test]
    fn diagonal_cells_are_not_adjacent() {
        let graph = PairingGraph::build([g(0, 0), g(1, 1)]);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn line_of_three_keeps_one_pair() {
        let mut graph = PairingGraph::build([g(0, 0), g(1, 0), g(2, 0)]);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.degree(g(1, 0)), 2);
        assert_eq!(graph.reduce(), 1);
        // Middle is busiest; both neighbours tie, the lower one loses its edge.
        assert_eq!(graph.pairs(), vec![(g(1, 0), g(2, 0))]);
    }

    #[test]
    fn square_block_forms_two_pairs() {
        let pairs = PairingGraph::matching([g(0, 0), g(1, 0), g(0, 1), g(1, 1)]);
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn isolated_pair_untouched() {
        let mut graph = PairingGraph::build([g(4, 4), g(4, 5)]);
        assert_eq!(graph.reduce(), 0);
        assert_eq!(graph.pairs(), vec![(g(4, 4), g(4, 5))]);
        assert!(graph.has_edge(g(4, 5), g(4, 4)));
    }

    proptest! {
        #[test]
        fn prop_reduced_graph_is_a_matching(
            cells in prop::collection::btree_set((0i32..8, 0i32..8), 0..40)
        ) {
            let cells: Vec<GridCoord> = cells.into_iter().map(|(x, y)| g(x, y)).collect();
            let original = PairingGraph::build(cells.iter().copied());
            let pairs = PairingGraph::matching(cells.iter().copied());

            let mut seen = BTreeSet::new();
            for (a, b) in pairs {
                prop_assert!(are_axis_adjacent(a, b));
                prop_assert!(original.has_edge(a, b));
                prop_assert!(seen.insert(a), "vertex {} matched twice", a);
                prop_assert!(seen.insert(b), "vertex {} matched twice", b);
            }
        }
    }
}
