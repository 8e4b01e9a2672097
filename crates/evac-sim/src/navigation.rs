//! Stochastic navigation over the Moore neighbourhood.
//!
//! Every candidate cell gets an unnormalized attraction
//!
//! ```text
//! w(c) = exp(-k_s' * (F(c) - F(pos)))
//!      * (1 - k_d * diagonal(c))
//!      * (1 - k_o * occupied_by_other(c))
//!      * (1 - k_w * reverse(c))
//! ```
//!
//! where `F` is the floor field and `k_s'` is `k_s` raised by discipline the
//! farther the agent is from its reference leader. Blocked cells and
//! corner-cutting diagonals weigh zero. Using the field *difference* keeps
//! weights comparable wherever the agent stands.
//!
//! If the weights cannot be normalized (all zero, infinite or NaN) the agent
//! stays put; that fallback is local and only logged at trace level.

use evac_contention::{AgentId, Board, RandomSource};
use evac_topology::{FloorField, GridCoord, Neighbors, Orientation, Room};
use tracing::trace;

use crate::config::{NavigationParams, SpeedControl};
use crate::maneuver::{Maneuver, Placement};

/// How the final candidate is picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Weighted random sample
    Stochastic,
    /// Highest weight, first candidate on ties
    ArgMax,
}

/// The weights of a neighbourhood could not form a distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegenerateAttraction {
    pub sum: f64,
}

/// A weighted option.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate<T> {
    pub option: T,
    pub weight: f64,
}

/// Read-only view a navigating agent decides against.
#[derive(Debug, Clone, Copy)]
pub struct Surroundings<'a> {
    pub room: &'a Room,
    pub board: &'a Board,
    pub field: &'a FloorField,
}

impl Surroundings<'_> {
    /// True when `c` holds an agent outside `group`.
    fn held_by_other(&self, c: GridCoord, group: &[AgentId]) -> bool {
        self.board
            .resident(c)
            .is_some_and(|resident| !group.contains(&resident))
    }
}

/// A diagonal step is disallowed when either corner it passes is blocked.
pub fn cross_obstacle(room: &Room, from: GridCoord, to: GridCoord) -> bool {
    (to - from).is_diagonal_step() && room.cuts_corner(from, to)
}

/// `k_s` scaled by discipline and the distance to the reference leader.
pub fn effective_k_s(params: &NavigationParams, leader_distance: Option<f64>) -> f64 {
    match leader_distance {
        Some(d) => {
            let reach = (d / params.discipline_radius).clamp(0.0, 1.0);
            params.k_s * (1.0 + params.discipline * reach)
        }
        None => params.k_s,
    }
}

fn discount(k: f64, applies: bool) -> f64 {
    if applies {
        1.0 - k
    } else {
        1.0
    }
}

/// Attraction of every cell in the 9-cell neighbourhood, stay first.
pub fn attraction(
    around: &Surroundings<'_>,
    params: &NavigationParams,
    k_s: f64,
    me: AgentId,
    position: GridCoord,
    orientation: Orientation,
) -> Vec<Candidate<GridCoord>> {
    let here = around.field.get(position);
    Neighbors::moore_with_center(position)
        .into_iter()
        .map(|cell| {
            let step = cell - position;
            let weight = if !around.room.is_passable(cell) || cross_obstacle(around.room, position, cell)
            {
                0.0
            } else {
                let there = around.field.get(cell);
                if there.is_infinite() {
                    0.0
                } else {
                    (-k_s * (there - here)).exp()
                        * discount(params.k_d, step.is_diagonal_step())
                        * discount(params.k_o, around.held_by_other(cell, &[me]))
                        * discount(params.k_w, orientation.is_reverse_step(step))
                }
            };
            Candidate {
                option: cell,
                weight,
            }
        })
        .collect()
}

/// Attraction of each of the seven pair maneuvers.
///
/// Uses the mean field change of both members, the diagonal penalty for
/// turns, one occupancy discount per target held by a non-member and the
/// reverse penalty for backing up.
pub fn pair_attraction(
    around: &Surroundings<'_>,
    params: &NavigationParams,
    k_s: f64,
    members: [AgentId; 2],
    from: Placement,
) -> Vec<Candidate<Maneuver>> {
    let here = (around.field.get(from.leader) + around.field.get(from.partner)) / 2.0;
    Maneuver::ALL
        .into_iter()
        .map(|maneuver| {
            let to = maneuver.apply(from);
            let legs = [(from.leader, to.leader), (from.partner, to.partner)];
            let blocked = legs.iter().any(|&(a, b)| {
                !around.room.is_passable(b) || cross_obstacle(around.room, a, b)
            });
            let weight = if blocked {
                0.0
            } else {
                let there = (around.field.get(to.leader) + around.field.get(to.partner)) / 2.0;
                if there.is_infinite() {
                    0.0
                } else {
                    let occupied = legs
                        .iter()
                        .filter(|&&(_, b)| around.held_by_other(b, &members))
                        .count();
                    (-k_s * (there - here)).exp()
                        * discount(params.k_d, maneuver.is_turn())
                        * (1.0 - params.k_o).powi(occupied as i32)
                        * discount(params.k_w, maneuver.is_reverse())
                }
            };
            Candidate {
                option: maneuver,
                weight,
            }
        })
        .collect()
}

/// Normalize weights into probabilities.
pub fn normalize<T>(candidates: &[Candidate<T>]) -> Result<Vec<f64>, DegenerateAttraction> {
    let sum: f64 = candidates.iter().map(|c| c.weight).sum();
    if !(sum.is_finite() && sum > 0.0) {
        return Err(DegenerateAttraction { sum });
    }
    Ok(candidates.iter().map(|c| c.weight / sum).collect())
}

/// Pick one option, or `fallback` when the attraction is degenerate.
pub fn select_candidates<T, R>(
    candidates: &[Candidate<T>],
    selection: Selection,
    rng: &mut R,
    fallback: T,
) -> T
where
    T: Copy + std::fmt::Debug,
    R: RandomSource + ?Sized,
{
    let probabilities = match normalize(candidates) {
        Ok(p) => p,
        Err(DegenerateAttraction { sum }) => {
            trace!(?fallback, sum, "degenerate attraction, staying");
            return fallback;
        }
    };
    let index = match selection {
        Selection::Stochastic => rng.weighted_index(&probabilities),
        Selection::ArgMax => arg_max(&probabilities),
    };
    index.map_or(fallback, |i| candidates[i].option)
}

fn arg_max(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, bv)) if bv >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Shrink the step duration while the crowd keeps up, grow it otherwise.
pub fn adapt_speed(duration: u32, gap: f64, control: &SpeedControl) -> u32 {
    let next = if gap <= control.cohesion_gap {
        duration.saturating_sub(control.step)
    } else {
        duration.saturating_add(control.step)
    };
    next.clamp(control.min_duration, control.max_duration)
}
