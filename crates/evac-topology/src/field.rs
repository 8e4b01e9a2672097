//! Static floor fields.
//!
//! A floor field holds, for every cell of a room, the walking distance to
//! one target cell over the 8-connected grid (axis step 1, diagonal step
//! √2). Obstacles and cells cut off from the target carry `+∞`.
//!
//! # Relaxation
//!
//! The field is built by label correction rather than a strict Dijkstra:
//! a FIFO work queue is seeded with the target at distance 0, and a cell is
//! pushed again every time a strictly shorter path to it is found. Obstacles
//! are never expanded. On the small, uniform-cost grids rooms are made of
//! this converges in a handful of passes.
//!
//! Diagonal relaxation does not look at the corner cells. The field is a
//! potential; whether an agent may actually take a diagonal step is decided
//! by navigation via [`Room::cuts_corner`].

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::{Error, Fingerprint, GridCoord, Neighbors, Region, Result, Room};

/// Distance-to-target grid for one room and one target.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FloorField {
    width: i32,
    height: i32,
    target: GridCoord,
    values: Vec<f64>,
}

impl FloorField {
    /// Compute the field of `room` toward `target`.
    pub fn compute(room: &Room, target: GridCoord) -> Result<Self> {
        if !room.in_bounds(target) {
            return Err(Error::TargetOutOfBounds(target));
        }
        if !room.is_passable(target) {
            return Err(Error::TargetIsObstacle(target));
        }

        let mut values = vec![f64::INFINITY; room.len()];
        let mut queued = vec![false; room.len()];
        let mut queue = VecDeque::new();

        let start = room.index(target).ok_or(Error::TargetOutOfBounds(target))?;
        values[start] = 0.0;
        queued[start] = true;
        queue.push_back(target);

        while let Some(current) = queue.pop_front() {
            let Some(ci) = room.index(current) else {
                continue;
            };
            queued[ci] = false;
            let base = values[ci];

            for dir in Neighbors::moore_directions() {
                let next = current + dir;
                if !room.is_passable(next) {
                    continue;
                }
                let Some(ni) = room.index(next) else {
                    continue;
                };
                let candidate = base + dir.step_cost();
                if candidate < values[ni] {
                    values[ni] = candidate;
                    if !queued[ni] {
                        queued[ni] = true;
                        queue.push_back(next);
                    }
                }
            }
        }

        Ok(Self {
            width: room.width(),
            height: room.height(),
            target,
            values,
        })
    }

    /// The cell this field leads to.
    pub const fn target(&self) -> GridCoord {
        self.target
    }

    pub const fn width(&self) -> i32 {
        self.width
    }

    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Distance at `c`; `+∞` for obstacles, unreachable and out-of-bounds cells.
    pub fn get(&self, c: GridCoord) -> f64 {
        if c.x < 0 || c.y < 0 || c.x >= self.width || c.y >= self.height {
            return f64::INFINITY;
        }
        self.values
            .get((c.y * self.width + c.x) as usize)
            .copied()
            .unwrap_or(f64::INFINITY)
    }

    /// True if `c` has a finite distance to the target.
    pub fn reaches(&self, c: GridCoord) -> bool {
        self.get(c).is_finite()
    }

    /// Copy flattened to 0 over `area` and scaled by `factor` everywhere
    /// else. Cells the field never reaches stay `+∞`.
    pub fn boosted(&self, area: Region, factor: f64) -> Self {
        let values = self
            .values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let c = GridCoord::new(i as i32 % self.width, i as i32 / self.width);
                if !v.is_finite() {
                    v
                } else if area.contains(c) {
                    0.0
                } else {
                    v * factor
                }
            })
            .collect();
        Self {
            width: self.width,
            height: self.height,
            target: self.target,
            values,
        }
    }

    /// Largest finite distance in the field.
    pub fn max_finite(&self) -> f64 {
        self.values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(0.0, f64::max)
    }
}

/// Floor fields of one room, keyed by target cell.
///
/// Targets move at runtime (exit, current goal, leader positions), so fields
/// are computed lazily and kept for the lifetime of the topology. The table
/// is bound to a room [`Fingerprint`]; presenting a different room drops
/// every cached field.
#[derive(Debug, Clone)]
pub struct FieldTable {
    fingerprint: Fingerprint,
    fields: HashMap<GridCoord, Arc<FloorField>>,
}

impl FieldTable {
    /// Empty table bound to `room`.
    pub fn new(room: &Room) -> Self {
        Self {
            fingerprint: room.fingerprint(),
            fields: HashMap::new(),
        }
    }

    /// Fingerprint of the topology this table belongs to.
    pub const fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Rebind to `room`, clearing the cache if its topology differs.
    ///
    /// Returns true if cached fields were discarded.
    pub fn rebind(&mut self, room: &Room) -> bool {
        let fingerprint = room.fingerprint();
        if fingerprint == self.fingerprint {
            return false;
        }
        self.fingerprint = fingerprint;
        let stale = !self.fields.is_empty();
        self.fields.clear();
        stale
    }

    /// Cached field toward `target`, if already computed.
    pub fn get(&self, target: GridCoord) -> Option<Arc<FloorField>> {
        self.fields.get(&target).cloned()
    }

    /// Field toward `target`, computing it on first use.
    pub fn get_or_compute(&mut self, room: &Room, target: GridCoord) -> Result<Arc<FloorField>> {
        self.rebind(room);
        if let Some(field) = self.fields.get(&target) {
            return Ok(Arc::clone(field));
        }
        let field = Arc::new(FloorField::compute(room, target)?);
        self.fields.insert(target, Arc::clone(&field));
        Ok(field)
    }

    /// Compute the field of every passable cell. Returns the table size.
    pub fn precompute_all(&mut self, room: &Room) -> Result<usize> {
        self.rebind(room);
        for target in room.passable_cells() {
            if !self.fields.contains_key(&target) {
                let field = FloorField::compute(room, target)?;
                self.fields.insert(target, Arc::new(field));
            }
        }
        Ok(self.fields.len())
    }
}
