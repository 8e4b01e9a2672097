//! Room topology: passable floor, obstacles and the exit gate.
//!
//! A room is a dense `width × height` grid of tiles. Rooms are immutable
//! during a run; anything derived from them (floor fields) is keyed by the
//! room's [`Fingerprint`] so a changed topology forces recomputation.

use crate::{Error, GridCoord, Result};

/// What occupies a grid position permanently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Tile {
    #[default]
    Floor,
    Obstacle,
}

impl Tile {
    const fn byte(self) -> u8 {
        match self {
            Tile::Floor => 0,
            Tile::Obstacle => 1,
        }
    }
}

/// Digest of a room's topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fingerprint(pub [u8; 32]);

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(&self.0[..8]))
    }
}

/// Inclusive axis-aligned rectangle of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Region {
    pub min: GridCoord,
    pub max: GridCoord,
}

impl Region {
    /// Region spanning two corners given in any order.
    pub fn new(a: GridCoord, b: GridCoord) -> Self {
        Self {
            min: GridCoord::new(a.x.min(b.x), a.y.min(b.y)),
            max: GridCoord::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// Single-cell region.
    pub const fn cell(c: GridCoord) -> Self {
        Self { min: c, max: c }
    }

    /// Center cell (rounded toward `min`). Region targets reduce to this.
    pub const fn center(&self) -> GridCoord {
        GridCoord::new(
            self.min.x + (self.max.x - self.min.x) / 2,
            self.min.y + (self.max.y - self.min.y) / 2,
        )
    }

    pub const fn contains(&self, c: GridCoord) -> bool {
        c.x >= self.min.x && c.x <= self.max.x && c.y >= self.min.y && c.y <= self.max.y
    }

    /// Number of cells covered.
    pub const fn area(&self) -> usize {
        ((self.max.x - self.min.x + 1) * (self.max.y - self.min.y + 1)) as usize
    }

    /// Iterate the cells row by row.
    pub fn cells(&self) -> impl Iterator<Item = GridCoord> + '_ {
        (self.min.y..=self.max.y)
            .flat_map(move |y| (self.min.x..=self.max.x).map(move |x| GridCoord::new(x, y)))
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} .. {}]", self.min, self.max)
    }
}

/// A single-floor room.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Room {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
    exit: Option<GridCoord>,
}

impl Room {
    /// Open room with no obstacles and no exit.
    pub fn new(width: i32, height: i32) -> Result<Self> {
        if width <= 0 || height <= 0 {
            return Err(Error::InvalidDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            tiles: vec![Tile::Floor; (width * height) as usize],
            exit: None,
        })
    }

    /// Room enclosed by a one-cell wall with the exit punched into it.
    pub fn walled(width: i32, height: i32, exit: GridCoord) -> Result<Self> {
        if width < 3 || height < 3 {
            return Err(Error::InvalidDimensions { width, height });
        }
        let mut room = Self::new(width, height)?;
        for x in 0..width {
            room.set_tile(GridCoord::new(x, 0), Tile::Obstacle);
            room.set_tile(GridCoord::new(x, height - 1), Tile::Obstacle);
        }
        for y in 0..height {
            room.set_tile(GridCoord::new(0, y), Tile::Obstacle);
            room.set_tile(GridCoord::new(width - 1, y), Tile::Obstacle);
        }
        room.set_exit(exit)?;
        Ok(room)
    }

    /// Parse an ASCII room: `#` obstacle, `.` or space floor, `G` exit.
    ///
    /// The first line is the northern (highest `y`) row. All rows must have
    /// the same width; blank trailing lines are ignored.
    pub fn parse(text: &str) -> Result<Self> {
        let mut rows: Vec<&str> = text.lines().map(|l| l.trim_end_matches('\r')).collect();
        while rows.last().is_some_and(|l| l.trim().is_empty()) {
            rows.pop();
        }

        let height = rows.len() as i32;
        let width = rows.first().map(|r| r.chars().count()).unwrap_or(0) as i32;
        let mut room = Self::new(width, height)?;

        for (line, row) in rows.iter().enumerate() {
            if row.chars().count() as i32 != width {
                return Err(Error::Parse {
                    line: line + 1,
                    reason: format!("expected {} columns", width),
                });
            }
            let y = height - 1 - line as i32;
            for (x, ch) in row.chars().enumerate() {
                let coord = GridCoord::new(x as i32, y);
                match ch {
                    '#' => room.set_tile(coord, Tile::Obstacle),
                    '.' | ' ' => {}
                    'G' => room.set_exit(coord)?,
                    other => {
                        return Err(Error::Parse {
                            line: line + 1,
                            reason: format!("unknown symbol {:?}", other),
                        })
                    }
                }
            }
        }
        Ok(room)
    }

    pub const fn width(&self) -> i32 {
        self.width
    }

    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Total number of grid positions.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// The exit gate, if placed.
    pub const fn exit(&self) -> Option<GridCoord> {
        self.exit
    }

    /// Exit gate or [`Error::MissingExit`].
    pub fn require_exit(&self) -> Result<GridCoord> {
        self.exit.ok_or(Error::MissingExit)
    }

    pub const fn in_bounds(&self, c: GridCoord) -> bool {
        c.x >= 0 && c.y >= 0 && c.x < self.width && c.y < self.height
    }

    /// Dense index of an in-bounds coordinate.
    pub fn index(&self, c: GridCoord) -> Option<usize> {
        self.in_bounds(c).then(|| (c.y * self.width + c.x) as usize)
    }

    /// Coordinate of a dense index.
    pub fn coord(&self, index: usize) -> GridCoord {
        let i = index as i32;
        GridCoord::new(i % self.width, i / self.width)
    }

    /// Tile at `c`; outside the room everything is an obstacle.
    pub fn tile(&self, c: GridCoord) -> Tile {
        self.index(c)
            .and_then(|i| self.tiles.get(i).copied())
            .unwrap_or(Tile::Obstacle)
    }

    pub fn is_passable(&self, c: GridCoord) -> bool {
        self.tile(c) == Tile::Floor
    }

    /// Overwrite a tile. Out-of-bounds writes are ignored.
    pub fn set_tile(&mut self, c: GridCoord, tile: Tile) {
        if let Some(slot) = self.index(c).and_then(|i| self.tiles.get_mut(i)) {
            *slot = tile;
        }
    }

    /// Place the exit gate; the gate cell is always floor.
    pub fn set_exit(&mut self, c: GridCoord) -> Result<()> {
        if !self.in_bounds(c) {
            return Err(Error::TargetOutOfBounds(c));
        }
        self.set_tile(c, Tile::Floor);
        self.exit = Some(c);
        Ok(())
    }

    /// Iterate over every passable coordinate.
    pub fn passable_cells(&self) -> impl Iterator<Item = GridCoord> + '_ {
        self.tiles
            .iter()
            .enumerate()
            .filter(|(_, t)| **t == Tile::Floor)
            .map(|(i, _)| self.coord(i))
    }

    /// True if the unit step `from → to` slips through a blocked corner.
    ///
    /// A diagonal step is only allowed when both orthogonal cells it passes
    /// between are passable. Axis steps never cut corners.
    pub fn cuts_corner(&self, from: GridCoord, to: GridCoord) -> bool {
        let step = to - from;
        if !step.is_diagonal_step() {
            return false;
        }
        let side_a = GridCoord::new(from.x + step.x, from.y);
        let side_b = GridCoord::new(from.x, from.y + step.y);
        !self.is_passable(side_a) || !self.is_passable(side_b)
    }

    /// Digest of dimensions, tiles and exit.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.width.to_le_bytes());
        hasher.update(&self.height.to_le_bytes());
        let tiles: Vec<u8> = self.tiles.iter().map(|t| t.byte()).collect();
        hasher.update(&tiles);
        match self.exit {
            Some(e) => {
                hasher.update(&[1]);
                hasher.update(&e.x.to_le_bytes());
                hasher.update(&e.y.to_le_bytes());
            }
            None => {
                hasher.update(&[0]);
            }
        }
        Fingerprint(*hasher.finalize().as_bytes())
    }
}
