//! The cell board: who stands where, and who wants to go where this tick.
//!
//! # Residency
//!
//! Every cell holds at most one resident. [`Board::occupy`] is the only way
//! to put an agent on a cell and it refuses an occupied one, so the
//! one-resident invariant cannot be broken silently.
//!
//! # Round state
//!
//! Intent queues and winners live on the cells but only for one round. A
//! cell joins the active list the first time an intent lands on it, and
//! [`Board::end_round`] wipes exactly the active cells.

use evac_topology::{GridCoord, Room};

use crate::{AgentId, Error, Result};

/// One grid position as seen by the contention protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cell {
    /// Agent standing on the cell
    pub resident: Option<AgentId>,
    /// Agents that want to enter the cell this round, in arrival order
    pub intents: Vec<AgentId>,
    /// Winner of this round's contest, once arbitrated
    pub winner: Option<AgentId>,
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        self.resident.is_none()
    }
}

/// Dense board of cells matching a room's dimensions.
#[derive(Debug, Clone)]
pub struct Board {
    width: i32,
    height: i32,
    cells: Vec<Cell>,
    active: Vec<usize>,
}

impl Board {
    /// Empty board. Non-positive dimensions give an empty board.
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            cells: vec![Cell::default(); (width * height) as usize],
            active: Vec::new(),
        }
    }

    /// Empty board sized to a room.
    pub fn for_room(room: &Room) -> Self {
        Self::new(room.width(), room.height())
    }

    pub const fn width(&self) -> i32 {
        self.width
    }

    pub const fn height(&self) -> i32 {
        self.height
    }

    pub const fn in_bounds(&self, c: GridCoord) -> bool {
        c.x >= 0 && c.y >= 0 && c.x < self.width && c.y < self.height
    }

    fn index(&self, c: GridCoord) -> Result<usize> {
        if self.in_bounds(c) {
            Ok((c.y * self.width + c.x) as usize)
        } else {
            Err(Error::OutOfBounds(c))
        }
    }

    fn coord(&self, index: usize) -> GridCoord {
        let i = index as i32;
        GridCoord::new(i % self.width, i / self.width)
    }

    /// Cell at `c`, `None` off the board.
    pub fn cell(&self, c: GridCoord) -> Option<&Cell> {
        self.index(c).ok().map(|i| &self.cells[i])
    }

    /// Resident of `c`. Off-board cells have none.
    pub fn resident(&self, c: GridCoord) -> Option<AgentId> {
        self.cell(c).and_then(|cell| cell.resident)
    }

    pub fn is_occupied(&self, c: GridCoord) -> bool {
        self.resident(c).is_some()
    }

    /// Put `agent` on `c`.
    ///
    /// Fails with [`Error::CellOccupied`] if someone is already there.
    pub fn occupy(&mut self, c: GridCoord, agent: AgentId) -> Result<()> {
        let i = self.index(c)?;
        match self.cells[i].resident {
            Some(resident) => Err(Error::CellOccupied {
                cell: c,
                resident,
                incoming: agent,
            }),
            None => {
                self.cells[i].resident = Some(agent);
                Ok(())
            }
        }
    }

    /// Remove and return the resident of `c`.
    pub fn vacate(&mut self, c: GridCoord) -> Result<AgentId> {
        let i = self.index(c)?;
        self.cells[i].resident.take().ok_or(Error::CellEmpty(c))
    }

    /// Move `agent` from `from` to `to`, checking it really stood on `from`.
    pub fn relocate(&mut self, agent: AgentId, from: GridCoord, to: GridCoord) -> Result<()> {
        if self.resident(from) != Some(agent) {
            return Err(Error::NotResident { agent, from });
        }
        self.vacate(from)?;
        self.occupy(to, agent)
    }

    /// Append an intent to the queue of `c`, activating the cell on first use.
    pub fn push_intent(&mut self, c: GridCoord, agent: AgentId) -> Result<()> {
        let i = self.index(c)?;
        let cell = &mut self.cells[i];
        if cell.intents.is_empty() {
            self.active.push(i);
        }
        cell.intents.push(agent);
        Ok(())
    }

    pub(crate) fn set_winner(&mut self, c: GridCoord, agent: AgentId) -> Result<()> {
        let i = self.index(c)?;
        self.cells[i].winner = Some(agent);
        Ok(())
    }

    /// Cells with at least one intent, in activation order.
    pub fn active_cells(&self) -> impl Iterator<Item = GridCoord> + '_ {
        self.active.iter().map(|&i| self.coord(i))
    }

    /// Drop intents and winners of every active cell.
    pub fn end_round(&mut self) {
        for &i in &self.active {
            let cell = &mut self.cells[i];
            cell.intents.clear();
            cell.winner = None;
        }
        self.active.clear();
    }

    /// Every occupied cell with its resident, in row-major order.
    pub fn residents(&self) -> impl Iterator<Item = (GridCoord, AgentId)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(i, cell)| cell.resident.map(|a| (self.coord(i), a)))
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| c.resident.is_some()).count()
    }
}
