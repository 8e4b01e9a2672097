//! Scenarios: a room, its goal areas and where agents start.
//!
//! The text format is a room drawing followed by optional area lines:
//!
//! ```text
//! ##########
//! #a.a....L#
//! #..##....G
//! #V...a...#
//! ##########
//! area 5 1 7 3
//! ```
//!
//! Besides the room symbols, `a` places a solitary agent, `L` the physical
//! leader and `V` the virtual leader. Each `area x0 y0 x1 y1` line adds a
//! gathering area, visited in order before the exit.

use std::sync::Arc;

use evac_topology::{FloorField, GridCoord, Orientation, Region, Room, Tile};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::agent::AgentKind;
use crate::config::SimulationConfig;
use crate::simulation::{Simulation, TopologyProvider};
use crate::{Error, Result};

/// A room with its starting crowd.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    room: Room,
    areas: Vec<Region>,
    agents: Vec<(AgentKind, GridCoord)>,
}

fn parse_error(line: usize, reason: impl Into<String>) -> Error {
    Error::Topology(evac_topology::Error::Parse {
        line,
        reason: reason.into(),
    })
}

fn parse_area(line: usize, text: &str) -> Result<Region> {
    let numbers = text
        .split_whitespace()
        .skip(1)
        .map(|n| n.parse::<i32>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| parse_error(line, format!("bad area bound: {e}")))?;
    match numbers.as_slice() {
        &[x0, y0, x1, y1] => Ok(Region::new(
            GridCoord::new(x0, y0),
            GridCoord::new(x1, y1),
        )),
        _ => Err(parse_error(line, "area needs four bounds: x0 y0 x1 y1")),
    }
}

impl Scenario {
    pub fn new(room: Room) -> Self {
        Self {
            room,
            areas: Vec::new(),
            agents: Vec::new(),
        }
    }

    /// Parse a scenario drawing.
    pub fn parse(text: &str) -> Result<Self> {
        let lines: Vec<&str> = text.lines().collect();
        let grid_end = lines
            .iter()
            .position(|l| l.trim_start().starts_with("area"))
            .unwrap_or(lines.len());
        let height = grid_end as i32;

        let mut drawing = String::new();
        let mut agents = Vec::new();
        for (row, line) in lines[..grid_end].iter().enumerate() {
            let y = height - 1 - row as i32;
            for (x, ch) in line.chars().enumerate() {
                let kind = match ch {
                    'a' => Some(AgentKind::Solitary),
                    'L' => Some(AgentKind::Leader),
                    'V' => Some(AgentKind::VirtualLeader),
                    _ => None,
                };
                match kind {
                    Some(kind) => {
                        agents.push((kind, GridCoord::new(x as i32, y)));
                        drawing.push('.');
                    }
                    None => drawing.push(ch),
                }
            }
            drawing.push('\n');
        }
        let room = Room::parse(&drawing)?;

        let mut areas = Vec::new();
        for (i, line) in lines.iter().enumerate().skip(grid_end) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if !line.starts_with("area") {
                return Err(parse_error(i + 1, "expected an area line"));
            }
            areas.push(parse_area(i + 1, line)?);
        }

        Ok(Self {
            room,
            areas,
            agents,
        })
    }

    /// Walled hall with a few pillars, the exit in the east wall and
    /// `agent_count` agents scattered over its western half. The first agent
    /// is the physical leader.
    pub fn demo(agent_count: usize, seed: u64) -> Result<Self> {
        let (width, height) = (30, 20);
        let exit = GridCoord::new(width - 1, height / 2);
        let mut room = Room::walled(width, height, exit)?;
        for (x, y) in [(8, 4), (8, 14), (16, 9)] {
            for c in Region::new(GridCoord::new(x, y), GridCoord::new(x + 1, y + 1)).cells() {
                room.set_tile(c, Tile::Obstacle);
            }
        }

        let mut cells: Vec<GridCoord> = room
            .passable_cells()
            .filter(|c| c.x <= width / 2 - 3)
            .collect();
        if agent_count > cells.len() {
            return Err(Error::InvalidConfig(format!(
                "demo hall fits at most {} agents",
                cells.len()
            )));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        cells.shuffle(&mut rng);

        let mut scenario = Self::new(room);
        for (i, cell) in cells.into_iter().take(agent_count).enumerate() {
            let kind = if i == 0 {
                AgentKind::Leader
            } else {
                AgentKind::Solitary
            };
            scenario.add_agent(kind, cell);
        }
        Ok(scenario)
    }

    pub fn add_agent(&mut self, kind: AgentKind, at: GridCoord) {
        self.agents.push((kind, at));
    }

    pub fn add_area(&mut self, area: Region) {
        self.areas.push(area);
    }

    pub fn agents(&self) -> &[(AgentKind, GridCoord)] {
        &self.agents
    }

    /// Create the simulation and place every agent facing downhill.
    pub fn build(&self, config: SimulationConfig) -> Result<Simulation> {
        let mut sim = Simulation::from_topology(self, config)?;
        let field = Arc::clone(&sim.goal_field);
        for &(kind, at) in &self.agents {
            sim.spawn(kind, at, facing(&field, at))?;
        }
        debug!(agents = self.agents.len(), areas = self.areas.len(), "scenario built");
        Ok(sim)
    }
}

impl TopologyProvider for Scenario {
    fn room(&self) -> &Room {
        &self.room
    }

    fn goal_areas(&self) -> Vec<Region> {
        self.areas.clone()
    }
}

/// Axis direction with the lowest field value ahead.
fn facing(field: &FloorField, at: GridCoord) -> Orientation {
    Orientation::ALL
        .into_iter()
        .min_by(|a, b| {
            field
                .get(at + a.vector())
                .total_cmp(&field.get(at + b.vector()))
        })
        .unwrap_or(Orientation::North)
}
