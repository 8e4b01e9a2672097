//! Goals and checkpoints.
//!
//! The simulation walks a queue of goals. Each tick it asks the current goal
//! whether its checkpoint is reached; if so the queue advances and the next
//! goal's target region becomes the navigation target. The last goal is
//! always the exit.

use std::collections::VecDeque;
use std::fmt;

use evac_topology::{GridCoord, Region};

/// What a goal may look at when judging its checkpoint.
#[derive(Debug, Clone, Copy)]
pub struct GoalView<'a> {
    /// Cells of every agent still on the grid
    pub positions: &'a [GridCoord],
    pub evacuated: usize,
}

/// A navigation goal.
pub trait Goal: fmt::Debug {
    /// Region agents head for.
    fn target(&self) -> Region;

    fn reached_checkpoint(&self, view: &GoalView<'_>) -> bool;

    fn name(&self) -> String;

    /// Cell the floor field is computed toward.
    fn focus(&self) -> GridCoord {
        self.target().center()
    }

    /// Number of distinct focus cells [`next_focus`](Self::next_focus) cycles through.
    fn focus_points(&self) -> usize {
        1
    }

    /// Move the focus on. Returns false if the focus is fixed.
    fn next_focus(&mut self) -> bool {
        false
    }

    /// Scale applied to the field outside the target region, which is
    /// flattened to zero.
    fn booster(&self) -> Option<f64> {
        None
    }
}

/// Gather in an area: done once everybody is inside or the area is full.
///
/// By default the field leads to the area's center. A booster makes every
/// cell outside the area steeper and levels the inside; focus rotation
/// walks the focus over the center and the four corners whenever the
/// current focus cell gets occupied, spreading the crowd through the area.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaGoal {
    area: Region,
    booster: Option<f64>,
    rotating: bool,
    corner: usize,
}

impl AreaGoal {
    /// Center, then the corners counter-clockwise from the lower left.
    pub const FOCUS_POINTS: usize = 5;

    pub fn new(area: Region) -> Self {
        Self {
            area,
            booster: None,
            rotating: false,
            corner: 0,
        }
    }

    #[must_use]
    pub fn with_booster(mut self, factor: f64) -> Self {
        self.booster = Some(factor);
        self
    }

    #[must_use]
    pub fn with_focus_rotation(mut self) -> Self {
        self.rotating = true;
        self
    }

    fn corners(&self) -> [GridCoord; Self::FOCUS_POINTS] {
        let Region { min, max } = self.area;
        [
            self.area.center(),
            min,
            GridCoord::new(max.x, min.y),
            max,
            GridCoord::new(min.x, max.y),
        ]
    }
}

impl Goal for AreaGoal {
    fn target(&self) -> Region {
        self.area
    }

    fn focus(&self) -> GridCoord {
        self.corners()[self.corner]
    }

    fn focus_points(&self) -> usize {
        if self.rotating {
            Self::FOCUS_POINTS
        } else {
            1
        }
    }

    fn next_focus(&mut self) -> bool {
        if !self.rotating {
            return false;
        }
        self.corner = (self.corner + 1) % Self::FOCUS_POINTS;
        true
    }

    fn booster(&self) -> Option<f64> {
        self.booster
    }

    fn reached_checkpoint(&self, view: &GoalView<'_>) -> bool {
        let inside = view
            .positions
            .iter()
            .filter(|&&p| self.area.contains(p))
            .count();
        inside == view.positions.len() || inside >= self.area.area()
    }

    fn name(&self) -> String {
        format!("area {}", self.area)
    }
}

/// Leave through the exit: done once nobody is left on the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitGoal {
    exit: GridCoord,
}

impl ExitGoal {
    pub fn new(exit: GridCoord) -> Self {
        Self { exit }
    }
}

impl Goal for ExitGoal {
    fn target(&self) -> Region {
        Region::cell(self.exit)
    }

    fn reached_checkpoint(&self, view: &GoalView<'_>) -> bool {
        view.positions.is_empty()
    }

    fn name(&self) -> String {
        format!("exit {}", self.exit)
    }
}

/// Ordered goals; the front one is active.
#[derive(Debug, Default)]
pub struct GoalQueue {
    goals: VecDeque<Box<dyn Goal>>,
}

impl GoalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Area goals in order, then the exit.
    pub fn evacuation(areas: impl IntoIterator<Item = Region>, exit: GridCoord) -> Self {
        Self::evacuation_with(areas.into_iter().map(AreaGoal::new), exit)
    }

    /// Prepared area goals in order, then the exit.
    pub fn evacuation_with(areas: impl IntoIterator<Item = AreaGoal>, exit: GridCoord) -> Self {
        let mut queue = Self::new();
        for area in areas {
            queue.push(area);
        }
        queue.push(ExitGoal::new(exit));
        queue
    }

    pub fn push(&mut self, goal: impl Goal + 'static) {
        self.goals.push_back(Box::new(goal));
    }

    pub fn current(&self) -> Option<&dyn Goal> {
        self.goals.front().map(|g| g.as_ref())
    }

    pub(crate) fn current_mut(&mut self) -> Option<&mut (dyn Goal + 'static)> {
        self.goals.front_mut().map(|g| g.as_mut())
    }

    /// Drop the active goal and return the next one, if any.
    pub fn advance(&mut self) -> Option<&dyn Goal> {
        self.goals.pop_front();
        self.current()
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }
}
