use std::fmt;

use serde::{Deserialize, Serialize};

pub mod action;
pub mod environment;
pub mod map;
pub mod plan;
pub mod planner;
pub mod search;
pub mod state;

pub use action::{Action, DoorRule};
pub use environment::{Cell, GridMap, Landmarks, MapError};
pub use map::{Direction, Grid, GridError};
pub use plan::{Plan, ReplayError, replay, replay_steps, trace};
pub use planner::{PlanError, PlannerConfig, Stage, StageKind, SubgoalPlan, SubgoalPlanner};
pub use search::{SearchError, SearchLimits, SearchOutcome, SearchStats, bfs_plan};
pub use state::State;

/// Represents a 2D grid coordinate: `row` from the top, `col` from the left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(row: usize, col: usize) -> Self {
        Position { row, col }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}
