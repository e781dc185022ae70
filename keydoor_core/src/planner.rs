use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    Position,
    action::{Action, DoorRule},
    environment::{Cell, GridMap, Landmarks, MapError},
    plan::{Plan, ReplayError, replay},
    search::{SearchError, SearchLimits, SearchStats, bfs_plan},
    state::State,
};

/// Settings shared by every search the planner runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub door_rule: DoorRule,
    pub limits: SearchLimits,
}

/// The three subgoals of the puzzle, in the order they are solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    ReachKey,
    ReachDoor,
    ReachGoal,
}

impl StageKind {
    pub const ALL: [StageKind; 3] = [StageKind::ReachKey, StageKind::ReachDoor, StageKind::ReachGoal];

    /// The action applied once the stage's target cell is reached.
    pub fn finishing_action(self) -> Option<Action> {
        match self {
            StageKind::ReachKey => Some(Action::PickUpKey),
            StageKind::ReachDoor => Some(Action::UnlockDoor),
            StageKind::ReachGoal => None,
        }
    }

    fn target(self, landmarks: &Landmarks) -> Position {
        match self {
            StageKind::ReachKey => landmarks.key,
            StageKind::ReachDoor => landmarks.door,
            StageKind::ReachGoal => landmarks.goal,
        }
    }

    fn unreachable(self, target: Position, source: SearchError) -> PlanError {
        match self {
            StageKind::ReachKey => PlanError::NoPathToKey { target, source },
            StageKind::ReachDoor => PlanError::NoPathToDoor { target, source },
            StageKind::ReachGoal => PlanError::NoPathToGoal { target, source },
        }
    }
}

/// One solved subgoal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stage {
    pub kind: StageKind,
    /// The search result for this stage, without the finishing action.
    pub plan: Plan,
    /// State on arrival at the target cell, before the finishing action.
    pub reached: State,
    pub stats: SearchStats,
}

/// A complete, validated solution to the puzzle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubgoalPlan {
    pub plan: Plan,
    pub stages: Vec<Stage>,
    pub final_state: State,
    pub stats: SearchStats,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error(transparent)]
    Map(#[from] MapError),
    #[error("Initial state is not one the agent can stand in: {0}")]
    InvalidInitialState(State),
    #[error("Could not find a path to the key at {target}: {source}")]
    NoPathToKey { target: Position, source: SearchError },
    #[error("Could not find a path to the door at {target}: {source}")]
    NoPathToDoor { target: Position, source: SearchError },
    #[error("Could not find a path to the goal at {target}: {source}")]
    NoPathToGoal { target: Position, source: SearchError },
    #[error("{action} was rejected after {stage:?} in state: {state}")]
    StageActionRejected {
        stage: StageKind,
        action: Action,
        state: State,
    },
    #[error("Plan for {stage:?} does not replay: {source}")]
    StageReplay {
        stage: StageKind,
        source: ReplayError,
    },
    #[error("Composed plan does not replay: {0}")]
    InvalidPlan(#[source] ReplayError),
    #[error("Composed plan ends without solving the puzzle, in state: {0}")]
    Unsolved(State),
}

/// Solves the key → door → goal puzzle as three chained breadth-first searches.
///
/// Each search only knows "stand on cell X"; picking up the key and unlocking
/// the door happen between searches. The concatenated plan is replayed from
/// the initial state before it is returned.
#[derive(Debug, Clone)]
pub struct SubgoalPlanner<'a> {
    map: &'a GridMap,
    landmarks: Landmarks,
    config: PlannerConfig,
}

impl<'a> SubgoalPlanner<'a> {
    /// Locates the Start, Key, Door and Goal cells; fails if any is missing or repeated.
    pub fn new(map: &'a GridMap, config: PlannerConfig) -> Result<Self, PlanError> {
        let landmarks = Landmarks::locate(map)?;
        debug!("landmarks: {landmarks:?}");
        Ok(SubgoalPlanner {
            map,
            landmarks,
            config,
        })
    }

    pub fn landmarks(&self) -> &Landmarks {
        &self.landmarks
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// The agent on the Start cell with neither flag set.
    pub fn initial_state(&self) -> State {
        State::new(self.landmarks.start)
    }

    /// At the goal, holding the key, with the door unlocked.
    pub fn is_solved(&self, state: &State) -> bool {
        state.position == self.landmarks.goal && state.holds_key && state.door_unlocked
    }

    /// Plans from [`SubgoalPlanner::initial_state`].
    pub fn plan(&self) -> Result<SubgoalPlan, PlanError> {
        self.plan_from(self.initial_state())
    }

    /// Whether the agent may stand in `state`: on the grid, off walls, and
    /// only inside a locked door where the door rule lets it enter.
    pub fn is_valid_state(&self, state: &State) -> bool {
        if !self.map.contains(state.position) {
            return false;
        }
        match self.map.cell_at(state.position) {
            Cell::Wall => false,
            Cell::Door if !state.door_unlocked => {
                state.holds_key && matches!(self.config.door_rule, DoorRule::KeyholeEntry)
            }
            _ => true,
        }
    }

    /// Plans from an arbitrary initial state.
    ///
    /// Fails with [`PlanError::InvalidInitialState`] unless
    /// [`SubgoalPlanner::is_valid_state`] accepts `initial`.
    #[instrument(skip_all, name = "subgoal_plan", fields(start = %initial.position), level = "debug")]
    pub fn plan_from(&self, initial: State) -> Result<SubgoalPlan, PlanError> {
        if !self.is_valid_state(&initial) {
            return Err(PlanError::InvalidInitialState(initial));
        }
        let PlannerConfig { door_rule, limits } = self.config;
        let mut plan = Plan::new();
        let mut stages = Vec::with_capacity(StageKind::ALL.len());
        let mut stats = SearchStats::default();
        let mut state = initial;

        for kind in StageKind::ALL {
            let target = kind.target(&self.landmarks);
            let outcome = bfs_plan(state, self.map, door_rule, limits, |s| s.position == target)
                .map_err(|source| kind.unreachable(target, source))?;
            stats.absorb(outcome.stats);

            let reached = replay(state, &outcome.plan, self.map, door_rule)
                .map_err(|source| PlanError::StageReplay {
                    stage: kind,
                    source,
                })?;
            debug!(
                "{kind:?}: {} actions to {target}, {} states expanded",
                outcome.plan.len(),
                outcome.stats.expanded
            );
            plan.append(&outcome.plan);

            state = match kind.finishing_action() {
                Some(action) => {
                    let next = action.apply(&reached, self.map, door_rule).ok_or(
                        PlanError::StageActionRejected {
                            stage: kind,
                            action,
                            state: reached,
                        },
                    )?;
                    plan.push(action);
                    next
                }
                None => reached,
            };

            stages.push(Stage {
                kind,
                plan: outcome.plan,
                reached,
                stats: outcome.stats,
            });
        }

        let final_state =
            replay(initial, &plan, self.map, door_rule).map_err(PlanError::InvalidPlan)?;
        if !self.is_solved(&final_state) {
            return Err(PlanError::Unsolved(final_state));
        }
        debug!("full plan has {} actions", plan.len());

        Ok(SubgoalPlan {
            plan,
            stages,
            final_state,
            stats,
        })
    }
}
