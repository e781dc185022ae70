use serde::{Deserialize, Serialize};
use std::{fmt, slice};

use crate::{
    action::{Action, DoorRule},
    environment::GridMap,
    state::State,
};

/// An ordered sequence of actions.
///
/// A plan carries no validity guarantee of its own; it only means something
/// when replayed from the state it was computed for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan(Vec<Action>);

impl Plan {
    pub fn new() -> Self {
        Plan(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn actions(&self) -> &[Action] {
        &self.0
    }

    pub fn iter(&self) -> slice::Iter<'_, Action> {
        self.0.iter()
    }

    pub fn push(&mut self, action: Action) {
        self.0.push(action);
    }

    /// Appends every action of `other`.
    pub fn append(&mut self, other: &Plan) {
        self.0.extend_from_slice(&other.0);
    }
}

impl From<Vec<Action>> for Plan {
    fn from(actions: Vec<Action>) -> Self {
        Plan(actions)
    }
}

impl FromIterator<Action> for Plan {
    fn from_iter<I: IntoIterator<Item = Action>>(iter: I) -> Self {
        Plan(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a Action;
    type IntoIter = slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (index, action) in self.0.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{action}")?;
        }
        write!(f, "]")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    /// `index` is zero-based; `state` is the state the action was rejected in.
    #[error("Action at index {index} ({action}) was rejected in state: {state}")]
    InvalidStep {
        index: usize,
        action: Action,
        state: State,
    },
}

/// Replays `plan` from `start` and returns the final state.
///
/// Stops at the first action the action model rejects.
pub fn replay(
    start: State,
    plan: &Plan,
    map: &GridMap,
    rule: DoorRule,
) -> Result<State, ReplayError> {
    plan.iter()
        .enumerate()
        .try_fold(start, |state, (index, &action)| step(state, index, action, map, rule))
}

/// Replays `plan` from `start` and returns every visited state, `start` first.
pub fn trace(
    start: State,
    plan: &Plan,
    map: &GridMap,
    rule: DoorRule,
) -> Result<Vec<State>, ReplayError> {
    let mut states = Vec::with_capacity(plan.len() + 1);
    states.push(start);
    for next in replay_steps(start, plan, map, rule) {
        states.push(next?);
    }
    Ok(states)
}

/// Replays `plan` lazily, yielding the state after each action.
///
/// The first rejected action yields its error and ends the iteration.
pub fn replay_steps<'a>(
    start: State,
    plan: &'a Plan,
    map: &'a GridMap,
    rule: DoorRule,
) -> impl Iterator<Item = Result<State, ReplayError>> + 'a {
    let mut current = Some(start);
    plan.iter().enumerate().map_while(move |(index, &action)| {
        let state = current?;
        let result = step(state, index, action, map, rule);
        current = result.as_ref().ok().copied();
        Some(result)
    })
}

fn step(
    state: State,
    index: usize,
    action: Action,
    map: &GridMap,
    rule: DoorRule,
) -> Result<State, ReplayError> {
    action
        .apply(&state, map, rule)
        .ok_or(ReplayError::InvalidStep {
            index,
            action,
            state,
        })
}
