use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::{
    environment::{Cell, GridMap},
    map::Direction,
    state::State,
};

/// How a locked door cell may be approached by a directional move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DoorRule {
    /// A locked door cell can never be entered. `UNLOCK_DOOR` still needs the
    /// agent to stand on the door, so the door can never be unlocked.
    Strict,
    /// A locked door cell may be entered while holding the key, and may not be
    /// left again until it is unlocked.
    #[default]
    KeyholeEntry,
}

/// Represents the primitive actions the agent can take.
///
/// Serialized and displayed with the action vocabulary names (`MOVE_UP`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    PickUpKey,
    UnlockDoor,
}

/// Error returned when parsing an unknown action name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown action name '{0}'")]
pub struct ParseActionError(pub String);

impl Action {
    /// Every action, in expansion order. Search results depend on this order.
    pub const ALL: [Action; 6] = [
        Action::MoveUp,
        Action::MoveDown,
        Action::MoveLeft,
        Action::MoveRight,
        Action::PickUpKey,
        Action::UnlockDoor,
    ];

    /// The stable vocabulary name of this action.
    pub fn name(self) -> &'static str {
        match self {
            Action::MoveUp => "MOVE_UP",
            Action::MoveDown => "MOVE_DOWN",
            Action::MoveLeft => "MOVE_LEFT",
            Action::MoveRight => "MOVE_RIGHT",
            Action::PickUpKey => "PICK_UP_KEY",
            Action::UnlockDoor => "UNLOCK_DOOR",
        }
    }

    /// The direction of a move action; `None` for the two special actions.
    pub fn direction(self) -> Option<Direction> {
        match self {
            Action::MoveUp => Some(Direction::Up),
            Action::MoveDown => Some(Direction::Down),
            Action::MoveLeft => Some(Direction::Left),
            Action::MoveRight => Some(Direction::Right),
            Action::PickUpKey | Action::UnlockDoor => None,
        }
    }

    /// Applies this action to `state`.
    ///
    /// Returns the successor state, or `None` when a precondition fails:
    /// the move leaves the grid, hits a wall or a door the rule forbids, the
    /// key is not underfoot (or already held), or the agent is not on the door
    /// with the key.
    pub fn apply(self, state: &State, map: &GridMap, rule: DoorRule) -> Option<State> {
        match self {
            Action::PickUpKey => (map.cell_at(state.position) == Cell::Key && !state.holds_key)
                .then(|| state.with_key()),
            Action::UnlockDoor => (state.holds_key && map.cell_at(state.position) == Cell::Door)
                .then(|| state.with_door_unlocked()),
            _ => self
                .direction()
                .and_then(|direction| apply_move(state, map, rule, direction)),
        }
    }
}

fn apply_move(state: &State, map: &GridMap, rule: DoorRule, direction: Direction) -> Option<State> {
    let door_locked = !state.door_unlocked;

    // A locked door that was entered through the keyhole has to be unlocked before leaving it.
    if rule == DoorRule::KeyholeEntry && door_locked && map.cell_at(state.position) == Cell::Door {
        return None;
    }

    let target = map.neighbor(state.position, direction)?;
    match map.cell_at(target) {
        Cell::Wall => None,
        Cell::Door if door_locked => match rule {
            DoorRule::Strict => None,
            DoorRule::KeyholeEntry => state.holds_key.then(|| state.moved_to(target)),
        },
        _ => Some(state.moved_to(target)),
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Action {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.name() == s)
            .ok_or_else(|| ParseActionError(s.to_string()))
    }
}
