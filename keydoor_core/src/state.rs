use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Position;

/// A node of the search graph: where the agent stands plus the two puzzle flags.
///
/// States are plain values. Actions build new states instead of mutating old
/// ones, and equality and hashing cover all three fields, so a `State` is its
/// own identity in visited sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct State {
    pub position: Position,
    pub holds_key: bool,
    pub door_unlocked: bool,
}

impl State {
    /// A state at `position` with neither flag set.
    pub const fn new(position: Position) -> Self {
        State {
            position,
            holds_key: false,
            door_unlocked: false,
        }
    }

    pub(crate) fn moved_to(self, position: Position) -> Self {
        State { position, ..self }
    }

    pub(crate) fn with_key(self) -> Self {
        State {
            holds_key: true,
            ..self
        }
    }

    pub(crate) fn with_door_unlocked(self) -> Self {
        State {
            door_unlocked: true,
            ..self
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "position {}, holds key: {}, door unlocked: {}",
            self.position, self.holds_key, self.door_unlocked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equality_covers_every_field() {
        let base = State::new(Position::new(1, 2));
        let mut seen = HashSet::new();
        assert!(seen.insert(base));
        assert!(!seen.insert(State::new(Position::new(1, 2))));
        assert!(seen.insert(base.with_key()));
        assert!(seen.insert(base.with_key().with_door_unlocked()));
        assert!(seen.insert(base.moved_to(Position::new(2, 2))));
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_transitions_leave_source_untouched() {
        let base = State::new(Position::new(0, 0));
        let moved = base.with_key().moved_to(Position::new(0, 1));
        assert_eq!(base, State::new(Position::new(0, 0)));
        assert!(moved.holds_key);
        assert!(!moved.door_unlocked);
        assert_eq!(moved.position, Position::new(0, 1));
    }
}
