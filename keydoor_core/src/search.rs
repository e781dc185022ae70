use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, instrument, trace};

use crate::{
    action::{Action, DoorRule},
    environment::GridMap,
    plan::Plan,
    state::State,
};

/// Optional step budget for a single search.
///
/// The reachable state space is at most `cells * 4`, so an unlimited search
/// always terminates; the budget only matters for very large maps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchLimits {
    pub max_expansions: Option<usize>,
}

/// Counters collected during a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    /// States dequeued and expanded.
    pub expanded: usize,
    /// States pushed onto the frontier, the start state included.
    pub enqueued: usize,
}

impl SearchStats {
    pub(crate) fn absorb(&mut self, other: SearchStats) {
        self.expanded += other.expanded;
        self.enqueued += other.enqueued;
    }
}

/// A successful search: the shortest plan and the state it ends in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    pub plan: Plan,
    pub final_state: State,
    pub stats: SearchStats,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    #[error("No state satisfying the goal is reachable ({expanded} states explored)")]
    Unreachable { expanded: usize },
    #[error("Search budget of {limit} expansions exhausted before reaching the goal")]
    BudgetExhausted { limit: usize },
}

/// Breadth-first search for the shortest action sequence from `start` to any
/// state satisfying `goal`.
///
/// Successors are generated in [`Action::ALL`] order and states are marked
/// visited when enqueued, so for fixed inputs the returned plan is always the
/// same one among the shortest plans. The goal is tested when a state is
/// dequeued; a start state that already satisfies it yields an empty plan.
#[instrument(skip_all, name = "bfs_plan", fields(start = %start.position), level = "debug")]
pub fn bfs_plan<G>(
    start: State,
    map: &GridMap,
    rule: DoorRule,
    limits: SearchLimits,
    goal: G,
) -> Result<SearchOutcome, SearchError>
where
    G: Fn(&State) -> bool,
{
    let mut frontier = VecDeque::from([start]);
    let mut visited = HashSet::from([start]);
    let mut came_from: HashMap<State, (State, Action)> = HashMap::new();
    let mut stats = SearchStats {
        expanded: 0,
        enqueued: 1,
    };

    while let Some(current) = frontier.pop_front() {
        if goal(&current) {
            let plan = construct_plan(&came_from, current);
            debug!(
                "goal reached at {} after {} actions, {} states expanded",
                current.position,
                plan.len(),
                stats.expanded
            );
            return Ok(SearchOutcome {
                plan,
                final_state: current,
                stats,
            });
        }

        if let Some(limit) = limits.max_expansions {
            if stats.expanded >= limit {
                debug!("expansion budget of {limit} exhausted");
                return Err(SearchError::BudgetExhausted { limit });
            }
        }
        stats.expanded += 1;
        trace!("expand {current:?}");

        for action in Action::ALL {
            let Some(next) = action.apply(&current, map, rule) else {
                continue;
            };
            if visited.insert(next) {
                came_from.insert(next, (current, action));
                frontier.push_back(next);
                stats.enqueued += 1;
            }
        }
    }

    debug!("frontier exhausted after {} expansions", stats.expanded);
    Err(SearchError::Unreachable {
        expanded: stats.expanded,
    })
}

fn construct_plan(came_from: &HashMap<State, (State, Action)>, mut current: State) -> Plan {
    let mut actions = Vec::new();
    while let Some(&(previous, action)) = came_from.get(&current) {
        actions.push(action);
        current = previous;
    }
    actions.reverse();
    Plan::from(actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Position, environment::Cell, plan::replay};
    use rand::{Rng, SeedableRng, rngs::StdRng};

    const PUZZLE: &str = "S....\n.##..\n..K#.\n....D\n....G";

    fn puzzle() -> GridMap {
        PUZZLE.parse().unwrap()
    }

    fn plan_of(names: &[&str]) -> Plan {
        names.iter().map(|name| name.parse::<Action>().unwrap()).collect()
    }

    #[test]
    fn test_shortest_plan_to_key() {
        let map = puzzle();
        let start = State::new(Position::new(0, 0));
        let outcome = bfs_plan(start, &map, DoorRule::default(), SearchLimits::default(), |s| {
            s.position == Position::new(2, 2)
        })
        .unwrap();

        assert_eq!(
            outcome.plan,
            plan_of(&["MOVE_DOWN", "MOVE_DOWN", "MOVE_RIGHT", "MOVE_RIGHT"])
        );
        assert_eq!(outcome.final_state, State::new(Position::new(2, 2)));
        assert!(outcome.stats.expanded > 0);
        assert!(outcome.stats.enqueued > outcome.stats.expanded);
    }

    #[test]
    fn test_start_satisfying_goal_yields_empty_plan() {
        let map = puzzle();
        let start = State::new(Position::new(0, 0));
        let outcome =
            bfs_plan(start, &map, DoorRule::default(), SearchLimits::default(), |_| true).unwrap();
        assert!(outcome.plan.is_empty());
        assert_eq!(outcome.final_state, start);
        assert_eq!(outcome.stats.expanded, 0);
    }

    #[test]
    fn test_door_unreachable_under_strict_rule() {
        let map = puzzle();
        let start = State::new(Position::new(2, 2)).with_key();
        let door = Position::new(3, 4);
        let result = bfs_plan(start, &map, DoorRule::Strict, SearchLimits::default(), |s| {
            s.position == door
        });
        assert!(matches!(result, Err(SearchError::Unreachable { .. })));
    }

    #[test]
    fn test_door_reachable_through_keyhole() {
        let map = puzzle();
        let start = State::new(Position::new(2, 2)).with_key();
        let door = Position::new(3, 4);
        let outcome = bfs_plan(
            start,
            &map,
            DoorRule::KeyholeEntry,
            SearchLimits::default(),
            |s| s.position == door,
        )
        .unwrap();
        assert_eq!(
            outcome.plan,
            plan_of(&["MOVE_DOWN", "MOVE_RIGHT", "MOVE_RIGHT"])
        );
        assert!(!outcome.final_state.door_unlocked);
    }

    #[test]
    fn test_search_can_collect_flags_on_the_way() {
        let map = puzzle();
        let start = State::new(Position::new(0, 0));
        let outcome = bfs_plan(start, &map, DoorRule::default(), SearchLimits::default(), |s| {
            s.door_unlocked
        })
        .unwrap();
        assert_eq!(
            outcome.plan,
            plan_of(&[
                "MOVE_DOWN",
                "MOVE_DOWN",
                "MOVE_RIGHT",
                "MOVE_RIGHT",
                "PICK_UP_KEY",
                "MOVE_DOWN",
                "MOVE_RIGHT",
                "MOVE_RIGHT",
                "UNLOCK_DOOR",
            ])
        );
    }

    #[test]
    fn test_budget_exhausted() {
        let map = puzzle();
        let start = State::new(Position::new(0, 0));
        let limits = SearchLimits {
            max_expansions: Some(3),
        };
        let result = bfs_plan(start, &map, DoorRule::default(), limits, |s| {
            s.position == Position::new(4, 4)
        });
        assert_eq!(result, Err(SearchError::BudgetExhausted { limit: 3 }));
    }

    #[test]
    fn test_repeated_searches_are_identical() {
        let map = puzzle();
        let start = State::new(Position::new(0, 0));
        let goal = |s: &State| s.position == Position::new(4, 4) && s.door_unlocked;
        let first = bfs_plan(start, &map, DoorRule::default(), SearchLimits::default(), goal);
        for _ in 0..10 {
            let again = bfs_plan(start, &map, DoorRule::default(), SearchLimits::default(), goal);
            assert_eq!(first, again);
        }
    }

    /// Random small map: walls sprinkled at ~25%, one key and one door.
    fn random_map(rng: &mut StdRng) -> (GridMap, State) {
        let height = rng.random_range(2..=3);
        let width = rng.random_range(3..=4);
        let mut rows: Vec<Vec<Cell>> = (0..height)
            .map(|_| {
                (0..width)
                    .map(|_| {
                        if rng.random_bool(0.25) {
                            Cell::Wall
                        } else {
                            Cell::Empty
                        }
                    })
                    .collect()
            })
            .collect();

        let mut free: Vec<Position> = (0..height)
            .flat_map(|row| (0..width).map(move |col| Position::new(row, col)))
            .collect();
        let mut pick = || free.swap_remove(rng.random_range(0..free.len()));
        let start = pick();
        let key = pick();
        let door = pick();
        rows[start.row][start.col] = Cell::Start;
        rows[key.row][key.col] = Cell::Key;
        rows[door.row][door.col] = Cell::Door;

        (GridMap::from_rows(rows).unwrap(), State::new(start))
    }

    /// Length of the shortest action sequence reaching `goal`, by trying every
    /// loop-free sequence. Shortest plans never revisit a state, so this is exact.
    fn shortest_by_enumeration(
        start: State,
        map: &GridMap,
        rule: DoorRule,
        goal: &dyn Fn(&State) -> bool,
    ) -> Option<usize> {
        fn walk(
            state: State,
            depth: usize,
            map: &GridMap,
            rule: DoorRule,
            goal: &dyn Fn(&State) -> bool,
            on_path: &mut Vec<State>,
            best: &mut Option<usize>,
        ) {
            if best.is_some_and(|b| depth >= b) {
                return;
            }
            if goal(&state) {
                *best = Some(depth);
                return;
            }
            for action in Action::ALL {
                if let Some(next) = action.apply(&state, map, rule) {
                    if !on_path.contains(&next) {
                        on_path.push(next);
                        walk(next, depth + 1, map, rule, goal, on_path, best);
                        on_path.pop();
                    }
                }
            }
        }

        let mut best = None;
        walk(start, 0, map, rule, goal, &mut vec![start], &mut best);
        best
    }

    #[test]
    fn test_random_maps_optimal_and_replayable() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..40 {
            let (map, start) = random_map(&mut rng);
            let key = map.find(Cell::Key)[0];
            let door = map.find(Cell::Door)[0];
            let goals: [Box<dyn Fn(&State) -> bool>; 3] = [
                Box::new(move |s: &State| s.position == key),
                Box::new(|s: &State| s.holds_key),
                Box::new(move |s: &State| s.door_unlocked && s.position != door),
            ];

            for rule in [DoorRule::Strict, DoorRule::KeyholeEntry] {
                for goal in &goals {
                    let expected = shortest_by_enumeration(start, &map, rule, goal.as_ref());
                    let result = bfs_plan(start, &map, rule, SearchLimits::default(), goal.as_ref());
                    match (expected, result) {
                        (None, Err(SearchError::Unreachable { .. })) => {}
                        (Some(length), Ok(outcome)) => {
                            assert_eq!(outcome.plan.len(), length, "map:\n{map}");
                            let end = replay(start, &outcome.plan, &map, rule).unwrap();
                            assert_eq!(end, outcome.final_state);
                            assert!(goal(&end));
                        }
                        (expected, result) => {
                            panic!("enumeration {expected:?} vs search {result:?} on map:\n{map}")
                        }
                    }
                }
            }
        }
    }
}
