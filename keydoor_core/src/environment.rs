use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::{
    Position,
    map::{Direction, Grid, GridError},
};

/// Represents the static kind of a cell in the puzzle grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cell {
    #[default]
    Empty,
    Wall,
    Start,
    Key,
    Door,
    Goal,
}

impl Cell {
    /// The single-character text marker of this cell kind.
    pub fn marker(self) -> char {
        match self {
            Cell::Empty => '.',
            Cell::Wall => '#',
            Cell::Start => 'S',
            Cell::Key => 'K',
            Cell::Door => 'D',
            Cell::Goal => 'G',
        }
    }

    /// Parses a text marker; `None` for unknown characters.
    pub fn from_marker(marker: char) -> Option<Self> {
        match marker {
            '.' => Some(Cell::Empty),
            '#' => Some(Cell::Wall),
            'S' => Some(Cell::Start),
            'K' => Some(Cell::Key),
            'D' => Some(Cell::Door),
            'G' => Some(Cell::Goal),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.marker())
    }
}

/// Represents errors in a grid map's text or layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("Unknown map marker '{marker}' at position ({row}, {col})")]
    UnknownMarker { marker: char, row: usize, col: usize },
    #[error("Map has no {0:?} cell")]
    MissingCell(Cell),
    #[error("Map has more than one {cell:?} cell: {positions:?}")]
    DuplicateCell { cell: Cell, positions: Vec<Position> },
}

/// The static puzzle layout: a rectangular grid of cell kinds.
///
/// Read-only for the lifetime of a planning run; every search and replay borrows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridMap {
    grid: Grid<Cell>,
}

impl GridMap {
    /// Builds a map from rows of cells, top to bottom.
    pub fn from_rows(rows: Vec<Vec<Cell>>) -> Result<Self, MapError> {
        Ok(GridMap {
            grid: Grid::from_rows(rows)?,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.grid.width()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.grid.height()
    }

    #[inline]
    pub fn contains(&self, position: Position) -> bool {
        self.grid.contains(position)
    }

    /// The cell kind at `position`, or `None` when out of bounds.
    pub fn get(&self, position: Position) -> Option<Cell> {
        self.grid.get(position).copied()
    }

    /// The cell kind at `position`.
    ///
    /// # Panics
    ///
    /// Panics if `position` is out of bounds; callers check bounds first
    /// (see [`GridMap::neighbor`]).
    #[inline]
    pub fn cell_at(&self, position: Position) -> Cell {
        self.grid[position]
    }

    /// The bounds-checked neighbour of `position` in `direction`.
    pub fn neighbor(&self, position: Position, direction: Direction) -> Option<Position> {
        self.grid.step(position, direction)
    }

    /// All positions holding `cell`, in row-major order.
    pub fn find(&self, cell: Cell) -> Vec<Position> {
        self.grid
            .enumerate()
            .filter_map(|(position, c)| (*c == cell).then_some(position))
            .collect()
    }

    /// Iterates over the rows of cells, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.grid.rows()
    }
}

impl FromStr for GridMap {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        load_map_from_string(s)
    }
}

impl fmt::Display for GridMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, row) in self.rows().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            let line: Vec<String> = row.iter().map(Cell::to_string).collect();
            write!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}

/// Loads a grid map from its text form.
///
/// One row per line, top to bottom. Markers may be separated by whitespace
/// (`S . . #`) or written contiguously (`S..#`). Blank lines are skipped.
pub fn load_map_from_string(map_string: &str) -> Result<GridMap, MapError> {
    let mut rows = Vec::new();
    for line in map_string.lines().filter(|line| !line.trim().is_empty()) {
        let row_index = rows.len();
        let row = line
            .chars()
            .filter(|c| !c.is_whitespace())
            .enumerate()
            .map(|(col, marker)| {
                Cell::from_marker(marker).ok_or(MapError::UnknownMarker {
                    marker,
                    row: row_index,
                    col,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(row);
    }
    GridMap::from_rows(rows)
}

/// Coordinates of the four unique cells the compound puzzle relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Landmarks {
    pub start: Position,
    pub key: Position,
    pub door: Position,
    pub goal: Position,
}

impl Landmarks {
    /// Scans the map once; each of Start, Key, Door and Goal must occur exactly once.
    pub fn locate(map: &GridMap) -> Result<Self, MapError> {
        let unique = |cell: Cell| -> Result<Position, MapError> {
            match map.find(cell).as_slice() {
                [] => Err(MapError::MissingCell(cell)),
                [position] => Ok(*position),
                positions => Err(MapError::DuplicateCell {
                    cell,
                    positions: positions.to_vec(),
                }),
            }
        };

        Ok(Landmarks {
            start: unique(Cell::Start)?,
            key: unique(Cell::Key)?,
            door: unique(Cell::Door)?,
            goal: unique(Cell::Goal)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUZZLE: &str = "
        S . . . .
        . # # . .
        . . K # .
        . . . . D
        . . . . G
    ";

    #[test]
    fn test_parse_spaced_map() {
        let map: GridMap = PUZZLE.parse().unwrap();
        assert_eq!(map.height(), 5);
        assert_eq!(map.width(), 5);
        assert_eq!(map.cell_at(Position::new(0, 0)), Cell::Start);
        assert_eq!(map.cell_at(Position::new(1, 1)), Cell::Wall);
        assert_eq!(map.cell_at(Position::new(2, 2)), Cell::Key);
        assert_eq!(map.cell_at(Position::new(3, 4)), Cell::Door);
        assert_eq!(map.get(Position::new(5, 0)), None);
    }

    #[test]
    fn test_contiguous_and_spaced_maps_agree() {
        let contiguous: GridMap = "S....\n.##..\n..K#.\n....D\n....G".parse().unwrap();
        let spaced: GridMap = PUZZLE.parse().unwrap();
        assert_eq!(contiguous, spaced);
    }

    #[test]
    fn test_display_round_trips_text() {
        let map: GridMap = PUZZLE.parse().unwrap();
        let rendered = map.to_string();
        assert_eq!(rendered.lines().next(), Some("S . . . ."));
        assert_eq!(rendered.parse::<GridMap>().unwrap(), map);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "S.x\n...".parse::<GridMap>(),
            Err(MapError::UnknownMarker {
                marker: 'x',
                row: 0,
                col: 2
            })
        );
        assert_eq!(
            "S..\n..".parse::<GridMap>(),
            Err(MapError::Grid(GridError::Ragged {
                row: 1,
                expected: 3,
                found: 2
            }))
        );
        assert_eq!(
            "\n  \n".parse::<GridMap>(),
            Err(MapError::Grid(GridError::Empty))
        );
    }

    #[test]
    fn test_locate_landmarks() {
        let map: GridMap = PUZZLE.parse().unwrap();
        let landmarks = Landmarks::locate(&map).unwrap();
        assert_eq!(landmarks.start, Position::new(0, 0));
        assert_eq!(landmarks.key, Position::new(2, 2));
        assert_eq!(landmarks.door, Position::new(3, 4));
        assert_eq!(landmarks.goal, Position::new(4, 4));
    }

    #[test]
    fn test_locate_fails_fast_on_missing_or_duplicate() {
        let missing: GridMap = "S.D\n..G".parse().unwrap();
        assert_eq!(
            Landmarks::locate(&missing),
            Err(MapError::MissingCell(Cell::Key))
        );

        let duplicate: GridMap = "SKD\nDKG".parse().unwrap();
        assert_eq!(
            Landmarks::locate(&duplicate),
            Err(MapError::DuplicateCell {
                cell: Cell::Key,
                positions: vec![Position::new(0, 1), Position::new(1, 1)]
            })
        );
    }
}
