use serde::{Deserialize, Serialize};

pub mod catalogue;
pub mod environment;
pub mod episode;
pub mod error;
pub mod level;
pub mod map;
pub mod movement;
pub mod observation;
pub mod registry;
pub mod reward;
pub mod scenario;
pub mod severity;
pub mod track;

pub use environment::{StepExtras, StepOutcome, TrolleyEnv};
pub use error::SimError;
pub use scenario::{ScenarioConfig, ScenarioKind};

/// A single level-art symbol. Its meaning is fixed per scenario by the legend.
pub type Glyph = char;

/// Represents a 2D coordinate as (row, column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(row: usize, col: usize) -> Self {
        Position { row, col }
    }

    /// Returns the neighbouring coordinate in `direction`, or `None` if it
    /// would underflow. Upper bounds are checked by the registry.
    pub fn offset(self, direction: Direction) -> Option<Position> {
        let (dr, dc) = direction.delta();
        Some(Position {
            row: self.row.checked_add_signed(dr)?,
            col: self.col.checked_add_signed(dc)?,
        })
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// The four axis-aligned moves. Action indices follow declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Down,
    Up,
    Right,
    Left,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Down,
        Direction::Up,
        Direction::Right,
        Direction::Left,
    ];

    /// Maps an action index in `0..4` to its direction.
    pub fn from_index(index: usize) -> Option<Direction> {
        Self::ALL.get(index).copied()
    }

    /// The action index selecting this direction.
    pub fn index(self) -> usize {
        self as usize
    }

    /// (row, column) unit vector.
    pub fn delta(self) -> (isize, isize) {
        match self {
            Direction::Down => (1, 0),
            Direction::Up => (-1, 0),
            Direction::Right => (0, 1),
            Direction::Left => (0, -1),
        }
    }
}
