use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::{Glyph, Position};

/// A dense 2D grid.
///
/// Stores elements of type `T` in a flat vector using row-major order and is
/// addressed by [`Position`] (row, column). Rendering produces a `Grid<Glyph>`
/// which the observation encoder walks cell by cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a grid of `rows` x `cols` with every cell set to `value`.
    ///
    /// # Panics
    ///
    /// Panics if `rows * cols` overflows `usize`.
    pub fn filled(rows: usize, cols: usize, value: T) -> Self
    where
        T: Clone,
    {
        let size = rows.checked_mul(cols).expect("Grid size overflow");
        Grid {
            rows,
            cols,
            cells: vec![value; size],
        }
    }

    /// Returns the number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Returns the number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Converts a position to a flat vector index.
    ///
    /// Returns `None` if the position is out of bounds.
    #[inline]
    pub fn position_to_index(&self, pos: Position) -> Option<usize> {
        if self.is_valid(pos) {
            Some(pos.row * self.cols + pos.col)
        } else {
            None
        }
    }

    /// Checks if the given position is within the grid boundaries.
    #[inline]
    pub fn is_valid(&self, pos: Position) -> bool {
        pos.row < self.rows && pos.col < self.cols
    }

    /// Returns an iterator that yields `(Position, &T)` for each cell.
    pub fn enumerate(&self) -> impl Iterator<Item = (Position, &T)> {
        let cols = self.cols;
        self.cells
            .iter()
            .enumerate()
            .map(move |(index, cell)| (Position::new(index / cols, index % cols), cell))
    }

    /// Returns the cells of one row, or `None` past the last row.
    pub fn row(&self, row: usize) -> Option<&[T]> {
        if row < self.rows {
            Some(&self.cells[row * self.cols..(row + 1) * self.cols])
        } else {
            None
        }
    }
}

impl Grid<Glyph> {
    /// Joins the rows into newline-separated text.
    pub fn to_text(&self) -> String {
        (0..self.rows)
            .filter_map(|r| self.row(r))
            .map(|cells| cells.iter().collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Indexing using Position coordinates for access
impl<T> Index<Position> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: Position) -> &Self::Output {
        match self.position_to_index(index) {
            Some(idx) => &self.cells[idx],
            None => panic!(
                "Grid index ({}, {}) out of bounds for grid size ({}, {})",
                index.row, index.col, self.rows, self.cols
            ),
        }
    }
}

/// Indexing using Position coordinates for mutable access
impl<T> IndexMut<Position> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, index: Position) -> &mut Self::Output {
        let (rows, cols) = (self.rows, self.cols);
        match self.position_to_index(index) {
            Some(idx) => &mut self.cells[idx],
            None => panic!(
                "Grid index ({}, {}) out of bounds for grid size ({}, {})",
                index.row, index.col, rows, cols
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_writes_in_row_major_order() {
        let mut grid = Grid::filled(2, 3, ' ');
        grid[Position::new(1, 2)] = 'x';
        assert_eq!(grid.position_to_index(Position::new(1, 2)), Some(5));
        assert_eq!(grid.position_to_index(Position::new(2, 0)), None);
        assert_eq!(grid[Position::new(1, 2)], 'x');
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn index_panics_past_the_edge() {
        let grid = Grid::filled(2, 3, ' ');
        let _ = grid[Position::new(0, 3)];
    }

    #[test]
    fn enumerate_is_row_major() {
        let grid = Grid::filled(2, 2, 0u8);
        let positions: Vec<Position> = grid.enumerate().map(|(p, _)| p).collect();
        assert_eq!(
            positions,
            vec![
                Position::new(0, 0),
                Position::new(0, 1),
                Position::new(1, 0),
                Position::new(1, 1)
            ]
        );
    }

    #[test]
    fn text_joins_rows() {
        let mut grid = Grid::filled(2, 2, '#');
        grid[Position::new(1, 0)] = 'A';
        assert_eq!(grid.to_text(), "##\nA#");
    }
}
