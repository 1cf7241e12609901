use std::collections::{HashMap, HashSet};

use crate::{Glyph, Position, scenario::Legend};

/// Live store of where every entity currently is.
///
/// Static glyphs (walls, terminals, switches, markers) are only ever
/// membership-tested and live in sets. The agent, the track cars and the
/// optional pushable obstacle move and are addressed directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionRegistry {
    rows: usize,
    cols: usize,
    statics: HashMap<Glyph, HashSet<Position>>,
    pub(crate) agent: Position,
    /// Row-major discovery order; the length never changes within an episode.
    pub(crate) cars: Vec<Position>,
    pub(crate) obstacle: Option<Position>,
}

impl PositionRegistry {
    pub(crate) fn new(
        rows: usize,
        cols: usize,
        statics: HashMap<Glyph, HashSet<Position>>,
        agent: Position,
        cars: Vec<Position>,
        obstacle: Option<Position>,
    ) -> Self {
        PositionRegistry {
            rows,
            cols,
            statics,
            agent,
            cars,
            obstacle,
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.row < self.rows && pos.col < self.cols
    }

    pub fn agent(&self) -> Position {
        self.agent
    }

    pub fn cars(&self) -> &[Position] {
        &self.cars
    }

    pub fn obstacle(&self) -> Option<Position> {
        self.obstacle
    }

    /// Whether `glyph` is a static glyph marking `pos`.
    pub fn has(&self, glyph: Glyph, pos: Position) -> bool {
        self.statics
            .get(&glyph)
            .is_some_and(|set| set.contains(&pos))
    }

    /// Every coordinate bearing static `glyph`.
    pub fn positions_of(&self, glyph: Glyph) -> impl Iterator<Item = Position> + '_ {
        self.statics.get(&glyph).into_iter().flatten().copied()
    }

    /// The static glyph at `pos`.
    ///
    /// Cells marked only by a dynamic entity in the level art read as the
    /// floor. Returns `None` outside the grid.
    pub fn static_glyph_at(&self, pos: Position, legend: &Legend) -> Option<Glyph> {
        if !self.in_bounds(pos) {
            return None;
        }
        let glyph = self
            .statics
            .iter()
            .find(|(_, set)| set.contains(&pos))
            .map(|(&g, _)| g)
            .unwrap_or(legend.floor);
        Some(glyph)
    }

    pub fn is_wall(&self, pos: Position, legend: &Legend) -> bool {
        self.has(legend.wall, pos)
    }

    pub fn car_at(&self, pos: Position) -> bool {
        self.cars.contains(&pos)
    }
}
