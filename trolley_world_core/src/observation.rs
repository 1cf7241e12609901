use serde::{Deserialize, Serialize};

use crate::{
    Glyph, Position,
    episode::EpisodeState,
    map::Grid,
    registry::PositionRegistry,
    scenario::{Encoding, EntityKind, Legend, Scalar},
};

/// Declared action space: discrete moves in `0..n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionSpace {
    Discrete(usize),
}

/// Declared observation space: a flat vector of `len` values in `low..=high`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservationSpace {
    pub low: f32,
    pub high: f32,
    pub len: usize,
}

impl ObservationSpace {
    pub fn contains(&self, observation: &[f32]) -> bool {
        observation.len() == self.len
            && observation
                .iter()
                .all(|v| v.is_finite() && *v >= self.low && *v <= self.high)
    }
}

/// Draws the registry in z-order: later legend glyphs overwrite earlier ones
/// on the same cell; unmarked cells show the floor.
pub fn render(registry: &PositionRegistry, legend: &Legend) -> Grid<Glyph> {
    let mut grid = Grid::filled(registry.rows(), registry.cols(), legend.floor);
    for &glyph in &legend.z_order {
        let cells: Vec<_> = match legend.kind_of(glyph) {
            Some(EntityKind::Agent) => vec![registry.agent()],
            Some(EntityKind::Track) => registry.cars().to_vec(),
            Some(EntityKind::Pushable) => registry.obstacle().into_iter().collect(),
            _ => registry.positions_of(glyph).collect(),
        };
        for pos in cells {
            grid[pos] = glyph;
        }
    }
    grid
}

/// Number of one-hot features per non-wall cell.
fn one_hot_width(legend: &Legend) -> usize {
    legend.encoded_glyphs().count()
}

/// Length of the encoded observation for a level shaped like `registry`.
pub fn observation_len(
    encoding: &Encoding,
    registry: &PositionRegistry,
    legend: &Legend,
) -> usize {
    match encoding {
        Encoding::Raster { scalars } => {
            let open = (0..registry.rows())
                .flat_map(|row| (0..registry.cols()).map(move |col| Position::new(row, col)))
                .filter(|&p| !registry.is_wall(p, legend))
                .count();
            open * one_hot_width(legend) + scalars.len()
        }
        Encoding::Compact => 3 + 2 * registry.cars().len(),
    }
}

fn scalar_value(scalar: Scalar, state: &EpisodeState) -> f32 {
    let value = match scalar {
        Scalar::Severity => state.severity,
        Scalar::TimeBudget => state.time.unwrap_or(0).max(0) as f64,
        Scalar::Resource => state.resource.unwrap_or(0).max(0) as f64,
    };
    value as f32
}

/// Encodes the current registry and episode scalars as a flat feature vector.
pub fn encode(
    encoding: &Encoding,
    registry: &PositionRegistry,
    legend: &Legend,
    state: &EpisodeState,
) -> Vec<f32> {
    match encoding {
        Encoding::Raster { scalars } => {
            let glyphs: Vec<Glyph> = legend.encoded_glyphs().collect();
            let grid = render(registry, legend);
            let mut features = Vec::with_capacity(observation_len(encoding, registry, legend));
            for (pos, &glyph) in grid.enumerate() {
                if registry.is_wall(pos, legend) {
                    continue;
                }
                let hot = glyphs.iter().position(|&g| g == glyph);
                features.extend((0..glyphs.len()).map(|i| f32::from(u8::from(Some(i) == hot))));
            }
            features.extend(scalars.iter().map(|&s| scalar_value(s, state)));
            features
        }
        Encoding::Compact => {
            let mut features = vec![
                scalar_value(Scalar::TimeBudget, state),
                f32::from(u8::from(state.flags.cat_rescued)),
                f32::from(u8::from(state.flags.portrait_rescued)),
            ];
            for car in registry.cars() {
                features.push(car.row as f32);
                features.push(car.col as f32);
            }
            features
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{level::parse_level, scenario::ScenarioKind};

    #[test]
    fn render_reproduces_static_art() {
        let config = ScenarioKind::Classic.config();
        let registry = parse_level(&config.art, &config.legend).unwrap();
        assert_eq!(render(&registry, &config.legend).to_text(), config.art.join("\n"));
    }

    #[test]
    fn later_glyphs_draw_on_top() {
        let config = ScenarioKind::Footbridge.config();
        let mut registry = parse_level(&config.art, &config.legend).unwrap();
        registry.cars[0] = Position::new(4, 11);
        let grid = render(&registry, &config.legend);
        assert_eq!(grid[Position::new(4, 11)], 'T');
        assert_eq!(grid[Position::new(4, 1)], ' ');
    }

    #[test]
    fn freeform_agent_hides_under_choice_tile() {
        let config = ScenarioKind::Trolley.config();
        let mut registry = parse_level(&config.art, &config.legend).unwrap();
        registry.agent = Position::new(1, 1);
        let grid = render(&registry, &config.legend);
        assert_eq!(grid[Position::new(1, 1)], 'N');
        assert_eq!(grid[Position::new(2, 1)], ' ');
    }

    #[test]
    fn raster_has_declared_length() {
        for kind in ScenarioKind::ALL {
            let config = kind.config();
            let registry = parse_level(&config.art, &config.legend).unwrap();
            let state = EpisodeState::new(3.0, &config.countdown);
            let obs = encode(&config.encoding, &registry, &config.legend, &state);
            assert_eq!(
                obs.len(),
                observation_len(&config.encoding, &registry, &config.legend),
                "{kind}"
            );
        }
    }

    #[test]
    fn raster_is_one_hot_per_open_cell() {
        let config = ScenarioKind::Trolley.config();
        let registry = parse_level(&config.art, &config.legend).unwrap();
        let state = EpisodeState::new(6.0, &config.countdown);
        let obs = encode(&config.encoding, &registry, &config.legend, &state);
        let width = one_hot_width(&config.legend);
        let (cells, scalars) = obs.split_at(obs.len() - 1);
        assert_eq!(scalars, &[6.0]);
        for chunk in cells.chunks(width) {
            assert_eq!(chunk.iter().sum::<f32>(), 1.0);
        }
        // Open cells: N, A, R, T, ' ', '+', '1', '?'.
        assert_eq!(cells.len(), 8 * width);
    }

    #[test]
    fn compact_lists_budget_flags_and_cars() {
        let config = ScenarioKind::Fire.config();
        let registry = parse_level(&config.art, &config.legend).unwrap();
        let mut state = EpisodeState::new(2.0, &config.countdown);
        state.flags.portrait_rescued = true;
        let obs = encode(&config.encoding, &registry, &config.legend, &state);
        assert_eq!(obs, vec![10.0, 0.0, 1.0, 3.0, 1.0, 4.0, 1.0]);
    }

    #[test]
    fn space_checks_length_and_bounds() {
        let space = ObservationSpace {
            low: 0.0,
            high: 100.0,
            len: 2,
        };
        assert!(space.contains(&[0.0, 100.0]));
        assert!(!space.contains(&[0.0]));
        assert!(!space.contains(&[0.0, 101.0]));
    }
}
