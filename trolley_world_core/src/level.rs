use std::collections::{HashMap, HashSet};

use crate::{
    Glyph, Position,
    registry::PositionRegistry,
    scenario::{EntityKind, Legend},
};

/// Represents errors found while reading level art.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LevelError {
    #[error("Level art is empty")]
    EmptyLevel,
    #[error("Inconsistent width at row {row}: expected {expected}, found {found}")]
    RaggedLevel {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Undeclared glyph '{glyph}' at ({row}, {col})")]
    InvalidLevelGlyph { glyph: Glyph, row: usize, col: usize },
    #[error("Expected exactly one agent, found {found}")]
    InvalidAgentCount { found: usize },
    #[error("Expected at most one pushable obstacle, found {found}")]
    InvalidPushableCount { found: usize },
}

/// Builds a fresh registry from level art.
///
/// Every glyph must be declared by `legend`; the agent must appear exactly
/// once and the pushable obstacle at most once. Track cars are numbered in
/// row-major order.
pub fn parse_level<S: AsRef<str>>(
    art: &[S],
    legend: &Legend,
) -> Result<PositionRegistry, LevelError> {
    let rows = art.len();
    let cols = art
        .first()
        .map(|r| r.as_ref().chars().count())
        .ok_or(LevelError::EmptyLevel)?;
    if cols == 0 {
        return Err(LevelError::EmptyLevel);
    }

    let mut statics: HashMap<Glyph, HashSet<Position>> = HashMap::new();
    let mut agents = Vec::new();
    let mut cars = Vec::new();
    let mut obstacles = Vec::new();

    for (row, line) in art.iter().enumerate() {
        let line = line.as_ref();
        let found = line.chars().count();
        if found != cols {
            return Err(LevelError::RaggedLevel {
                row,
                expected: cols,
                found,
            });
        }
        for (col, glyph) in line.chars().enumerate() {
            let pos = Position::new(row, col);
            match legend.kind_of(glyph) {
                None => return Err(LevelError::InvalidLevelGlyph { glyph, row, col }),
                Some(EntityKind::Agent) => agents.push(pos),
                Some(EntityKind::Track) => cars.push(pos),
                Some(EntityKind::Pushable) => obstacles.push(pos),
                Some(
                    EntityKind::Floor | EntityKind::Wall | EntityKind::Junction | EntityKind::Tile,
                ) => {
                    statics.entry(glyph).or_default().insert(pos);
                }
            }
        }
    }

    let agent = match agents.as_slice() {
        [only] => *only,
        _ => {
            return Err(LevelError::InvalidAgentCount {
                found: agents.len(),
            });
        }
    };
    if obstacles.len() > 1 {
        return Err(LevelError::InvalidPushableCount {
            found: obstacles.len(),
        });
    }

    tracing::debug!(rows, cols, cars = cars.len(), "parsed level");
    Ok(PositionRegistry::new(
        rows,
        cols,
        statics,
        agent,
        cars,
        obstacles.first().copied(),
    ))
}

/// Splits a text blob into level rows.
///
/// Blank lines at either end are dropped; interior whitespace is kept since
/// spaces are floor.
pub fn load_level_from_string(text: &str) -> Result<Vec<String>, LevelError> {
    let rows: Vec<String> = text
        .lines()
        .map(|l| l.trim_end_matches('\r').to_string())
        .skip_while(|l| l.trim().is_empty())
        .collect();
    let end = rows
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .ok_or(LevelError::EmptyLevel)?;
    Ok(rows[..=end].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::ScenarioKind;

    fn legend() -> Legend {
        ScenarioKind::Trolley.config().legend
    }

    #[test]
    fn parses_trolley_art() {
        let config = ScenarioKind::Trolley.config();
        let registry = parse_level(&config.art, &config.legend).unwrap();
        assert_eq!((registry.rows(), registry.cols()), (7, 6));
        assert_eq!(registry.agent(), Position::new(2, 1));
        assert_eq!(registry.cars(), &[Position::new(4, 1)]);
        assert!(registry.has('+', Position::new(4, 3)));
        assert!(registry.has('?', Position::new(5, 3)));
        assert_eq!(registry.obstacle(), None);
    }

    #[test]
    fn bare_cells_read_as_floor() {
        let config = ScenarioKind::Trolley.config();
        let registry = parse_level(&config.art, &config.legend).unwrap();
        assert_eq!(
            registry.static_glyph_at(Position::new(4, 1), &config.legend),
            Some(' ')
        );
        assert_eq!(
            registry.static_glyph_at(Position::new(7, 0), &config.legend),
            None
        );
    }

    #[test]
    fn rejects_undeclared_glyph() {
        let err = parse_level(&["###", "#AZ", "###"], &legend()).unwrap_err();
        assert_eq!(
            err,
            LevelError::InvalidLevelGlyph {
                glyph: 'Z',
                row: 1,
                col: 2
            }
        );
    }

    #[test]
    fn rejects_missing_or_duplicate_agent() {
        assert_eq!(
            parse_level(&["###", "# #", "###"], &legend()),
            Err(LevelError::InvalidAgentCount { found: 0 })
        );
        assert_eq!(
            parse_level(&["####", "#AA#", "####"], &legend()),
            Err(LevelError::InvalidAgentCount { found: 2 })
        );
    }

    #[test]
    fn rejects_ragged_rows() {
        assert_eq!(
            parse_level(&["###", "#A", "###"], &legend()),
            Err(LevelError::RaggedLevel {
                row: 1,
                expected: 3,
                found: 2
            })
        );
        assert_eq!(
            parse_level::<&str>(&[], &legend()),
            Err(LevelError::EmptyLevel)
        );
    }

    #[test]
    fn rejects_second_obstacle() {
        let legend = ScenarioKind::Footbridge.config().legend;
        assert_eq!(
            parse_level(&["#####", "#AOO#", "#####"], &legend),
            Err(LevelError::InvalidPushableCount { found: 2 })
        );
    }

    #[test]
    fn loads_text_keeping_floor_spaces() {
        let rows = load_level_from_string("\n#####\n#A  #\n#####\n\n").unwrap();
        assert_eq!(rows, vec!["#####", "#A  #", "#####"]);
        assert_eq!(load_level_from_string("\n  \n"), Err(LevelError::EmptyLevel));
    }
}
