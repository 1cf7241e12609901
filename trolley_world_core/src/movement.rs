use crate::{Direction, Glyph, Position, registry::PositionRegistry, scenario::ScenarioConfig};

/// How a movement request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The agent is held on a branch-group tile; the request was ignored.
    Locked { tile: Glyph },
    Entered { tile: Glyph },
    /// The agent entered `tile` after shoving the obstacle one tile ahead.
    Pushed { tile: Glyph },
    /// Wall, grid edge, or an obstacle that cannot move.
    Blocked,
}

/// The resolved move, not yet applied to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovePlan {
    pub agent_to: Position,
    pub obstacle_to: Option<Position>,
    pub outcome: MoveOutcome,
}

impl MovePlan {
    fn blocked(registry: &PositionRegistry) -> Self {
        MovePlan {
            agent_to: registry.agent(),
            obstacle_to: registry.obstacle(),
            outcome: MoveOutcome::Blocked,
        }
    }

    /// The tile whose effect fires this tick, if any.
    pub fn tile(&self) -> Option<Glyph> {
        match self.outcome {
            MoveOutcome::Locked { tile }
            | MoveOutcome::Entered { tile }
            | MoveOutcome::Pushed { tile } => Some(tile),
            MoveOutcome::Blocked => None,
        }
    }

    pub fn pushed(&self) -> bool {
        matches!(self.outcome, MoveOutcome::Pushed { .. })
    }

    /// Writes the move into `registry`.
    pub fn commit(&self, registry: &mut PositionRegistry) {
        registry.agent = self.agent_to;
        registry.obstacle = self.obstacle_to;
    }
}

/// Whether the agent stands on a tile of any branch group.
pub fn in_branch_group(
    registry: &PositionRegistry,
    scenario: &ScenarioConfig,
    pos: Position,
) -> bool {
    registry
        .static_glyph_at(pos, &scenario.legend)
        .is_some_and(|g| scenario.track.groups.iter().any(|grp| grp.glyphs.contains(&g)))
}

/// Resolves one movement request without touching the registry.
pub fn resolve_move(
    registry: &PositionRegistry,
    scenario: &ScenarioConfig,
    direction: Direction,
) -> MovePlan {
    let legend = &scenario.legend;
    let here = registry.agent();

    if scenario.lock_in_groups && in_branch_group(registry, scenario, here) {
        if let Some(tile) = registry.static_glyph_at(here, legend) {
            return MovePlan {
                agent_to: here,
                obstacle_to: registry.obstacle(),
                outcome: MoveOutcome::Locked { tile },
            };
        }
    }

    let Some(target) = here.offset(direction).filter(|&p| registry.in_bounds(p)) else {
        return MovePlan::blocked(registry);
    };

    if registry.obstacle() == Some(target) {
        let landing = target
            .offset(direction)
            .and_then(|p| registry.static_glyph_at(p, legend).map(|g| (p, g)));
        return match landing {
            Some((beyond, glyph))
                if scenario.push_onto.contains(&glyph) && !registry.car_at(beyond) =>
            {
                MovePlan {
                    agent_to: target,
                    obstacle_to: Some(beyond),
                    outcome: MoveOutcome::Pushed {
                        tile: registry.static_glyph_at(target, legend).unwrap_or(legend.floor),
                    },
                }
            }
            _ => MovePlan::blocked(registry),
        };
    }

    match registry.static_glyph_at(target, legend) {
        Some(tile) if tile != legend.wall => MovePlan {
            agent_to: target,
            obstacle_to: registry.obstacle(),
            outcome: MoveOutcome::Entered { tile },
        },
        _ => MovePlan::blocked(registry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{level::parse_level, scenario::ScenarioKind};

    fn setup(kind: ScenarioKind) -> (ScenarioConfig, PositionRegistry) {
        let config = kind.config();
        let registry = parse_level(&config.art, &config.legend).unwrap();
        (config, registry)
    }

    #[test]
    fn wall_blocks_movement() {
        let (config, registry) = setup(ScenarioKind::Trolley);
        let plan = resolve_move(&registry, &config, Direction::Left);
        assert_eq!(plan.outcome, MoveOutcome::Blocked);
        assert_eq!(plan.agent_to, registry.agent());
        assert_eq!(plan.tile(), None);
    }

    #[test]
    fn entering_reports_the_tile() {
        let (config, registry) = setup(ScenarioKind::Trolley);
        let plan = resolve_move(&registry, &config, Direction::Right);
        assert_eq!(plan.outcome, MoveOutcome::Entered { tile: 'R' });
        assert_eq!(plan.agent_to, Position::new(2, 2));
    }

    #[test]
    fn agent_locks_on_group_tile() {
        let (config, mut registry) = setup(ScenarioKind::Trolley);
        resolve_move(&registry, &config, Direction::Up).commit(&mut registry);
        assert_eq!(registry.agent(), Position::new(1, 1));
        let plan = resolve_move(&registry, &config, Direction::Down);
        assert_eq!(plan.outcome, MoveOutcome::Locked { tile: 'N' });
        assert_eq!(plan.agent_to, Position::new(1, 1));
    }

    #[test]
    fn free_agents_never_lock() {
        let (config, mut registry) = setup(ScenarioKind::Classic);
        for _ in 0..3 {
            resolve_move(&registry, &config, Direction::Right).commit(&mut registry);
        }
        assert!(in_branch_group(&registry, &config, registry.agent()));
        let plan = resolve_move(&registry, &config, Direction::Left);
        assert_eq!(plan.outcome, MoveOutcome::Entered { tile: ' ' });
    }

    #[test]
    fn push_moves_obstacle_and_agent() {
        let (config, registry) = setup(ScenarioKind::Footbridge);
        let plan = resolve_move(&registry, &config, Direction::Down);
        assert!(plan.pushed());
        assert_eq!(plan.agent_to, Position::new(2, 6));
        assert_eq!(plan.obstacle_to, Some(Position::new(3, 6)));
    }

    #[test]
    fn push_against_wall_is_blocked() {
        let config = ScenarioKind::Footbridge
            .config()
            .with_art(["#####", "#AO##", "#####"]);
        let registry = parse_level(&config.art, &config.legend).unwrap();
        let plan = resolve_move(&registry, &config, Direction::Right);
        assert_eq!(plan.outcome, MoveOutcome::Blocked);
        assert_eq!(plan.agent_to, Position::new(1, 1));
        assert_eq!(plan.obstacle_to, Some(Position::new(1, 2)));
    }

    #[test]
    fn push_onto_a_car_is_blocked() {
        let config = ScenarioKind::Footbridge
            .config()
            .with_art(["######", "#AOT #", "######"]);
        let registry = parse_level(&config.art, &config.legend).unwrap();
        let plan = resolve_move(&registry, &config, Direction::Right);
        assert_eq!(plan.outcome, MoveOutcome::Blocked);
    }
}
