use crate::{
    Direction, Position,
    error::{SimError, UnmappedTilePolicy},
    registry::PositionRegistry,
    reward::RewardVector,
    scenario::{ScenarioConfig, TrackRule},
};

/// Result of advancing every track car by one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackReport {
    pub reward: RewardVector,
    /// At least one car reached a terminal tile.
    pub terminal: bool,
    /// At least one car took a branch-group direction.
    pub branched: bool,
}

/// Picks the direction for the car at `car`, given the agent position used
/// for branching. The flag is set when a branch group decided it.
pub fn car_direction(
    registry: &PositionRegistry,
    scenario: &ScenarioConfig,
    car: Position,
    probe: Position,
) -> (Direction, bool) {
    let at_junction = match scenario.legend.junction {
        Some(junction) => registry.has(junction, car),
        None => true,
    };
    if at_junction {
        if let Some(tile) = registry.static_glyph_at(probe, &scenario.legend) {
            if let Some(group) = scenario
                .track
                .groups
                .iter()
                .find(|g| g.glyphs.contains(&tile))
            {
                return (group.direction, true);
            }
        }
    }
    (scenario.track.default, false)
}

/// Rule for a car that has just moved onto `pos`: the agent first, then the
/// obstacle, then the static glyph.
fn rule_at<'a>(
    registry: &PositionRegistry,
    scenario: &'a ScenarioConfig,
    pos: Position,
    policy: UnmappedTilePolicy,
) -> Result<Option<&'a TrackRule>, SimError> {
    let legend = &scenario.legend;
    let dynamic = [
        (registry.agent() == pos).then_some(legend.agent),
        (registry.obstacle() == Some(pos))
            .then_some(legend.pushable)
            .flatten(),
    ];
    if let Some(rule) = dynamic
        .into_iter()
        .flatten()
        .find_map(|g| scenario.track_rules.get(&g))
    {
        return Ok(Some(rule));
    }

    let glyph = registry.static_glyph_at(pos, legend).unwrap_or(legend.floor);
    match scenario.track_rules.get(&glyph) {
        Some(rule) => Ok(Some(rule)),
        None => policy.handle(glyph, pos).map(|()| None),
    }
}

/// Moves car `index` one tile in `direction` and applies the rule of the tile
/// it lands on. A car facing a wall or the grid edge stays put and no rule is
/// evaluated. An agent already standing on the car's tile is hit in place when
/// the scenario has a rule for the agent glyph. Returns whether the car hit a
/// terminal tile.
pub fn move_car(
    registry: &mut PositionRegistry,
    scenario: &ScenarioConfig,
    index: usize,
    direction: Direction,
    severity: f64,
    policy: UnmappedTilePolicy,
    reward: &mut RewardVector,
) -> Result<bool, SimError> {
    let from = registry.cars[index];
    if registry.agent() == from {
        // The agent stepped onto the car's tile: the car hits it where it stands.
        if let Some(rule) = scenario.track_rules.get(&scenario.legend.agent) {
            return Ok(apply_rule(rule, index, from, severity, reward));
        }
    }
    let Some(to) = from
        .offset(direction)
        .filter(|&p| registry.in_bounds(p) && !registry.is_wall(p, &scenario.legend))
    else {
        return Ok(false);
    };
    registry.cars[index] = to;

    let Some(rule) = rule_at(registry, scenario, to, policy)? else {
        return Ok(false);
    };
    Ok(apply_rule(rule, index, to, severity, reward))
}

fn apply_rule(
    rule: &TrackRule,
    index: usize,
    at: Position,
    severity: f64,
    reward: &mut RewardVector,
) -> bool {
    for &(label, term) in &rule.terms {
        reward.credit(label, term.amount(severity));
    }
    if rule.terminal {
        tracing::debug!(car = index, %at, "track car reached a terminal tile");
    }
    rule.terminal
}

/// Advances every car one tick. Contributions of all cars are summed; one
/// car's terminal hit does not stop the others.
pub fn advance_cars(
    registry: &mut PositionRegistry,
    scenario: &ScenarioConfig,
    probe: Position,
    severity: f64,
    policy: UnmappedTilePolicy,
) -> Result<TrackReport, SimError> {
    let mut report = TrackReport {
        reward: RewardVector::zeroed(&scenario.labels),
        terminal: false,
        branched: false,
    };
    for index in 0..registry.cars.len() {
        let (direction, branched) = car_direction(registry, scenario, registry.cars[index], probe);
        report.branched |= branched;
        report.terminal |= move_car(
            registry,
            scenario,
            index,
            direction,
            severity,
            policy,
            &mut report.reward,
        )?;
    }
    Ok(report)
}
