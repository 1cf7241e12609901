use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    Direction, Glyph,
    error::SimError,
    reward::{Label, RewardTerm},
};

/// What a glyph stands for inside one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Open ground; also the implicit glyph of cells only a dynamic entity marks.
    Floor,
    Wall,
    Agent,
    /// Runaway entity advanced every tick (trolley, bomb, murderer, fire).
    Track,
    /// Obstacle the agent can push one tile.
    Pushable,
    /// Tile where track cars consult the branch groups.
    Junction,
    /// Any other static tile: terminals, switches, markers.
    Tile,
}

/// Glyph roles plus render priority for one scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Legend {
    pub floor: Glyph,
    pub wall: Glyph,
    pub agent: Glyph,
    pub track: Option<Glyph>,
    pub pushable: Option<Glyph>,
    pub junction: Option<Glyph>,
    /// Every declared glyph, lowest render priority first. Later glyphs draw
    /// over earlier ones on the same cell.
    pub z_order: Vec<Glyph>,
}

impl Legend {
    pub fn kind_of(&self, glyph: Glyph) -> Option<EntityKind> {
        if !self.z_order.contains(&glyph) {
            return None;
        }
        let kind = if glyph == self.floor {
            EntityKind::Floor
        } else if glyph == self.wall {
            EntityKind::Wall
        } else if glyph == self.agent {
            EntityKind::Agent
        } else if Some(glyph) == self.track {
            EntityKind::Track
        } else if Some(glyph) == self.pushable {
            EntityKind::Pushable
        } else if Some(glyph) == self.junction {
            EntityKind::Junction
        } else {
            EntityKind::Tile
        };
        Some(kind)
    }

    pub fn contains(&self, glyph: Glyph) -> bool {
        self.z_order.contains(&glyph)
    }

    /// Glyphs that can appear in a rendered cell, minus the wall.
    pub fn encoded_glyphs(&self) -> impl Iterator<Item = Glyph> + '_ {
        self.z_order.iter().copied().filter(move |&g| g != self.wall)
    }

    fn validate(&self) -> Result<(), SimError> {
        let mut seen = Vec::with_capacity(self.z_order.len());
        for &g in &self.z_order {
            if seen.contains(&g) {
                return Err(SimError::InvalidLegend(format!("glyph '{g}' declared twice")));
            }
            seen.push(g);
        }
        let roles = [Some(self.floor), Some(self.wall), Some(self.agent)]
            .into_iter()
            .chain([self.track, self.pushable, self.junction])
            .flatten()
            .collect::<Vec<_>>();
        for (i, &g) in roles.iter().enumerate() {
            if !self.contains(g) {
                return Err(SimError::InvalidLegend(format!(
                    "role glyph '{g}' missing from the z-order"
                )));
            }
            if roles[..i].contains(&g) {
                return Err(SimError::InvalidLegend(format!(
                    "glyph '{g}' has more than one role"
                )));
            }
        }
        Ok(())
    }
}

/// Which rescue flag a tile sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rescue {
    Cat,
    Portrait,
}

/// Consequences of the agent entering (or staying on) a tile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileEffect {
    /// Credited when the agent arrives.
    pub arrive: Vec<(Label, f64)>,
    /// Credited when the agent is already there (locked), or re-enters a tile
    /// whose rescue already happened.
    pub stay: Vec<(Label, f64)>,
    /// Subtracted from the resource budget on arrival.
    pub drain: u32,
    pub rescue: Option<Rescue>,
}

impl TileEffect {
    /// A tile with no consequences.
    pub fn inert() -> Self {
        TileEffect::default()
    }

    pub fn rewards(arrive: &[(Label, f64)], stay: &[(Label, f64)]) -> Self {
        TileEffect {
            arrive: arrive.to_vec(),
            stay: stay.to_vec(),
            ..TileEffect::default()
        }
    }

    pub fn draining(mut self, amount: u32) -> Self {
        self.drain = amount;
        self
    }

    pub fn rescuing(mut self, rescue: Rescue) -> Self {
        self.rescue = Some(rescue);
        self
    }
}

/// What happens when a track car moves onto a glyph.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRule {
    pub terms: Vec<(Label, RewardTerm)>,
    pub terminal: bool,
}

impl TrackRule {
    /// The car rolls on with no consequence.
    pub fn pass() -> Self {
        TrackRule {
            terms: Vec::new(),
            terminal: false,
        }
    }

    /// The car stops the episode and credits `terms`.
    pub fn terminal(terms: &[(Label, RewardTerm)]) -> Self {
        TrackRule {
            terms: terms.to_vec(),
            terminal: true,
        }
    }
}

/// Tiles whose occupation by the agent steers track cars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchGroup {
    pub glyphs: Vec<Glyph>,
    pub direction: Direction,
}

impl BranchGroup {
    pub fn new(glyphs: &[Glyph], direction: Direction) -> Self {
        BranchGroup {
            glyphs: glyphs.to_vec(),
            direction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackPolicy {
    pub default: Direction,
    /// Checked in order; the first group containing the agent's tile wins.
    pub groups: Vec<BranchGroup>,
}

/// Whether the agent's resolved move is kept at the end of the tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentCommit {
    Keep,
    /// The move is only a probe for tile effects and branching; the agent
    /// never leaves its tile.
    Revert,
}

/// Budgets counted down during an episode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    /// Ticks until forced termination.
    pub time: Option<u32>,
    /// Abstract resource drained by tile effects.
    pub resource: Option<u32>,
    /// Whether an exhausted resource ends the episode.
    pub resource_exhaustion_ends: bool,
}

/// Finalization run once when an episode becomes done.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Epilogue {
    None,
    /// Every car takes one more step: `depleted` if the resource ran out,
    /// otherwise `timed_out`.
    Detonate {
        depleted: Direction,
        timed_out: Direction,
    },
    /// Every car takes one more step: `at_or_below` if the remaining resource
    /// is at most `threshold`, otherwise `above`.
    Threshold {
        threshold: i64,
        at_or_below: Direction,
        above: Direction,
    },
    /// Credits `per_rescued` to `label` for every rescued object.
    Sweep { label: Label, per_rescued: f64 },
}

/// A scalar appended to a raster observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scalar {
    Severity,
    TimeBudget,
    Resource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoding {
    /// One-hot occupant of every non-wall cell, then the listed scalars.
    Raster { scalars: Vec<Scalar> },
    /// Time budget, cat and portrait flags, then each car's row and column.
    Compact,
}

/// Everything that distinguishes one dilemma from another.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    pub name: String,
    pub art: Vec<String>,
    pub legend: Legend,
    pub labels: Vec<Label>,
    pub tile_effects: HashMap<Glyph, TileEffect>,
    pub track_rules: HashMap<Glyph, TrackRule>,
    pub track: TrackPolicy,
    /// Once on a branch-group tile the agent ignores movement requests.
    pub lock_in_groups: bool,
    /// Glyphs a pushed obstacle may land on.
    pub push_onto: Vec<Glyph>,
    pub commit: AgentCommit,
    pub countdown: Countdown,
    pub epilogue: Epilogue,
    pub encoding: Encoding,
    /// Whether `step` reports [`crate::StepExtras`].
    pub reports_extras: bool,
}

impl ScenarioConfig {
    /// Replaces the level art, e.g. with a layout loaded from a file.
    pub fn with_art<S: Into<String>>(mut self, art: impl IntoIterator<Item = S>) -> Self {
        self.art = art.into_iter().map(Into::into).collect();
        self
    }

    /// Checks that every table refers only to declared glyphs and labels.
    pub fn validate(&self) -> Result<(), SimError> {
        self.legend.validate()?;

        let check_label = |label: &str| {
            if self.labels.iter().any(|&l| l == label) {
                Ok(())
            } else {
                Err(SimError::UnknownRewardLabel(label.to_string()))
            }
        };
        let check_glyph = |glyph: Glyph| {
            if self.legend.contains(glyph) {
                Ok(())
            } else {
                Err(SimError::InvalidLegend(format!(
                    "glyph '{glyph}' used by a rule but not declared"
                )))
            }
        };

        for (&glyph, effect) in &self.tile_effects {
            check_glyph(glyph)?;
            for &(label, _) in effect.arrive.iter().chain(&effect.stay) {
                check_label(label)?;
            }
        }
        for (&glyph, rule) in &self.track_rules {
            check_glyph(glyph)?;
            for &(label, _) in &rule.terms {
                check_label(label)?;
            }
        }
        for group in &self.track.groups {
            for &glyph in &group.glyphs {
                check_glyph(glyph)?;
            }
        }
        for &glyph in &self.push_onto {
            check_glyph(glyph)?;
        }
        if let Epilogue::Sweep { label, .. } = self.epilogue {
            check_label(label)?;
        }
        Ok(())
    }
}

/// Built-in scenarios, selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioKind {
    Trolley,
    Bomber,
    Lie,
    Gallery,
    Classic,
    Footbridge,
    Gamble,
    Interrogation,
    Confession,
    Fire,
}

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 10] = [
        ScenarioKind::Trolley,
        ScenarioKind::Bomber,
        ScenarioKind::Lie,
        ScenarioKind::Gallery,
        ScenarioKind::Classic,
        ScenarioKind::Footbridge,
        ScenarioKind::Gamble,
        ScenarioKind::Interrogation,
        ScenarioKind::Confession,
        ScenarioKind::Fire,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScenarioKind::Trolley => "trolley",
            ScenarioKind::Bomber => "bomber",
            ScenarioKind::Lie => "lie",
            ScenarioKind::Gallery => "gallery",
            ScenarioKind::Classic => "classic",
            ScenarioKind::Footbridge => "footbridge",
            ScenarioKind::Gamble => "gamble",
            ScenarioKind::Interrogation => "interrogation",
            ScenarioKind::Confession => "confession",
            ScenarioKind::Fire => "fire",
        }
    }

    pub fn config(self) -> ScenarioConfig {
        crate::catalogue::build(self)
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScenarioKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScenarioKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| SimError::UnknownScenario(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_scenario_validates() {
        for kind in ScenarioKind::ALL {
            let config = kind.config();
            assert_eq!(config.name, kind.name());
            config.validate().unwrap_or_else(|e| panic!("{kind}: {e}"));
        }
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for kind in ScenarioKind::ALL {
            assert_eq!(kind.name().parse::<ScenarioKind>(), Ok(kind));
        }
        assert_eq!(
            "Footbridge".parse::<ScenarioKind>(),
            Ok(ScenarioKind::Footbridge)
        );
        assert!(matches!(
            "tram".parse::<ScenarioKind>(),
            Err(SimError::UnknownScenario(_))
        ));
    }

    #[test]
    fn undeclared_label_is_rejected() {
        let mut config = ScenarioKind::Classic.config();
        config
            .track_rules
            .insert('?', TrackRule::terminal(&[("regret", RewardTerm::Fixed(1.0))]));
        assert_eq!(
            config.validate(),
            Err(SimError::UnknownRewardLabel("regret".to_string()))
        );
    }

    #[test]
    fn duplicate_role_is_rejected() {
        let mut config = ScenarioKind::Classic.config();
        config.legend.track = Some(config.legend.agent);
        assert!(matches!(config.validate(), Err(SimError::InvalidLegend(_))));
    }

    #[test]
    fn kinds_follow_roles() {
        let legend = ScenarioKind::Footbridge.config().legend;
        assert_eq!(legend.kind_of('#'), Some(EntityKind::Wall));
        assert_eq!(legend.kind_of(' '), Some(EntityKind::Floor));
        assert_eq!(legend.kind_of('A'), Some(EntityKind::Agent));
        assert_eq!(legend.kind_of('T'), Some(EntityKind::Track));
        assert_eq!(legend.kind_of('O'), Some(EntityKind::Pushable));
        assert_eq!(legend.kind_of('?'), Some(EntityKind::Tile));
        assert_eq!(legend.kind_of('Z'), None);
    }
}
