use crate::{Glyph, Position, level::LevelError};

/// Errors surfaced by environment construction, `reset` and `step`.
///
/// Every failure is local to the call that produced it: a failed `step`
/// leaves the environment exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    #[error(transparent)]
    Level(#[from] LevelError),
    #[error("No rule for glyph '{glyph}' entered at {position}")]
    UnmappedTile { glyph: Glyph, position: Position },
    #[error("Action index {0} is not one of 0..4")]
    InvalidAction(usize),
    #[error("Episode is finished; reset before stepping again")]
    EpisodeFinished,
    #[error("Reward label '{0}' is not declared by the scenario")]
    UnknownRewardLabel(String),
    #[error("Invalid legend: {0}")]
    InvalidLegend(String),
    #[error("Severity {severity} is outside the observation range 0..={high}")]
    SeverityOutOfRange { severity: f64, high: f32 },
    #[error("Budget {budget} exceeds the observation bound {high}")]
    BudgetOutOfRange { budget: u32, high: f32 },
    #[error("Unknown scenario '{0}'")]
    UnknownScenario(String),
}

/// What to do when an entity lands on a glyph no rule covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnmappedTilePolicy {
    /// Abort the step with [`SimError::UnmappedTile`].
    Fail,
    /// Log a warning and count the transition as contributing nothing.
    Warn,
}

impl Default for UnmappedTilePolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            UnmappedTilePolicy::Fail
        } else {
            UnmappedTilePolicy::Warn
        }
    }
}

impl UnmappedTilePolicy {
    pub(crate) fn handle(self, glyph: Glyph, position: Position) -> Result<(), SimError> {
        match self {
            UnmappedTilePolicy::Fail => Err(SimError::UnmappedTile { glyph, position }),
            UnmappedTilePolicy::Warn => {
                tracing::warn!(%glyph, %position, "no rule for tile; contribution dropped");
                Ok(())
            }
        }
    }
}
