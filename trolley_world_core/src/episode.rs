use serde::{Deserialize, Serialize};

use crate::{
    error::{SimError, UnmappedTilePolicy},
    registry::PositionRegistry,
    reward::RewardVector,
    scenario::{Countdown, Epilogue, Rescue, ScenarioConfig, TileEffect},
    track::move_car,
};

/// Persistent per-episode flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
    pub cat_rescued: bool,
    pub portrait_rescued: bool,
    pub pushed: bool,
    /// A branch group steered a track car at least once.
    pub trial: bool,
}

impl Flags {
    pub fn rescued(&self, rescue: Rescue) -> bool {
        match rescue {
            Rescue::Cat => self.cat_rescued,
            Rescue::Portrait => self.portrait_rescued,
        }
    }

    fn set_rescued(&mut self, rescue: Rescue) {
        match rescue {
            Rescue::Cat => self.cat_rescued = true,
            Rescue::Portrait => self.portrait_rescued = true,
        }
    }

    pub fn rescued_count(&self) -> u32 {
        u32::from(self.cat_rescued) + u32::from(self.portrait_rescued)
    }
}

/// Scalars and flags of one episode. Rebuilt on every reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeState {
    pub severity: f64,
    /// Remaining ticks; may reach or pass zero.
    pub time: Option<i64>,
    /// Remaining resource; may pass zero when drained by more than is left.
    pub resource: Option<i64>,
    pub flags: Flags,
    pub ticks: u32,
    /// Ticks on which the branch-deciding agent position was on a group tile.
    pub probability_counter: u32,
    pub done: bool,
}

impl EpisodeState {
    pub fn new(severity: f64, countdown: &Countdown) -> Self {
        EpisodeState {
            severity,
            time: countdown.time.map(i64::from),
            resource: countdown.resource.map(i64::from),
            flags: Flags::default(),
            ticks: 0,
            probability_counter: 0,
            done: false,
        }
    }

    pub fn resource_exhausted(&self) -> bool {
        self.resource.is_some_and(|r| r <= 0)
    }

    pub fn time_exhausted(&self) -> bool {
        self.time.is_some_and(|t| t <= 0)
    }

    /// Counts one tick against the time budget. Returns whether a budget now
    /// forces termination.
    pub fn spend_tick(&mut self, countdown: &Countdown) -> bool {
        self.ticks += 1;
        if let Some(time) = self.time.as_mut() {
            *time -= 1;
        }
        self.time_exhausted() || (countdown.resource_exhaustion_ends && self.resource_exhausted())
    }

    pub fn drain(&mut self, amount: u32) {
        if let Some(resource) = self.resource.as_mut() {
            *resource -= i64::from(amount);
        }
    }

    /// Applies the agent's tile effect. `stayed` selects the re-fire rewards
    /// of an agent that did not arrive this tick.
    pub fn apply_tile_effect(
        &mut self,
        effect: &TileEffect,
        stayed: bool,
        reward: &mut RewardVector,
    ) {
        let already_rescued = effect.rescue.is_some_and(|r| self.flags.rescued(r));
        if stayed || already_rescued {
            reward.credit_all(&effect.stay);
            return;
        }
        reward.credit_all(&effect.arrive);
        if effect.drain > 0 {
            self.drain(effect.drain);
        }
        if let Some(rescue) = effect.rescue {
            self.flags.set_rescued(rescue);
        }
    }
}

/// Resolves the delayed consequence once an episode is done.
///
/// Runs exactly once, on the transition into done. The rescue flags are only
/// read here; the sweep leaves them as they were.
pub fn run_epilogue(
    scenario: &ScenarioConfig,
    registry: &mut PositionRegistry,
    state: &EpisodeState,
    policy: UnmappedTilePolicy,
) -> Result<RewardVector, SimError> {
    let mut reward = RewardVector::zeroed(&scenario.labels);
    let direction = match scenario.epilogue {
        Epilogue::None => return Ok(reward),
        Epilogue::Sweep { label, per_rescued } => {
            let rescued = state.flags.rescued_count();
            reward.credit(label, per_rescued * f64::from(rescued));
            tracing::info!(rescued, "sweep epilogue settled");
            return Ok(reward);
        }
        Epilogue::Detonate {
            depleted,
            timed_out,
        } => {
            if state.resource_exhausted() {
                depleted
            } else {
                timed_out
            }
        }
        Epilogue::Threshold {
            threshold,
            at_or_below,
            above,
        } => {
            if state.resource.is_some_and(|r| r <= threshold) {
                at_or_below
            } else {
                above
            }
        }
    };

    for index in 0..registry.cars().len() {
        move_car(
            registry,
            scenario,
            index,
            direction,
            state.severity,
            policy,
            &mut reward,
        )?;
    }
    tracing::info!(?direction, "epilogue moved track cars");
    Ok(reward)
}
