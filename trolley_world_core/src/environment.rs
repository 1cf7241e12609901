use serde::{Deserialize, Serialize};

use crate::{
    Direction, Glyph,
    episode::{EpisodeState, run_epilogue},
    error::{SimError, UnmappedTilePolicy},
    level::parse_level,
    map::Grid,
    movement::{MoveOutcome, in_branch_group, resolve_move},
    observation::{self, ActionSpace, ObservationSpace},
    registry::PositionRegistry,
    reward::RewardVector,
    scenario::{AgentCommit, ScenarioConfig},
    severity::SeverityGenerator,
    track::advance_cars,
};

/// Construction-time knobs. Missing fields take their defaults when
/// deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvOptions {
    /// Replaces the scenario's time budget.
    pub time_budget: Option<u32>,
    /// Replaces the scenario's resource budget.
    pub resource_budget: Option<u32>,
    pub unmapped_tile: UnmappedTilePolicy,
    /// Declared upper bound of every observation value.
    pub observation_high: f32,
}

impl Default for EnvOptions {
    fn default() -> Self {
        EnvOptions {
            time_budget: None,
            resource_budget: None,
            unmapped_tile: UnmappedTilePolicy::default(),
            observation_high: 100.0,
        }
    }
}

/// Logging-only values reported by scenarios that declare them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepExtras {
    pub probability_counter: u32,
    pub severity: f64,
}

/// Everything one `step` returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    pub observation: Vec<f32>,
    pub reward: RewardVector,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<StepExtras>,
}

/// A single-agent grid-world dilemma driven by discrete actions.
pub struct TrolleyEnv {
    scenario: ScenarioConfig,
    severity: Box<dyn SeverityGenerator + Send>,
    options: EnvOptions,
    /// Parsed once at construction; every reset starts from a copy.
    initial: PositionRegistry,
    registry: PositionRegistry,
    state: EpisodeState,
    observation_len: usize,
}

impl std::fmt::Debug for TrolleyEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrolleyEnv")
            .field("scenario", &self.scenario.name)
            .field("registry", &self.registry)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl TrolleyEnv {
    /// Validates `scenario`, parses its art and starts the first episode.
    ///
    /// Level errors surface here, before any episode is played.
    pub fn new(
        mut scenario: ScenarioConfig,
        severity: impl SeverityGenerator + Send + 'static,
        options: EnvOptions,
    ) -> Result<Self, SimError> {
        if let Some(time) = options.time_budget {
            scenario.countdown.time = Some(time);
        }
        if let Some(resource) = options.resource_budget {
            scenario.countdown.resource = Some(resource);
        }
        scenario.validate()?;
        let initial = parse_level(&scenario.art, &scenario.legend)?;
        let observation_len =
            observation::observation_len(&scenario.encoding, &initial, &scenario.legend);

        let mut env = TrolleyEnv {
            state: EpisodeState::new(0.0, &scenario.countdown),
            registry: initial.clone(),
            initial,
            scenario,
            severity: Box::new(severity),
            options,
            observation_len,
        };
        env.reset(None)?;
        Ok(env)
    }

    /// Starts a new episode, drawing a severity unless one is given.
    pub fn reset(&mut self, severity: Option<f64>) -> Result<Vec<f32>, SimError> {
        let severity = severity.unwrap_or_else(|| self.severity.generate());
        self.check_bounds(severity)?;

        self.registry = self.initial.clone();
        self.state = EpisodeState::new(severity, &self.scenario.countdown);
        tracing::debug!(scenario = %self.scenario.name, severity, "episode reset");
        Ok(self.observation())
    }

    fn check_bounds(&self, severity: f64) -> Result<(), SimError> {
        let high = self.options.observation_high;
        if !severity.is_finite() || severity < 0.0 || severity > f64::from(high) {
            return Err(SimError::SeverityOutOfRange { severity, high });
        }
        let countdown = &self.scenario.countdown;
        for budget in [countdown.time, countdown.resource].into_iter().flatten() {
            if budget as f32 > high {
                return Err(SimError::BudgetOutOfRange { budget, high });
            }
        }
        Ok(())
    }

    /// Advances the episode by one tick.
    ///
    /// On error the environment is left exactly as it was before the call.
    pub fn step(&mut self, action: usize) -> Result<StepOutcome, SimError> {
        if self.state.done {
            return Err(SimError::EpisodeFinished);
        }
        let direction = Direction::from_index(action).ok_or(SimError::InvalidAction(action))?;
        let scenario = &self.scenario;
        let policy = self.options.unmapped_tile;

        let mut registry = self.registry.clone();
        let mut state = self.state.clone();
        let mut reward = RewardVector::zeroed(&scenario.labels);

        // Decide: resolve the move against the current registry.
        let plan = resolve_move(&registry, scenario, direction);
        if let Some(tile) = plan.tile() {
            match scenario.tile_effects.get(&tile) {
                Some(effect) => {
                    let stayed = matches!(plan.outcome, MoveOutcome::Locked { .. });
                    state.apply_tile_effect(effect, stayed, &mut reward);
                }
                None => policy.handle(tile, plan.agent_to)?,
            }
        }
        state.flags.pushed |= plan.pushed();

        // Commit: a reverted move still steers the cars from its target.
        if scenario.commit == AgentCommit::Keep {
            plan.commit(&mut registry);
        }
        let probe = plan.agent_to;
        if in_branch_group(&registry, scenario, probe) {
            state.probability_counter += 1;
        }

        let report = advance_cars(&mut registry, scenario, probe, state.severity, policy)?;
        state.flags.trial |= report.branched;
        reward += &report.reward;

        let out_of_budget = state.spend_tick(&scenario.countdown);
        if report.terminal || out_of_budget {
            state.done = true;
            reward += &run_epilogue(scenario, &mut registry, &state, policy)?;
            tracing::info!(
                scenario = %scenario.name,
                ticks = state.ticks,
                terminal = report.terminal,
                out_of_budget,
                "episode finished"
            );
        }
        tracing::trace!(?direction, outcome = ?plan.outcome, total = reward.total(), "step");

        let extras = scenario.reports_extras.then_some(StepExtras {
            probability_counter: state.probability_counter,
            severity: state.severity,
        });
        self.registry = registry;
        self.state = state;
        Ok(StepOutcome {
            observation: self.observation(),
            reward,
            done: self.state.done,
            extras,
        })
    }

    /// Encodes the current registry and episode scalars.
    pub fn observation(&self) -> Vec<f32> {
        observation::encode(
            &self.scenario.encoding,
            &self.registry,
            &self.scenario.legend,
            &self.state,
        )
    }

    pub fn render(&self) -> Grid<Glyph> {
        observation::render(&self.registry, &self.scenario.legend)
    }

    pub fn render_string(&self) -> String {
        self.render().to_text()
    }

    pub fn action_space(&self) -> ActionSpace {
        ActionSpace::Discrete(Direction::ALL.len())
    }

    pub fn observation_space(&self) -> ObservationSpace {
        ObservationSpace {
            low: 0.0,
            high: self.options.observation_high,
            len: self.observation_len,
        }
    }

    pub fn scenario(&self) -> &ScenarioConfig {
        &self.scenario
    }

    pub fn registry(&self) -> &PositionRegistry {
        &self.registry
    }

    pub fn state(&self) -> &EpisodeState {
        &self.state
    }

    pub fn options(&self) -> &EnvOptions {
        &self.options
    }

    pub fn is_done(&self) -> bool {
        self.state.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Position, ScenarioKind, severity::FixedSeverity};

    const DOWN: usize = 0;
    const UP: usize = 1;
    const RIGHT: usize = 2;
    const LEFT: usize = 3;

    fn env(kind: ScenarioKind, severity: f64) -> TrolleyEnv {
        TrolleyEnv::new(kind.config(), FixedSeverity(severity), EnvOptions::default()).unwrap()
    }

    #[test]
    fn reset_starts_a_clean_episode() {
        for kind in ScenarioKind::ALL {
            let env = env(kind, 3.0);
            assert!(!env.is_done());
            assert_eq!(env.observation().len(), env.observation_space().len);
            assert_eq!(env.action_space(), ActionSpace::Discrete(4));
        }
    }

    #[test]
    fn invalid_action_is_rejected_without_side_effects() {
        let mut env = env(ScenarioKind::Classic, 3.0);
        let before = env.render_string();
        assert_eq!(env.step(4), Err(SimError::InvalidAction(4)));
        assert_eq!(env.render_string(), before);
        assert_eq!(env.state().ticks, 0);
    }

    #[test]
    fn stepping_after_done_fails() {
        let mut env = env(ScenarioKind::Classic, 3.0);
        while !env.step(LEFT).unwrap().done {}
        assert_eq!(env.step(LEFT), Err(SimError::EpisodeFinished));
        env.reset(None).unwrap();
        assert!(env.step(LEFT).is_ok());
    }

    #[test]
    fn locked_agent_collects_stay_rewards() {
        let mut env = env(ScenarioKind::Trolley, 4.0);
        let first = env.step(RIGHT).unwrap();
        assert_eq!(first.reward.get("right"), Some(1.0));
        assert_eq!(first.reward.get("causal_harms"), Some(1.0));
        let second = env.step(LEFT).unwrap();
        assert_eq!(second.reward.get("right"), Some(1.0));
        assert_eq!(second.reward.get("causal_harms"), Some(0.0));
        assert_eq!(env.registry().agent(), Position::new(2, 2));
        let third = env.step(UP).unwrap();
        assert!(third.done);
        assert_eq!(third.reward.get("uncaused_harms"), Some(4.0));
        assert_eq!(env.registry().cars(), &[Position::new(5, 3)]);
        assert!(env.state().flags.trial);
        assert_eq!(env.state().probability_counter, 3);
    }

    #[test]
    fn reverted_probe_leaves_agent_at_console() {
        let mut env = env(ScenarioKind::Interrogation, 2.0);
        let start = env.registry().agent();
        let outcome = env.step(RIGHT).unwrap();
        assert_eq!(env.registry().agent(), start);
        assert_eq!(outcome.reward.get("torture"), Some(1.0));
        assert_eq!(env.state().resource, Some(2));
    }

    #[test]
    fn extras_only_for_declaring_scenarios() {
        let mut gamble = env(ScenarioKind::Gamble, 5.0);
        let extras = gamble.step(DOWN).unwrap().extras.unwrap();
        assert_eq!(extras.severity, 5.0);
        let mut classic = env(ScenarioKind::Classic, 5.0);
        assert_eq!(classic.step(DOWN).unwrap().extras, None);
    }

    #[test]
    fn out_of_range_severity_is_rejected() {
        let mut env = env(ScenarioKind::Classic, 3.0);
        assert!(matches!(
            env.reset(Some(101.0)),
            Err(SimError::SeverityOutOfRange { .. })
        ));
        assert!(matches!(
            env.reset(Some(f64::NAN)),
            Err(SimError::SeverityOutOfRange { .. })
        ));
        assert_eq!(env.state().severity, 3.0);
    }

    #[test]
    fn oversized_budget_is_rejected() {
        let options = EnvOptions {
            time_budget: Some(500),
            ..EnvOptions::default()
        };
        let err = TrolleyEnv::new(ScenarioKind::Fire.config(), FixedSeverity(1.0), options)
            .unwrap_err();
        assert_eq!(
            err,
            SimError::BudgetOutOfRange {
                budget: 500,
                high: 100.0
            }
        );
    }

    #[test]
    fn bad_level_fails_at_construction() {
        let config = ScenarioKind::Classic.config().with_art(["####", "#  #", "####"]);
        let err = TrolleyEnv::new(config, FixedSeverity(1.0), EnvOptions::default()).unwrap_err();
        assert!(matches!(err, SimError::Level(_)));
    }

    #[test]
    fn unmapped_tile_error_leaves_state_untouched() {
        let mut config = ScenarioKind::Classic.config();
        config.tile_effects.remove(&'S');
        let options = EnvOptions {
            unmapped_tile: UnmappedTilePolicy::Fail,
            ..EnvOptions::default()
        };
        let mut env = TrolleyEnv::new(config, FixedSeverity(1.0), options).unwrap();
        env.step(RIGHT).unwrap();
        env.step(RIGHT).unwrap();
        let registry = env.registry().clone();
        let state = env.state().clone();
        assert_eq!(
            env.step(RIGHT),
            Err(SimError::UnmappedTile {
                glyph: 'S',
                position: Position::new(1, 4)
            })
        );
        assert_eq!(env.registry(), &registry);
        assert_eq!(env.state(), &state);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: EnvOptions = serde_json::from_str(r#"{"time_budget": 4}"#).unwrap();
        assert_eq!(options.time_budget, Some(4));
        assert_eq!(options.resource_budget, None);
        assert_eq!(options.observation_high, 100.0);
        let options: EnvOptions = serde_json::from_str(r#"{"unmapped_tile": "warn"}"#).unwrap();
        assert_eq!(options.unmapped_tile, UnmappedTilePolicy::Warn);
    }
}
