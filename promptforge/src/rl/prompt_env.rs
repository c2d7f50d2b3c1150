// src/rl/prompt_env.rs
//
// Gym-style prompt-construction process.
//
// - PromptEnv: one episodic decision process (reset, step)
// - VecPromptEnv: N independent processes over one shared catalog
// - Deterministic execution given seeds
//
// Episode lifecycle: reset() fixes the context and psychology vector, step()
// grows an ordered, duplicate-free selection. The episode ends on the step
// that finishes, or on the first step taken once the turn budget is spent or
// the selection is full. That step's reward is the terminal effectiveness.
//
// Invalid actions are ordinary transitions: reward INVALID_ACTION_PENALTY,
// turn + 1, selection unchanged. Nothing in step() can fail or panic.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{CatalogKind, ComponentCatalog, ComponentId, PsychologyVector, PSYCHOLOGY_DIMS};
use crate::config::ProcessConfig;
use crate::error::ProcessError;

use super::action_encoding::{ActionCodec, DecodedAction};
use super::context_rand::ContextSampler;
use super::observation::{EpisodeContext, Observation};
use super::scoring::{ScoreBreakdown, ScoringModel, INVALID_ACTION_PENALTY};

/// Why an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// The decision-maker chose to finish.
    Finished,
    /// `turn` reached `max_turns` (truncation).
    TurnBudgetExhausted,
    /// The selection reached `max_prompt_length`.
    SelectionFull,
    /// step() was called on a terminal episode.
    EpisodeAlreadyDone,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::Finished => "finished",
            TerminationReason::TurnBudgetExhausted => "turn_budget_exhausted",
            TerminationReason::SelectionFull => "selection_full",
            TerminationReason::EpisodeAlreadyDone => "episode_already_done",
        }
    }
}

/// Why a selection was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidAction {
    AlreadySelected,
    ComponentOutOfRange,
    PositionOutOfRange,
}

/// Result of a single step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// The observation after taking the action.
    pub observation: Observation,
    pub reward: f64,
    /// Episode ended on its own terms (finish or full selection).
    pub terminated: bool,
    /// Episode ended because the turn budget ran out.
    pub truncated: bool,
    pub info: StepInfo,
}

impl StepResult {
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Additional information returned from a step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepInfo {
    pub termination_reason: Option<TerminationReason>,
    /// The decoded action this step applied.
    pub action: Option<DecodedAction>,
    pub invalid_action: Option<InvalidAction>,
    /// Terminal effectiveness, set on the step that ends the episode.
    pub final_effectiveness: Option<f64>,
    pub score_breakdown: Option<ScoreBreakdown>,
    pub components_used: usize,
    /// components_used / max(turn, 1).
    pub efficiency: f64,
    pub turn: usize,
}

/// Single prompt-construction decision process.
#[derive(Debug, Clone)]
pub struct PromptEnv {
    catalog: Arc<ComponentCatalog>,
    config: ProcessConfig,
    codec: ActionCodec,
    sampler: ContextSampler,
    seed: u64,
    context: EpisodeContext,
    psychology: PsychologyVector,
    selected: Vec<ComponentId>,
    turn: usize,
    done: bool,
    termination_reason: Option<TerminationReason>,
}

impl PromptEnv {
    /// Create a process seeded with 0 and reset to a sampled context.
    pub fn new(catalog: Arc<ComponentCatalog>, config: ProcessConfig) -> Result<Self, ProcessError> {
        Self::with_seed(catalog, config, 0)
    }

    /// Create a process and reset it with `seed`.
    pub fn with_seed(
        catalog: Arc<ComponentCatalog>,
        config: ProcessConfig,
        seed: u64,
    ) -> Result<Self, ProcessError> {
        config.validate()?;
        let codec = ActionCodec::new(
            config.codec,
            catalog.count(CatalogKind::Component),
            config.max_prompt_length,
        )?;
        let sampler = ContextSampler::new(config.context_rand.clone(), seed);

        let mut env = Self {
            catalog,
            config,
            codec,
            sampler,
            seed,
            context: EpisodeContext::new(0, 0, 0),
            psychology: [0.0; PSYCHOLOGY_DIMS],
            selected: Vec::new(),
            turn: 0,
            done: false,
            termination_reason: None,
        };
        env.reset(Some(seed), None)?;
        Ok(env)
    }

    /// Start a new episode.
    ///
    /// A supplied seed reseeds the process RNG; otherwise a seed is drawn from
    /// the current stream. A supplied context is used verbatim after range
    /// validation; otherwise each field is sampled uniformly.
    pub fn reset(
        &mut self,
        seed: Option<u64>,
        context: Option<EpisodeContext>,
    ) -> Result<Observation, ProcessError> {
        if let Some(ctx) = &context {
            ctx.validate(&self.catalog)?;
        }

        let seed = seed.unwrap_or_else(|| self.sampler.next_seed());
        self.sampler.reseed(seed);
        self.seed = seed;

        self.context = match context {
            Some(ctx) => ctx,
            None => self.sampler.sample_context(&self.catalog),
        };
        let weights = self
            .catalog
            .context_type(self.context.context_type)
            .map(|c| c.psychology_weights)
            .unwrap_or([0.0; PSYCHOLOGY_DIMS]);
        self.psychology = self.sampler.sample_psychology(&weights);

        self.selected.clear();
        self.turn = 0;
        self.done = false;
        self.termination_reason = None;

        debug!(
            seed,
            context_type = self.context.context_type,
            stage = self.context.stage,
            urgency = self.context.urgency,
            "episode reset"
        );

        Ok(self.observation())
    }

    /// Decode `action` with the configured codec and apply it.
    pub fn step(&mut self, action: usize) -> StepResult {
        let decoded = self.codec.decode(action);
        self.step_decoded(decoded)
    }

    /// Apply an already-decoded action. Out-of-range components or positions
    /// are penalised like any other invalid selection.
    ///
    /// Once `turn == max_turns` or the selection holds `max_prompt_length`
    /// components, any action ends the episode with the terminal score.
    pub fn step_decoded(&mut self, action: DecodedAction) -> StepResult {
        if self.done {
            return StepResult {
                observation: self.observation(),
                reward: 0.0,
                terminated: true,
                truncated: false,
                info: StepInfo {
                    termination_reason: Some(TerminationReason::EpisodeAlreadyDone),
                    action: Some(action),
                    ..self.base_info()
                },
            };
        }

        let reason = if action.finish {
            Some(TerminationReason::Finished)
        } else if self.turn >= self.config.max_turns {
            Some(TerminationReason::TurnBudgetExhausted)
        } else if self.selected.len() >= self.config.max_prompt_length {
            Some(TerminationReason::SelectionFull)
        } else {
            None
        };

        if let Some(reason) = reason {
            let breakdown = self.score_breakdown();
            self.finish_episode(reason);
            return StepResult {
                observation: self.observation(),
                reward: breakdown.score,
                terminated: reason != TerminationReason::TurnBudgetExhausted,
                truncated: reason == TerminationReason::TurnBudgetExhausted,
                info: StepInfo {
                    termination_reason: Some(reason),
                    action: Some(action),
                    final_effectiveness: Some(breakdown.score),
                    score_breakdown: Some(breakdown),
                    ..self.base_info()
                },
            };
        }

        let invalid = self.check_selection(&action);
        let reward = match invalid {
            Some(_) => INVALID_ACTION_PENALTY,
            None => self.apply_selection(&action),
        };
        self.turn += 1;

        StepResult {
            observation: self.observation(),
            reward,
            terminated: false,
            truncated: false,
            info: StepInfo {
                action: Some(action),
                invalid_action: invalid,
                ..self.base_info()
            },
        }
    }

    fn check_selection(&self, action: &DecodedAction) -> Option<InvalidAction> {
        if action.component >= self.catalog.count(CatalogKind::Component) {
            return Some(InvalidAction::ComponentOutOfRange);
        }
        if action
            .position
            .is_some_and(|p| p >= self.config.max_prompt_length)
        {
            return Some(InvalidAction::PositionOutOfRange);
        }
        if self.selected.contains(&action.component) {
            return Some(InvalidAction::AlreadySelected);
        }
        None
    }

    /// Insert the component and return the step reward.
    fn apply_selection(&mut self, action: &DecodedAction) -> f64 {
        match action.position {
            Some(p) => {
                let at = p.min(self.selected.len());
                self.selected.insert(at, action.component);
            }
            None => self.selected.push(action.component),
        }

        let scoring = self.scoring();
        let mut reward = scoring.component_reward(action.component, &self.context);
        if self.selected.len() > 1 {
            reward += scoring.compatibility_bonus(&self.selected);
        }
        reward
    }

    fn finish_episode(&mut self, reason: TerminationReason) {
        self.done = true;
        self.termination_reason = Some(reason);
        debug!(
            reason = reason.as_str(),
            turn = self.turn,
            components = self.selected.len(),
            "episode finished"
        );
    }

    fn base_info(&self) -> StepInfo {
        StepInfo {
            components_used: self.selected.len(),
            efficiency: self.efficiency(),
            turn: self.turn,
            ..StepInfo::default()
        }
    }

    /// Current observation.
    pub fn observation(&self) -> Observation {
        Observation::from_state(
            self.catalog.count(CatalogKind::Component),
            self.context,
            &self.selected,
            self.config.expose_psychology.then_some(self.psychology),
            self.turn,
            self.config.max_turns,
        )
    }

    pub fn scoring(&self) -> ScoringModel<'_> {
        ScoringModel::new(&self.catalog, self.config.max_prompt_length)
    }

    pub fn score_breakdown(&self) -> ScoreBreakdown {
        self.scoring()
            .score_breakdown(&self.selected, &self.context, &self.psychology)
    }

    /// Terminal effectiveness of the current selection.
    pub fn final_effectiveness(&self) -> f64 {
        self.score_breakdown().score
    }

    pub fn efficiency(&self) -> f64 {
        self.selected.len() as f64 / self.turn.max(1) as f64
    }

    pub fn catalog(&self) -> &Arc<ComponentCatalog> {
        &self.catalog
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    pub fn codec(&self) -> &ActionCodec {
        &self.codec
    }

    pub fn action_space_size(&self) -> usize {
        self.codec.action_space_size()
    }

    pub fn context(&self) -> EpisodeContext {
        self.context
    }

    pub fn psychology(&self) -> &PsychologyVector {
        &self.psychology
    }

    pub fn selected(&self) -> &[ComponentId] {
        &self.selected
    }

    pub fn turn(&self) -> usize {
        self.turn
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn termination_reason(&self) -> Option<TerminationReason> {
        self.termination_reason
    }
}

/// Vectorised processes for batched rollouts.
#[derive(Debug, Clone)]
pub struct VecPromptEnv {
    envs: Vec<PromptEnv>,
}

impl VecPromptEnv {
    /// Create N processes sharing `catalog`; process i is seeded with i.
    pub fn new(
        n: usize,
        catalog: Arc<ComponentCatalog>,
        config: ProcessConfig,
    ) -> Result<Self, ProcessError> {
        let envs = (0..n)
            .map(|i| PromptEnv::with_seed(Arc::clone(&catalog), config.clone(), i as u64))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { envs })
    }

    pub fn num_envs(&self) -> usize {
        self.envs.len()
    }

    /// Reset all processes with optional per-process seeds.
    ///
    /// Processes without a seed draw one from their own stream.
    pub fn reset_all(&mut self, seeds: Option<&[u64]>) -> Result<Vec<Observation>, ProcessError> {
        self.reset_all_with_context(seeds, None)
    }

    /// Reset all processes into the same fixed context.
    pub fn reset_all_with_context(
        &mut self,
        seeds: Option<&[u64]>,
        context: Option<EpisodeContext>,
    ) -> Result<Vec<Observation>, ProcessError> {
        self.envs
            .iter_mut()
            .enumerate()
            .map(|(i, env)| {
                let seed = seeds.and_then(|s| s.get(i).copied());
                env.reset(seed, context)
            })
            .collect()
    }

    /// Step all processes.
    ///
    /// # Panics
    /// If `actions.len()` differs from the number of processes.
    pub fn step(&mut self, actions: &[usize]) -> Vec<StepResult> {
        assert_eq!(
            actions.len(),
            self.envs.len(),
            "Actions length must match number of environments"
        );

        self.envs
            .iter_mut()
            .zip(actions.iter())
            .map(|(env, &action)| env.step(action))
            .collect()
    }

    pub fn envs(&self) -> &[PromptEnv] {
        &self.envs
    }

    pub fn seeds(&self) -> Vec<u64> {
        self.envs.iter().map(|e| e.seed()).collect()
    }

    pub fn dones(&self) -> Vec<bool> {
        self.envs.iter().map(|e| e.is_done()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodecKind;

    fn booking_env(config: ProcessConfig) -> PromptEnv {
        let catalog = Arc::new(ComponentCatalog::appointment_booking().unwrap());
        PromptEnv::new(catalog, config).unwrap()
    }

    #[test]
    fn test_env_reset_determinism() {
        let mut env1 = booking_env(ProcessConfig::default());
        let mut env2 = booking_env(ProcessConfig::default());
        let obs1 = env1.reset(Some(42), None).unwrap();
        let obs2 = env2.reset(Some(42), None).unwrap();
        assert_eq!(obs1.to_canonical_json().unwrap(), obs2.to_canonical_json().unwrap());
        assert_eq!(env1.psychology(), env2.psychology());
    }

    #[test]
    fn test_env_step_determinism() {
        let mut env1 = booking_env(ProcessConfig::default());
        let mut env2 = booking_env(ProcessConfig::default());
        env1.reset(Some(7), None).unwrap();
        env2.reset(Some(7), None).unwrap();
        for action in [0usize, 14, 26, 14, 40, 1] {
            let r1 = env1.step(action);
            let r2 = env2.step(action);
            assert_eq!(r1.reward, r2.reward);
            assert_eq!(r1.observation, r2.observation);
            assert_eq!(r1.done(), r2.done());
        }
    }

    #[test]
    fn test_duplicate_selection_penalised() {
        let mut env = booking_env(ProcessConfig::deterministic());
        env.reset(Some(1), None).unwrap();
        env.step(0);
        let result = env.step(0);
        assert_eq!(result.reward, INVALID_ACTION_PENALTY);
        assert_eq!(result.info.invalid_action, Some(InvalidAction::AlreadySelected));
        assert_eq!(env.selected(), &[0]);
        assert_eq!(env.turn(), 2);
    }

    #[test]
    fn test_out_of_range_decoded_actions() {
        let mut env = booking_env(ProcessConfig::deterministic());
        env.reset(Some(1), None).unwrap();

        let r = env.step_decoded(DecodedAction::select(0, 6));
        assert_eq!(r.reward, -0.1);
        assert_eq!(r.info.invalid_action, Some(InvalidAction::PositionOutOfRange));
        assert_eq!(env.turn(), 1);

        let r = env.step_decoded(DecodedAction::select(10, 0));
        assert_eq!(r.reward, -0.1);
        assert_eq!(r.info.invalid_action, Some(InvalidAction::ComponentOutOfRange));
        assert_eq!(env.turn(), 2);
        assert!(env.selected().is_empty());
    }

    #[test]
    fn test_positional_insert_clamps_to_len() {
        let mut env = booking_env(ProcessConfig::deterministic());
        env.reset(Some(1), None).unwrap();
        let codec = *env.codec();
        env.step(codec.encode(&DecodedAction::select(3, 5)).unwrap());
        env.step(codec.encode(&DecodedAction::select(1, 0)).unwrap());
        env.step(codec.encode(&DecodedAction::select(2, 1)).unwrap());
        assert_eq!(env.selected(), &[1, 2, 3]);
    }

    #[test]
    fn test_finish_returns_final_effectiveness() {
        let mut env = booking_env(ProcessConfig::deterministic());
        env.reset(Some(1), None).unwrap();
        env.step(0);
        let expected = env.final_effectiveness();
        let r = env.step(1);
        assert!(r.terminated);
        assert!(!r.truncated);
        assert_eq!(r.reward, expected);
        assert_eq!(r.info.termination_reason, Some(TerminationReason::Finished));
        assert_eq!(env.turn(), 1);
    }

    #[test]
    fn test_empty_finish_scores_zero() {
        let mut env = booking_env(ProcessConfig::default());
        env.reset(Some(3), None).unwrap();
        let r = env.step(1);
        assert!(r.terminated);
        assert_eq!(r.reward, 0.0);
    }

    #[test]
    fn test_step_after_done() {
        let mut env = booking_env(ProcessConfig::default());
        env.reset(Some(3), None).unwrap();
        env.step(1);
        let r = env.step(0);
        assert_eq!(r.reward, 0.0);
        assert!(r.terminated);
        assert_eq!(r.info.termination_reason, Some(TerminationReason::EpisodeAlreadyDone));
        assert!(env.selected().is_empty());
    }

    #[test]
    fn test_turn_budget_truncates_with_final_score() {
        let config = ProcessConfig::deterministic().with_max_turns(3);
        let mut env = booking_env(config);
        env.reset(Some(5), None).unwrap();
        env.step(0);
        env.step(0);
        let r = env.step(0);
        assert!(!r.done());
        assert_eq!(r.reward, INVALID_ACTION_PENALTY);
        assert_eq!(env.turn(), 3);

        let expected = env.final_effectiveness();
        assert!(expected > 0.0);
        let r = env.step(0);
        assert!(r.truncated);
        assert!(!r.terminated);
        assert_eq!(r.reward, expected);
        assert_eq!(r.info.final_effectiveness, Some(expected));
        assert_eq!(r.info.termination_reason, Some(TerminationReason::TurnBudgetExhausted));
        assert_eq!(env.turn(), 3);

        let r = env.step(0);
        assert_eq!(r.reward, 0.0);
        assert_eq!(r.info.termination_reason, Some(TerminationReason::EpisodeAlreadyDone));
    }

    #[test]
    fn test_full_selection_terminates_with_final_score() {
        let config = ProcessConfig::deterministic().with_max_prompt_length(2);
        let mut env = booking_env(config);
        env.reset(Some(5), None).unwrap();
        let codec = *env.codec();
        env.step(codec.select_action(0, 0).unwrap());
        let r = env.step(codec.select_action(1, 1).unwrap());
        assert!(!r.done());
        assert!(r.info.final_effectiveness.is_none());
        assert_eq!(r.info.components_used, 2);

        let expected = env.final_effectiveness();
        let r = env.step(codec.select_action(2, 0).unwrap());
        assert!(r.terminated);
        assert!(!r.truncated);
        assert_eq!(r.reward, expected);
        assert_eq!(r.info.termination_reason, Some(TerminationReason::SelectionFull));
        assert_eq!(env.selected(), &[0, 1]);
    }

    #[test]
    fn test_oversized_prompt_length_rejected_at_construction() {
        let catalog = Arc::new(ComponentCatalog::appointment_booking().unwrap());
        let config = ProcessConfig::default().with_max_prompt_length(usize::MAX / 2 + 1);
        assert!(config.validate().is_ok());
        let err = PromptEnv::new(catalog, config).unwrap_err();
        assert!(matches!(
            err,
            ProcessError::InvalidConfig { field: "max_prompt_length", .. }
        ));
    }

    #[test]
    fn test_reset_with_context() {
        let mut env = booking_env(ProcessConfig::deterministic());
        let ctx = EpisodeContext::new(2, 3, 2);
        let obs = env.reset(Some(9), Some(ctx)).unwrap();
        assert_eq!(obs.context, ctx);
        assert_eq!(env.psychology(), &[0.6, 0.5, 0.8, 0.45, 0.5]);

        let err = env.reset(None, Some(EpisodeContext::new(6, 0, 0))).unwrap_err();
        assert!(matches!(
            err,
            ProcessError::ContextOutOfRange {
                field: "context_type",
                ..
            }
        ));
    }

    #[test]
    fn test_select_or_finish_codec() {
        let config = ProcessConfig::deterministic().with_codec(CodecKind::SelectOrFinish);
        let mut env = booking_env(config);
        env.reset(Some(2), None).unwrap();
        assert_eq!(env.action_space_size(), 11);
        env.step(4);
        env.step(2);
        assert_eq!(env.selected(), &[4, 2]);
        let r = env.step(10);
        assert!(r.terminated);
    }

    #[test]
    fn test_hidden_psychology() {
        let mut config = ProcessConfig::default();
        config.expose_psychology = false;
        let mut env = booking_env(config);
        let obs = env.reset(Some(2), None).unwrap();
        assert!(obs.psychology.is_none());
    }

    #[test]
    fn test_vec_env() {
        let catalog = Arc::new(ComponentCatalog::appointment_booking().unwrap());
        let mut venv = VecPromptEnv::new(3, catalog, ProcessConfig::default()).unwrap();
        assert_eq!(venv.num_envs(), 3);
        venv.reset_all(Some(&[10, 11, 12])).unwrap();
        assert_eq!(venv.seeds(), vec![10, 11, 12]);
        let results = venv.step(&[1, 0, 1]);
        assert_eq!(results.len(), 3);
        assert_eq!(venv.dones(), vec![true, false, true]);
    }

    #[test]
    fn test_vec_env_reset_propagates_context_error() {
        let catalog = Arc::new(ComponentCatalog::appointment_booking().unwrap());
        let mut venv = VecPromptEnv::new(2, catalog, ProcessConfig::default()).unwrap();
        let obs = venv
            .reset_all_with_context(None, Some(EpisodeContext::new(1, 2, 0)))
            .unwrap();
        assert!(obs.iter().all(|o| o.context == EpisodeContext::new(1, 2, 0)));

        let err = venv
            .reset_all_with_context(Some(&[1, 2]), Some(EpisodeContext::new(0, 4, 0)))
            .unwrap_err();
        assert!(matches!(err, ProcessError::ContextOutOfRange { field: "stage", .. }));
    }
}
