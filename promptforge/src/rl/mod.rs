// src/rl/mod.rs
//
// The prompt-construction decision process and its RL-facing surface.
//
// Key components:
// - ActionCodec: versioned integer action encoding (positional or
//   select-or-finish)
// - ScoringModel: step rewards, compatibility and terminal effectiveness
// - PromptEnv: Gym-style episodic process (reset, step)
// - VecPromptEnv: vectorised processes over one shared catalog
// - ContextSampler: seeded context and psychology randomisation
// - Observation: versioned, serializable state snapshot for policy input
// - Policy: trait for decision-makers, with random and greedy baselines
// - run_episode / run_episodes_parallel: rollout drivers
// - evaluation: per-context-type aggregates and fixed-strategy comparison

pub mod action_encoding;
pub mod context_rand;
pub mod evaluation;
pub mod observation;
pub mod policy;
pub mod prompt_env;
pub mod rollout;
pub mod scoring;

// Re-exports for convenience
pub use action_encoding::{ActionCodec, ActionEncodingSpec, DecodedAction, ACTION_VERSION};
pub use context_rand::ContextSampler;
pub use evaluation::{
    builtin_strategies, compare_strategies, context_type_episodes, evaluate_by_context_type,
    ContextTypeReport, EffectivenessStats, FixedStrategy, StrategyComparison, BUILTIN_STRATEGIES,
};
pub use observation::{feature_dim, EpisodeContext, Observation, OBS_VERSION};
pub use policy::{GreedyPolicy, Policy, RandomPolicy, GREEDY_POLICY_VERSION, RANDOM_POLICY_VERSION};
pub use prompt_env::{InvalidAction, PromptEnv, StepInfo, StepResult, TerminationReason, VecPromptEnv};
pub use rollout::{run_episode, run_episodes_parallel, EpisodeConfig, EpisodeSummary};
pub use scoring::{ScoreBreakdown, ScoringModel, INVALID_ACTION_PENALTY};
