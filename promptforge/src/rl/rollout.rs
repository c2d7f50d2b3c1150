// src/rl/rollout.rs
//
// Episode runners.
//
// - run_episode: drive one PromptEnv with one Policy to termination
// - run_episodes_parallel: spread episodes over scoped worker threads, each
//   with its own process and policy over one shared catalog
//
// Every episode is reset with its own seed and the policy is re-seeded per
// episode, so summaries do not depend on how episodes land on workers.

use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{ComponentCatalog, ComponentId};
use crate::config::ProcessConfig;
use crate::error::ProcessError;

use super::observation::EpisodeContext;
use super::policy::Policy;
use super::prompt_env::{PromptEnv, TerminationReason};
use super::scoring::ScoreBreakdown;

/// Per-episode settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodeConfig {
    /// Random seed for the episode.
    pub seed: u64,
    /// Episode ID for logging.
    pub episode_id: u64,
    /// Fixed context; sampled from the seed when None.
    pub context: Option<EpisodeContext>,
}

impl EpisodeConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_episode_id(mut self, episode_id: u64) -> Self {
        self.episode_id = episode_id;
        self
    }

    pub fn with_context(mut self, context: EpisodeContext) -> Self {
        self.context = Some(context);
        self
    }
}

/// Summary of a completed episode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EpisodeSummary {
    pub episode_id: u64,
    pub seed: u64,
    pub policy_version: String,
    pub context: EpisodeContext,
    /// Final selection in prompt order.
    pub selected: Vec<ComponentId>,
    pub steps: usize,
    pub total_reward: f64,
    pub invalid_actions: usize,
    pub final_effectiveness: f64,
    pub score_breakdown: ScoreBreakdown,
    pub termination_reason: TerminationReason,
}

/// Run one episode to termination.
pub fn run_episode(
    env: &mut PromptEnv,
    policy: &mut dyn Policy,
    config: &EpisodeConfig,
) -> Result<EpisodeSummary, ProcessError> {
    let mut obs = env.reset(Some(config.seed), config.context)?;
    policy.reset_episode(config.seed, config.episode_id);

    let mut steps = 0usize;
    let mut total_reward = 0.0;
    let mut invalid_actions = 0usize;

    // Every non-finish step advances the turn, so the loop is bounded by
    // max_turns + 1 iterations.
    let (termination_reason, final_effectiveness, score_breakdown) = loop {
        let result = env.step(policy.act(&obs));
        steps += 1;
        total_reward += result.reward;
        if result.info.invalid_action.is_some() {
            invalid_actions += 1;
        }
        if result.done() {
            let reason = result
                .info
                .termination_reason
                .unwrap_or(TerminationReason::Finished);
            let breakdown = result
                .info
                .score_breakdown
                .unwrap_or_else(|| env.score_breakdown());
            break (reason, breakdown.score, breakdown);
        }
        obs = result.observation;
    };

    debug!(
        episode_id = config.episode_id,
        seed = config.seed,
        steps,
        total_reward,
        final_effectiveness,
        "episode complete"
    );

    Ok(EpisodeSummary {
        episode_id: config.episode_id,
        seed: config.seed,
        policy_version: policy.version().to_string(),
        context: env.context(),
        selected: env.selected().to_vec(),
        steps,
        total_reward,
        invalid_actions,
        final_effectiveness,
        score_breakdown,
        termination_reason,
    })
}

/// Run `episodes` on up to `workers` threads. Results are in episode order.
///
/// `make_policy` builds one policy per worker from that worker's process.
pub fn run_episodes_parallel<F>(
    catalog: Arc<ComponentCatalog>,
    config: &ProcessConfig,
    episodes: &[EpisodeConfig],
    workers: usize,
    make_policy: F,
) -> Result<Vec<EpisodeSummary>, ProcessError>
where
    F: Fn(&PromptEnv) -> Box<dyn Policy> + Sync,
{
    config.validate()?;
    if episodes.is_empty() {
        return Ok(Vec::new());
    }

    let workers = workers.clamp(1, episodes.len());
    let chunk_size = episodes.len().div_ceil(workers);
    let make_policy = &make_policy;

    thread::scope(|s| {
        let handles: Vec<_> = episodes
            .chunks(chunk_size)
            .map(|chunk| {
                let catalog = Arc::clone(&catalog);
                let config = config.clone();
                s.spawn(move || -> Result<Vec<EpisodeSummary>, ProcessError> {
                    let mut env = PromptEnv::new(catalog, config)?;
                    let mut policy = make_policy(&env);
                    chunk
                        .iter()
                        .map(|episode| run_episode(&mut env, policy.as_mut(), episode))
                        .collect()
                })
            })
            .collect();

        let mut summaries = Vec::with_capacity(episodes.len());
        for handle in handles {
            match handle.join() {
                Ok(chunk) => summaries.extend(chunk?),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        Ok(summaries)
    })
}
