// src/rl/policy.rs
//
// Policy trait and baseline decision-makers.
//
// - Policy trait: integer actions from observations
// - RandomPolicy: uniform over the action space (seeded ChaCha8)
// - GreedyPolicy: one-step lookahead on terminal effectiveness; finishes as
//   soon as no remaining component improves the score

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::catalog::{ComponentCatalog, ComponentId, PSYCHOLOGY_DIMS};

use super::action_encoding::ActionCodec;
use super::observation::Observation;
use super::scoring::ScoringModel;

pub const RANDOM_POLICY_VERSION: &str = "random-v1.0.0";
pub const GREEDY_POLICY_VERSION: &str = "greedy-v1.0.0";

/// A decision-maker for the prompt-construction process.
pub trait Policy: Send {
    /// Unique version string for this policy implementation.
    fn version(&self) -> &str;

    /// Choose an action for the current observation.
    fn act(&mut self, obs: &Observation) -> usize;

    /// Reset the policy for a new episode.
    ///
    /// The seed enables deterministic episode sequences.
    fn reset_episode(&mut self, seed: u64, episode_id: u64);
}

/// Uniformly random actions.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    action_space_size: usize,
    rng: ChaCha8Rng,
}

impl RandomPolicy {
    pub fn new(action_space_size: usize, seed: u64) -> Self {
        Self {
            action_space_size,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Policy for RandomPolicy {
    fn version(&self) -> &str {
        RANDOM_POLICY_VERSION
    }

    fn act(&mut self, _obs: &Observation) -> usize {
        self.rng.gen_range(0..self.action_space_size.max(1))
    }

    fn reset_episode(&mut self, seed: u64, episode_id: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed ^ episode_id.rotate_left(32));
    }
}

/// Greedy one-step lookahead on `final_effectiveness`.
#[derive(Debug, Clone)]
pub struct GreedyPolicy {
    catalog: Arc<ComponentCatalog>,
    codec: ActionCodec,
    max_prompt_length: usize,
}

impl GreedyPolicy {
    pub fn new(catalog: Arc<ComponentCatalog>, codec: ActionCodec, max_prompt_length: usize) -> Self {
        Self {
            catalog,
            codec,
            max_prompt_length,
        }
    }

    /// Best next component and its score, if any improves on the current one.
    pub fn best_addition(&self, obs: &Observation) -> Option<(ComponentId, f64)> {
        if obs.selected.len() >= self.max_prompt_length {
            return None;
        }
        let scoring = ScoringModel::new(&self.catalog, self.max_prompt_length);
        let psychology = obs.psychology.unwrap_or([0.0; PSYCHOLOGY_DIMS]);
        let current = scoring.final_effectiveness(&obs.selected, &obs.context, &psychology);

        let mut candidate = obs.selected.clone();
        let mut best: Option<(ComponentId, f64)> = None;
        for comp in self.catalog.components() {
            if obs.is_selected(comp.id) {
                continue;
            }
            candidate.push(comp.id);
            let score = scoring.final_effectiveness(&candidate, &obs.context, &psychology);
            candidate.pop();
            if score > current && best.map_or(true, |(_, s)| score > s) {
                best = Some((comp.id, score));
            }
        }
        best
    }
}

impl Policy for GreedyPolicy {
    fn version(&self) -> &str {
        GREEDY_POLICY_VERSION
    }

    fn act(&mut self, obs: &Observation) -> usize {
        self.best_addition(obs)
            .and_then(|(id, _)| self.codec.select_action(id, obs.selected.len()))
            .unwrap_or_else(|| self.codec.finish_action())
    }

    fn reset_episode(&mut self, _seed: u64, _episode_id: u64) {
        // Stateless
    }
}
