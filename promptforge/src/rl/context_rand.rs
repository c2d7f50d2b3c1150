// src/rl/context_rand.rs
//
// Seeded sampling of episode contexts and psychology noise.
//
// Given the same seed and config, the sampler produces the same sequence of
// contexts and psychology vectors. ChaCha8 keeps the stream stable across
// platforms.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use crate::catalog::{CatalogKind, ComponentCatalog, PsychologyVector, PSYCHOLOGY_DIMS};
use crate::config::ContextRandConfig;

use super::observation::EpisodeContext;

/// Deterministic sampler for per-episode randomisation.
#[derive(Debug, Clone)]
pub struct ContextSampler {
    config: ContextRandConfig,
    rng: ChaCha8Rng,
}

impl ContextSampler {
    pub fn new(config: ContextRandConfig, seed: u64) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    /// Draw a fresh seed from the current stream.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.gen()
    }

    /// Uniformly sample a context type, stage and urgency level.
    pub fn sample_context(&mut self, catalog: &ComponentCatalog) -> EpisodeContext {
        EpisodeContext {
            context_type: self.sample_index(catalog.count(CatalogKind::ContextType)),
            stage: self.sample_index(catalog.count(CatalogKind::Stage)),
            urgency: self.sample_index(catalog.count(CatalogKind::UrgencyLevel)),
        }
    }

    /// `clamp(weights + noise, 0, 1)` per dimension. Noise is Normal(0, std)
    /// truncated to ±bound. Deterministic configs consume no randomness.
    pub fn sample_psychology(&mut self, weights: &PsychologyVector) -> PsychologyVector {
        let mut out = *weights;
        if !self.config.is_deterministic() {
            if let Ok(normal) = Normal::new(0.0, self.config.psychology_noise_std) {
                let bound = self.config.psychology_noise_bound;
                for v in out.iter_mut() {
                    let noise: f64 = normal.sample(&mut self.rng);
                    *v += noise.clamp(-bound, bound);
                }
            }
        }
        for v in out.iter_mut() {
            *v = v.clamp(0.0, 1.0);
        }
        out
    }

    /// Independent Uniform[0, 1) draw per dimension, ignoring any catalog
    /// weights.
    pub fn sample_uniform_psychology(&mut self) -> PsychologyVector {
        let mut out = [0.0; PSYCHOLOGY_DIMS];
        for v in out.iter_mut() {
            *v = self.rng.gen();
        }
        out
    }

    pub fn config(&self) -> &ContextRandConfig {
        &self.config
    }

    fn sample_index(&mut self, len: usize) -> usize {
        if len <= 1 {
            0
        } else {
            self.rng.gen_range(0..len)
        }
    }
}
