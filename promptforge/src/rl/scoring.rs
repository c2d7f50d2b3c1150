// src/rl/scoring.rs
//
// Multi-factor scoring for prompt strategies.
//
// Step reward for a selection:
//   (eff_ctx + eff_stage) / 2
//     × 1.2  if the context type prefers the component
//     × 1.1  if the stage prefers it
//     × 1.15 if urgency is the highest level and the component is urgency-tagged
//     × 0.1
//
// Terminal effectiveness sums the mean combined effectiveness, preference and
// stage bonuses, compatibility, an efficiency bonus for short prompts and a
// psychology-alignment bonus, clamped to [0, 1].
//
// All functions are pure; the catalog is read-only input.

use serde::{Deserialize, Serialize};

use crate::catalog::{ComponentCatalog, ComponentId, PsychologyDimension, PsychologyVector};

use super::observation::EpisodeContext;

pub const CONTEXT_PREFERENCE_MULTIPLIER: f64 = 1.2;
pub const STAGE_PREFERENCE_MULTIPLIER: f64 = 1.1;
pub const URGENCY_MULTIPLIER: f64 = 1.15;
pub const STEP_REWARD_SCALE: f64 = 0.1;

pub const COMPATIBLE_PAIR_SCORE: f64 = 1.0;
pub const INCOMPATIBLE_PAIR_SCORE: f64 = -0.3;
pub const COMPATIBILITY_SCALE: f64 = 0.05;
/// Weight of the compatibility bonus inside the terminal score.
pub const TERMINAL_COMPATIBILITY_WEIGHT: f64 = 10.0;

pub const PREFERENCE_BONUS: f64 = 0.1;
pub const EFFICIENCY_BONUS_PER_SLOT: f64 = 0.05;

pub const PSYCHOLOGY_THRESHOLD: f64 = 0.6;
pub const PSYCHOLOGY_BONUS_PER_MATCH: f64 = 0.05;
pub const PSYCHOLOGY_BONUS_CAP: f64 = 0.2;

/// Reward for a rejected action (duplicate, out-of-range component/position).
pub const INVALID_ACTION_PENALTY: f64 = -0.1;

/// Which component tags each psychology dimension favours once it exceeds
/// `PSYCHOLOGY_THRESHOLD`.
pub const PSYCHOLOGY_RULES: [(PsychologyDimension, &[&str]); 5] = [
    (PsychologyDimension::Interest, &["value_proposition", "social_proof"]),
    (PsychologyDimension::Urgency, &["urgency_creation", "appointment_booking"]),
    (PsychologyDimension::Availability, &["appointment_booking"]),
    (PsychologyDimension::Trust, &["appointment_booking", "value_proposition"]),
    (PsychologyDimension::Commitment, &["appointment_booking", "follow_up"]),
];

/// Every term of the terminal score, for telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub avg_effectiveness: f64,
    pub preference_bonus: f64,
    pub stage_bonus: f64,
    /// Already scaled by `TERMINAL_COMPATIBILITY_WEIGHT`.
    pub compatibility_bonus: f64,
    pub efficiency_bonus: f64,
    pub psychology_bonus: f64,
    /// Unclamped sum of all terms.
    pub raw_total: f64,
    /// `raw_total` clamped to [0, 1].
    pub score: f64,
}

/// Scoring functions bound to a catalog and a prompt-length limit.
#[derive(Debug, Clone, Copy)]
pub struct ScoringModel<'a> {
    catalog: &'a ComponentCatalog,
    max_prompt_length: usize,
}

impl<'a> ScoringModel<'a> {
    pub fn new(catalog: &'a ComponentCatalog, max_prompt_length: usize) -> Self {
        Self {
            catalog,
            max_prompt_length,
        }
    }

    /// Immediate reward for selecting `component` in `ctx`. Zero for unknown ids.
    pub fn component_reward(&self, component: ComponentId, ctx: &EpisodeContext) -> f64 {
        let Some(comp) = self.catalog.component(component) else {
            return 0.0;
        };
        let mut value = comp.combined_effectiveness(ctx.context_type, ctx.stage);

        if self
            .catalog
            .context_type(ctx.context_type)
            .is_some_and(|c| c.preferred_components.contains(&component))
        {
            value *= CONTEXT_PREFERENCE_MULTIPLIER;
        }
        if self
            .catalog
            .stage(ctx.stage)
            .is_some_and(|s| s.preferred_components.contains(&component))
        {
            value *= STAGE_PREFERENCE_MULTIPLIER;
        }
        if ctx.urgency == self.catalog.high_urgency() && self.catalog.is_urgency_tagged(component) {
            value *= URGENCY_MULTIPLIER;
        }

        value * STEP_REWARD_SCALE
    }

    /// Mean directed pair score over ordered pairs of distinct positions,
    /// scaled by `COMPATIBILITY_SCALE`. Zero for fewer than two components.
    pub fn compatibility_bonus(&self, selected: &[ComponentId]) -> f64 {
        if selected.len() < 2 {
            return 0.0;
        }

        let mut total = 0.0;
        let mut pairs = 0usize;
        for (i, &a) in selected.iter().enumerate() {
            for (j, &b) in selected.iter().enumerate() {
                if i == j {
                    continue;
                }
                let compatible = self
                    .catalog
                    .component(a)
                    .is_some_and(|c| c.is_compatible_with(b));
                total += if compatible {
                    COMPATIBLE_PAIR_SCORE
                } else {
                    INCOMPATIBLE_PAIR_SCORE
                };
                pairs += 1;
            }
        }

        (total / pairs as f64) * COMPATIBILITY_SCALE
    }

    /// Psychology-alignment bonus, capped at `PSYCHOLOGY_BONUS_CAP`.
    pub fn psychology_bonus(&self, selected: &[ComponentId], psychology: &PsychologyVector) -> f64 {
        let mut bonus = 0.0;
        for &id in selected {
            let Some(comp) = self.catalog.component(id) else {
                continue;
            };
            for (dim, tags) in PSYCHOLOGY_RULES {
                if psychology[dim.index()] > PSYCHOLOGY_THRESHOLD && tags.iter().any(|t| comp.has_tag(t)) {
                    bonus += PSYCHOLOGY_BONUS_PER_MATCH;
                }
            }
        }
        bonus.min(PSYCHOLOGY_BONUS_CAP)
    }

    pub fn score_breakdown(
        &self,
        selected: &[ComponentId],
        ctx: &EpisodeContext,
        psychology: &PsychologyVector,
    ) -> ScoreBreakdown {
        if selected.is_empty() {
            return ScoreBreakdown::default();
        }

        let n = selected.len() as f64;
        let avg_effectiveness = selected
            .iter()
            .filter_map(|&id| self.catalog.component(id))
            .map(|c| c.combined_effectiveness(ctx.context_type, ctx.stage))
            .sum::<f64>()
            / n;

        let context_preferred = self
            .catalog
            .context_type(ctx.context_type)
            .map(|c| &c.preferred_components);
        let stage_preferred = self.catalog.stage(ctx.stage).map(|s| &s.preferred_components);

        let preference_bonus = selected
            .iter()
            .filter(|&&id| context_preferred.is_some_and(|p| p.contains(&id)))
            .count() as f64
            * PREFERENCE_BONUS;
        let stage_bonus = selected
            .iter()
            .filter(|&&id| stage_preferred.is_some_and(|p| p.contains(&id)))
            .count() as f64
            * PREFERENCE_BONUS;

        let compatibility_bonus = self.compatibility_bonus(selected) * TERMINAL_COMPATIBILITY_WEIGHT;
        let efficiency_bonus = self.max_prompt_length.saturating_sub(selected.len()) as f64
            * EFFICIENCY_BONUS_PER_SLOT;
        let psychology_bonus = self.psychology_bonus(selected, psychology);

        let raw_total = avg_effectiveness
            + preference_bonus
            + stage_bonus
            + compatibility_bonus
            + efficiency_bonus
            + psychology_bonus;

        ScoreBreakdown {
            avg_effectiveness,
            preference_bonus,
            stage_bonus,
            compatibility_bonus,
            efficiency_bonus,
            psychology_bonus,
            raw_total,
            score: raw_total.clamp(0.0, 1.0),
        }
    }

    /// Terminal effectiveness in [0, 1]; 0 for an empty selection.
    pub fn final_effectiveness(
        &self,
        selected: &[ComponentId],
        ctx: &EpisodeContext,
        psychology: &PsychologyVector,
    ) -> f64 {
        self.score_breakdown(selected, ctx, psychology).score
    }
}
