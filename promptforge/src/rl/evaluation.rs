// src/rl/evaluation.rs
//
// Offline evaluation on top of rollouts and the scoring model.
//
// - evaluate_by_context_type: effectiveness statistics and component usage of
//   finished episodes, grouped by context type
// - context_type_episodes: episode configs pinned to each context type, with
//   stage and urgency sampled from a seed
// - compare_strategies: score fixed component lists across sampled contexts
//   and uniformly random psychology vectors
//
// Every strategy is scored on the same sampled contexts, so comparisons are
// paired.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{CatalogKind, ComponentCatalog, ComponentId};
use crate::config::ContextRandConfig;
use crate::error::ProcessError;

use super::context_rand::ContextSampler;
use super::observation::EpisodeContext;
use super::rollout::{EpisodeConfig, EpisodeSummary};
use super::scoring::ScoringModel;

/// Reference strategies for the appointment-booking catalog.
pub const BUILTIN_STRATEGIES: [(&str, &[&str]); 5] = [
    (
        "rapport_focused",
        &["rapport_building", "needs_assessment", "personalization"],
    ),
    (
        "value_focused",
        &["value_proposition", "objection_handling", "incentive_offering"],
    ),
    (
        "urgency_focused",
        &["urgency_creation", "appointment_booking", "incentive_offering"],
    ),
    (
        "social_proof_focused",
        &["social_proof", "rapport_building", "needs_assessment"],
    ),
    (
        "balanced",
        &[
            "rapport_building",
            "needs_assessment",
            "value_proposition",
            "objection_handling",
            "appointment_booking",
        ],
    ),
];

/// Summary statistics over effectiveness scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectivenessStats {
    pub count: usize,
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl EffectivenessStats {
    /// None for an empty slice.
    pub fn from_scores(scores: &[f64]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }
        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        let (min, max) = scores
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &s| {
                (lo.min(s), hi.max(s))
            });
        Some(Self {
            count: scores.len(),
            mean,
            std: variance.sqrt(),
            min,
            max,
        })
    }
}

/// Aggregate results for one context type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextTypeReport {
    pub context_type: String,
    pub stats: EffectivenessStats,
    /// Episodes whose final selection contained each component.
    pub component_usage: BTreeMap<String, usize>,
}

/// Group finished episodes by context type, in catalog order. Context types
/// with no episodes are omitted.
pub fn evaluate_by_context_type(
    summaries: &[EpisodeSummary],
    catalog: &ComponentCatalog,
) -> Vec<ContextTypeReport> {
    let mut scores: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
    let mut usage: BTreeMap<usize, BTreeMap<String, usize>> = BTreeMap::new();

    for summary in summaries {
        let ct = summary.context.context_type;
        scores.entry(ct).or_default().push(summary.final_effectiveness);
        let counts = usage.entry(ct).or_default();
        for name in catalog.component_names(&summary.selected) {
            *counts.entry(name).or_default() += 1;
        }
    }

    scores
        .into_iter()
        .filter_map(|(ct, scores)| {
            let stats = EffectivenessStats::from_scores(&scores)?;
            Some(ContextTypeReport {
                context_type: catalog
                    .context_type(ct)
                    .map_or_else(|| ct.to_string(), |c| c.name.clone()),
                stats,
                component_usage: usage.remove(&ct).unwrap_or_default(),
            })
        })
        .collect()
}

/// `per_type` episodes for every context type, in catalog order. Stage and
/// urgency are sampled uniformly; episode i uses seed + i.
pub fn context_type_episodes(
    catalog: &ComponentCatalog,
    per_type: usize,
    seed: u64,
) -> Vec<EpisodeConfig> {
    let num_types = catalog.count(CatalogKind::ContextType);
    let mut sampler = ContextSampler::new(ContextRandConfig::deterministic(), seed);
    let mut episodes = Vec::with_capacity(num_types.saturating_mul(per_type));

    for context_type in 0..num_types {
        for _ in 0..per_type {
            let sampled = sampler.sample_context(catalog);
            let id = episodes.len() as u64;
            episodes.push(
                EpisodeConfig::default()
                    .with_seed(seed.wrapping_add(id))
                    .with_episode_id(id)
                    .with_context(EpisodeContext {
                        context_type,
                        ..sampled
                    }),
            );
        }
    }
    episodes
}

/// A named, fixed component list in prompt order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedStrategy {
    pub name: String,
    pub components: Vec<ComponentId>,
}

impl FixedStrategy {
    /// Resolve component names. Repeated names keep their first position.
    pub fn from_names(
        name: &str,
        components: &[&str],
        catalog: &ComponentCatalog,
    ) -> Result<Self, ProcessError> {
        let mut ids = Vec::with_capacity(components.len());
        for &component in components {
            let id = catalog
                .component_index(component)
                .ok_or_else(|| ProcessError::UnknownComponent {
                    strategy: name.to_string(),
                    name: component.to_string(),
                })?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        if ids.is_empty() {
            return Err(ProcessError::EmptyStrategy(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            components: ids,
        })
    }

    /// Parse `name=component,component,...`.
    pub fn parse(spec: &str, catalog: &ComponentCatalog) -> Result<Self, ProcessError> {
        let (name, list) = spec
            .split_once('=')
            .ok_or_else(|| ProcessError::InvalidConfig {
                field: "strategy",
                message: format!("expected name=component,... got '{}'", spec),
            })?;
        let components: Vec<&str> = list
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();
        Self::from_names(name.trim(), &components, catalog)
    }
}

/// `BUILTIN_STRATEGIES` resolved against `catalog`.
pub fn builtin_strategies(catalog: &ComponentCatalog) -> Result<Vec<FixedStrategy>, ProcessError> {
    BUILTIN_STRATEGIES
        .iter()
        .map(|(name, components)| FixedStrategy::from_names(name, components, catalog))
        .collect()
}

/// Effectiveness of one fixed strategy across sampled contexts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyComparison {
    pub strategy: String,
    /// Components actually scored, after truncation to the prompt length.
    pub component_names: Vec<String>,
    pub stats: EffectivenessStats,
}

/// Score each strategy on `samples` contexts drawn from `seed`.
///
/// Strategies longer than `max_prompt_length` are truncated. Every strategy
/// sees the same sequence of contexts and psychology vectors.
pub fn compare_strategies(
    catalog: &ComponentCatalog,
    strategies: &[FixedStrategy],
    max_prompt_length: usize,
    samples: usize,
    seed: u64,
) -> Result<Vec<StrategyComparison>, ProcessError> {
    if samples == 0 {
        return Err(ProcessError::InvalidConfig {
            field: "samples",
            message: "must be at least 1".to_string(),
        });
    }
    let num_components = catalog.count(CatalogKind::Component);
    let scoring = ScoringModel::new(catalog, max_prompt_length);
    let mut sampler = ContextSampler::new(ContextRandConfig::deterministic(), seed);

    let mut out = Vec::with_capacity(strategies.len());
    for strategy in strategies {
        if let Some(&bad) = strategy.components.iter().find(|&&id| id >= num_components) {
            return Err(ProcessError::UnknownComponent {
                strategy: strategy.name.clone(),
                name: bad.to_string(),
            });
        }
        if strategy.components.is_empty() {
            return Err(ProcessError::EmptyStrategy(strategy.name.clone()));
        }
        let selected = &strategy.components[..strategy.components.len().min(max_prompt_length)];

        sampler.reseed(seed);
        let scores: Vec<f64> = (0..samples)
            .map(|_| {
                let ctx = sampler.sample_context(catalog);
                let psychology = sampler.sample_uniform_psychology();
                scoring.final_effectiveness(selected, &ctx, &psychology)
            })
            .collect();

        let Some(stats) = EffectivenessStats::from_scores(&scores) else {
            continue;
        };
        debug!(strategy = %strategy.name, mean = stats.mean, "strategy scored");
        out.push(StrategyComparison {
            strategy: strategy.name.clone(),
            component_names: catalog.component_names(selected),
            stats,
        });
    }
    Ok(out)
}
