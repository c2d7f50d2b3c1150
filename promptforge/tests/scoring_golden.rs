// tests/scoring_golden.rs
//
// Hand-computed golden values for the scoring model and the episode flow on
// a three-component catalog.
//
// Catalog: rapport, value, booking; every component 0.4 for context "p" and
// 0.2 for stage "s"; "p" prefers {rapport, booking}; rapport -> [booking] is
// the only compatibility edge. P = 3, no psychology noise, psychology 0.5.

use std::sync::Arc;

use promptforge::rl::{DecodedAction, EpisodeContext, PromptEnv, ScoringModel, TerminationReason};
use promptforge::{ComponentCatalog, ProcessConfig};

const EPS: f64 = 1e-9;

fn golden_catalog_json(ctx_eff: f64, stage_eff: f64) -> String {
    format!(
        r#"{{
            "components": {{
                "rapport": {{
                    "effectiveness": {{"p": {ctx_eff}}},
                    "stage_effectiveness": {{"s": {stage_eff}}},
                    "compatibility": ["booking"]
                }},
                "value": {{
                    "effectiveness": {{"p": {ctx_eff}}},
                    "stage_effectiveness": {{"s": {stage_eff}}}
                }},
                "booking": {{
                    "effectiveness": {{"p": {ctx_eff}}},
                    "stage_effectiveness": {{"s": {stage_eff}}}
                }}
            }},
            "context_types": {{
                "p": {{
                    "preferred_components": ["rapport", "booking"],
                    "psychology_weights": {{
                        "interest": 0.5, "urgency": 0.5, "availability": 0.5,
                        "trust": 0.5, "commitment": 0.5
                    }}
                }}
            }},
            "stages": {{ "s": {{ "preferred_components": [] }} }},
            "urgency_levels": {{ "low": {{}} }}
        }}"#
    )
}

fn golden_env(ctx_eff: f64, stage_eff: f64) -> PromptEnv {
    let catalog = ComponentCatalog::from_json_str(&golden_catalog_json(ctx_eff, stage_eff)).unwrap();
    let config = ProcessConfig::deterministic().with_max_prompt_length(3);
    let mut env = PromptEnv::new(Arc::new(catalog), config).unwrap();
    env.reset(Some(0), Some(EpisodeContext::new(0, 0, 0))).unwrap();
    env
}

#[test]
fn test_golden_episode_rewards_and_final_score() {
    let mut env = golden_env(0.4, 0.2);
    let codec = *env.codec();
    let rapport = env.catalog().component_index("rapport").unwrap();
    let booking = env.catalog().component_index("booking").unwrap();

    // (0.4 + 0.2) / 2 * 1.2 * 0.1
    let r1 = env.step(codec.encode(&DecodedAction::select(rapport, 0)).unwrap());
    assert!((r1.reward - 0.036).abs() < EPS);
    assert!(!r1.done());

    // 0.036 + ((1.0 - 0.3) / 2) * 0.05
    let r2 = env.step(codec.encode(&DecodedAction::select(booking, 1)).unwrap());
    assert!((r2.reward - 0.0535).abs() < EPS);
    assert!(!r2.done());
    assert_eq!(env.selected(), &[rapport, booking]);

    // 0.3 avg + 0.2 preference + 0.175 compatibility + 0.05 efficiency
    let r3 = env.step(codec.finish_action());
    assert!(r3.terminated);
    assert_eq!(r3.info.termination_reason, Some(TerminationReason::Finished));
    assert!((r3.reward - 0.725).abs() < EPS);

    let breakdown = r3.info.score_breakdown.unwrap();
    assert!((breakdown.avg_effectiveness - 0.3).abs() < EPS);
    assert!((breakdown.preference_bonus - 0.2).abs() < EPS);
    assert!(breakdown.stage_bonus.abs() < EPS);
    assert!((breakdown.compatibility_bonus - 0.175).abs() < EPS);
    assert!((breakdown.efficiency_bonus - 0.05).abs() < EPS);
    assert!(breakdown.psychology_bonus.abs() < EPS);
}

#[test]
fn test_golden_score_clamps_to_one() {
    let mut env = golden_env(0.8, 0.6);
    let codec = *env.codec();
    env.step(codec.encode(&DecodedAction::select(0, 0)).unwrap());
    env.step(codec.encode(&DecodedAction::select(2, 1)).unwrap());
    let r = env.step(codec.finish_action());
    let breakdown = r.info.score_breakdown.unwrap();
    assert!((breakdown.raw_total - 1.125).abs() < EPS);
    assert_eq!(r.reward, 1.0);
}

#[test]
fn test_compatible_pair_beats_incompatible_pair() {
    let catalog = ComponentCatalog::from_json_str(&golden_catalog_json(0.4, 0.2)).unwrap();
    let scoring = ScoringModel::new(&catalog, 3);
    let with_edge = scoring.compatibility_bonus(&[0, 2]);
    let without_edge = scoring.compatibility_bonus(&[0, 1]);
    assert!((with_edge - 0.0175).abs() < EPS);
    assert!((without_edge - (-0.015)).abs() < EPS);
    assert!(with_edge > without_edge);
}

#[test]
fn test_empty_selection_final_score_zero() {
    let catalog = ComponentCatalog::from_json_str(&golden_catalog_json(0.4, 0.2)).unwrap();
    let scoring = ScoringModel::new(&catalog, 3);
    let ctx = EpisodeContext::new(0, 0, 0);
    assert_eq!(scoring.final_effectiveness(&[], &ctx, &[1.0; 5]), 0.0);
}

#[test]
fn test_invalid_position_exact_penalty() {
    let mut env = golden_env(0.4, 0.2);
    let r = env.step_decoded(DecodedAction::select(0, 3));
    assert_eq!(r.reward, -0.1);
    assert_eq!(env.turn(), 1);
    assert!(env.selected().is_empty());
}
