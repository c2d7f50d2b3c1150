// tests/decision_process_invariants.rs
//
// Invariants of the decision process under arbitrary action sequences:
// - selection never holds duplicates and never exceeds max_prompt_length
// - turn never exceeds max_turns; episodes end within the turn budget
// - the step that ends an episode returns the terminal score as its reward
// - every reported effectiveness lies in [0, 1]
// - any usize action is accepted without panicking

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use promptforge::rl::{InvalidAction, PromptEnv, TerminationReason, INVALID_ACTION_PENALTY};
use promptforge::{CodecKind, ComponentCatalog, ProcessConfig};

fn booking_catalog() -> Arc<ComponentCatalog> {
    Arc::new(ComponentCatalog::appointment_booking().unwrap())
}

fn assert_invariants(env: &PromptEnv) {
    let selected = env.selected();
    let mut sorted = selected.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), selected.len(), "duplicate in selection {:?}", selected);
    assert!(selected.len() <= env.config().max_prompt_length);
    assert!(env.turn() <= env.config().max_turns);
}

fn run_random_episodes(config: ProcessConfig, rng_seed: u64) {
    let mut env = PromptEnv::new(booking_catalog(), config.clone()).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(rng_seed);

    for episode in 0..200u64 {
        env.reset(Some(episode), None).unwrap();
        let mut steps = 0;
        loop {
            // Mostly in-range actions with occasional huge values.
            let action = if rng.gen_bool(0.1) {
                rng.gen::<usize>()
            } else {
                rng.gen_range(0..env.action_space_size())
            };
            let result = env.step(action);
            steps += 1;
            assert_invariants(&env);

            if result.info.invalid_action.is_some() {
                assert_eq!(result.reward, INVALID_ACTION_PENALTY);
            }
            if let Some(score) = result.info.final_effectiveness {
                assert!((0.0..=1.0).contains(&score));
            }
            if result.done() {
                // whatever ended the episode, the terminal score is the reward
                assert_eq!(Some(result.reward), result.info.final_effectiveness);
                assert_eq!(result.truncated, env.turn() == config.max_turns && !result.terminated);
                break;
            }
            assert!(steps <= config.max_turns, "episode exceeded turn budget");
        }
        assert!(env.is_done());
    }
}

#[test]
fn test_positional_invariants_random_actions() {
    run_random_episodes(ProcessConfig::default(), 1);
}

#[test]
fn test_select_or_finish_invariants_random_actions() {
    run_random_episodes(ProcessConfig::default().with_codec(CodecKind::SelectOrFinish), 2);
}

#[test]
fn test_small_limits_invariants() {
    let config = ProcessConfig::default()
        .with_max_prompt_length(2)
        .with_max_turns(3);
    run_random_episodes(config, 3);
}

#[test]
fn test_reselect_leaves_selection_unchanged() {
    let mut env = PromptEnv::new(booking_catalog(), ProcessConfig::deterministic()).unwrap();
    env.reset(Some(0), None).unwrap();
    let codec = *env.codec();

    env.step(codec.select_action(4, 0).unwrap());
    let before = env.selected().to_vec();
    let turn_before = env.turn();

    // same component, different position
    let r = env.step(codec.select_action(4, 1).unwrap());
    assert_eq!(r.reward, -0.1);
    assert_eq!(r.info.invalid_action, Some(InvalidAction::AlreadySelected));
    assert_eq!(env.selected(), before.as_slice());
    assert_eq!(env.turn(), turn_before + 1);
}

#[test]
fn test_max_usize_action_does_not_panic() {
    let mut env = PromptEnv::new(booking_catalog(), ProcessConfig::default()).unwrap();
    env.reset(Some(0), None).unwrap();
    let r = env.step(usize::MAX);
    assert!(r.reward.is_finite());
}

#[test]
fn test_info_efficiency() {
    let mut env = PromptEnv::new(booking_catalog(), ProcessConfig::deterministic()).unwrap();
    env.reset(Some(0), None).unwrap();
    let codec = *env.codec();
    env.step(codec.select_action(0, 0).unwrap());
    env.step(codec.select_action(0, 1).unwrap());
    let r = env.step(codec.select_action(1, 1).unwrap());
    assert_eq!(r.info.components_used, 2);
    assert_eq!(r.info.turn, 3);
    assert!((r.info.efficiency - 2.0 / 3.0).abs() < 1e-12);
}

#[test]
fn test_budget_exhaustion_pays_terminal_score() {
    let config = ProcessConfig::deterministic().with_max_turns(2);
    let mut env = PromptEnv::new(booking_catalog(), config).unwrap();
    env.reset(Some(0), None).unwrap();
    let codec = *env.codec();

    env.step(codec.select_action(7, 0).unwrap());
    env.step(codec.select_action(4, 1).unwrap());
    let expected = env.final_effectiveness();

    let r = env.step(codec.select_action(0, 2).unwrap());
    assert!(r.truncated);
    assert_eq!(r.reward, expected);
    assert_eq!(r.info.termination_reason, Some(TerminationReason::TurnBudgetExhausted));
    assert_eq!(env.selected(), &[7, 4]);
}
