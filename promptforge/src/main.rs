// src/main.rs
//
// Research-harness CLI for promptforge.
//
// - Loads a catalog (--catalog, or the built-in appointment-booking catalog).
// - Process config: PROMPTFORGE_* env overrides, then CLI flags on top.
// - Runs N episodes with a baseline policy, deterministic via --seed
//   (episode i uses seed + i).
// - Modes:
//     records            one StrategyRecord JSON line per episode (default)
//     by-context-type    --episodes per context type, one report line each
//     compare-strategies fixed component lists scored on --samples contexts
// - A run header goes to stderr; JSON lines go to stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use promptforge::rl::{
    builtin_strategies, compare_strategies, context_type_episodes, evaluate_by_context_type,
    run_episodes_parallel, ActionCodec, EpisodeConfig, EpisodeContext, FixedStrategy,
    GreedyPolicy, Policy, PromptEnv, RandomPolicy,
};
use promptforge::{CatalogKind, CodecKind, ComponentCatalog, ProcessConfig, StrategyRecord};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum PolicyArg {
    Greedy,
    Random,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Records,
    ByContextType,
    CompareStrategies,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum CodecArg {
    Positional,
    SelectOrFinish,
}

#[derive(Debug, Parser)]
#[command(
    name = "promptforge",
    about = "Prompt-construction decision process (research harness)",
    version
)]
struct Args {
    /// Catalog JSON file. Defaults to the built-in appointment-booking catalog.
    #[arg(long)]
    catalog: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "records")]
    mode: Mode,

    /// Number of episodes to run (per context type in by-context-type mode).
    #[arg(long, default_value_t = 1)]
    episodes: u64,

    /// Contexts sampled per strategy in compare-strategies mode.
    #[arg(long, default_value_t = 30)]
    samples: usize,

    /// Fixed strategy as name=component,component,... (repeatable).
    /// Defaults to the built-in reference strategies.
    #[arg(long = "strategy")]
    strategies: Vec<String>,

    /// Base seed; episode i uses seed + i.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Baseline decision-maker.
    #[arg(long, value_enum, default_value = "greedy")]
    policy: PolicyArg,

    /// Fix the context type by name (requires --stage and --urgency).
    #[arg(long)]
    context_type: Option<String>,

    /// Fix the stage by name.
    #[arg(long)]
    stage: Option<String>,

    /// Fix the urgency level by name.
    #[arg(long)]
    urgency: Option<String>,

    #[arg(long)]
    max_prompt_length: Option<usize>,

    #[arg(long)]
    max_turns: Option<usize>,

    #[arg(long, value_enum)]
    codec: Option<CodecArg>,

    /// Worker threads for rollouts.
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Verbosity: -v, -vv
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_context(args: &Args, catalog: &ComponentCatalog) -> Result<Option<EpisodeContext>> {
    let (ct, st, ur) = match (&args.context_type, &args.stage, &args.urgency) {
        (None, None, None) => return Ok(None),
        (Some(ct), Some(st), Some(ur)) => (ct, st, ur),
        _ => bail!("--context-type, --stage and --urgency must be given together"),
    };
    let context_type = catalog
        .context_type_index(ct)
        .with_context(|| format!("unknown context type '{ct}'"))?;
    let stage = catalog
        .stage_index(st)
        .with_context(|| format!("unknown stage '{st}'"))?;
    let urgency = catalog
        .urgency_index(ur)
        .with_context(|| format!("unknown urgency level '{ur}'"))?;
    Ok(Some(EpisodeContext::new(context_type, stage, urgency)))
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let catalog = match &args.catalog {
        Some(path) => ComponentCatalog::from_json_file(path)
            .with_context(|| format!("loading catalog {}", path.display()))?,
        None => ComponentCatalog::appointment_booking().context("loading built-in catalog")?,
    };
    let catalog = Arc::new(catalog);

    let mut config = ProcessConfig::from_env_or_default();
    if let Some(p) = args.max_prompt_length {
        config.max_prompt_length = p;
    }
    if let Some(t) = args.max_turns {
        config.max_turns = t;
    }
    if let Some(codec) = args.codec {
        config.codec = match codec {
            CodecArg::Positional => CodecKind::Positional,
            CodecArg::SelectOrFinish => CodecKind::SelectOrFinish,
        };
    }
    config.validate().context("invalid process config")?;

    let context = resolve_context(&args, &catalog)?;
    if context.is_some() && args.mode != Mode::Records {
        bail!("--context-type, --stage and --urgency only apply to records mode");
    }
    let action_spec = ActionCodec::new(
        config.codec,
        catalog.count(CatalogKind::Component),
        config.max_prompt_length,
    )?
    .spec();

    eprintln!(
        "promptforge | mode={:?} | catalog={} | components={} | codec={} | actions={} | P={} | turns={} | policy={:?} | episodes={} | seed={}",
        args.mode,
        catalog.source_digest(),
        catalog.count(CatalogKind::Component),
        config.codec.as_str(),
        action_spec.action_space_size,
        config.max_prompt_length,
        config.max_turns,
        args.policy,
        args.episodes,
        args.seed,
    );

    if args.mode == Mode::CompareStrategies {
        let strategies = if args.strategies.is_empty() {
            builtin_strategies(&catalog).context("built-in strategies need the appointment-booking catalog")?
        } else {
            args.strategies
                .iter()
                .map(|spec| FixedStrategy::parse(spec, &catalog))
                .collect::<Result<Vec<_>, _>>()?
        };
        let results = compare_strategies(
            &catalog,
            &strategies,
            config.max_prompt_length,
            args.samples,
            args.seed,
        )?;
        for result in &results {
            println!("{}", serde_json::to_string(result)?);
        }
        return Ok(());
    }

    let episodes: Vec<EpisodeConfig> = match args.mode {
        Mode::ByContextType => {
            let per_type = usize::try_from(args.episodes).context("--episodes too large")?;
            context_type_episodes(&catalog, per_type, args.seed)
        }
        _ => (0..args.episodes)
            .map(|i| {
                let ep = EpisodeConfig::default()
                    .with_seed(args.seed.wrapping_add(i))
                    .with_episode_id(i);
                match context {
                    Some(ctx) => ep.with_context(ctx),
                    None => ep,
                }
            })
            .collect(),
    };

    let policy_arg = args.policy;
    let seed = args.seed;
    let make_policy = move |env: &PromptEnv| -> Box<dyn Policy> {
        match policy_arg {
            PolicyArg::Greedy => Box::new(GreedyPolicy::new(
                Arc::clone(env.catalog()),
                *env.codec(),
                env.config().max_prompt_length,
            )),
            PolicyArg::Random => Box::new(RandomPolicy::new(env.action_space_size(), seed)),
        }
    };

    let summaries = run_episodes_parallel(
        Arc::clone(&catalog),
        &config,
        &episodes,
        args.workers,
        make_policy,
    )?;

    let mean = if summaries.is_empty() {
        0.0
    } else {
        summaries.iter().map(|s| s.final_effectiveness).sum::<f64>() / summaries.len() as f64
    };
    info!(episodes = summaries.len(), mean_effectiveness = mean, "rollouts complete");

    if args.mode == Mode::ByContextType {
        for report in evaluate_by_context_type(&summaries, &catalog) {
            println!("{}", serde_json::to_string(&report)?);
        }
        return Ok(());
    }

    for summary in &summaries {
        let record = StrategyRecord::from_summary(summary, &catalog, &action_spec);
        println!("{}", record.to_json_line()?);
    }

    Ok(())
}
