//! promptforge core library.
//!
//! This crate exposes the prompt-construction decision process: an episodic
//! environment in which a decision-maker assembles a short ordered list of
//! reusable components to fit a situational context, scored by a
//! multi-factor effectiveness model. The binary (`src/main.rs`) is just a
//! thin research harness around these components.
//!
//! # Layout
//!
//! - **Catalog** (`catalog`): immutable, validated domain data (components,
//!   context types, stages, urgency levels, compatibility), loaded from JSON
//!   and shared across processes behind an `Arc`.
//!
//! - **Config** (`config`): episode limits, codec choice and context
//!   randomisation, with `PROMPTFORGE_*` environment overrides.
//!
//! - **Decision process** (`rl`): action codec, scoring model, Gym-style
//!   `PromptEnv` / `VecPromptEnv`, baseline policies, rollout runners and
//!   offline evaluation (per-context-type aggregates, fixed-strategy
//!   comparison).
//!
//! - **Strategy records** (`strategy`): the persisted JSON shape of a
//!   finished episode.

pub mod catalog;
pub mod config;
pub mod error;
pub mod rl;
pub mod strategy;

pub use catalog::{
    CatalogKind, CatalogShape, Component, ComponentCatalog, ComponentId, ContextType,
    PsychologyDimension, PsychologyVector, Stage, UrgencyLevel, PSYCHOLOGY_DIMS,
};
pub use config::{CodecKind, ContextRandConfig, ProcessConfig};
pub use error::{CatalogError, ProcessError};
pub use strategy::StrategyRecord;
