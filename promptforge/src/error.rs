// src/error.rs
//
// Error taxonomy for promptforge.
//
// - CatalogError: configuration errors, fatal at load time.
// - ProcessError: caller-contract violations (bad reset context, bad limits).
//
// In-episode invalid actions are NOT errors; they are ordinary transitions
// carrying an `InvalidAction` reason (see rl::prompt_env).

use thiserror::Error;

/// Errors raised while loading or validating a component catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("catalog is missing required section '{0}'")]
    MissingSection(&'static str),

    #[error("catalog section '{section}' is invalid: {message}")]
    InvalidSection {
        section: &'static str,
        message: String,
    },

    #[error("catalog section '{0}' must declare at least one entry")]
    EmptySection(&'static str),

    #[error("component '{component}' has no {kind} effectiveness for '{name}'")]
    MissingEffectiveness {
        component: String,
        kind: &'static str,
        name: String,
    },

    #[error("'{owner}' field '{field}' references unknown name '{name}'")]
    UnknownReference {
        owner: String,
        field: &'static str,
        name: String,
    },

    #[error("'{owner}' field '{field}' has value {value} outside [0, 1]")]
    ValueOutOfRange {
        owner: String,
        field: String,
        value: f64,
    },

    #[error("context type '{context_type}' psychology_weights is missing dimension '{dimension}'")]
    MissingPsychologyWeight {
        context_type: String,
        dimension: &'static str,
    },

    #[error("catalog declares {actual} {kind}, expected exactly {expected}")]
    Cardinality {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Errors raised by the decision process for caller-contract violations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProcessError {
    #[error("reset context field '{field}' = {index} is out of range (catalog declares {count})")]
    ContextOutOfRange {
        field: &'static str,
        index: usize,
        count: usize,
    },

    #[error("invalid process config '{field}': {message}")]
    InvalidConfig {
        field: &'static str,
        message: String,
    },

    #[error("strategy '{strategy}' names unknown component '{name}'")]
    UnknownComponent { strategy: String, name: String },

    #[error("strategy '{0}' selects no components")]
    EmptyStrategy(String),
}
