// src/rl/action_encoding.rs
//
// Versioned integer action encoding for the prompt-construction process.
//
// Two codecs, chosen once per process via `CodecKind`:
// - Positional (canonical): size C * P * 2. One integer packs
//   (component, position, finish):
//     finish    = a mod 2
//     position  = (a / 2) mod P
//     component = (a / 2P) mod C
// - SelectOrFinish: size C + 1. Value C means finish, anything else selects
//   that component and appends it.
//
// Decoding reduces modulo the action space, so it never fails for any usize.
// Rewards depend on the codec only through the decoded triple.

use serde::{Deserialize, Serialize};

use crate::catalog::ComponentId;
use crate::config::CodecKind;
use crate::error::ProcessError;

/// Current action encoding version.
/// Increment when changing the encoding schema.
pub const ACTION_VERSION: u32 = 1;

/// A decoded action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedAction {
    pub component: ComponentId,
    /// Insertion position. `None` appends (select-or-finish codec).
    pub position: Option<usize>,
    pub finish: bool,
}

impl DecodedAction {
    pub fn select(component: ComponentId, position: usize) -> Self {
        Self {
            component,
            position: Some(position),
            finish: false,
        }
    }

    pub fn append(component: ComponentId) -> Self {
        Self {
            component,
            position: None,
            finish: false,
        }
    }

    /// A finish action. The component field is ignored by the process.
    pub fn finish() -> Self {
        Self {
            component: 0,
            position: None,
            finish: true,
        }
    }
}

/// Bidirectional mapping between `usize` actions and `DecodedAction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCodec {
    Positional {
        num_components: usize,
        max_prompt_length: usize,
    },
    SelectOrFinish {
        num_components: usize,
    },
}

impl ActionCodec {
    pub fn new(
        kind: CodecKind,
        num_components: usize,
        max_prompt_length: usize,
    ) -> Result<Self, ProcessError> {
        if num_components == 0 {
            return Err(ProcessError::InvalidConfig {
                field: "num_components",
                message: "codec needs at least one component".to_string(),
            });
        }
        match kind {
            CodecKind::Positional => {
                if max_prompt_length == 0 {
                    return Err(ProcessError::InvalidConfig {
                        field: "max_prompt_length",
                        message: "positional codec needs at least one position".to_string(),
                    });
                }
                if num_components
                    .checked_mul(max_prompt_length)
                    .and_then(|n| n.checked_mul(2))
                    .is_none()
                {
                    return Err(ProcessError::InvalidConfig {
                        field: "max_prompt_length",
                        message: format!(
                            "{} components x {} positions x 2 overflows the action space",
                            num_components, max_prompt_length
                        ),
                    });
                }
                Ok(ActionCodec::Positional {
                    num_components,
                    max_prompt_length,
                })
            }
            CodecKind::SelectOrFinish => {
                if num_components == usize::MAX {
                    return Err(ProcessError::InvalidConfig {
                        field: "num_components",
                        message: "no room for the finish action".to_string(),
                    });
                }
                Ok(ActionCodec::SelectOrFinish { num_components })
            }
        }
    }

    pub fn kind(&self) -> CodecKind {
        match self {
            ActionCodec::Positional { .. } => CodecKind::Positional,
            ActionCodec::SelectOrFinish { .. } => CodecKind::SelectOrFinish,
        }
    }

    /// Number of distinct actions.
    pub fn action_space_size(&self) -> usize {
        match *self {
            ActionCodec::Positional {
                num_components,
                max_prompt_length,
            } => num_components * max_prompt_length * 2,
            ActionCodec::SelectOrFinish { num_components } => num_components + 1,
        }
    }

    /// Decode any integer. Never fails.
    pub fn decode(&self, action: usize) -> DecodedAction {
        match *self {
            ActionCodec::Positional {
                num_components,
                max_prompt_length,
            } => DecodedAction {
                finish: action % 2 == 1,
                position: Some((action / 2) % max_prompt_length),
                component: (action / (2 * max_prompt_length)) % num_components,
            },
            ActionCodec::SelectOrFinish { num_components } => {
                let a = action % (num_components + 1);
                if a == num_components {
                    DecodedAction::finish()
                } else {
                    DecodedAction::append(a)
                }
            }
        }
    }

    /// Encode a triple. Returns None if it is not representable by this codec.
    pub fn encode(&self, decoded: &DecodedAction) -> Option<usize> {
        match *self {
            ActionCodec::Positional {
                num_components,
                max_prompt_length,
            } => {
                let position = decoded.position?;
                if decoded.component >= num_components || position >= max_prompt_length {
                    return None;
                }
                Some(
                    decoded.component * 2 * max_prompt_length
                        + position * 2
                        + usize::from(decoded.finish),
                )
            }
            ActionCodec::SelectOrFinish { num_components } => {
                if decoded.finish {
                    Some(num_components)
                } else if decoded.position.is_none() && decoded.component < num_components {
                    Some(decoded.component)
                } else {
                    None
                }
            }
        }
    }

    /// Smallest action that finishes the episode.
    pub fn finish_action(&self) -> usize {
        match *self {
            ActionCodec::Positional { .. } => 1,
            ActionCodec::SelectOrFinish { num_components } => num_components,
        }
    }

    /// Action selecting `component`, appended at `len` (the current selection
    /// length). Returns None when the component or position is unrepresentable.
    pub fn select_action(&self, component: ComponentId, len: usize) -> Option<usize> {
        let decoded = match self {
            ActionCodec::Positional { .. } => DecodedAction::select(component, len),
            ActionCodec::SelectOrFinish { .. } => DecodedAction::append(component),
        };
        self.encode(&decoded)
    }

    pub fn spec(&self) -> ActionEncodingSpec {
        let (num_components, max_prompt_length) = match *self {
            ActionCodec::Positional {
                num_components,
                max_prompt_length,
            } => (num_components, Some(max_prompt_length)),
            ActionCodec::SelectOrFinish { num_components } => (num_components, None),
        };
        ActionEncodingSpec {
            version: ACTION_VERSION,
            codec: self.kind(),
            action_space_size: self.action_space_size(),
            num_components,
            max_prompt_length,
        }
    }
}

/// Action encoding metadata, recorded alongside rollouts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionEncodingSpec {
    /// Schema version.
    pub version: u32,
    pub codec: CodecKind,
    pub action_space_size: usize,
    pub num_components: usize,
    /// Positions per component (positional codec only).
    pub max_prompt_length: Option<usize>,
}
