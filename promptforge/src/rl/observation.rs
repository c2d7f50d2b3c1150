// src/rl/observation.rs
//
// Versioned observation schema for the prompt-construction process.
//
// - Versioned (obs_version field) for schema evolution
// - Serializable (serde) for logging and replay
// - Deterministic ordering (Vec, not HashMap) so equal states serialize to
//   identical bytes
// - `to_features()` gives a flat f32 vector for learners

use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogKind, ComponentCatalog, ComponentId, PsychologyVector, PSYCHOLOGY_DIMS};
use crate::error::ProcessError;

/// Current observation schema version.
/// Increment when adding/removing/changing fields.
pub const OBS_VERSION: u32 = 1;

/// The situational context of one episode, as catalog indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpisodeContext {
    pub context_type: usize,
    pub stage: usize,
    pub urgency: usize,
}

impl EpisodeContext {
    pub fn new(context_type: usize, stage: usize, urgency: usize) -> Self {
        Self {
            context_type,
            stage,
            urgency,
        }
    }

    /// Check every index against the catalog. Never clamps.
    pub fn validate(&self, catalog: &ComponentCatalog) -> Result<(), ProcessError> {
        let checks = [
            ("context_type", self.context_type, CatalogKind::ContextType),
            ("stage", self.stage, CatalogKind::Stage),
            ("urgency", self.urgency, CatalogKind::UrgencyLevel),
        ];
        for (field, index, kind) in checks {
            let count = catalog.count(kind);
            if index >= count {
                return Err(ProcessError::ContextOutOfRange { field, index, count });
            }
        }
        Ok(())
    }
}

/// Snapshot of the process state handed to the decision-maker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    pub obs_version: u32,
    pub turn: usize,
    pub max_turns: usize,
    pub context: EpisodeContext,
    /// Membership mask indexed by component id.
    pub selected_mask: Vec<bool>,
    /// Selected component ids in prompt order.
    pub selected: Vec<ComponentId>,
    /// Per-episode psychology vector (None when not exposed).
    pub psychology: Option<PsychologyVector>,
}

impl Observation {
    pub fn from_state(
        num_components: usize,
        context: EpisodeContext,
        selected: &[ComponentId],
        psychology: Option<PsychologyVector>,
        turn: usize,
        max_turns: usize,
    ) -> Self {
        let mut selected_mask = vec![false; num_components];
        for &id in selected {
            if let Some(slot) = selected_mask.get_mut(id) {
                *slot = true;
            }
        }
        Self {
            obs_version: OBS_VERSION,
            turn,
            max_turns,
            context,
            selected_mask,
            selected: selected.to_vec(),
            psychology,
        }
    }

    /// Serialize to canonical JSON bytes.
    pub fn to_canonical_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn is_selected(&self, id: ComponentId) -> bool {
        self.selected_mask.get(id).copied().unwrap_or(false)
    }

    /// Flat encoding: one-hot context type, stage and urgency, the selection
    /// mask, turn / max_turns, then psychology (zeros when not exposed).
    pub fn to_features(&self, catalog: &ComponentCatalog) -> Vec<f32> {
        let mut out = Vec::with_capacity(feature_dim(catalog));
        push_one_hot(&mut out, self.context.context_type, catalog.count(CatalogKind::ContextType));
        push_one_hot(&mut out, self.context.stage, catalog.count(CatalogKind::Stage));
        push_one_hot(&mut out, self.context.urgency, catalog.count(CatalogKind::UrgencyLevel));
        out.extend(self.selected_mask.iter().map(|&m| if m { 1.0 } else { 0.0 }));
        out.push(self.turn as f32 / self.max_turns.max(1) as f32);
        match &self.psychology {
            Some(p) => out.extend(p.iter().map(|&v| v as f32)),
            None => out.extend(std::iter::repeat(0.0).take(PSYCHOLOGY_DIMS)),
        }
        out
    }
}

/// Length of `Observation::to_features` for a catalog.
pub fn feature_dim(catalog: &ComponentCatalog) -> usize {
    catalog.count(CatalogKind::ContextType)
        + catalog.count(CatalogKind::Stage)
        + catalog.count(CatalogKind::UrgencyLevel)
        + catalog.count(CatalogKind::Component)
        + 1
        + PSYCHOLOGY_DIMS
}

fn push_one_hot(out: &mut Vec<f32>, index: usize, len: usize) {
    out.extend((0..len).map(|i| if i == index { 1.0 } else { 0.0 }));
}
