// src/strategy.rs
//
// Persisted strategy record: the ordered component names chosen for a
// context, the terminal effectiveness, and provenance metadata.
//
// JSON shape (camelCase):
//   { componentNames, contextType, stage, urgency, effectivenessScore, metadata }

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::ComponentCatalog;
use crate::rl::action_encoding::ActionEncodingSpec;
use crate::rl::observation::OBS_VERSION;
use crate::rl::rollout::EpisodeSummary;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StrategyRecord {
    pub component_names: Vec<String>,
    pub context_type: String,
    pub stage: String,
    pub urgency: String,
    pub effectiveness_score: f64,
    pub metadata: BTreeMap<String, Value>,
}

impl StrategyRecord {
    /// Build a record from a finished episode.
    pub fn from_summary(
        summary: &EpisodeSummary,
        catalog: &ComponentCatalog,
        action_spec: &ActionEncodingSpec,
    ) -> Self {
        let name_or_index = |name: Option<&str>, index: usize| {
            name.map(str::to_string).unwrap_or_else(|| index.to_string())
        };
        let ctx = summary.context;

        let mut metadata = BTreeMap::new();
        metadata.insert("policyVersion".to_string(), Value::from(summary.policy_version.clone()));
        metadata.insert("episodeId".to_string(), Value::from(summary.episode_id));
        metadata.insert("seed".to_string(), Value::from(summary.seed));
        metadata.insert("steps".to_string(), Value::from(summary.steps));
        metadata.insert("totalReward".to_string(), Value::from(summary.total_reward));
        metadata.insert("invalidActions".to_string(), Value::from(summary.invalid_actions));
        metadata.insert(
            "terminationReason".to_string(),
            Value::from(summary.termination_reason.as_str()),
        );
        metadata.insert("actionVersion".to_string(), Value::from(action_spec.version));
        metadata.insert("codec".to_string(), Value::from(action_spec.codec.as_str()));
        metadata.insert("obsVersion".to_string(), Value::from(OBS_VERSION));
        metadata.insert("catalogDigest".to_string(), Value::from(catalog.source_digest()));

        Self {
            component_names: catalog.component_names(&summary.selected),
            context_type: name_or_index(
                catalog.context_type(ctx.context_type).map(|c| c.name.as_str()),
                ctx.context_type,
            ),
            stage: name_or_index(catalog.stage(ctx.stage).map(|s| s.name.as_str()), ctx.stage),
            urgency: name_or_index(
                catalog.urgency_level(ctx.urgency).map(|u| u.name.as_str()),
                ctx.urgency,
            ),
            effectiveness_score: summary.final_effectiveness,
            metadata,
        }
    }

    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
