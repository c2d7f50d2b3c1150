// src/catalog/parse.rs
//
// JSON file schema for component catalogs and its validation into the
// strongly-typed catalog entries.
//
// Sections are read as ordered JSON objects so declaration order becomes the
// id order. Every cross reference is resolved here; an unknown name is an
// error, never a silent drop. Unknown entry fields are rejected too.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{Component, ContextType, PsychologyDimension, PsychologyVector, Stage, UrgencyLevel};
use crate::error::CatalogError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawComponent {
    #[serde(default)]
    description: String,
    #[serde(default)]
    effectiveness: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    stage_effectiveness: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    compatibility: Vec<String>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawContextType {
    #[serde(default)]
    description: String,
    #[serde(default, alias = "preferences")]
    preferred_components: Vec<String>,
    psychology_weights: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStage {
    #[serde(default)]
    description: String,
    #[serde(default)]
    preferred_components: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawUrgencyLevel {
    #[serde(default)]
    description: String,
    #[serde(default)]
    preferred_components: Vec<String>,
}

/// Fully resolved catalog entries, in declaration order.
pub(super) struct ParsedCatalog {
    pub components: Vec<Component>,
    pub context_types: Vec<ContextType>,
    pub stages: Vec<Stage>,
    pub urgency_levels: Vec<UrgencyLevel>,
}

pub(super) fn parse_catalog(text: &str) -> Result<ParsedCatalog, CatalogError> {
    let root: Value = serde_json::from_str(text)?;
    let root = root.as_object().ok_or_else(|| CatalogError::InvalidSection {
        section: "root",
        message: "top level must be a JSON object".to_string(),
    })?;

    let raw_components: Vec<(String, RawComponent)> = section_entries(root, "components")?;
    let raw_contexts: Vec<(String, RawContextType)> = section_entries(root, "context_types")?;
    let raw_stages: Vec<(String, RawStage)> = section_entries(root, "stages")?;
    let raw_urgency: Vec<(String, RawUrgencyLevel)> = section_entries(root, "urgency_levels")?;

    let component_ids = name_index(&raw_components);
    let context_names: Vec<&str> = raw_contexts.iter().map(|(n, _)| n.as_str()).collect();
    let stage_names: Vec<&str> = raw_stages.iter().map(|(n, _)| n.as_str()).collect();

    let mut components = Vec::with_capacity(raw_components.len());
    for (id, (name, raw)) in raw_components.iter().enumerate() {
        let effectiveness_by_context_type = dense_effectiveness(
            name,
            "effectiveness",
            "context type",
            raw.effectiveness.as_ref(),
            &context_names,
        )?;
        let effectiveness_by_stage = dense_effectiveness(
            name,
            "stage_effectiveness",
            "stage",
            raw.stage_effectiveness.as_ref(),
            &stage_names,
        )?;
        let compatible_with = resolve_components(name, "compatibility", &raw.compatibility, &component_ids)?;

        components.push(Component {
            id,
            name: name.clone(),
            description: raw.description.clone(),
            tags: raw.tags.iter().cloned().collect(),
            effectiveness_by_context_type,
            effectiveness_by_stage,
            compatible_with,
        });
    }

    let mut context_types = Vec::with_capacity(raw_contexts.len());
    for (id, (name, raw)) in raw_contexts.into_iter().enumerate() {
        let preferred_components =
            resolve_components(&name, "preferred_components", &raw.preferred_components, &component_ids)?;
        let psychology_weights = psychology_vector(&name, &raw.psychology_weights)?;
        context_types.push(ContextType {
            id,
            name,
            description: raw.description,
            preferred_components,
            psychology_weights,
        });
    }

    let mut stages = Vec::with_capacity(raw_stages.len());
    for (id, (name, raw)) in raw_stages.into_iter().enumerate() {
        let preferred_components =
            resolve_components(&name, "preferred_components", &raw.preferred_components, &component_ids)?;
        stages.push(Stage {
            id,
            name,
            description: raw.description,
            preferred_components,
        });
    }

    let mut urgency_levels = Vec::with_capacity(raw_urgency.len());
    for (id, (name, raw)) in raw_urgency.into_iter().enumerate() {
        let preferred_components =
            resolve_components(&name, "preferred_components", &raw.preferred_components, &component_ids)?;
        urgency_levels.push(UrgencyLevel {
            id,
            name,
            description: raw.description,
            preferred_components,
        });
    }

    Ok(ParsedCatalog {
        components,
        context_types,
        stages,
        urgency_levels,
    })
}

/// Read one top-level section as ordered `(name, entry)` pairs.
fn section_entries<T: DeserializeOwned>(
    root: &Map<String, Value>,
    section: &'static str,
) -> Result<Vec<(String, T)>, CatalogError> {
    let value = root.get(section).ok_or(CatalogError::MissingSection(section))?;
    let entries = value.as_object().ok_or_else(|| CatalogError::InvalidSection {
        section,
        message: "expected an object keyed by name".to_string(),
    })?;
    if entries.is_empty() {
        return Err(CatalogError::EmptySection(section));
    }

    entries
        .iter()
        .map(|(name, entry)| {
            let parsed = T::deserialize(entry).map_err(|e| CatalogError::InvalidSection {
                section,
                message: format!("entry '{}': {}", name, e),
            })?;
            Ok((name.clone(), parsed))
        })
        .collect()
}

fn name_index<T>(entries: &[(String, T)]) -> HashMap<String, usize> {
    entries
        .iter()
        .enumerate()
        .map(|(i, (name, _))| (name.clone(), i))
        .collect()
}

fn resolve_components(
    owner: &str,
    field: &'static str,
    names: &[String],
    component_ids: &HashMap<String, usize>,
) -> Result<BTreeSet<usize>, CatalogError> {
    names
        .iter()
        .map(|name| {
            component_ids
                .get(name)
                .copied()
                .ok_or_else(|| CatalogError::UnknownReference {
                    owner: owner.to_string(),
                    field,
                    name: name.clone(),
                })
        })
        .collect()
}

/// Turn a name-keyed effectiveness map into a dense vector over `declared`.
fn dense_effectiveness(
    component: &str,
    field: &'static str,
    kind: &'static str,
    map: Option<&BTreeMap<String, f64>>,
    declared: &[&str],
) -> Result<Vec<f64>, CatalogError> {
    let missing = |name: &str| CatalogError::MissingEffectiveness {
        component: component.to_string(),
        kind,
        name: name.to_string(),
    };

    let Some(map) = map else {
        return Err(missing(declared.first().copied().unwrap_or_default()));
    };

    if let Some(unknown) = map.keys().find(|k| !declared.contains(&k.as_str())) {
        return Err(CatalogError::UnknownReference {
            owner: component.to_string(),
            field,
            name: unknown.clone(),
        });
    }

    declared
        .iter()
        .map(|&name| {
            let value = *map.get(name).ok_or_else(|| missing(name))?;
            check_unit(component, format!("{}.{}", field, name), value)
        })
        .collect()
}

fn psychology_vector(
    context_type: &str,
    weights: &BTreeMap<String, f64>,
) -> Result<PsychologyVector, CatalogError> {
    let mut out = [0.0; super::PSYCHOLOGY_DIMS];

    if let Some(unknown) = weights.keys().find(|k| PsychologyDimension::parse(k).is_none()) {
        return Err(CatalogError::UnknownReference {
            owner: context_type.to_string(),
            field: "psychology_weights",
            name: unknown.clone(),
        });
    }

    for dim in PsychologyDimension::ALL {
        let value = *weights
            .get(dim.as_str())
            .ok_or_else(|| CatalogError::MissingPsychologyWeight {
                context_type: context_type.to_string(),
                dimension: dim.as_str(),
            })?;
        out[dim.index()] = check_unit(
            context_type,
            format!("psychology_weights.{}", dim.as_str()),
            value,
        )?;
    }
    Ok(out)
}

fn check_unit(owner: &str, field: String, value: f64) -> Result<f64, CatalogError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(CatalogError::ValueOutOfRange {
            owner: owner.to_string(),
            field,
            value,
        })
    }
}
