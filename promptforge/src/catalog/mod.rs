// src/catalog/mod.rs
//
// Immutable component catalog: components, context types, stages, urgency
// levels and the directed compatibility relation.
//
// The catalog is the only data shared between decision-process instances.
// It is built once from JSON, validated eagerly, and never mutated; share it
// across workers behind an `Arc`.
//
// Ids are declaration order in the JSON source (object key order preserved).

mod parse;

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::CatalogError;

/// Index of a component within its catalog.
pub type ComponentId = usize;

/// Number of psychology dimensions carried per context type.
pub const PSYCHOLOGY_DIMS: usize = 5;

/// Per-dimension psychology affinities, each in [0, 1].
pub type PsychologyVector = [f64; PSYCHOLOGY_DIMS];

/// Embedded JSON for the built-in appointment-booking catalog.
const APPOINTMENT_BOOKING_JSON: &str = include_str!("../../catalogs/appointment_booking.json");

/// Psychology dimensions, in vector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PsychologyDimension {
    Interest,
    Urgency,
    Availability,
    Trust,
    Commitment,
}

impl PsychologyDimension {
    pub const ALL: [PsychologyDimension; PSYCHOLOGY_DIMS] = [
        PsychologyDimension::Interest,
        PsychologyDimension::Urgency,
        PsychologyDimension::Availability,
        PsychologyDimension::Trust,
        PsychologyDimension::Commitment,
    ];

    /// Position of this dimension in a `PsychologyVector`.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Stable lowercase name (the JSON key).
    pub fn as_str(self) -> &'static str {
        match self {
            PsychologyDimension::Interest => "interest",
            PsychologyDimension::Urgency => "urgency",
            PsychologyDimension::Availability => "availability",
            PsychologyDimension::Trust => "trust",
            PsychologyDimension::Commitment => "commitment",
        }
    }

    /// Parse a JSON key. Returns None if unrecognized.
    pub fn parse(s: &str) -> Option<PsychologyDimension> {
        Self::ALL.into_iter().find(|d| d.as_str() == s)
    }
}

/// A reusable building block that can be selected into a strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Component {
    pub id: ComponentId,
    pub name: String,
    pub description: String,
    /// Free-form tags; a component also implicitly carries its own name.
    pub tags: BTreeSet<String>,
    /// Effectiveness per context type, indexed by context-type id.
    pub effectiveness_by_context_type: Vec<f64>,
    /// Effectiveness per stage, indexed by stage id.
    pub effectiveness_by_stage: Vec<f64>,
    /// Directed: `b` in `a.compatible_with` says nothing about `a` in `b`'s set.
    pub compatible_with: BTreeSet<ComponentId>,
}

impl Component {
    /// True if the component is named `tag` or lists it among its tags.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.name == tag || self.tags.contains(tag)
    }

    pub fn is_compatible_with(&self, other: ComponentId) -> bool {
        self.compatible_with.contains(&other)
    }

    /// Unweighted mean of the context-type and stage effectiveness.
    pub fn combined_effectiveness(&self, context_type: usize, stage: usize) -> f64 {
        let base = self
            .effectiveness_by_context_type
            .get(context_type)
            .copied()
            .unwrap_or(0.0);
        let stage_eff = self
            .effectiveness_by_stage
            .get(stage)
            .copied()
            .unwrap_or(0.0);
        (base + stage_eff) / 2.0
    }
}

/// A situational persona (e.g. "cautious", "price_shopper").
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextType {
    pub id: usize,
    pub name: String,
    pub description: String,
    pub preferred_components: BTreeSet<ComponentId>,
    pub psychology_weights: PsychologyVector,
}

/// A stage of the process (e.g. "early", "closing").
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stage {
    pub id: usize,
    pub name: String,
    pub description: String,
    pub preferred_components: BTreeSet<ComponentId>,
}

/// An ordinal urgency level. Levels are declared low to high.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UrgencyLevel {
    pub id: usize,
    pub name: String,
    pub description: String,
    /// Components tagged as urgency-relevant at this level.
    pub preferred_components: BTreeSet<ComponentId>,
}

/// Kinds of catalog entries, for `ComponentCatalog::count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogKind {
    Component,
    ContextType,
    Stage,
    UrgencyLevel,
}

impl CatalogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKind::Component => "components",
            CatalogKind::ContextType => "context_types",
            CatalogKind::Stage => "stages",
            CatalogKind::UrgencyLevel => "urgency_levels",
        }
    }
}

/// Optional fixed cardinalities a catalog must satisfy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogShape {
    pub components: Option<usize>,
    pub context_types: Option<usize>,
    pub stages: Option<usize>,
    pub urgency_levels: Option<usize>,
}

impl CatalogShape {
    /// Shape of the built-in appointment-booking domain.
    pub const APPOINTMENT_BOOKING: CatalogShape = CatalogShape {
        components: Some(10),
        context_types: Some(6),
        stages: Some(4),
        urgency_levels: Some(3),
    };

    /// No cardinality constraints.
    pub fn unconstrained() -> Self {
        Self::default()
    }

    fn check(&self, catalog: &ComponentCatalog) -> Result<(), CatalogError> {
        let expectations = [
            (CatalogKind::Component, self.components),
            (CatalogKind::ContextType, self.context_types),
            (CatalogKind::Stage, self.stages),
            (CatalogKind::UrgencyLevel, self.urgency_levels),
        ];
        for (kind, expected) in expectations {
            if let Some(expected) = expected {
                let actual = catalog.count(kind);
                if actual != expected {
                    return Err(CatalogError::Cardinality {
                        kind: kind.as_str(),
                        expected,
                        actual,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Validated, read-only domain description.
#[derive(Debug, Clone)]
pub struct ComponentCatalog {
    components: Vec<Component>,
    context_types: Vec<ContextType>,
    stages: Vec<Stage>,
    urgency_levels: Vec<UrgencyLevel>,
    source_digest: String,
}

impl ComponentCatalog {
    /// Parse and validate a catalog with no cardinality constraints.
    pub fn from_json_str(text: &str) -> Result<Self, CatalogError> {
        Self::from_json_str_with_shape(text, CatalogShape::unconstrained())
    }

    /// Parse and validate a catalog, then enforce `shape`.
    pub fn from_json_str_with_shape(text: &str, shape: CatalogShape) -> Result<Self, CatalogError> {
        let parsed = parse::parse_catalog(text)?;
        let catalog = Self {
            components: parsed.components,
            context_types: parsed.context_types,
            stages: parsed.stages,
            urgency_levels: parsed.urgency_levels,
            source_digest: sha256_digest(text.as_bytes()),
        };
        shape.check(&catalog)?;
        Ok(catalog)
    }

    /// Load a catalog from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        Self::from_json_file_with_shape(path, CatalogShape::unconstrained())
    }

    /// Load a catalog from a JSON file and enforce `shape`.
    pub fn from_json_file_with_shape<P: AsRef<Path>>(
        path: P,
        shape: CatalogShape,
    ) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_json_str_with_shape(&text, shape)?;
        info!(
            path = %path.display(),
            components = catalog.count(CatalogKind::Component),
            context_types = catalog.count(CatalogKind::ContextType),
            stages = catalog.count(CatalogKind::Stage),
            urgency_levels = catalog.count(CatalogKind::UrgencyLevel),
            digest = %catalog.source_digest,
            "catalog loaded"
        );
        Ok(catalog)
    }

    /// The built-in appointment-booking catalog (10 × 6 × 4 × 3).
    pub fn appointment_booking() -> Result<Self, CatalogError> {
        Self::from_json_str_with_shape(APPOINTMENT_BOOKING_JSON, CatalogShape::APPOINTMENT_BOOKING)
    }

    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(id)
    }

    pub fn context_type(&self, id: usize) -> Option<&ContextType> {
        self.context_types.get(id)
    }

    pub fn stage(&self, id: usize) -> Option<&Stage> {
        self.stages.get(id)
    }

    pub fn urgency_level(&self, id: usize) -> Option<&UrgencyLevel> {
        self.urgency_levels.get(id)
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn context_types(&self) -> &[ContextType] {
        &self.context_types
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn urgency_levels(&self) -> &[UrgencyLevel] {
        &self.urgency_levels
    }

    /// Number of declared entries of the given kind.
    pub fn count(&self, kind: CatalogKind) -> usize {
        match kind {
            CatalogKind::Component => self.components.len(),
            CatalogKind::ContextType => self.context_types.len(),
            CatalogKind::Stage => self.stages.len(),
            CatalogKind::UrgencyLevel => self.urgency_levels.len(),
        }
    }

    pub fn component_index(&self, name: &str) -> Option<ComponentId> {
        self.components.iter().position(|c| c.name == name)
    }

    pub fn context_type_index(&self, name: &str) -> Option<usize> {
        self.context_types.iter().position(|c| c.name == name)
    }

    pub fn stage_index(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.name == name)
    }

    pub fn urgency_index(&self, name: &str) -> Option<usize> {
        self.urgency_levels.iter().position(|u| u.name == name)
    }

    /// Id of the highest declared urgency level (the one unlocking the bonus).
    pub fn high_urgency(&self) -> usize {
        self.urgency_levels.len().saturating_sub(1)
    }

    /// True if the component is tagged urgency-relevant by the high level.
    pub fn is_urgency_tagged(&self, component: ComponentId) -> bool {
        self.urgency_levels
            .last()
            .is_some_and(|level| level.preferred_components.contains(&component))
    }

    /// `sha256:<hex>` digest of the JSON source this catalog was built from.
    pub fn source_digest(&self) -> &str {
        &self.source_digest
    }

    /// Names of the given component ids, in order. Unknown ids are skipped.
    pub fn component_names(&self, ids: &[ComponentId]) -> Vec<String> {
        ids.iter()
            .filter_map(|&id| self.component(id))
            .map(|c| c.name.clone())
            .collect()
    }
}

fn sha256_digest(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(bytes);
    let mut out = String::with_capacity(7 + hash.len() * 2);
    out.push_str("sha256:");
    for b in hash.iter() {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) const TINY: &str = r#"{
        "components": {
            "a": {
                "effectiveness": {"p": 0.5},
                "stage_effectiveness": {"s": 0.5},
                "compatibility": ["b"]
            },
            "b": {
                "effectiveness": {"p": 0.7},
                "stage_effectiveness": {"s": 0.3},
                "tags": ["value_proposition"]
            }
        },
        "context_types": {
            "p": {
                "preferred_components": ["a"],
                "psychology_weights": {
                    "interest": 0.7, "urgency": 0.2, "availability": 0.4,
                    "trust": 0.5, "commitment": 0.3
                }
            }
        },
        "stages": {"s": {"preferred_components": []}},
        "urgency_levels": {"low": {}, "high": {"preferred_components": ["b"]}}
    }"#;

    #[test]
    fn test_builtin_catalog_shape() {
        let catalog = ComponentCatalog::appointment_booking().expect("built-in catalog must load");
        assert_eq!(catalog.count(CatalogKind::Component), 10);
        assert_eq!(catalog.count(CatalogKind::ContextType), 6);
        assert_eq!(catalog.count(CatalogKind::Stage), 4);
        assert_eq!(catalog.count(CatalogKind::UrgencyLevel), 3);
        assert_eq!(catalog.component_index("rapport_building"), Some(0));
        assert_eq!(catalog.component_index("personalization"), Some(9));
        assert_eq!(catalog.urgency_index("high"), Some(catalog.high_urgency()));
    }

    #[test]
    fn test_builtin_urgency_tags() {
        let catalog = ComponentCatalog::appointment_booking().unwrap();
        let urgency = catalog.component_index("urgency_creation").unwrap();
        let booking = catalog.component_index("appointment_booking").unwrap();
        let rapport = catalog.component_index("rapport_building").unwrap();
        assert!(catalog.is_urgency_tagged(urgency));
        assert!(catalog.is_urgency_tagged(booking));
        assert!(!catalog.is_urgency_tagged(rapport));
    }

    #[test]
    fn test_declaration_order_defines_ids() {
        let catalog = ComponentCatalog::from_json_str(TINY).unwrap();
        assert_eq!(catalog.component(0).unwrap().name, "a");
        assert_eq!(catalog.component(1).unwrap().name, "b");
        assert!(catalog.component(2).is_none());
        assert_eq!(catalog.urgency_level(1).unwrap().name, "high");
    }

    #[test]
    fn test_compatibility_is_directed() {
        let catalog = ComponentCatalog::from_json_str(TINY).unwrap();
        let a = catalog.component(0).unwrap();
        let b = catalog.component(1).unwrap();
        assert!(a.is_compatible_with(1));
        assert!(!b.is_compatible_with(0));
    }

    #[test]
    fn test_tags_include_own_name() {
        let catalog = ComponentCatalog::from_json_str(TINY).unwrap();
        let b = catalog.component(1).unwrap();
        assert!(b.has_tag("b"));
        assert!(b.has_tag("value_proposition"));
        assert!(!b.has_tag("follow_up"));
    }

    #[test]
    fn test_psychology_weights_in_dimension_order() {
        let catalog = ComponentCatalog::from_json_str(TINY).unwrap();
        let weights = catalog.context_type(0).unwrap().psychology_weights;
        assert_eq!(weights, [0.7, 0.2, 0.4, 0.5, 0.3]);
        assert_eq!(weights[PsychologyDimension::Trust.index()], 0.5);
    }

    #[test]
    fn test_shape_violation_rejected() {
        let shape = CatalogShape {
            context_types: Some(6),
            ..CatalogShape::unconstrained()
        };
        let err = ComponentCatalog::from_json_str_with_shape(TINY, shape).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Cardinality {
                kind: "context_types",
                expected: 6,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_digest_is_stable() {
        let c1 = ComponentCatalog::from_json_str(TINY).unwrap();
        let c2 = ComponentCatalog::from_json_str(TINY).unwrap();
        assert_eq!(c1.source_digest(), c2.source_digest());
        assert!(c1.source_digest().starts_with("sha256:"));
        assert_eq!(c1.source_digest().len(), 7 + 64);
    }

    #[test]
    fn test_psychology_dimension_parse() {
        for dim in PsychologyDimension::ALL {
            assert_eq!(PsychologyDimension::parse(dim.as_str()), Some(dim));
        }
        assert_eq!(PsychologyDimension::parse("patience"), None);
    }
}
