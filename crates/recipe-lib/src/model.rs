//! Recipe data model
//!
//! A recipe is a bundle of measurements, component references, and an
//! optional values tree. The store holds one base recipe plus overlay
//! fragments; the builder folds matching overlays onto the base and
//! returns an immutable [`RecipeResult`] to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::criteria::{Criteria, CriteriaSpec};
use crate::measurement::Measurement;

/// Schema version stamped into every built recipe.
pub const PAYLOAD_VERSION: &str = "v1";

/// How a component is packaged and applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentType {
    Helm,
    Kustomize,
}

impl Default for ComponentType {
    fn default() -> Self {
        ComponentType::Helm
    }
}

/// Node selector value paths for one node class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingPaths {
    #[serde(default)]
    pub node_selector_paths: Vec<String>,
}

/// Scheduling hints splitting a component's workloads across system and
/// accelerated node classes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeScheduling {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SchedulingPaths>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerated: Option<SchedulingPaths>,
}

/// A deployable unit (operator, controller, add-on) referenced by a
/// recipe. Names are unique within a recipe; `dependency_refs` name other
/// components in the same recipe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRef {
    pub name: String,

    #[serde(default)]
    pub version: String,

    #[serde(default, rename = "type")]
    pub component_type: ComponentType,

    /// Chart repository or source URL.
    #[serde(default)]
    pub source: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    #[serde(default)]
    pub dependency_refs: Vec<String>,

    #[serde(default)]
    pub value_override_keys: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_scheduling: Option<NodeScheduling>,
}

impl ComponentRef {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }
}

/// The base recipe loaded from embedded data. Criteria is implicitly
/// all-wildcard; measurements and components are required.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    /// Recipe corpus version, stamped into result metadata.
    pub version: String,

    pub measurements: Vec<Measurement>,

    pub component_refs: Vec<ComponentRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<serde_json::Value>,
}

/// A partial recipe contributed when its criteria matches the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayDoc {
    /// Unique overlay identifier, reported in `matched_overlay_ids`.
    pub id: String,

    /// Partial criteria; omitted fields mean the wildcard.
    #[serde(default)]
    pub criteria: CriteriaSpec,

    #[serde(default)]
    pub measurements: Vec<Measurement>,

    #[serde(default)]
    pub component_refs: Vec<ComponentRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<serde_json::Value>,
}

/// An overlay with its criteria resolved to typed form. Source order is
/// preserved for stable specificity tie-breaks.
#[derive(Debug, Clone)]
pub struct Overlay {
    pub id: String,
    pub criteria: Criteria,
    pub measurements: Vec<Measurement>,
    pub component_refs: Vec<ComponentRef>,
    pub values: Option<serde_json::Value>,
}

/// Provenance stamped onto every built recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    /// Recipe corpus version.
    pub version: String,

    /// UTC build timestamp, RFC 3339. Pinnable for reproducible output.
    pub generated_at: DateTime<Utc>,

    /// Schema version of the result payload.
    pub payload_version: String,
}

/// A fully resolved recipe: the response returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeResult {
    pub metadata: ResultMetadata,

    pub criteria: Criteria,

    /// Applied overlay identifiers, in application order.
    pub matched_overlay_ids: Vec<String>,

    pub measurements: Vec<Measurement>,

    pub component_refs: Vec<ComponentRef>,

    /// Component names topologically sorted so every dependency precedes
    /// its dependents. Deployers consume this order unchanged.
    pub deployment_order: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl RecipeResult {
    /// Look up a component reference by name.
    pub fn component_ref(&self, name: &str) -> Option<&ComponentRef> {
        self.component_refs.iter().find(|c| c.name == name)
    }

    /// Components sorted by deployment order. Components absent from the
    /// order keep their declared position after all ordered ones.
    pub fn ordered_components(&self) -> Vec<&ComponentRef> {
        let position = |name: &str| {
            self.deployment_order
                .iter()
                .position(|n| n == name)
        };

        let mut ordered: Vec<(usize, usize, &ComponentRef)> = self
            .component_refs
            .iter()
            .enumerate()
            .map(|(declared, c)| match position(&c.name) {
                Some(pos) => (0, pos, c),
                None => (1, declared, c),
            })
            .collect();
        ordered.sort_by_key(|(unordered, pos, _)| (*unordered, *pos));
        ordered.into_iter().map(|(_, _, c)| c).collect()
    }
}
