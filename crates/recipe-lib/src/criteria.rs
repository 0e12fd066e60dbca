//! Recipe selection criteria
//!
//! A criteria is a seven-dimensional selector (service, fabric,
//! accelerator, intent, worker OS, system OS, node count) with a wildcard
//! sentinel per dimension. Overlays carry partial criteria; callers supply
//! full criteria via query parameters, CLI flags, or a criteria file.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RecipeError, Result};

/// Wildcard spelling accepted by every dimension.
const ANY_VALUE: &str = "any";

/// Expected `kind` of a criteria input file.
pub const CRITERIA_FILE_KIND: &str = "recipeCriteria";

/// Expected `apiVersion` of a criteria input file.
pub const CRITERIA_FILE_API_VERSION: &str = "cns.nvidia.com/v1alpha1";

macro_rules! criteria_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal,
        any: [ $( $anyalias:literal ),* ],
        $( $variant:ident => $canonical:literal $(| $alias:literal)* ),+ $(,)?
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
        )]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            #[default]
            Any,
            $( #[serde(rename = $canonical)] $variant, )+
        }

        impl $name {
            /// All non-wildcard canonical spellings, sorted alphabetically.
            pub fn supported() -> Vec<&'static str> {
                let mut values = vec![ $( $canonical, )+ ];
                values.sort_unstable();
                values
            }

            pub fn is_any(&self) -> bool {
                matches!(self, $name::Any)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $name::Any => f.write_str(ANY_VALUE),
                    $( $name::$variant => f.write_str($canonical), )+
                }
            }
        }

        impl FromStr for $name {
            type Err = RecipeError;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_lowercase().as_str() {
                    "" | ANY_VALUE $(| $anyalias)* => Ok($name::Any),
                    $( $canonical $(| $alias)* => Ok($name::$variant), )+
                    other => Err(RecipeError::CriteriaParse(format!(
                        "invalid {}: {:?} (supported: {})",
                        $label,
                        other,
                        $name::supported().join(", "),
                    ))),
                }
            }
        }
    };
}

criteria_enum!(
    /// Managed Kubernetes service the cluster runs on.
    ///
    /// Self-managed spellings collapse to the wildcard: a vanilla cluster
    /// places no service-specific constraints on the recipe.
    ServiceType, "service type",
    any: ["self-managed", "self", "vanilla"],
    Eks => "eks",
    Gke => "gke",
    Aks => "aks",
    Oke => "oke",
);

criteria_enum!(
    /// High-speed network fabric between worker nodes.
    FabricType, "fabric type",
    any: [],
    Efa => "efa",
    Ib => "ib" | "infiniband",
);

criteria_enum!(
    /// GPU family installed on accelerated nodes.
    AcceleratorType, "accelerator type",
    any: [],
    H100 => "h100",
    Gb200 => "gb200",
    A100 => "a100",
    L40 => "l40",
);

criteria_enum!(
    /// Primary workload the cluster is tuned for.
    IntentType, "intent type",
    any: [],
    Training => "training",
    Inference => "inference",
);

criteria_enum!(
    /// Operating system running on a node class.
    OsType, "os type",
    any: [],
    Ubuntu => "ubuntu",
    Rhel => "rhel",
    Cos => "cos",
    AmazonLinux => "amazonlinux" | "al2" | "al2023",
);

/// Input parameters for recipe matching.
///
/// All dimensions default to the wildcard; `nodes` of zero means
/// unspecified. Criteria are value types, immutable once constructed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criteria {
    #[serde(default, skip_serializing_if = "ServiceType::is_any")]
    pub service: ServiceType,

    #[serde(default, skip_serializing_if = "FabricType::is_any")]
    pub fabric: FabricType,

    #[serde(default, skip_serializing_if = "AcceleratorType::is_any")]
    pub accelerator: AcceleratorType,

    #[serde(default, skip_serializing_if = "IntentType::is_any")]
    pub intent: IntentType,

    /// Worker node OS.
    #[serde(default, skip_serializing_if = "OsType::is_any")]
    pub worker: OsType,

    /// System/control-plane node OS.
    #[serde(default, skip_serializing_if = "OsType::is_any")]
    pub system: OsType,

    /// Number of worker nodes; 0 means unspecified.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub nodes: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl Criteria {
    /// A criteria with every dimension set to the wildcard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Symmetric wildcard-aware match: each dimension matches when either
    /// side is the wildcard or both sides agree. `nodes` of zero plays the
    /// role of the wildcard.
    pub fn matches(&self, other: &Criteria) -> bool {
        if !self.service.is_any() && !other.service.is_any() && self.service != other.service {
            return false;
        }
        if !self.fabric.is_any() && !other.fabric.is_any() && self.fabric != other.fabric {
            return false;
        }
        if !self.accelerator.is_any()
            && !other.accelerator.is_any()
            && self.accelerator != other.accelerator
        {
            return false;
        }
        if !self.intent.is_any() && !other.intent.is_any() && self.intent != other.intent {
            return false;
        }
        if !self.worker.is_any() && !other.worker.is_any() && self.worker != other.worker {
            return false;
        }
        if !self.system.is_any() && !other.system.is_any() && self.system != other.system {
            return false;
        }
        if self.nodes != 0 && other.nodes != 0 && self.nodes != other.nodes {
            return false;
        }
        true
    }

    /// Directional check used for overlay selection: true when `request`
    /// meets every constraint this criteria declares. A wildcard on the
    /// request side does not satisfy a specific constraint, so an
    /// all-wildcard request selects only all-wildcard overlays.
    pub fn is_satisfied_by(&self, request: &Criteria) -> bool {
        (self.service.is_any() || self.service == request.service)
            && (self.fabric.is_any() || self.fabric == request.fabric)
            && (self.accelerator.is_any() || self.accelerator == request.accelerator)
            && (self.intent.is_any() || self.intent == request.intent)
            && (self.worker.is_any() || self.worker == request.worker)
            && (self.system.is_any() || self.system == request.system)
            && (self.nodes == 0 || self.nodes == request.nodes)
    }

    /// Count of non-wildcard, non-zero dimensions. More specific overlays
    /// are applied later so their values win at the leaves.
    pub fn specificity(&self) -> usize {
        let mut score = 0;
        if !self.service.is_any() {
            score += 1;
        }
        if !self.fabric.is_any() {
            score += 1;
        }
        if !self.accelerator.is_any() {
            score += 1;
        }
        if !self.intent.is_any() {
            score += 1;
        }
        if !self.worker.is_any() {
            score += 1;
        }
        if !self.system.is_any() {
            score += 1;
        }
        if self.nodes != 0 {
            score += 1;
        }
        score
    }
}

impl fmt::Display for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.service.is_any() {
            parts.push(format!("service={}", self.service));
        }
        if !self.fabric.is_any() {
            parts.push(format!("fabric={}", self.fabric));
        }
        if !self.accelerator.is_any() {
            parts.push(format!("accelerator={}", self.accelerator));
        }
        if !self.intent.is_any() {
            parts.push(format!("intent={}", self.intent));
        }
        if !self.worker.is_any() {
            parts.push(format!("worker={}", self.worker));
        }
        if !self.system.is_any() {
            parts.push(format!("system={}", self.system));
        }
        if self.nodes != 0 {
            parts.push(format!("nodes={}", self.nodes));
        }
        if parts.is_empty() {
            f.write_str("criteria(any)")
        } else {
            write!(f, "criteria({})", parts.join(", "))
        }
    }
}

/// Textual form of a criteria, used by overlay definitions and the
/// criteria input file. Omitted fields mean the wildcard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CriteriaSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fabric: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<u32>,
}

impl CriteriaSpec {
    /// Resolve the textual form into a typed criteria.
    pub fn resolve(&self) -> Result<Criteria> {
        let mut criteria = Criteria::new();
        if let Some(s) = &self.service {
            criteria.service = s.parse()?;
        }
        if let Some(s) = &self.fabric {
            criteria.fabric = s.parse()?;
        }
        if let Some(s) = &self.accelerator {
            criteria.accelerator = s.parse()?;
        }
        if let Some(s) = &self.intent {
            criteria.intent = s.parse()?;
        }
        if let Some(s) = &self.worker {
            criteria.worker = s.parse()?;
        }
        if let Some(s) = &self.system {
            criteria.system = s.parse()?;
        }
        if let Some(n) = self.nodes {
            criteria.nodes = n;
        }
        Ok(criteria)
    }
}

/// Parse criteria from URL query parameters.
///
/// All parameters are optional and default to the wildcard. `gpu` is
/// accepted as an alias for `accelerator`.
pub fn parse_query(params: &HashMap<String, String>) -> Result<Criteria> {
    let get = |key: &str| params.get(key).map(String::as_str).unwrap_or("");

    let mut criteria = Criteria::new();
    criteria.service = get("service").parse()?;
    criteria.fabric = get("fabric").parse()?;

    let accelerator = match get("accelerator") {
        "" => get("gpu"),
        value => value,
    };
    criteria.accelerator = accelerator.parse()?;

    criteria.intent = get("intent").parse()?;
    criteria.worker = get("worker").parse()?;
    criteria.system = get("system").parse()?;

    let nodes = get("nodes");
    if !nodes.is_empty() {
        criteria.nodes = nodes.trim().parse::<u32>().map_err(|_| {
            RecipeError::CriteriaParse(format!(
                "invalid nodes value: {:?} (must be a non-negative integer)",
                nodes
            ))
        })?;
    }

    Ok(criteria)
}

/// A `kind: recipeCriteria` input document, the file-based alternative to
/// query parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriteriaFile {
    pub kind: String,
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    #[serde(default)]
    pub metadata: CriteriaFileMetadata,
    pub spec: CriteriaSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CriteriaFileMetadata {
    #[serde(default)]
    pub name: String,
}

impl CriteriaFile {
    /// Parse a criteria document from YAML and resolve its spec.
    pub fn parse(yaml: &str) -> Result<Criteria> {
        let file: CriteriaFile = serde_yaml::from_str(yaml)
            .map_err(|e| RecipeError::CriteriaParse(format!("malformed criteria file: {e}")))?;

        if file.kind != CRITERIA_FILE_KIND {
            return Err(RecipeError::CriteriaParse(format!(
                "unexpected kind {:?}, want {:?}",
                file.kind, CRITERIA_FILE_KIND
            )));
        }
        if file.api_version != CRITERIA_FILE_API_VERSION {
            return Err(RecipeError::CriteriaParse(format!(
                "unexpected apiVersion {:?}, want {:?}",
                file.api_version, CRITERIA_FILE_API_VERSION
            )));
        }

        file.spec.resolve()
    }
}
