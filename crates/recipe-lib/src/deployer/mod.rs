//! Deployment artifact generation
//!
//! A deployer renders a resolved recipe into artifacts for one GitOps
//! target. Deployers are constructed per request from factories held in a
//! [`DeployerRegistry`] owned by the application root; reads are the hot
//! path, so the registry sits behind a readers-writer lock.

mod argocd;
mod flux;
mod helm;
mod namespace;
mod script;
mod template;

pub use argocd::ArgoCdDeployer;
pub use flux::FluxDeployer;
pub use helm::HelmDeployer;
pub use namespace::namespace_for_component;
pub use script::ScriptDeployer;

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{RecipeError, Result};
use crate::model::RecipeResult;

pub use async_trait::async_trait;

/// GitOps targets a recipe can be rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployerType {
    Script,
    Helm,
    ArgoCd,
    Flux,
}

impl DeployerType {
    /// All deployer types, in canonical order.
    pub fn all() -> &'static [DeployerType] {
        &[
            DeployerType::Script,
            DeployerType::Helm,
            DeployerType::ArgoCd,
            DeployerType::Flux,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeployerType::Script => "script",
            DeployerType::Helm => "helm",
            DeployerType::ArgoCd => "argocd",
            DeployerType::Flux => "flux",
        }
    }
}

impl fmt::Display for DeployerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeployerType {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "script" => Ok(DeployerType::Script),
            "helm" => Ok(DeployerType::Helm),
            "argocd" => Ok(DeployerType::ArgoCd),
            "flux" => Ok(DeployerType::Flux),
            other => Err(RecipeError::Registry(format!(
                "unknown deployer type {other:?} (supported: script, helm, argocd, flux)"
            ))),
        }
    }
}

/// Per-deployer configuration supplied through bundle options.
#[derive(Debug, Clone)]
pub struct DeployerConfig {
    /// Override the component namespace table with a single namespace.
    pub namespace: Option<String>,

    /// Custom labels stamped into rendered manifests where the target
    /// format supports them.
    pub labels: BTreeMap<String, String>,

    /// Emit the per-deployer README.
    pub include_readme: bool,
}

impl Default for DeployerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            labels: BTreeMap::new(),
            include_readme: true,
        }
    }
}

impl DeployerConfig {
    /// Namespace for a component, honoring the configured override.
    pub fn namespace_for(&self, component_name: &str) -> String {
        match &self.namespace {
            Some(ns) => ns.clone(),
            None => namespace_for_component(component_name).to_string(),
        }
    }
}

/// Files produced by one deployer run.
#[derive(Debug, Clone, Default)]
pub struct Artifacts {
    /// Absolute paths of every file written, in emission order.
    pub files: Vec<PathBuf>,

    /// Rendered README content, when the deployer produces one.
    pub readme_content: Option<String>,
}

/// Renders deployment artifacts for one GitOps target.
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Render artifacts for `recipe` into `bundle_dir`. The directory
    /// exists; the deployer owns everything beneath it.
    async fn generate(
        &self,
        token: &CancellationToken,
        recipe: &RecipeResult,
        bundle_dir: &Path,
    ) -> Result<Artifacts>;

    /// Pre-generation validation hook. The default accepts everything.
    fn validate(&self, _recipe: &RecipeResult) -> Result<()> {
        Ok(())
    }

    /// Configuration hook, applied once before generation.
    fn configure(&mut self, _config: &DeployerConfig) -> Result<()> {
        Ok(())
    }
}

/// Factory producing a fresh deployer per request. Factories must be
/// cheap and safe to call concurrently.
pub type DeployerFactory = fn() -> Box<dyn Deployer>;

/// Registry mapping deployer types to factories.
///
/// Owned by the application root and passed as a dependency; holding
/// factories rather than instances keeps per-request construction cheap
/// and isolation automatic.
pub struct DeployerRegistry {
    factories: RwLock<HashMap<DeployerType, DeployerFactory>>,
}

impl Default for DeployerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeployerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// A registry wired with every built-in deployer.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry
            .register(DeployerType::Script, || Box::new(ScriptDeployer::new()))
            .expect("builtin registration cannot collide in an empty registry");
        registry
            .register(DeployerType::Helm, || Box::new(HelmDeployer::new()))
            .expect("builtin registration cannot collide in an empty registry");
        registry
            .register(DeployerType::ArgoCd, || Box::new(ArgoCdDeployer::new()))
            .expect("builtin registration cannot collide in an empty registry");
        registry
            .register(DeployerType::Flux, || Box::new(FluxDeployer::new()))
            .expect("builtin registration cannot collide in an empty registry");
        registry
    }

    /// Register a factory. Duplicate registration is an error.
    pub fn register(&self, deployer_type: DeployerType, factory: DeployerFactory) -> Result<()> {
        let mut factories = self.factories.write().expect("registry lock poisoned");
        if factories.contains_key(&deployer_type) {
            return Err(RecipeError::Registry(format!(
                "deployer type {deployer_type} already registered"
            )));
        }
        factories.insert(deployer_type, factory);
        Ok(())
    }

    /// Remove a registered factory. Absent types are an error.
    pub fn unregister(&self, deployer_type: DeployerType) -> Result<()> {
        let mut factories = self.factories.write().expect("registry lock poisoned");
        if factories.remove(&deployer_type).is_none() {
            return Err(RecipeError::Registry(format!(
                "deployer type {deployer_type} not registered"
            )));
        }
        Ok(())
    }

    /// Construct a fresh deployer for the type, if registered.
    pub fn get(&self, deployer_type: DeployerType) -> Option<Box<dyn Deployer>> {
        let factories = self.factories.read().expect("registry lock poisoned");
        factories.get(&deployer_type).map(|factory| factory())
    }

    /// Registered types, in canonical order.
    pub fn types(&self) -> Vec<DeployerType> {
        let factories = self.factories.read().expect("registry lock poisoned");
        DeployerType::all()
            .iter()
            .copied()
            .filter(|t| factories.contains_key(t))
            .collect()
    }
}

/// Write one artifact file, honoring cancellation and the shared file
/// mode contract: 0600 for regular files, 0755 for executable scripts.
pub(crate) fn write_artifact(
    token: &CancellationToken,
    path: &Path,
    contents: &str,
    executable: bool,
) -> Result<()> {
    if token.is_cancelled() {
        return Err(RecipeError::Cancelled);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = if executable { 0o755 } else { 0o600 };
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = executable;

    Ok(())
}
