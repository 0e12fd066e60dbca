//! Error types shared across the recipe pipeline
//!
//! Every failure the library can surface maps to one of these kinds.
//! Transport layers (HTTP, CLI) translate kinds into status codes and
//! exit codes; the library itself never recovers an error locally.

use crate::deployer::DeployerType;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, RecipeError>;

/// Error kinds produced by the recipe pipeline.
#[derive(Debug, thiserror::Error)]
pub enum RecipeError {
    /// Unknown enum value, negative node count, or malformed criteria file.
    #[error("invalid criteria: {0}")]
    CriteriaParse(String),

    /// Malformed embedded recipe data or duplicate overlay identifiers.
    #[error("recipe store: {0}")]
    StoreLoad(String),

    /// A dependency reference names a component missing from the recipe.
    #[error("component {component} depends on unknown component {dependency}")]
    UnresolvedDependency {
        component: String,
        dependency: String,
    },

    /// The component dependency graph contains a cycle.
    #[error("dependency cycle among components: {}", participants.join(", "))]
    Cycle { participants: Vec<String> },

    /// A deployer template failed to parse or execute.
    #[error("template render failed: {0}")]
    Render(String),

    /// Filesystem read or write failure while emitting artifacts.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// A cancellation token was observed mid-operation.
    #[error("operation cancelled")]
    Cancelled,

    /// A requested deployer type has no registered factory.
    #[error("deployer {0} is not registered")]
    DeployerAbsent(DeployerType),

    /// Invalid registry wiring, e.g. registering a type twice.
    #[error("deployer registry: {0}")]
    Registry(String),

    /// A recipe failed bundler validation before any deployer ran.
    #[error("invalid recipe: {0}")]
    Validation(String),
}

impl RecipeError {
    /// Stable machine-readable code for error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            RecipeError::CriteriaParse(_) => "INVALID_CRITERIA",
            RecipeError::StoreLoad(_) => "STORE_LOAD_FAILED",
            RecipeError::UnresolvedDependency { .. } => "UNRESOLVED_DEPENDENCY",
            RecipeError::Cycle { .. } => "DEPENDENCY_CYCLE",
            RecipeError::Render(_) => "RENDER_FAILED",
            RecipeError::Io(_) => "IO_ERROR",
            RecipeError::Cancelled => "CANCELLED",
            RecipeError::DeployerAbsent(_) => "DEPLOYER_ABSENT",
            RecipeError::Registry(_) => "REGISTRY_ERROR",
            RecipeError::Validation(_) => "INVALID_RECIPE",
        }
    }

    /// Whether retrying the same operation may succeed.
    pub fn retryable(&self) -> bool {
        matches!(self, RecipeError::Io(_))
    }
}
