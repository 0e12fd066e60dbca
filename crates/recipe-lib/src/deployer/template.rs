//! Text template rendering shared by deployer implementations.
//!
//! Templates are pure text over fixed per-deployer data structs. HTML
//! escaping is disabled: the outputs are YAML and Markdown, never HTML.

use handlebars::Handlebars;
use serde::Serialize;

use crate::error::{RecipeError, Result};

/// Component summary handed to README templates.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentInfo {
    pub name: String,
    pub version: String,
    pub namespace: String,
}

/// Data for README template rendering, shared across deployers.
///
/// The timestamp is the recipe's `generated_at`, not the wall clock, so
/// pinned builds render byte-identical bundles.
#[derive(Debug, Clone, Serialize)]
pub struct ReadmeData {
    pub timestamp: String,
    pub recipe_version: String,
    pub components: Vec<ComponentInfo>,
}

/// Render a template with the given data.
pub fn render<T: Serialize>(template: &str, data: &T) -> Result<String> {
    let mut registry = Handlebars::new();
    registry.register_escape_fn(handlebars::no_escape);
    registry
        .render_template(template, data)
        .map_err(|e| RecipeError::Render(e.to_string()))
}
