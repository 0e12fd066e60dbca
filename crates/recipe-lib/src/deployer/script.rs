//! Script deployer
//!
//! The default target for manual installs: emits a single README listing
//! the components in deployment order.

use std::path::Path;

use tokio_util::sync::CancellationToken;

use super::template::{render, ComponentInfo, ReadmeData};
use super::{async_trait, write_artifact, Artifacts, Deployer, DeployerConfig};
use crate::error::Result;
use crate::model::RecipeResult;

const README_TEMPLATE: &str = include_str!("templates/script_readme.md.hbs");

/// Generates the manual-deployment README.
#[derive(Debug, Default)]
pub struct ScriptDeployer {
    config: DeployerConfig,
}

impl ScriptDeployer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Deployer for ScriptDeployer {
    async fn generate(
        &self,
        token: &CancellationToken,
        recipe: &RecipeResult,
        bundle_dir: &Path,
    ) -> Result<Artifacts> {
        let mut artifacts = Artifacts::default();

        let data = ReadmeData {
            timestamp: recipe.metadata.generated_at.to_rfc3339(),
            recipe_version: recipe.metadata.version.clone(),
            components: recipe
                .ordered_components()
                .into_iter()
                .map(|c| ComponentInfo {
                    name: c.name.clone(),
                    version: c.version.clone(),
                    namespace: self.config.namespace_for(&c.name),
                })
                .collect(),
        };

        let readme = render(README_TEMPLATE, &data)?;
        let readme_path = bundle_dir.join("README.md");
        write_artifact(token, &readme_path, &readme, false)?;

        artifacts.files.push(readme_path);
        artifacts.readme_content = Some(readme);
        Ok(artifacts)
    }

    fn configure(&mut self, config: &DeployerConfig) -> Result<()> {
        self.config = config.clone();
        Ok(())
    }
}
