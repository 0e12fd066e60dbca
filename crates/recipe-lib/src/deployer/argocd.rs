//! Argo CD deployer
//!
//! Emits one Application manifest per component plus a parent
//! app-of-apps. A component's sync wave is its 0-based position in the
//! deployment order; components outside the order default to wave 0 and
//! sort after ordered ones.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::template::{render, ComponentInfo, ReadmeData};
use super::{async_trait, write_artifact, Artifacts, Deployer, DeployerConfig};
use crate::error::Result;
use crate::model::RecipeResult;

const APPLICATION_TEMPLATE: &str = include_str!("templates/argocd_application.yaml.hbs");
const APP_OF_APPS_TEMPLATE: &str = include_str!("templates/argocd_app_of_apps.yaml.hbs");
const README_TEMPLATE: &str = include_str!("templates/argocd_readme.md.hbs");

/// Data for the Application manifest template.
#[derive(Debug, Serialize)]
struct ApplicationData {
    name: String,
    source: String,
    chart: String,
    version: String,
    namespace: String,
    sync_wave: usize,
    labels: Option<BTreeMap<String, String>>,
}

/// Generates Argo CD Application manifests.
#[derive(Debug, Default)]
pub struct ArgoCdDeployer {
    config: DeployerConfig,
}

impl ArgoCdDeployer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Deployer for ArgoCdDeployer {
    async fn generate(
        &self,
        token: &CancellationToken,
        recipe: &RecipeResult,
        bundle_dir: &Path,
    ) -> Result<Artifacts> {
        let mut artifacts = Artifacts::default();
        let argocd_dir = bundle_dir.join("argocd");

        let wave_of = |name: &str| {
            recipe
                .deployment_order
                .iter()
                .position(|n| n == name)
                .unwrap_or(0)
        };

        for component in recipe.ordered_components() {
            let data = ApplicationData {
                name: component.name.clone(),
                source: component.source.clone(),
                chart: component
                    .chart
                    .clone()
                    .unwrap_or_else(|| component.name.clone()),
                version: component.version.clone(),
                namespace: self.config.namespace_for(&component.name),
                sync_wave: wave_of(&component.name),
                labels: if self.config.labels.is_empty() {
                    None
                } else {
                    Some(self.config.labels.clone())
                },
            };

            let manifest = render(APPLICATION_TEMPLATE, &data)?;
            let path = argocd_dir.join(format!("{}-app.yaml", component.name));
            write_artifact(token, &path, &manifest, false)?;
            artifacts.files.push(path);
        }

        let app_of_apps = render(APP_OF_APPS_TEMPLATE, &serde_json::json!({}))?;
        let app_of_apps_path = argocd_dir.join("app-of-apps.yaml");
        write_artifact(token, &app_of_apps_path, &app_of_apps, false)?;
        artifacts.files.push(app_of_apps_path);

        if self.config.include_readme {
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
        }

        Ok(artifacts)
    }

    fn configure(&mut self, config: &DeployerConfig) -> Result<()> {
        self.config = config.clone();
        Ok(())
    }
}
