//! Flux deployer
//!
//! Emits a parent kustomization plus one HelmRelease per component. The
//! dependency expression is a linear chain over the deployment order: the
//! first component has no `dependsOn`, every later one depends on its
//! immediate predecessor. Stricter than the declared graph, kept for
//! compatibility with existing consumers.

use std::path::Path;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::template::{render, ComponentInfo, ReadmeData};
use super::{async_trait, write_artifact, Artifacts, Deployer, DeployerConfig};
use crate::error::Result;
use crate::model::RecipeResult;

const KUSTOMIZATION_TEMPLATE: &str = include_str!("templates/flux_kustomization.yaml.hbs");
const HELMRELEASE_TEMPLATE: &str = include_str!("templates/flux_helmrelease.yaml.hbs");
const README_TEMPLATE: &str = include_str!("templates/flux_readme.md.hbs");

/// Data for the component HelmRelease template.
#[derive(Debug, Serialize)]
struct HelmReleaseData {
    name: String,
    namespace: String,
    chart: String,
    version: String,
    /// Name of the HelmRelease this one depends on; `None` for the first
    /// component in the chain.
    depends_on_name: Option<String>,
    depends_on_namespace: Option<String>,
}

/// Generates Flux HelmRelease and Kustomization resources.
#[derive(Debug, Default)]
pub struct FluxDeployer {
    config: DeployerConfig,
}

impl FluxDeployer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Deployer for FluxDeployer {
    async fn generate(
        &self,
        token: &CancellationToken,
        recipe: &RecipeResult,
        bundle_dir: &Path,
    ) -> Result<Artifacts> {
        let mut artifacts = Artifacts::default();
        let ordered = recipe.ordered_components();

        let kustomization = render(
            KUSTOMIZATION_TEMPLATE,
            &serde_json::json!({
                "components": ordered
                    .iter()
                    .map(|c| serde_json::json!({"name": c.name}))
                    .collect::<Vec<_>>(),
            }),
        )?;
        let kustomization_path = bundle_dir.join("flux").join("kustomization.yaml");
        write_artifact(token, &kustomization_path, &kustomization, false)?;
        artifacts.files.push(kustomization_path);

        let mut previous: Option<(String, String)> = None;
        for component in &ordered {
            let namespace = self.config.namespace_for(&component.name);
            let data = HelmReleaseData {
                name: component.name.clone(),
                namespace: namespace.clone(),
                chart: component
                    .chart
                    .clone()
                    .unwrap_or_else(|| component.name.clone()),
                version: component.version.clone(),
                depends_on_name: previous.as_ref().map(|(name, _)| name.clone()),
                depends_on_namespace: previous.as_ref().map(|(_, ns)| ns.clone()),
            };

            let helmrelease = render(HELMRELEASE_TEMPLATE, &data)?;
            let path = bundle_dir.join(&component.name).join("helmrelease.yaml");
            write_artifact(token, &path, &helmrelease, false)?;
            artifacts.files.push(path);

            previous = Some((component.name.clone(), namespace));
        }

        if self.config.include_readme {
            let data = ReadmeData {
                timestamp: recipe.metadata.generated_at.to_rfc3339(),
                recipe_version: recipe.metadata.version.clone(),
                components: ordered
                    .iter()
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_recipe;
    use std::fs;

    #[tokio::test]
    async fn test_generate_emits_expected_layout() {
        let dir = tempfile::tempdir().unwrap();
        let recipe = sample_recipe();

        let artifacts = FluxDeployer::new()
            .generate(&CancellationToken::new(), &recipe, dir.path())
            .await
            .unwrap();

        assert!(dir.path().join("flux/kustomization.yaml").exists());
        for name in ["cert-manager", "gpu-operator", "skyhook"] {
            assert!(
                dir.path().join(name).join("helmrelease.yaml").exists(),
                "missing helmrelease for {name}"
            );
        }
        assert!(dir.path().join("README.md").exists());
        assert_eq!(artifacts.files.len(), 5);
    }

    #[tokio::test]
    async fn test_dependency_chain_follows_deployment_order() {
        let dir = tempfile::tempdir().unwrap();
        let recipe = sample_recipe();

        FluxDeployer::new()
            .generate(&CancellationToken::new(), &recipe, dir.path())
            .await
            .unwrap();

        let cert =
            fs::read_to_string(dir.path().join("cert-manager/helmrelease.yaml")).unwrap();
        assert!(
            !cert.contains("dependsOn:"),
            "first component must not declare dependsOn\n{cert}"
        );

        let gpu = fs::read_to_string(dir.path().join("gpu-operator/helmrelease.yaml")).unwrap();
        assert!(gpu.contains("dependsOn:"));
        assert!(gpu.contains("name: cert-manager"));

        let sky = fs::read_to_string(dir.path().join("skyhook/helmrelease.yaml")).unwrap();
        assert!(sky.contains("dependsOn:"));
        assert!(sky.contains("name: gpu-operator"));
    }

    #[tokio::test]
    async fn test_helmrelease_contents() {
        let dir = tempfile::tempdir().unwrap();

        FluxDeployer::new()
            .generate(&CancellationToken::new(), &sample_recipe(), dir.path())
            .await
            .unwrap();

        let content =
            fs::read_to_string(dir.path().join("gpu-operator/helmrelease.yaml")).unwrap();
        assert!(content.contains("apiVersion: helm.toolkit.fluxcd.io/v2"));
        assert!(content.contains("kind: HelmRelease"));
        assert!(content.contains("kind: HelmRepository"));
        assert!(content.contains("version: \"v25.3.3\""));
    }

    #[tokio::test]
    async fn test_kustomization_lists_components_in_order() {
        let dir = tempfile::tempdir().unwrap();

        FluxDeployer::new()
            .generate(&CancellationToken::new(), &sample_recipe(), dir.path())
            .await
            .unwrap();

        let content = fs::read_to_string(dir.path().join("flux/kustomization.yaml")).unwrap();
        let cert = content.find("../cert-manager").unwrap();
        let gpu = content.find("../gpu-operator").unwrap();
        let sky = content.find("../skyhook").unwrap();
        assert!(cert < gpu && gpu < sky);
    }

    #[tokio::test]
    async fn test_empty_components_still_emit_kustomization() {
        let dir = tempfile::tempdir().unwrap();
        let mut recipe = sample_recipe();
        recipe.component_refs.clear();
        recipe.deployment_order.clear();

        let artifacts = FluxDeployer::new()
            .generate(&CancellationToken::new(), &recipe, dir.path())
            .await
            .unwrap();

        assert!(dir.path().join("flux/kustomization.yaml").exists());
        // Kustomization + README only.
        assert_eq!(artifacts.files.len(), 2);
    }
}
