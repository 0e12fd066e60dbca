//! Recipe resolution and bundling for GPU-accelerated Kubernetes clusters
//!
//! This crate provides the core pipeline:
//! - Criteria parsing and wildcard-aware matching
//! - An immutable recipe store (base recipe + overlays) from embedded data
//! - Overlay resolution and deep merging into a resolved recipe
//! - Topological component ordering with cycle detection
//! - Deployer registry and per-target artifact generation
//! - Bundle orchestration with checksums and parallel execution

pub mod builder;
pub mod bundler;
pub mod checksum;
pub mod criteria;
pub mod deployer;
pub mod error;
pub mod graph;
pub mod measurement;
pub mod model;
pub mod observability;
pub mod store;

pub use builder::{BuildOptions, RecipeBuilder};
pub use criteria::Criteria;
pub use error::{RecipeError, Result};
pub use model::{ComponentRef, Recipe, RecipeResult};
pub use store::RecipeStore;

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use crate::criteria::Criteria;
    use crate::measurement::{Measurement, MeasurementType, Subtype};
    use crate::model::{
        ComponentRef, RecipeResult, ResultMetadata, PAYLOAD_VERSION,
    };

    /// A small resolved recipe with a three-component chain, used across
    /// deployer and bundler tests.
    pub fn sample_recipe() -> RecipeResult {
        let mut image = Subtype::new("image");
        image.data.insert("gpu-operator".into(), "v25.3.3".into());
        image.data.insert("driver".into(), "570.124.06".into());
        image
            .data
            .insert("container-toolkit".into(), "v1.17.5".into());

        let mut config = Subtype::new("config");
        config.data.insert("mig".into(), false.into());
        config
            .data
            .insert("useOpenKernelModule".into(), false.into());
        config.data.insert("rdma".into(), false.into());

        let mut k8s = Measurement::new(MeasurementType::K8s);
        k8s.subtypes.push(image);
        k8s.subtypes.push(config);

        let mut cert_manager = ComponentRef::new("cert-manager", "v1.17.2");
        cert_manager.source = "https://charts.jetstack.io".into();
        cert_manager.chart = Some("cert-manager".into());

        let mut gpu_operator = ComponentRef::new("gpu-operator", "v25.3.3");
        gpu_operator.source = "https://helm.ngc.nvidia.com/nvidia".into();
        gpu_operator.chart = Some("gpu-operator".into());
        gpu_operator.dependency_refs = vec!["cert-manager".into()];

        let mut skyhook = ComponentRef::new("skyhook", "v0.9.1");
        skyhook.source = "https://helm.ngc.nvidia.com/nvidia".into();
        skyhook.chart = Some("skyhook".into());
        skyhook.dependency_refs = vec!["gpu-operator".into()];

        RecipeResult {
            metadata: ResultMetadata {
                version: "v1.2.0".into(),
                generated_at: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
                payload_version: PAYLOAD_VERSION.into(),
            },
            criteria: Criteria::new(),
            matched_overlay_ids: vec![],
            measurements: vec![k8s],
            component_refs: vec![cert_manager, gpu_operator, skyhook],
            deployment_order: vec![
                "cert-manager".into(),
                "gpu-operator".into(),
                "skyhook".into(),
            ],
            values: Some(json!({
                "driver": {
                    "enabled": true,
                    "repository": "nvcr.io/nvidia",
                    "version": "570.124.06",
                },
            })),
            warnings: vec![],
        }
    }
}
