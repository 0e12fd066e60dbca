//! End-to-end recipe resolution scenarios against a small store corpus.

use recipe_lib::builder::{BuildOptions, RecipeBuilder};
use recipe_lib::criteria::{AcceleratorType, Criteria, IntentType, ServiceType};
use recipe_lib::error::RecipeError;
use recipe_lib::store::RecipeStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const BASE: &str = r#"
version: v1.0.0
measurements:
  - type: K8s
    subtypes:
      - name: image
        data:
          cert-manager: v1.17.2
          gpu-operator: v25.3.3
componentRefs:
  - name: cert-manager
    version: v1.17.2
    source: https://charts.jetstack.io
  - name: gpu-operator
    version: v25.3.3
    source: https://helm.ngc.nvidia.com/nvidia
    dependencyRefs:
      - cert-manager
values:
  driver:
    enabled: true
    repo: x
    version: "1.0"
"#;

const H100_INFERENCE: &str = r#"
id: h100-inference
criteria:
  accelerator: h100
  intent: inference
componentRefs:
  - name: network-operator
    version: v25.4.0
    source: https://helm.ngc.nvidia.com/nvidia
    dependencyRefs:
      - cert-manager
values:
  driver:
    version: "2.0"
"#;

const EKS: &str = r#"
id: eks
criteria:
  service: eks
values:
  shared:
    key: from-eks
"#;

const EKS_H100: &str = r#"
id: eks-h100
criteria:
  service: eks
  accelerator: h100
values:
  shared:
    key: from-eks-h100
"#;

fn builder_with(overlays: &[(&str, &str)]) -> RecipeBuilder {
    let store = RecipeStore::from_sources(BASE, overlays).unwrap();
    RecipeBuilder::new(Arc::new(store))
}

fn build(builder: &RecipeBuilder, criteria: &Criteria) -> recipe_lib::RecipeResult {
    builder
        .build(&CancellationToken::new(), criteria, &BuildOptions::default())
        .unwrap()
}

#[test]
fn wildcard_resolution_adds_overlay_component() {
    // S1: overlay adds network-operator depending on cert-manager.
    let builder = builder_with(&[("h100-inference", H100_INFERENCE)]);
    let criteria = Criteria {
        accelerator: AcceleratorType::H100,
        intent: IntentType::Inference,
        ..Criteria::new()
    };

    let result = build(&builder, &criteria);

    let names: Vec<&str> = result
        .component_refs
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(names, vec!["cert-manager", "gpu-operator", "network-operator"]);
    assert_eq!(result.deployment_order[0], "cert-manager");
    assert_eq!(result.matched_overlay_ids, vec!["h100-inference"]);
}

#[test]
fn specificity_tie_breaking_prefers_more_specific_overlay() {
    // S2: both overlays match; the two-field one must win the shared key.
    let builder = builder_with(&[("eks", EKS), ("eks-h100", EKS_H100)]);
    let criteria = Criteria {
        service: ServiceType::Eks,
        accelerator: AcceleratorType::H100,
        ..Criteria::new()
    };

    let result = build(&builder, &criteria);

    assert_eq!(result.matched_overlay_ids, vec!["eks", "eks-h100"]);
    let values = result.values.unwrap();
    assert_eq!(values["shared"]["key"], "from-eks-h100");
}

#[test]
fn nested_map_merge_keeps_untouched_keys() {
    // S3: overlay bumps driver.version, everything else survives.
    let builder = builder_with(&[("h100-inference", H100_INFERENCE)]);
    let criteria = Criteria {
        accelerator: AcceleratorType::H100,
        intent: IntentType::Inference,
        ..Criteria::new()
    };

    let result = build(&builder, &criteria);
    let values = result.values.unwrap();
    assert_eq!(values["driver"]["enabled"], true);
    assert_eq!(values["driver"]["repo"], "x");
    assert_eq!(values["driver"]["version"], "2.0");
}

#[test]
fn dependency_cycle_fails_the_build() {
    // S4: A -> B -> A.
    let base = r#"
version: v1.0.0
measurements:
  - type: K8s
    subtypes: []
componentRefs:
  - name: a
    version: v1.0.0
    source: https://example.com
    dependencyRefs:
      - b
  - name: b
    version: v1.0.0
    source: https://example.com
    dependencyRefs:
      - a
"#;
    let store = RecipeStore::from_sources(base, &[]).unwrap();
    let builder = RecipeBuilder::new(Arc::new(store));

    let err = builder
        .build(
            &CancellationToken::new(),
            &Criteria::new(),
            &BuildOptions::default(),
        )
        .unwrap_err();

    match err {
        RecipeError::Cycle { participants } => {
            assert_eq!(participants, vec!["a", "b"]);
        }
        other => panic!("expected Cycle, got {other:?}"),
    }
}

#[test]
fn unknown_dependency_fails_the_build() {
    let base = r#"
version: v1.0.0
measurements:
  - type: K8s
    subtypes: []
componentRefs:
  - name: gpu-operator
    version: v25.3.3
    source: https://example.com
    dependencyRefs:
      - not-present
"#;
    let store = RecipeStore::from_sources(base, &[]).unwrap();
    let builder = RecipeBuilder::new(Arc::new(store));

    let err = builder
        .build(
            &CancellationToken::new(),
            &Criteria::new(),
            &BuildOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, RecipeError::UnresolvedDependency { .. }));
}

#[test]
fn every_dependency_ref_resolves_in_result() {
    // Invariant 1: dependency refs always name components in the result.
    let builder = builder_with(&[
        ("eks", EKS),
        ("h100-inference", H100_INFERENCE),
        ("eks-h100", EKS_H100),
    ]);

    for criteria in [
        Criteria::new(),
        Criteria {
            service: ServiceType::Eks,
            accelerator: AcceleratorType::H100,
            intent: IntentType::Inference,
            ..Criteria::new()
        },
    ] {
        let result = build(&builder, &criteria);
        for component in &result.component_refs {
            for dep in &component.dependency_refs {
                assert!(
                    result.component_ref(dep).is_some(),
                    "{} depends on missing {}",
                    component.name,
                    dep
                );
            }
        }

        // Invariant 2: deployment order is a permutation with deps first.
        assert_eq!(result.deployment_order.len(), result.component_refs.len());
        for component in &result.component_refs {
            let own = result
                .deployment_order
                .iter()
                .position(|n| n == &component.name)
                .unwrap();
            for dep in &component.dependency_refs {
                let dep_pos = result
                    .deployment_order
                    .iter()
                    .position(|n| n == dep)
                    .unwrap();
                assert!(dep_pos < own, "{dep} must precede {}", component.name);
            }
        }
    }
}
