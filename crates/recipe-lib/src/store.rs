//! Recipe store
//!
//! Loads the base recipe and overlay fragments from embedded declarative
//! data, validates them once, and exposes an immutable snapshot. Overlays
//! retain source order so specificity ties break deterministically.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{RecipeError, Result};
use crate::model::{ComponentRef, Overlay, OverlayDoc, Recipe};

const BASE_RECIPE: &str = include_str!("../data/base.yaml");

/// Embedded overlay sources, in application tie-break order.
const OVERLAY_SOURCES: &[(&str, &str)] = &[
    ("eks.yaml", include_str!("../data/overlays/eks.yaml")),
    ("ib-fabric.yaml", include_str!("../data/overlays/ib-fabric.yaml")),
    (
        "h100-inference.yaml",
        include_str!("../data/overlays/h100-inference.yaml"),
    ),
    (
        "gb200-training.yaml",
        include_str!("../data/overlays/gb200-training.yaml"),
    ),
    ("eks-h100.yaml", include_str!("../data/overlays/eks-h100.yaml")),
];

/// Immutable store of the base recipe and its overlays.
///
/// Construction validates everything; after that the store is read-only
/// and safe for concurrent readers without locks.
#[derive(Debug)]
pub struct RecipeStore {
    base: Recipe,
    overlays: Vec<Overlay>,
}

impl RecipeStore {
    /// Load the store from the data embedded in this crate.
    pub fn embedded() -> Result<Arc<Self>> {
        let sources: Vec<(&str, &str)> = OVERLAY_SOURCES.to_vec();
        let store = Self::from_sources(BASE_RECIPE, &sources)?;
        info!(
            overlays = store.overlays.len(),
            components = store.base.component_refs.len(),
            version = %store.base.version,
            "Recipe store loaded"
        );
        Ok(Arc::new(store))
    }

    /// Build a store from raw YAML sources. Each overlay source is a
    /// `(label, yaml)` pair; the label only appears in error messages.
    pub fn from_sources(base_yaml: &str, overlay_sources: &[(&str, &str)]) -> Result<Self> {
        let base: Recipe = serde_yaml::from_str(base_yaml)
            .map_err(|e| RecipeError::StoreLoad(format!("base recipe: {e}")))?;

        validate_component_names(&base.component_refs, "base recipe")?;
        if base.measurements.is_empty() {
            return Err(RecipeError::StoreLoad(
                "base recipe has no measurements".into(),
            ));
        }
        if base.component_refs.is_empty() {
            return Err(RecipeError::StoreLoad(
                "base recipe has no component refs".into(),
            ));
        }

        let mut overlays = Vec::with_capacity(overlay_sources.len());
        let mut seen_ids = HashSet::new();

        for (label, yaml) in overlay_sources {
            let doc: OverlayDoc = serde_yaml::from_str(yaml)
                .map_err(|e| RecipeError::StoreLoad(format!("overlay {label}: {e}")))?;

            if !seen_ids.insert(doc.id.clone()) {
                return Err(RecipeError::StoreLoad(format!(
                    "duplicate overlay id {:?}",
                    doc.id
                )));
            }

            validate_component_names(&doc.component_refs, &format!("overlay {}", doc.id))?;

            let criteria = doc.criteria.resolve().map_err(|e| {
                RecipeError::StoreLoad(format!("overlay {} criteria: {e}", doc.id))
            })?;

            debug!(
                id = %doc.id,
                criteria = %criteria,
                specificity = criteria.specificity(),
                "Overlay registered"
            );

            overlays.push(Overlay {
                id: doc.id,
                criteria,
                measurements: doc.measurements,
                component_refs: doc.component_refs,
                values: doc.values,
            });
        }

        Ok(Self { base, overlays })
    }

    /// The base recipe. Callers must not assume they may mutate it; the
    /// builder deep-clones before merging.
    pub fn base(&self) -> &Recipe {
        &self.base
    }

    /// All overlays in source order.
    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }
}

fn validate_component_names(components: &[ComponentRef], scope: &str) -> Result<()> {
    let mut seen = HashSet::new();
    for component in components {
        if component.name.is_empty() {
            return Err(RecipeError::StoreLoad(format!(
                "{scope}: component with empty name"
            )));
        }
        if !seen.insert(component.name.as_str()) {
            return Err(RecipeError::StoreLoad(format!(
                "{scope}: duplicate component {:?}",
                component.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::{AcceleratorType, ServiceType};

    #[test]
    fn test_embedded_store_loads() {
        let store = RecipeStore::embedded().unwrap();

        assert!(!store.base().measurements.is_empty());
        let names: Vec<&str> = store
            .base()
            .component_refs
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["cert-manager", "gpu-operator", "nvsentinel", "skyhook"]
        );
        assert!(store.overlays().len() >= 4);
    }

    #[test]
    fn test_embedded_overlays_preserve_source_order() {
        let store = RecipeStore::embedded().unwrap();
        let ids: Vec<&str> = store.overlays().iter().map(|o| o.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "eks",
                "ib-fabric",
                "h100-inference",
                "gb200-training",
                "eks-h100"
            ]
        );
    }

    #[test]
    fn test_embedded_overlay_criteria_are_typed() {
        let store = RecipeStore::embedded().unwrap();
        let overlay = store
            .overlays()
            .iter()
            .find(|o| o.id == "eks-h100")
            .unwrap();
        assert_eq!(overlay.criteria.service, ServiceType::Eks);
        assert_eq!(overlay.criteria.accelerator, AcceleratorType::H100);
        assert_eq!(overlay.criteria.specificity(), 2);
    }

    const MINIMAL_BASE: &str = r#"
version: v0.0.1
measurements:
  - type: K8s
    subtypes:
      - name: image
        data:
          gpu-operator: v25.3.3
componentRefs:
  - name: gpu-operator
    version: v25.3.3
    source: https://helm.ngc.nvidia.com/nvidia
"#;

    #[test]
    fn test_duplicate_overlay_ids_rejected() {
        let overlay = "id: dup\ncriteria:\n  service: eks\n";
        let err =
            RecipeStore::from_sources(MINIMAL_BASE, &[("a", overlay), ("b", overlay)]).unwrap_err();
        assert!(matches!(err, RecipeError::StoreLoad(_)));
        assert!(err.to_string().contains("duplicate overlay id"));
    }

    #[test]
    fn test_unparseable_overlay_criteria_rejected() {
        let overlay = "id: bad\ncriteria:\n  service: mainframe\n";
        let err = RecipeStore::from_sources(MINIMAL_BASE, &[("bad", overlay)]).unwrap_err();
        assert!(matches!(err, RecipeError::StoreLoad(_)));
    }

    #[test]
    fn test_unknown_measurement_type_rejected() {
        let base = r#"
version: v0.0.1
measurements:
  - type: Firmware
    subtypes: []
componentRefs:
  - name: gpu-operator
    version: v25.3.3
    source: https://example.com
"#;
        let err = RecipeStore::from_sources(base, &[]).unwrap_err();
        assert!(matches!(err, RecipeError::StoreLoad(_)));
    }

    #[test]
    fn test_duplicate_component_names_rejected() {
        let base = r#"
version: v0.0.1
measurements:
  - type: K8s
    subtypes: []
componentRefs:
  - name: gpu-operator
    version: v25.3.3
    source: https://example.com
  - name: gpu-operator
    version: v25.3.4
    source: https://example.com
"#;
        let err = RecipeStore::from_sources(base, &[]).unwrap_err();
        assert!(err.to_string().contains("duplicate component"));
    }

    #[test]
    fn test_base_without_measurements_rejected() {
        let base = r#"
version: v0.0.1
measurements: []
componentRefs:
  - name: gpu-operator
    version: v25.3.3
    source: https://example.com
"#;
        assert!(RecipeStore::from_sources(base, &[]).is_err());
    }
}
