//! Recipe builder
//!
//! Resolves criteria against the store: deep-clones the base recipe,
//! folds matching overlays in specificity order, computes the deployment
//! order, and stamps provenance. Identical inputs produce byte-identical
//! results when `generated_at` is pinned.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::criteria::Criteria;
use crate::error::{RecipeError, Result};
use crate::graph;
use crate::measurement::Measurement;
use crate::model::{ComponentRef, Overlay, RecipeResult, ResultMetadata, PAYLOAD_VERSION};
use crate::observability::RecipeMetrics;
use crate::store::RecipeStore;

/// Per-request build options.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Keep `subtype.context` maps in the result. Stripped by default.
    pub include_context: bool,

    /// Pin the `generated_at` stamp for reproducible output. `None`
    /// stamps the current time.
    pub generated_at: Option<DateTime<Utc>>,
}

/// Builds resolved recipes from a store snapshot.
#[derive(Debug, Clone)]
pub struct RecipeBuilder {
    store: Arc<RecipeStore>,
    metrics: RecipeMetrics,
}

impl RecipeBuilder {
    pub fn new(store: Arc<RecipeStore>) -> Self {
        Self {
            store,
            metrics: RecipeMetrics::new(),
        }
    }

    /// Resolve `criteria` into a full recipe.
    pub fn build(
        &self,
        token: &CancellationToken,
        criteria: &Criteria,
        options: &BuildOptions,
    ) -> Result<RecipeResult> {
        let start = Instant::now();
        let result = self.build_inner(token, criteria, options);
        self.metrics
            .observe_build(start.elapsed().as_secs_f64(), result.is_ok());
        result
    }

    fn build_inner(
        &self,
        token: &CancellationToken,
        criteria: &Criteria,
        options: &BuildOptions,
    ) -> Result<RecipeResult> {
        if token.is_cancelled() {
            return Err(RecipeError::Cancelled);
        }

        let base = self.store.base();
        let mut measurements = base.measurements.clone();
        let mut component_refs = base.component_refs.clone();
        let mut values = base.values.clone();

        let overlays = select_overlays(self.store.overlays(), criteria);
        let mut matched_overlay_ids = Vec::with_capacity(overlays.len());

        for overlay in &overlays {
            if token.is_cancelled() {
                return Err(RecipeError::Cancelled);
            }

            debug!(
                id = %overlay.id,
                specificity = overlay.criteria.specificity(),
                "Applying overlay"
            );

            merge_measurements(&mut measurements, &overlay.measurements);
            merge_components(&mut component_refs, &overlay.component_refs);
            if let Some(overlay_values) = &overlay.values {
                match values.as_mut() {
                    Some(existing) => merge_values(existing, overlay_values),
                    None => values = Some(overlay_values.clone()),
                }
            }

            matched_overlay_ids.push(overlay.id.clone());
        }

        let deployment_order = graph::deployment_order(&component_refs)?;

        let mut warnings = Vec::new();
        if component_refs.is_empty() {
            warnings.push("recipe resolved to no component refs".to_string());
        }

        if !options.include_context {
            strip_context(&mut measurements);
        }

        Ok(RecipeResult {
            metadata: ResultMetadata {
                version: base.version.clone(),
                generated_at: options.generated_at.unwrap_or_else(Utc::now),
                payload_version: PAYLOAD_VERSION.to_string(),
            },
            criteria: *criteria,
            matched_overlay_ids,
            measurements,
            component_refs,
            deployment_order,
            values,
            warnings,
        })
    }
}

/// Overlays whose constraints the request satisfies, ordered by ascending
/// specificity with source order as the tie-break, so the most specific
/// overlay is applied last and wins at the leaves. An all-wildcard
/// request selects only all-wildcard overlays.
fn select_overlays<'a>(overlays: &'a [Overlay], criteria: &Criteria) -> Vec<&'a Overlay> {
    let mut matching: Vec<(usize, &Overlay)> = overlays
        .iter()
        .enumerate()
        .filter(|(_, o)| o.criteria.is_satisfied_by(criteria))
        .collect();
    matching.sort_by_key(|(source_order, o)| (o.criteria.specificity(), *source_order));
    matching.into_iter().map(|(_, o)| o).collect()
}

/// Merge overlay measurements into the working copy. Types and subtypes
/// are created when absent; readings merge key-by-key with the overlay
/// taking precedence. Overlay-introduced keys are additive.
fn merge_measurements(dst: &mut Vec<Measurement>, src: &[Measurement]) {
    for overlay_measurement in src {
        let Some(existing) = dst
            .iter_mut()
            .find(|m| m.measurement_type == overlay_measurement.measurement_type)
        else {
            dst.push(overlay_measurement.clone());
            continue;
        };

        for overlay_subtype in &overlay_measurement.subtypes {
            let Some(subtype) = existing
                .subtypes
                .iter_mut()
                .find(|s| s.name == overlay_subtype.name)
            else {
                existing.subtypes.push(overlay_subtype.clone());
                continue;
            };

            for (key, reading) in &overlay_subtype.data {
                subtype.data.insert(key.clone(), reading.clone());
            }
            if let Some(overlay_context) = &overlay_subtype.context {
                let context = subtype.context.get_or_insert_with(Default::default);
                for (key, value) in overlay_context {
                    context.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

/// Merge overlay component refs into the working copy. Missing components
/// are appended in source order; existing ones take the overlay's
/// non-empty scalar fields, union their reference lists preserving
/// first-seen order, and add scheduling paths.
fn merge_components(dst: &mut Vec<ComponentRef>, src: &[ComponentRef]) {
    for overlay_component in src {
        let Some(existing) = dst.iter_mut().find(|c| c.name == overlay_component.name) else {
            dst.push(overlay_component.clone());
            continue;
        };

        if !overlay_component.version.is_empty() {
            existing.version = overlay_component.version.clone();
        }
        if !overlay_component.source.is_empty() {
            existing.source = overlay_component.source.clone();
        }
        if overlay_component.component_type != Default::default() {
            existing.component_type = overlay_component.component_type;
        }
        if let Some(chart) = &overlay_component.chart {
            existing.chart = Some(chart.clone());
        }
        if let Some(path) = &overlay_component.path {
            existing.path = Some(path.clone());
        }
        if let Some(tag) = &overlay_component.tag {
            existing.tag = Some(tag.clone());
        }

        union_into(&mut existing.dependency_refs, &overlay_component.dependency_refs);
        union_into(
            &mut existing.value_override_keys,
            &overlay_component.value_override_keys,
        );

        if let Some(overlay_scheduling) = &overlay_component.node_scheduling {
            let scheduling = existing
                .node_scheduling
                .get_or_insert_with(Default::default);
            if let Some(system) = &overlay_scheduling.system {
                let paths = scheduling.system.get_or_insert_with(Default::default);
                union_into(&mut paths.node_selector_paths, &system.node_selector_paths);
            }
            if let Some(accelerated) = &overlay_scheduling.accelerated {
                let paths = scheduling.accelerated.get_or_insert_with(Default::default);
                union_into(
                    &mut paths.node_selector_paths,
                    &accelerated.node_selector_paths,
                );
            }
        }
    }
}

/// Order-preserving set union: appends entries not already present.
fn union_into(dst: &mut Vec<String>, src: &[String]) {
    for entry in src {
        if !dst.contains(entry) {
            dst.push(entry.clone());
        }
    }
}

/// Recursive nested-map merge over the values tree. Where both sides are
/// maps the merge recurses; otherwise the overlay wins, including when a
/// scalar replaces a map.
pub fn merge_values(dst: &mut Value, overlay: &Value) {
    if let (Value::Object(dst_map), Value::Object(overlay_map)) = (&mut *dst, overlay) {
        for (key, overlay_value) in overlay_map {
            match dst_map.get_mut(key) {
                Some(existing) => merge_values(existing, overlay_value),
                None => {
                    dst_map.insert(key.clone(), overlay_value.clone());
                }
            }
        }
    } else {
        *dst = overlay.clone();
    }
}

fn strip_context(measurements: &mut [Measurement]) {
    for measurement in measurements {
        for subtype in &mut measurement.subtypes {
            subtype.context = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::{AcceleratorType, IntentType, ServiceType};
    use crate::measurement::{MeasurementType, Reading};
    use serde_json::json;

    fn embedded_builder() -> RecipeBuilder {
        RecipeBuilder::new(RecipeStore::embedded().unwrap())
    }

    fn build(criteria: &Criteria) -> RecipeResult {
        embedded_builder()
            .build(&CancellationToken::new(), criteria, &BuildOptions::default())
            .unwrap()
    }

    #[test]
    fn test_empty_criteria_selects_no_constrained_overlay() {
        let result = build(&Criteria::new());
        // Every embedded overlay declares at least one constraint, so the
        // wildcard request resolves to the bare base recipe.
        assert!(result.matched_overlay_ids.is_empty());
        assert_eq!(result.component_refs.len(), 4);
    }

    #[test]
    fn test_specific_criteria_selects_matching_overlays_in_order() {
        let criteria = Criteria {
            service: ServiceType::Eks,
            accelerator: AcceleratorType::H100,
            intent: IntentType::Inference,
            ..Criteria::new()
        };
        let result = build(&criteria);
        // ib-fabric and gb200-training stay out: their constraints are
        // unmet. Specificity ascending, source order on ties.
        assert_eq!(
            result.matched_overlay_ids,
            vec!["eks", "h100-inference", "eks-h100"]
        );
    }

    #[test]
    fn test_overlay_adds_new_component_with_dependencies() {
        let criteria = Criteria {
            accelerator: AcceleratorType::H100,
            intent: IntentType::Inference,
            ..Criteria::new()
        };
        let result = build(&criteria);

        for name in ["cert-manager", "gpu-operator", "nvsentinel", "skyhook"] {
            assert!(result.component_ref(name).is_some(), "missing {name}");
        }

        let network_operator = result.component_ref("network-operator").unwrap();
        assert_eq!(network_operator.version, "v25.4.0");
        assert_eq!(network_operator.dependency_refs, vec!["cert-manager"]);
        assert_eq!(result.deployment_order[0], "cert-manager");
    }

    #[test]
    fn test_more_specific_overlay_wins_at_leaves() {
        // eks (specificity 1) and eks-h100 (specificity 2) both set
        // values; the driver version must come from eks-h100, applied
        // last.
        let criteria = Criteria {
            service: ServiceType::Eks,
            accelerator: AcceleratorType::H100,
            ..Criteria::new()
        };
        let result = build(&criteria);
        let values = result.values.unwrap();
        assert_eq!(values["driver"]["version"], "570.133.20");
        // Base keys under the same node survive.
        assert_eq!(values["driver"]["repository"], "nvcr.io/nvidia");
        assert_eq!(values["cloud"]["provider"], "aws");
        assert_eq!(values["cloud"]["instanceType"], "p5.48xlarge");
    }

    #[test]
    fn test_base_measurement_types_survive_every_build() {
        let store = RecipeStore::embedded().unwrap();
        let base_types: Vec<MeasurementType> = store
            .base()
            .measurements
            .iter()
            .map(|m| m.measurement_type)
            .collect();

        for criteria in [
            Criteria::new(),
            Criteria {
                service: ServiceType::Eks,
                ..Criteria::new()
            },
            Criteria {
                accelerator: AcceleratorType::Gb200,
                intent: IntentType::Training,
                ..Criteria::new()
            },
        ] {
            let result = build(&criteria);
            for t in &base_types {
                assert!(
                    result
                        .measurements
                        .iter()
                        .any(|m| m.measurement_type == *t),
                    "{t} missing for {criteria}"
                );
            }
        }
    }

    #[test]
    fn test_overlay_readings_override_base_readings() {
        let criteria = Criteria {
            accelerator: AcceleratorType::Gb200,
            intent: IntentType::Training,
            ..Criteria::new()
        };
        let result = build(&criteria);

        let k8s = result
            .measurements
            .iter()
            .find(|m| m.measurement_type == MeasurementType::K8s)
            .unwrap();
        let config = k8s.subtype("config").unwrap();
        assert_eq!(config.data["rdma"], Reading::Bool(true));
        assert_eq!(config.data["useOpenKernelModule"], Reading::Bool(true));
        // Untouched base keys survive.
        assert_eq!(config.data["mig"], Reading::Bool(false));
    }

    #[test]
    fn test_context_stripped_unless_requested() {
        let criteria = Criteria::new();
        let stripped = build(&criteria);
        for measurement in &stripped.measurements {
            for subtype in &measurement.subtypes {
                assert!(subtype.context.is_none());
            }
        }

        let kept = embedded_builder()
            .build(
                &CancellationToken::new(),
                &criteria,
                &BuildOptions {
                    include_context: true,
                    ..Default::default()
                },
            )
            .unwrap();
        let k8s = kept
            .measurements
            .iter()
            .find(|m| m.measurement_type == MeasurementType::K8s)
            .unwrap();
        assert!(k8s.subtype("image").unwrap().context.is_some());
    }

    #[test]
    fn test_pinned_generated_at_makes_output_reproducible() {
        let pinned = "2025-06-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let options = BuildOptions {
            include_context: false,
            generated_at: Some(pinned),
        };
        let criteria = Criteria {
            accelerator: AcceleratorType::H100,
            intent: IntentType::Inference,
            ..Criteria::new()
        };

        let builder = embedded_builder();
        let token = CancellationToken::new();
        let a = builder.build(&token, &criteria, &options).unwrap();
        let b = builder.build(&token, &criteria, &options).unwrap();

        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_cancelled_token_stops_build() {
        let token = CancellationToken::new();
        token.cancel();
        let err = embedded_builder()
            .build(&token, &Criteria::new(), &BuildOptions::default())
            .unwrap_err();
        assert!(matches!(err, RecipeError::Cancelled));
    }

    #[test]
    fn test_merge_values_nested_maps() {
        let mut base = json!({
            "driver": {"enabled": true, "repo": "x", "version": "1.0"}
        });
        let overlay = json!({"driver": {"version": "2.0"}});

        merge_values(&mut base, &overlay);
        assert_eq!(
            base,
            json!({"driver": {"enabled": true, "repo": "x", "version": "2.0"}})
        );
    }

    #[test]
    fn test_merge_values_scalar_replaces_map() {
        let mut base = json!({"value": {"nested": "data"}});
        let overlay = json!({"value": "flat"});

        merge_values(&mut base, &overlay);
        assert_eq!(base, json!({"value": "flat"}));
    }

    #[test]
    fn test_merge_values_adds_new_keys() {
        let mut base = json!({"enabled": true});
        let overlay = json!({"newFeature": {"depth": 3}});

        merge_values(&mut base, &overlay);
        assert_eq!(base["enabled"], json!(true));
        assert_eq!(base["newFeature"]["depth"], json!(3));
    }

    #[test]
    fn test_empty_overlay_is_identity() {
        let mut components = vec![ComponentRef::new("gpu-operator", "v25.3.3")];
        let before = components.clone();
        merge_components(&mut components, &[]);
        assert_eq!(components, before);

        let mut measurements = vec![Measurement::new(MeasurementType::K8s)];
        let before = measurements.clone();
        merge_measurements(&mut measurements, &[]);
        assert_eq!(measurements, before);
    }

    #[test]
    fn test_merging_same_overlay_twice_is_idempotent() {
        let mut overlay_component = ComponentRef::new("network-operator", "v25.4.0");
        overlay_component.dependency_refs = vec!["cert-manager".into()];
        overlay_component.value_override_keys = vec!["rdma.enabled".into()];
        let overlay = vec![overlay_component];

        let mut once = vec![ComponentRef::new("cert-manager", "v1.17.2")];
        merge_components(&mut once, &overlay);
        let mut twice = once.clone();
        merge_components(&mut twice, &overlay);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_dependency_union_preserves_first_seen_order() {
        let mut existing = ComponentRef::new("network-operator", "v25.4.0");
        existing.dependency_refs = vec!["cert-manager".into()];

        let mut overlay_component = ComponentRef::new("network-operator", "");
        overlay_component.dependency_refs = vec!["gpu-operator".into(), "cert-manager".into()];

        let mut components = vec![existing];
        merge_components(&mut components, &[overlay_component]);

        assert_eq!(
            components[0].dependency_refs,
            vec!["cert-manager", "gpu-operator"]
        );
        // Empty overlay version must not clobber the existing one.
        assert_eq!(components[0].version, "v25.4.0");
    }
}
