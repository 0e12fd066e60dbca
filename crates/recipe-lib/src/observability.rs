//! Observability infrastructure for the recipe pipeline
//!
//! Provides:
//! - Prometheus metrics (build duration, bundle counters, HTTP request
//!   counters for the serving front door)
//! - A lightweight cloneable handle over a process-global registry

use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge_vec, Histogram, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec,
};
use std::sync::OnceLock;

/// Default histogram buckets for build/render latencies (in seconds).
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Global metrics instance (registered once).
static GLOBAL_METRICS: OnceLock<RecipeMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics.
struct RecipeMetricsInner {
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: Histogram,
    rate_limit_rejections_total: IntCounter,
    recipe_builds_total: IntCounterVec,
    recipe_build_duration_seconds: Histogram,
    bundles_generated_total: IntCounterVec,
    bundle_duration_seconds: HistogramVec,
    bundle_files: IntGaugeVec,
    bundle_size_bytes: IntGaugeVec,
}

impl RecipeMetricsInner {
    fn new() -> Self {
        Self {
            http_requests_total: register_int_counter_vec!(
                "recipe_http_requests_total",
                "HTTP requests served, by path and status",
                &["path", "status"]
            )
            .expect("Failed to register http_requests_total"),

            http_request_duration_seconds: register_histogram!(
                "recipe_http_request_duration_seconds",
                "Time spent serving HTTP requests",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register http_request_duration_seconds"),

            rate_limit_rejections_total: register_int_counter!(
                "recipe_rate_limit_rejections_total",
                "Requests rejected by the rate limiter"
            )
            .expect("Failed to register rate_limit_rejections_total"),

            recipe_builds_total: register_int_counter_vec!(
                "recipe_builds_total",
                "Recipe builds, by outcome",
                &["outcome"]
            )
            .expect("Failed to register recipe_builds_total"),

            recipe_build_duration_seconds: register_histogram!(
                "recipe_build_duration_seconds",
                "Time spent resolving recipes from criteria",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register recipe_build_duration_seconds"),

            bundles_generated_total: register_int_counter_vec!(
                "recipe_bundles_generated_total",
                "Bundles generated, by deployer and outcome",
                &["deployer", "outcome"]
            )
            .expect("Failed to register bundles_generated_total"),

            bundle_duration_seconds: register_histogram_vec!(
                "recipe_bundle_duration_seconds",
                "Time spent generating bundles, by deployer",
                &["deployer"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register bundle_duration_seconds"),

            bundle_files: register_int_gauge_vec!(
                "recipe_bundle_files",
                "Files emitted by the last bundle, by deployer",
                &["deployer"]
            )
            .expect("Failed to register bundle_files"),

            bundle_size_bytes: register_int_gauge_vec!(
                "recipe_bundle_size_bytes",
                "Bytes emitted by the last bundle, by deployer",
                &["deployer"]
            )
            .expect("Failed to register bundle_size_bytes"),
        }
    }
}

/// Metrics handle for the recipe pipeline.
///
/// Multiple clones share the same underlying metrics.
#[derive(Debug, Clone)]
pub struct RecipeMetrics {
    _private: (),
}

impl Default for RecipeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RecipeMetrics {
    /// Create a new metrics handle (initializes global metrics if needed).
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(RecipeMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &RecipeMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record one served HTTP request.
    pub fn observe_http_request(&self, path: &str, status: u16, duration_secs: f64) {
        self.inner()
            .http_requests_total
            .with_label_values(&[path, &status.to_string()])
            .inc();
        self.inner()
            .http_request_duration_seconds
            .observe(duration_secs);
    }

    /// Record a rate-limited request.
    pub fn inc_rate_limit_rejections(&self) {
        self.inner().rate_limit_rejections_total.inc();
    }

    /// Record one recipe build.
    pub fn observe_build(&self, duration_secs: f64, success: bool) {
        let outcome = if success { "success" } else { "error" };
        self.inner()
            .recipe_builds_total
            .with_label_values(&[outcome])
            .inc();
        self.inner()
            .recipe_build_duration_seconds
            .observe(duration_secs);
    }

    /// Record one bundle generation attempt for a deployer.
    pub fn observe_bundle(&self, deployer: &str, duration_secs: f64, success: bool) {
        let outcome = if success { "success" } else { "error" };
        self.inner()
            .bundles_generated_total
            .with_label_values(&[deployer, outcome])
            .inc();
        self.inner()
            .bundle_duration_seconds
            .with_label_values(&[deployer])
            .observe(duration_secs);
    }

    /// Record the size of a completed bundle for a deployer.
    pub fn set_bundle_size(&self, deployer: &str, files: i64, bytes: i64) {
        self.inner()
            .bundle_files
            .with_label_values(&[deployer])
            .set(files);
        self.inner()
            .bundle_size_bytes
            .with_label_values(&[deployer])
            .set(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_handle_records_without_panicking() {
        let metrics = RecipeMetrics::new();

        metrics.observe_http_request("/v1/recipe", 200, 0.003);
        metrics.inc_rate_limit_rejections();
        metrics.observe_build(0.001, true);
        metrics.observe_build(0.002, false);
        metrics.observe_bundle("helm", 0.01, true);
        metrics.set_bundle_size("helm", 4, 2048);
    }

    #[test]
    fn test_metrics_handles_share_registry() {
        let a = RecipeMetrics::new();
        let b = a.clone();
        a.observe_build(0.001, true);
        b.observe_build(0.001, true);
    }
}
