//! HTTP API for recipe resolution, health checks, and metrics
//!
//! Routes:
//! - `GET /v1/recipe` resolves a recipe from query criteria
//! - `GET /health` and `GET /ready` serve probes
//! - `GET /metrics` exposes Prometheus counters

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use prometheus::{Encoder, TextEncoder};
use recipe_lib::builder::{BuildOptions, RecipeBuilder};
use recipe_lib::criteria;
use recipe_lib::error::RecipeError;
use recipe_lib::observability::RecipeMetrics;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::ratelimit::TokenBucket;

/// Shared application state.
pub struct AppState {
    pub builder: RecipeBuilder,
    pub metrics: RecipeMetrics,
    pub limiter: TokenBucket,
    pub cache_max_age_secs: u32,
    ready: AtomicBool,
}

impl AppState {
    pub fn new(builder: RecipeBuilder, config: &ServerConfig) -> Self {
        Self {
            builder,
            metrics: RecipeMetrics::new(),
            limiter: TokenBucket::new(config.rate_limit, config.rate_limit_burst),
            cache_max_age_secs: config.cache_max_age_secs,
            ready: AtomicBool::new(false),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Request identifier propagated through handlers and echoed in the
/// response headers.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// JSON error envelope attached to every non-2xx API response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    request_id: String,
    timestamp: DateTime<Utc>,
    retryable: bool,
}

#[derive(Debug, Serialize)]
struct ProbeResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
}

/// Create the API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/v1/recipe", get(get_recipe))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn(request_id_middleware));

    Router::new()
        .merge(api)
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            observe_middleware,
        ))
        .with_state(state)
}

/// Start the API server.
pub async fn serve(config: &ServerConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state.clone());

    let addr = format!("{}:{}", config.address, config.port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    state.set_ready(true);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Generate the request id when absent and echo it on the response.
async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    req.extensions_mut().insert(RequestId(request_id.clone()));
    let mut response = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Reject requests once the token bucket runs dry.
async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    if state.limiter.allow() {
        return next.run(req).await;
    }

    state.metrics.inc_rate_limit_rejections();
    warn!("Rate limit exceeded");

    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let body = ErrorResponse {
        code: "RATE_LIMIT_EXCEEDED".to_string(),
        message: "Too many requests".to_string(),
        details: None,
        request_id,
        timestamp: Utc::now(),
        retryable: true,
    };

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
    response
}

/// Record request counts and latency for every route.
async fn observe_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let response = next.run(req).await;
    state.metrics.observe_http_request(
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

/// GET /v1/recipe
async fn get_recipe(
    State(state): State<Arc<AppState>>,
    request_id: Option<Extension<RequestId>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let request_id = request_id
        .map(|Extension(RequestId(id))| id)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let criteria = match criteria::parse_query(&params) {
        Ok(criteria) => criteria,
        Err(err) => return error_response(&err, request_id),
    };

    let include_context = params
        .get("context")
        .map(|v| v == "true")
        .unwrap_or(false);

    debug!(criteria = %criteria, include_context, "Resolving recipe");

    let options = BuildOptions {
        include_context,
        generated_at: None,
    };
    match state
        .builder
        .build(&CancellationToken::new(), &criteria, &options)
    {
        Ok(result) => {
            let mut response = (StatusCode::OK, Json(result)).into_response();
            let cache_control = format!("public, max-age={}", state.cache_max_age_secs);
            if let Ok(value) = HeaderValue::from_str(&cache_control) {
                response
                    .headers_mut()
                    .insert(header::CACHE_CONTROL, value);
            }
            response
        }
        Err(err) => error_response(&err, request_id),
    }
}

fn error_response(err: &RecipeError, request_id: String) -> Response {
    let status = match err {
        RecipeError::CriteriaParse(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let body = ErrorResponse {
        code: err.code().to_string(),
        message: err.to_string(),
        details: None,
        request_id,
        timestamp: Utc::now(),
        retryable: err.retryable(),
    };

    (status, Json(body)).into_response()
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(ProbeResponse {
        status: "healthy",
        timestamp: Utc::now(),
        reason: None,
    })
}

/// GET /ready
async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.is_ready() {
        (
            StatusCode::OK,
            Json(ProbeResponse {
                status: "ready",
                timestamp: Utc::now(),
                reason: None,
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ProbeResponse {
                status: "not_ready",
                timestamp: Utc::now(),
                reason: Some("recipe store is loading"),
            }),
        )
    }
}

/// GET /metrics
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %err, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new()).into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}
