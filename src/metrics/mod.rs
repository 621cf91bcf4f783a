use std::{sync::Arc, time::Instant};

use anyhow::Error;
use axum::{
    Router,
    extract::{Extension, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::get,
};
use http::{StatusCode, header::CONTENT_TYPE};
use prometheus::{
    Encoder, HistogramVec, IntCounterVec, Registry, TextEncoder,
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
};
use tower_http::compression::CompressionLayer;
use tracing::{info, warn};

use crate::{
    http::http_version,
    policy::engine::Decision,
    routing::{RemoteAddr, error_cause::ErrorCause, middleware::request_id::RequestId},
};

// https://prometheus.io/docs/instrumenting/exposition_formats/#basic-info
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

pub const HTTP_DURATION_BUCKETS: &[f64] = &[0.005, 0.02, 0.05, 0.2, 1.0, 2.0];

async fn handler(State(registry): State<Registry>) -> Response {
    let mut buf = Vec::with_capacity(64 * 1024);

    if let Err(e) = TextEncoder::new().encode(&registry.gather(), &mut buf) {
        warn!("Unable to encode metrics: {e:#}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    ([(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], buf).into_response()
}

/// Router that exports the metrics for scraping
pub fn setup(registry: &Registry) -> Router {
    Router::new()
        .route("/metrics", get(handler))
        .layer(
            CompressionLayer::new()
                .gzip(true)
                .br(true)
                .zstd(true)
                .deflate(true),
        )
        .with_state(registry.clone())
}

#[derive(Clone)]
pub struct HttpMetrics {
    pub env: String,
    pub hostname: String,
    pub log_requests: bool,

    pub requests: IntCounterVec,
    pub duration: HistogramVec,
}

impl HttpMetrics {
    pub fn new(
        registry: &Registry,
        env: String,
        hostname: String,
        log_requests: bool,
    ) -> Result<Self, Error> {
        const LABELS_HTTP: &[&str] = &["method", "status", "verdict"];

        Ok(Self {
            env,
            hostname,
            log_requests,

            requests: register_int_counter_vec_with_registry!(
                format!("http_total"),
                format!("Counts occurrences of requests"),
                LABELS_HTTP,
                registry
            )?,

            duration: register_histogram_vec_with_registry!(
                format!("http_duration_sec"),
                format!("Records the duration of request processing in seconds"),
                LABELS_HTTP,
                HTTP_DURATION_BUCKETS.to_vec(),
                registry
            )?,
        })
    }
}

pub async fn middleware(
    State(state): State<Arc<HttpMetrics>>,
    request_id: Option<Extension<RequestId>>,
    remote_addr: Option<Extension<RemoteAddr>>,
    request: Request,
    next: Next,
) -> impl IntoResponse {
    // Gather needed stuff from request before it's consumed
    let method = request.method().clone();
    let http_version = http_version(request.version());
    let uri = request.uri().clone();

    let start = Instant::now();
    let response = next.run(request).await;
    let duration = start.elapsed();

    let status = response.status().as_u16();
    let decision = response.extensions().get::<Decision>().copied();
    let error_cause = response
        .extensions()
        .get::<ErrorCause>()
        .map_or_else(|| "none".to_string(), |x| x.to_string());

    let verdict: &'static str = decision.map_or("none", |x| x.verdict.into());
    let reason: &'static str = decision.map_or("none", |x| x.reason.into());

    let status_str = status.to_string();
    let labels = &[method.as_str(), status_str.as_str(), verdict];
    state.requests.with_label_values(labels).inc();
    state
        .duration
        .with_label_values(labels)
        .observe(duration.as_secs_f64());

    if state.log_requests {
        info!(
            env = state.env.as_str(),
            hostname = state.hostname.as_str(),
            request_id = request_id.map(|x| x.0.to_string()).unwrap_or_default(),
            remote_addr = remote_addr.map(|x| x.0.0.to_string()).unwrap_or_default(),
            method = method.as_str(),
            http = http_version,
            status,
            path = uri.path(),
            verdict,
            reason,
            error = error_cause,
            dur = duration.as_millis() as u64,
        );
    }

    response
}
