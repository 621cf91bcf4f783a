use std::sync::Arc;

use anyhow::Error;
use axum::{
    extract::{Extension, Request, State},
    middleware::Next,
    response::Response,
};
use http::HeaderValue;
use prometheus::{IntCounterVec, Registry, register_int_counter_vec_with_registry};
use tracing::info;

use super::request_id::RequestId;
use crate::{
    http::headers::X_GEOBLOCK_REASON,
    identity::Credentials,
    policy::engine::{Engine, RequestContext},
    routing::{RemoteAddr, blocked::BlockedResponder, format},
    settings::SettingsStore,
};

pub struct GeoblockState {
    engine: Arc<Engine>,
    responder: BlockedResponder,
    settings: Arc<SettingsStore>,
    log_requests: bool,
    decisions: IntCounterVec,
}

impl GeoblockState {
    pub fn new(
        engine: Arc<Engine>,
        responder: BlockedResponder,
        settings: Arc<SettingsStore>,
        log_requests: bool,
        registry: &Registry,
    ) -> Result<Self, Error> {
        let decisions = register_int_counter_vec_with_registry!(
            format!("geoblock_decisions_total"),
            format!("Counts the geoblocking decisions by verdict and the rule that produced it"),
            &["verdict", "reason"],
            registry
        )?;

        Ok(Self {
            engine,
            responder,
            settings,
            log_requests,
            decisions,
        })
    }
}

pub async fn middleware(
    State(state): State<Arc<GeoblockState>>,
    remote_addr: Option<Extension<RemoteAddr>>,
    request_id: Option<Extension<RequestId>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    let ctx = RequestContext {
        path: path.to_string(),
        remote_addr: remote_addr.map(|x| x.0.0),
        credentials: Credentials::from_request(request.uri(), request.headers()),
        format: format::negotiate(path, request.headers()),
    };

    let decision = state.engine.decide(&ctx).await;
    let verdict: &'static str = decision.verdict.into();
    let reason: &'static str = decision.reason.into();
    state
        .decisions
        .with_label_values(&[verdict, reason])
        .inc();

    let mut response = if decision.is_blocked() {
        if state.log_requests {
            info!(
                request_id = request_id.map(|x| x.0.to_string()).unwrap_or_default(),
                remote_addr = ctx.remote_addr.map(|x| x.to_string()).unwrap_or_default(),
                path = ctx.path.as_str(),
                format = ctx.format.to_string(),
                reason,
                "Request blocked"
            );
        }

        let settings = state.settings.load();
        let mut response = state
            .responder
            .respond(ctx.format, settings.redirect(), request.headers());
        response
            .headers_mut()
            .insert(X_GEOBLOCK_REASON, HeaderValue::from_static(reason));
        response
    } else {
        next.run(request).await
    };

    response.extensions_mut().insert(decision);
    response
}
