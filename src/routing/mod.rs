pub mod blocked;
pub mod error_cause;
pub mod format;
pub mod i18n;
#[allow(clippy::declare_interior_mutable_const)]
pub mod middleware;
pub mod proxy;

use std::{net::IpAddr, sync::Arc};

use anyhow::{Context, Error};
use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
};
use prometheus::Registry;
use tower::ServiceBuilder;

use crate::{
    cli::Cli,
    http::Client,
    metrics,
    policy::engine::Engine,
    routing::middleware::{geoblock, remote_addr, request_id},
    settings::SettingsStore,
};

use blocked::BlockedResponder;

/// Address of the client as seen by the gateway
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RemoteAddr(pub IpAddr);

pub fn setup_router(
    cli: &Cli,
    engine: Arc<Engine>,
    settings: Arc<SettingsStore>,
    http_client: Arc<dyn Client>,
    registry: &Registry,
) -> Result<Router, Error> {
    // Metrics
    let metrics_mw = from_fn_with_state(
        Arc::new(
            metrics::HttpMetrics::new(
                registry,
                cli.misc.env.clone(),
                cli.misc.hostname.clone(),
                cli.log.log_requests,
            )
            .context("unable to register HTTP metrics")?,
        ),
        metrics::middleware,
    );

    // Client address
    let remote_addr_mw = from_fn_with_state(
        remote_addr::RemoteAddrState {
            header: cli.http_server.http_server_remote_addr_header.clone(),
            hops: cli.http_server.http_server_remote_addr_hops,
        },
        remote_addr::middleware,
    );

    // Geoblocking
    let geoblock_state = geoblock::GeoblockState::new(
        engine,
        BlockedResponder::new(cli.geoblock.geoblock_default_locale),
        settings,
        cli.log.log_requests,
        registry,
    )
    .context("unable to setup geoblocking")?;
    let geoblock_mw = from_fn_with_state(Arc::new(geoblock_state), geoblock::middleware);

    // Upstream
    let state_proxy = Arc::new(proxy::ProxyState::new(
        http_client,
        cli.upstream.upstream_url.clone(),
    ));

    // The layer that's added first is executed first
    let common_layers = ServiceBuilder::new()
        .layer(from_fn(request_id::middleware))
        .layer(remote_addr_mw)
        .layer(metrics_mw)
        .layer(geoblock_mw);

    let router = Router::new()
        .fallback(proxy::proxy)
        .with_state(state_proxy)
        .layer(common_layers);

    Ok(router)
}
