use std::sync::Arc;

use anyhow::{Context, Error};
use axum::Router;
use prometheus::Registry;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    cli::Cli,
    http::{self, Client, ReqwestClient},
    identity::{AdminTokens, Anonymous, Chain, ResolvesIdentity, UpstreamSession},
    metrics,
    policy::{
        cache::PolicyCache,
        engine::Engine,
        location::{GeoIp, LocatesIp, NoLocation},
        routes::RouteClassifier,
    },
    routing,
    settings::{Settings, SettingsStore, file::SettingsFile},
    tasks::TaskManager,
};

pub const SERVICE_NAME: &str = "geoblock_gateway";
pub const AUTHOR_NAME: &str = "Geoblock Gateway Developers";

fn setup_identity(
    cli: &Cli,
    http_client: Arc<dyn Client>,
) -> Result<Arc<dyn ResolvesIdentity>, Error> {
    let mut resolvers: Vec<Arc<dyn ResolvesIdentity>> = vec![];

    if let Some(v) = &cli.identity.identity_admin_tokens {
        resolvers.push(Arc::new(
            AdminTokens::load(v).context("unable to load admin tokens")?,
        ));
    }

    if let Some(v) = &cli.identity.identity_session_url {
        warn!("Identity: resolving sessions using {v}");

        resolvers.push(Arc::new(UpstreamSession::new(
            http_client,
            v.clone(),
            cli.identity.identity_cache_ttl,
            cli.identity.identity_cache_admin_ttl,
            cli.identity.identity_cache_size,
        )));
    }

    Ok(match resolvers.len() {
        0 => {
            warn!("Identity: no resolvers configured, nobody is treated as an admin");
            Arc::new(Anonymous)
        }
        1 => resolvers.remove(0),
        _ => Arc::new(Chain(resolvers)),
    })
}

fn setup_locator(cli: &Cli) -> Result<Arc<dyn LocatesIp>, Error> {
    Ok(match &cli.misc.geoip_db {
        Some(v) => Arc::new(GeoIp::new(v).context("unable to load GeoIP database")?),
        None => {
            warn!("GeoIP: no database configured, all locations are unknown");
            Arc::new(NoLocation)
        }
    })
}

pub async fn main(cli: &Cli) -> Result<(), Error> {
    // Prepare some general stuff
    let token = CancellationToken::new();
    let registry = Registry::new();

    // HTTP client, used to reach the upstream
    let reqwest_client = http::client::new((&cli.upstream).into())?;
    let http_client = Arc::new(ReqwestClient::new(reqwest_client)) as Arc<dyn Client>;

    // List of cancellable tasks to execute & track
    let mut tasks = TaskManager::new();

    // Handle SIGTERM/SIGHUP and Ctrl+C
    // Cancelling a token cancels all of its clones too
    let handler_token = token.clone();
    ctrlc::set_handler(move || handler_token.cancel())?;

    // Runtime settings
    let base_settings = Settings::from(&cli.geoblock);
    let settings = Arc::new(SettingsStore::new(base_settings.clone()));

    if let Some(v) = &cli.geoblock.geoblock_settings_file {
        let settings_file = Arc::new(SettingsFile::new(
            v.clone(),
            base_settings,
            cli.geoblock.geoblock_settings_poll_interval,
            settings.clone(),
        ));

        // Fail early if the file is broken on startup
        settings_file
            .load()
            .await
            .context("unable to load settings file")?;

        tasks.add("settings_file", settings_file);
    }

    warn!("Geoblocking settings: {:?}", settings.load());

    // Decision engine
    let engine = Arc::new(Engine::new(
        settings.clone(),
        PolicyCache::new(settings.clone()),
        RouteClassifier::new(&cli.geoblock.geoblock_url_prefix),
        setup_identity(cli, http_client.clone())?,
        setup_locator(cli)?,
    ));

    // Create gateway router
    let router = routing::setup_router(cli, engine, settings, http_client, &registry)
        .context("unable to setup Axum router")?;

    // Create HTTP server
    let http_server = Arc::new(http::Server::new(
        cli.http_server.http_server_listen,
        cli.http_server.http_server_backlog,
        router,
        cli.http_server.http_server_grace_period,
    ));
    tasks.add("http_server", http_server);

    // Setup metrics
    if let Some(addr) = cli.metrics.metrics_listen {
        let router: Router = metrics::setup(&registry);

        let srv = Arc::new(http::Server::new(
            addr,
            cli.http_server.http_server_backlog,
            router,
            cli.http_server.http_server_grace_period,
        ));

        tasks.add("metrics_server", srv);
    }

    // Spawn & track tasks
    tasks.start(&token);

    warn!("Service is running, waiting for the shutdown signal");
    token.cancelled().await;

    warn!("Shutdown signal received, cleaning up");
    tasks.stop().await;

    Ok(())
}
