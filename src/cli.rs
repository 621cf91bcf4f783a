use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::{Args, Parser};
use http::HeaderName;
use humantime::parse_duration;
use url::Url;

use crate::{
    core::{AUTHOR_NAME, SERVICE_NAME},
    http::client,
    routing::i18n::Locale,
    settings::Settings,
};

fn default_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|x| x.into_string().ok())
        .unwrap_or_else(|| "unknown".into())
}

/// Clap does not support prefixes due to macro limitations.
/// So the names are a bit redundant (e.g. cli.geoblock.geoblock_...) to
/// make it consistent with env vars naming etc.

#[derive(Parser)]
#[clap(name = SERVICE_NAME)]
#[clap(author = AUTHOR_NAME)]
pub struct Cli {
    #[command(flatten, next_help_heading = "HTTP Server")]
    pub http_server: HttpServer,

    #[command(flatten, next_help_heading = "Upstream")]
    pub upstream: Upstream,

    #[command(flatten, next_help_heading = "Geoblocking")]
    pub geoblock: Geoblock,

    #[command(flatten, next_help_heading = "Identity")]
    pub identity: Identity,

    #[command(flatten, next_help_heading = "Metrics")]
    pub metrics: Metrics,

    #[command(flatten, next_help_heading = "Logging")]
    pub log: Log,

    #[command(flatten, next_help_heading = "Misc")]
    pub misc: Misc,
}

#[derive(Args)]
pub struct HttpServer {
    /// Where to listen for HTTP
    #[clap(env, long, default_value = "127.0.0.1:8080")]
    pub http_server_listen: SocketAddr,

    /// Backlog of incoming connections to set on the listening socket.
    #[clap(env, long, default_value = "2048")]
    pub http_server_backlog: u32,

    /// For how long to wait for the connections to close on shutdown
    #[clap(env, long, default_value = "10s", value_parser = parse_duration)]
    pub http_server_grace_period: Duration,

    /// Header to take the client's IP address from, e.g. `x-forwarded-for` or `x-real-ip`.
    /// Only set it when running behind a trusted load balancer,
    /// otherwise the socket address is used.
    /// The header is read from the right since the entries on the left are controlled
    /// by the client, see `--http-server-remote-addr-hops`.
    #[clap(env, long)]
    pub http_server_remote_addr_header: Option<HeaderName>,

    /// Number of trusted proxies in front of us that append to the remote address header.
    /// The client's address is taken that many entries from the right, 1 being the rightmost one.
    #[clap(env, long, default_value = "1")]
    pub http_server_remote_addr_hops: usize,
}

#[derive(Args)]
pub struct Upstream {
    /// URL of the application to forward the allowed requests to
    #[clap(env, long, default_value = "http://127.0.0.1:3000")]
    pub upstream_url: Url,

    /// Timeout for HTTP connection phase
    #[clap(env, long, default_value = "5s", value_parser = parse_duration)]
    pub upstream_timeout_connect: Duration,

    /// Timeout for the whole HTTP call: this includes connecting, sending request,
    /// receiving response etc.
    #[clap(env, long, default_value = "60s", value_parser = parse_duration)]
    pub upstream_timeout: Duration,
}

#[derive(Args)]
pub struct Geoblock {
    /// Enables geoblocking. When disabled all requests are let through.
    #[clap(env, long, default_value = "true", action = clap::ArgAction::Set)]
    pub geoblock_enabled: bool,

    /// Pipe-delimited list of ISO country codes that are allowed, e.g. "CA|GB".
    /// When this or the allowed geoname IDs are set everything else is blocked.
    #[clap(env, long, default_value = "")]
    pub geoblock_allowed_countries: String,

    /// Pipe-delimited list of allowed geoname IDs (continents, countries, regions or cities)
    #[clap(env, long, default_value = "")]
    pub geoblock_allowed_geoname_ids: String,

    /// Pipe-delimited list of ISO country codes that are blocked.
    /// Ignored when an allowlist is configured.
    #[clap(env, long, default_value = "")]
    pub geoblock_blocked_countries: String,

    /// Pipe-delimited list of blocked geoname IDs
    #[clap(env, long, default_value = "")]
    pub geoblock_blocked_geoname_ids: String,

    /// Pipe-delimited list of additional paths that are never blocked, e.g. "/about|/faq"
    #[clap(env, long, default_value = "")]
    pub geoblock_allowed_paths: String,

    /// Where to redirect blocked browsers instead of showing the page
    #[clap(env, long)]
    pub geoblock_blocked_redirect: Option<String>,

    /// Path prefix the application is served under, e.g. "/forum"
    #[clap(env, long, default_value = "")]
    pub geoblock_url_prefix: String,

    /// JSON file with settings that override the ones above.
    /// It's re-read periodically so the policy can be changed at runtime.
    #[clap(env, long)]
    pub geoblock_settings_file: Option<PathBuf>,

    /// How frequently to re-read the settings file
    #[clap(env, long, default_value = "10s", value_parser = parse_duration)]
    pub geoblock_settings_poll_interval: Duration,

    /// Language of the blocked page when the client's one isn't supported
    #[clap(env, long, default_value = "en")]
    pub geoblock_default_locale: Locale,
}

#[derive(Args)]
pub struct Identity {
    /// File with the session tokens and API keys of the administrators, one per line.
    /// Requests carrying them are never blocked.
    #[clap(env, long)]
    pub identity_admin_tokens: Option<PathBuf>,

    /// Endpoint of the application that reports the current user,
    /// e.g. "http://127.0.0.1:3000/session/current.json"
    #[clap(env, long)]
    pub identity_session_url: Option<Url>,

    /// For how long to cache the identity of a session
    #[clap(env, long, default_value = "60s", value_parser = parse_duration)]
    pub identity_cache_ttl: Duration,

    /// For how long to cache sessions that belong to admins.
    /// A revoked admin session keeps bypassing geoblocking for up to this long.
    /// Capped by `--identity-cache-ttl`.
    #[clap(env, long, default_value = "10s", value_parser = parse_duration)]
    pub identity_cache_admin_ttl: Duration,

    /// Maximum number of sessions to cache
    #[clap(env, long, default_value = "10000")]
    pub identity_cache_size: u64,
}

#[derive(Args)]
pub struct Metrics {
    /// Where to listen for Prometheus metrics scraping
    #[clap(env, long)]
    pub metrics_listen: Option<SocketAddr>,
}

#[derive(Args)]
pub struct Log {
    /// Maximum logging level
    #[clap(env, long, default_value = "info")]
    pub log_level: tracing::Level,

    /// Enables logging to stdout
    #[clap(env, long)]
    pub log_stdout: bool,

    /// Enables logging to stdout in JSON
    #[clap(env, long)]
    pub log_stdout_json: bool,

    /// Enables logging to Journald
    #[clap(env, long)]
    pub log_journald: bool,

    /// Enables logging to /dev/null (to benchmark logging)
    #[clap(env, long)]
    pub log_null: bool,

    /// Enables logging of HTTP requests and blocked decisions to stdout/journald/null
    #[clap(env, long)]
    pub log_requests: bool,
}

#[derive(Args)]
pub struct Misc {
    /// Environment we run in to specify in the logs
    #[clap(env, long, default_value = "dev")]
    pub env: String,

    /// Local hostname to identify in e.g. logs.
    /// If not specified - tries to obtain it.
    #[clap(env, long, default_value = default_hostname())]
    pub hostname: String,

    /// Path to a MaxMind City or Country database.
    /// Without it the locations are unknown, which blocks everything in allowlist mode.
    #[clap(env, long)]
    pub geoip_db: Option<PathBuf>,

    /// Number of Tokio threads to use to serve requests.
    /// Defaults to the number of CPUs
    #[clap(env, long)]
    pub threads: Option<usize>,
}

// Some conversions
impl From<&Geoblock> for Settings {
    fn from(c: &Geoblock) -> Self {
        Self {
            enabled: c.geoblock_enabled,
            allowed_countries: c.geoblock_allowed_countries.clone(),
            allowed_geoname_ids: c.geoblock_allowed_geoname_ids.clone(),
            blocked_countries: c.geoblock_blocked_countries.clone(),
            blocked_geoname_ids: c.geoblock_blocked_geoname_ids.clone(),
            allowed_paths: c.geoblock_allowed_paths.clone(),
            blocked_redirect: c.geoblock_blocked_redirect.clone(),
        }
    }
}

impl From<&Upstream> for client::Options {
    fn from(c: &Upstream) -> Self {
        Self {
            timeout_connect: c.upstream_timeout_connect,
            timeout: c.upstream_timeout,
            tcp_keepalive: Some(Duration::from_secs(15)),
            user_agent: SERVICE_NAME.into(),
        }
    }
}
