use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

use ahash::{AHashMap, AHashSet};
use axum::{Router, body::Body, extract::ConnectInfo};
use clap::Parser;
use geoblock_gateway::{
    cli::Cli,
    http::{Client, ReqwestClient},
    identity::AdminTokens,
    policy::{
        cache::PolicyCache,
        engine::Engine,
        location::{LocatesIp, Location},
        routes::RouteClassifier,
    },
    setup_router,
    settings::{Settings, SettingsStore},
};
use http::{Request, Response, header::ACCEPT};
use httptest::{Expectation, Server, matchers::*, responders::*};
use prometheus::Registry;
use tower::ServiceExt;

// Same addresses as in the MaxMind test databases
pub const IP_GB: IpAddr = IpAddr::V4(Ipv4Addr::new(81, 2, 69, 142));
pub const IP_US: IpAddr = IpAddr::V4(Ipv4Addr::new(216, 160, 83, 56));
pub const IP_UNKNOWN: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3));

pub const GEONAME_UK: u32 = 2635167;
pub const GEONAME_LONDON: u32 = 2643743;

pub const ADMIN_TOKEN: &str = "admin-session-token";
pub const UPSTREAM_BODY: &str = "hello from upstream";

pub struct FakeLocator(AHashMap<IpAddr, Location>);

impl FakeLocator {
    pub fn new() -> Self {
        Self(AHashMap::from([
            (IP_GB, Location::new(Some("GB"), [GEONAME_UK, GEONAME_LONDON])),
            // Milton, WA
            (IP_US, Location::new(Some("US"), [6252001, 5803556])),
        ]))
    }
}

impl LocatesIp for FakeLocator {
    fn lookup(&self, ip: IpAddr) -> Option<Location> {
        self.0.get(&ip).cloned()
    }
}

pub struct TestEnv {
    pub router: Router,
    pub settings: Arc<SettingsStore>,
    pub registry: Registry,
    // Must outlive the router
    pub upstream: Server,
}

impl TestEnv {
    pub fn new(settings: Settings) -> Self {
        Self::with_args(settings, &[])
    }

    pub fn with_args(settings: Settings, args: &[&str]) -> Self {
        let upstream = Server::run();
        upstream.expect(
            Expectation::matching(any())
                .times(0..)
                .respond_with(status_code(200).body(UPSTREAM_BODY)),
        );

        let upstream_url = upstream.url_str("/");
        let mut argv = vec!["geoblock-gateway", "--upstream-url", upstream_url.as_str()];
        argv.extend_from_slice(args);
        let cli = Cli::parse_from(argv);

        let store = Arc::new(SettingsStore::new(settings));
        let engine = Arc::new(Engine::new(
            store.clone(),
            PolicyCache::new(store.clone()),
            RouteClassifier::new(&cli.geoblock.geoblock_url_prefix),
            Arc::new(AdminTokens::new(AHashSet::from([ADMIN_TOKEN.to_string()]))),
            Arc::new(FakeLocator::new()),
        ));

        let http_client = Arc::new(ReqwestClient::new(reqwest::Client::new())) as Arc<dyn Client>;
        let registry = Registry::new();
        let router = setup_router(&cli, engine, store.clone(), http_client, &registry).unwrap();

        Self {
            router,
            settings: store,
            registry,
            upstream,
        }
    }

    pub fn request(path: &str, ip: IpAddr, accept: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(path);
        if let Some(v) = accept {
            builder = builder.header(ACCEPT, v);
        }

        let mut req = builder.body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::new(ip, 40000)));
        req
    }

    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.unwrap()
    }

    /// Browser-like request
    pub async fn get(&self, path: &str, ip: IpAddr) -> Response<Body> {
        self.send(Self::request(path, ip, Some("text/html"))).await
    }
}

pub async fn body_string(resp: Response<Body>) -> String {
    let body = axum::body::to_bytes(resp.into_body(), 1 << 20).await.unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}
