use geoblock_gateway::{
    http::headers::X_GEOBLOCK_REASON,
    policy::engine::{Decision, Reason},
    settings::Settings,
};
use http::{
    StatusCode,
    header::{CONTENT_TYPE, COOKIE, LOCATION},
};

use crate::helpers::*;

const REDIRECT_URL: &str = "http://markvanlan.com";

fn allowlist(countries: &str) -> Settings {
    Settings {
        allowed_countries: countries.into(),
        ..Default::default()
    }
}

fn blocklist(countries: &str) -> Settings {
    Settings {
        blocked_countries: countries.into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_disabled() {
    let env = TestEnv::new(Settings {
        enabled: false,
        ..allowlist("CA")
    });

    for ip in [IP_GB, IP_US, IP_UNKNOWN] {
        let resp = env.get("/latest", ip).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.extensions().get::<Decision>(),
            Some(&Decision::allow(Reason::Disabled))
        );
    }
}

#[tokio::test]
async fn test_allowlist() {
    let env = TestEnv::new(allowlist("CA|GB"));

    let resp = env.get("/latest", IP_GB).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await, UPSTREAM_BODY);

    let resp = env.get("/latest", IP_US).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(resp.headers()[X_GEOBLOCK_REASON], "allowlist_miss");

    // Unknown location can't prove it's allowed
    let resp = env.get("/latest", IP_UNKNOWN).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(resp.headers()[X_GEOBLOCK_REASON], "unknown_location");
}

#[tokio::test]
async fn test_allowlist_geoname() {
    let env = TestEnv::new(Settings {
        allowed_geoname_ids: format!("{GEONAME_LONDON}"),
        ..Default::default()
    });

    assert_eq!(env.get("/", IP_GB).await.status(), StatusCode::OK);
    assert_eq!(env.get("/", IP_US).await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_empty_policy() {
    let env = TestEnv::new(Settings::default());

    for ip in [IP_GB, IP_US, IP_UNKNOWN] {
        assert_eq!(env.get("/latest", ip).await.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_blocklist() {
    let env = TestEnv::new(blocklist("GB"));

    assert_eq!(env.get("/latest", IP_GB).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(env.get("/latest", IP_US).await.status(), StatusCode::OK);
    assert_eq!(env.get("/latest", IP_UNKNOWN).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_blocklist_exact_match() {
    let env = TestEnv::new(blocklist("US-TEST"));
    assert_eq!(env.get("/latest", IP_US).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_blocklist_geoname() {
    let env = TestEnv::new(Settings {
        blocked_geoname_ids: format!("{GEONAME_LONDON}"),
        ..Default::default()
    });

    assert_eq!(env.get("/", IP_GB).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(env.get("/", IP_US).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_bypass_paths() {
    let env = TestEnv::new(Settings {
        allowed_paths: "/about|faq".into(),
        ..allowlist("CA")
    });

    for path in [
        "/assets/application.js",
        "/uploads/default/original/1X/logo.png",
        "/srv/status",
        "/session/csrf",
        "/manifest.webmanifest",
        "/about",
        "/faq",
    ] {
        assert_eq!(env.get(path, IP_US).await.status(), StatusCode::OK, "{path}");
    }

    for path in ["/", "/srv/status/extra", "/about/team", "/latest"] {
        assert_eq!(
            env.get(path, IP_US).await.status(),
            StatusCode::FORBIDDEN,
            "{path}"
        );
    }

    // Status stays open in blocklist mode too
    env.settings.replace(blocklist("US"));
    assert_eq!(env.get("/srv/status", IP_US).await.status(), StatusCode::OK);
    assert_eq!(env.get("/latest", IP_US).await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_url_prefix() {
    let env = TestEnv::with_args(allowlist("CA"), &["--geoblock-url-prefix", "/forum"]);

    assert_eq!(
        env.get("/forum/srv/status", IP_US).await.status(),
        StatusCode::OK
    );
    assert_eq!(
        env.get("/forum/assets/app.js", IP_US).await.status(),
        StatusCode::OK
    );
    // Outside of the prefix nothing is exempt
    assert_eq!(
        env.get("/srv/status", IP_US).await.status(),
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn test_admin() {
    let env = TestEnv::new(allowlist("CA"));

    let mut req = TestEnv::request("/admin", IP_US, Some("text/html"));
    req.headers_mut().insert(
        COOKIE,
        format!("foo=bar; _t={ADMIN_TOKEN}").parse().unwrap(),
    );
    let resp = env.send(req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.extensions().get::<Decision>(),
        Some(&Decision::allow(Reason::Admin))
    );

    let mut req = TestEnv::request("/admin", IP_US, Some("application/json"));
    req.headers_mut()
        .insert("api-key", ADMIN_TOKEN.parse().unwrap());
    assert_eq!(env.send(req).await.status(), StatusCode::OK);

    // Feed readers pass the API key in the query
    let resp = env
        .send(TestEnv::request(
            &format!("/latest.json?api_key={ADMIN_TOKEN}&api_username=system"),
            IP_US,
            None,
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.extensions().get::<Decision>(),
        Some(&Decision::allow(Reason::Admin))
    );

    let resp = env
        .send(TestEnv::request("/latest.rss?api_key=nope", IP_US, None))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // Wrong token
    let mut req = TestEnv::request("/admin", IP_US, Some("text/html"));
    req.headers_mut()
        .insert(COOKIE, "_t=nope".parse().unwrap());
    assert_eq!(env.send(req).await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_redirect() {
    let env = TestEnv::new(Settings {
        blocked_redirect: Some(REDIRECT_URL.into()),
        ..allowlist("GB")
    });

    let resp = env.get("/latest", IP_US).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers()[LOCATION], REDIRECT_URL);

    // API clients get the error instead
    let resp = env
        .send(TestEnv::request("/latest.json", IP_US, None))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(resp.headers().get(LOCATION).is_none());

    // Allowed ones aren't redirected
    assert_eq!(env.get("/latest", IP_GB).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_response_formats() {
    let env = TestEnv::new(blocklist("GB"));

    let resp = env.get("/latest", IP_GB).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(
        resp.headers()[CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
    let page = body_string(resp).await;
    assert!(page.contains("not available in your region"));

    let resp = env
        .send(TestEnv::request("/latest", IP_GB, Some("application/json")))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let v: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
    assert_eq!(v["errors"].as_array().unwrap().len(), 1);

    let resp = env.send(TestEnv::request("/feed.rss", IP_GB, None)).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(body_string(resp).await.is_empty());
}

#[tokio::test]
async fn test_settings_change() {
    let env = TestEnv::new(blocklist("GB"));
    assert_eq!(env.get("/", IP_GB).await.status(), StatusCode::FORBIDDEN);

    // Unrelated change keeps the outcome
    env.settings
        .update(|s| s.allowed_paths = "/about".into());
    assert_eq!(env.get("/", IP_GB).await.status(), StatusCode::FORBIDDEN);

    env.settings.update(|s| s.blocked_countries = "US".into());
    assert_eq!(env.get("/", IP_GB).await.status(), StatusCode::OK);
    assert_eq!(env.get("/", IP_US).await.status(), StatusCode::FORBIDDEN);

    // Switching to allowlist mode takes precedence
    env.settings.update(|s| s.allowed_countries = "US".into());
    assert_eq!(env.get("/", IP_US).await.status(), StatusCode::OK);
    assert_eq!(env.get("/", IP_GB).await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_remote_addr_header() {
    let env = TestEnv::with_args(
        blocklist("GB"),
        &["--http-server-remote-addr-header", "x-real-ip"],
    );

    // Socket says US but the load balancer says GB
    let mut req = TestEnv::request("/", IP_US, Some("text/html"));
    req.headers_mut()
        .insert("x-real-ip", "81.2.69.142".parse().unwrap());
    assert_eq!(env.send(req).await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_forwarded_for_spoofing() {
    let env = TestEnv::with_args(
        blocklist("US"),
        &["--http-server-remote-addr-header", "x-forwarded-for"],
    );

    // Client prepends a GB address, the load balancer appends the real one
    let mut req = TestEnv::request("/", IP_US, Some("text/html"));
    req.headers_mut().insert(
        "x-forwarded-for",
        "81.2.69.142, 216.160.83.56".parse().unwrap(),
    );
    let resp = env.send(req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        resp.extensions().get::<Decision>(),
        Some(&Decision::block(Reason::BlocklistMatch))
    );

    // Two load balancers
    let env = TestEnv::with_args(
        blocklist("US"),
        &[
            "--http-server-remote-addr-header",
            "x-forwarded-for",
            "--http-server-remote-addr-hops",
            "2",
        ],
    );

    let mut req = TestEnv::request("/", IP_GB, Some("text/html"));
    req.headers_mut().insert(
        "x-forwarded-for",
        "81.2.69.142, 216.160.83.56, 10.0.0.1".parse().unwrap(),
    );
    assert_eq!(env.send(req).await.status(), StatusCode::FORBIDDEN);
}
