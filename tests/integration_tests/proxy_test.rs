use geoblock_gateway::{http::headers::X_REQUEST_ID, settings::Settings};
use http::StatusCode;
use prometheus::{Encoder, TextEncoder};

use crate::helpers::*;

#[tokio::test]
async fn test_proxy_passthrough() {
    let env = TestEnv::new(Settings::default());

    let resp = env.get("/t/some-topic/42?page=2", IP_US).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key(X_REQUEST_ID));
    assert_eq!(body_string(resp).await, UPSTREAM_BODY);
}

#[tokio::test]
async fn test_metrics() {
    let env = TestEnv::new(Settings {
        blocked_countries: "GB".into(),
        ..Default::default()
    });

    env.get("/", IP_GB).await;
    env.get("/", IP_US).await;
    env.get("/srv/status", IP_GB).await;

    let mut buf = vec![];
    TextEncoder::new()
        .encode(&env.registry.gather(), &mut buf)
        .unwrap();
    let text = String::from_utf8(buf).unwrap();

    assert!(text.contains(
        r#"geoblock_decisions_total{reason="blocklist_match",verdict="block"} 1"#
    ));
    assert!(text.contains(
        r#"geoblock_decisions_total{reason="blocklist_miss",verdict="allow"} 1"#
    ));
    assert!(text.contains(r#"geoblock_decisions_total{reason="open_path",verdict="allow"} 1"#));
    assert!(text.contains(r#"http_total{method="GET",status="403",verdict="block"} 1"#));
    assert!(text.contains(r#"http_total{method="GET",status="200",verdict="allow"} 2"#));
}
