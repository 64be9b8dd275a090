// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::sync::Arc;

use axum::{
    body::{self, Body},
    Router,
};
use http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use sentimetric::ai_adapter::MockSource;
use sentimetric::api::{create_router, AppState};
use sentimetric::metrics::Metrics;
use sentimetric::{Analyzer, Comparator, ComparatorConfig, ExternalServiceError};

const BODY_LIMIT: usize = 1024 * 1024;

fn router_with(external: Option<MockSource>) -> Router {
    let comparator = external.map(|src| {
        Comparator::with_default_rule(Arc::new(src), ComparatorConfig::default())
            .expect("comparator")
    });
    create_router(AppState::new(Analyzer::new(), comparator), None)
}

async fn post_json(app: Router, uri: &str, payload: Json) -> (StatusCode, Json) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let v = serde_json::from_slice(&bytes).unwrap_or(Json::Null);
    (status, v)
}

#[tokio::test]
async fn health_returns_ok() {
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let resp = router_with(None).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn analyze_returns_result_fields() {
    let (status, v) = post_json(
        router_with(None),
        "/analyze",
        json!({ "text": "I love this, it is great!" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["category"], "positive");
    assert_eq!(v["method"], "rule_based");
    assert!(v["polarity"].as_f64().unwrap() > 0.0);
    let c = v["confidence"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&c));
    assert!(v["signals"].as_array().is_some_and(|s| !s.is_empty()));
}

#[tokio::test]
async fn analyze_rejects_non_text() {
    let (status, v) = post_json(router_with(None), "/analyze", json!({ "text": 42 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["error"]["kind"], "invalid_input");
}

#[tokio::test]
async fn batch_isolates_bad_items() {
    let (status, v) = post_json(
        router_with(None),
        "/batch",
        json!(["great stuff", null, "terrible service", ["nested"]]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let items = v.as_array().expect("array");
    assert_eq!(items.len(), 4);
    assert_eq!(items[0]["ok"]["category"], "positive");
    assert_eq!(items[1]["error"]["kind"], "invalid_input");
    assert_eq!(items[2]["ok"]["category"], "negative");
    assert_eq!(items[3]["error"]["kind"], "invalid_input");
}

#[tokio::test]
async fn compare_without_external_source_is_503() {
    let (status, v) = post_json(router_with(None), "/compare", json!({ "text": "good" })).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(v["error"]["kind"], "unconfigured");
}

#[tokio::test]
async fn compare_reports_agreement() {
    let app = router_with(Some(MockSource::fixed(0.7, 0.9)));
    let (status, v) = post_json(app, "/compare", json!({ "text": "this is great" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["agreement"], "agree");
    assert_eq!(v["degraded"], false);
    assert_eq!(v["rule_result"]["method"], "rule_based");
    assert_eq!(v["external_result"]["method"], "llm");
}

#[tokio::test]
async fn compare_external_failure_is_502_unless_fallback() {
    let failing = || Some(MockSource::failing(ExternalServiceError::Timeout));

    let (status, v) = post_json(router_with(failing()), "/compare", json!({ "text": "good" })).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(v["error"]["kind"], "external_service");
    assert_eq!(v["error"]["detail"]["kind"], "timeout");

    let (status, v) = post_json(
        router_with(failing()),
        "/compare",
        json!({ "text": "good", "fallback": "duplicate_rule_result" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["degraded"], true);
    assert_eq!(v["external_result"]["method"], "rule_based_fallback");
    assert_eq!(v["rule_result"]["polarity"], v["external_result"]["polarity"]);
}

#[tokio::test]
async fn metrics_route_only_when_installed() {
    let req = || {
        Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap()
    };

    let resp = router_with(None).oneshot(req()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let recorder = PrometheusBuilder::new().build_recorder();
    let metrics = Metrics::from_handle(recorder.handle());
    let app = create_router(AppState::new(Analyzer::new(), None), Some(&metrics));
    let resp = app.oneshot(req()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
