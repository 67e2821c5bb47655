use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tasso::{DateRange, PreloadCache, PreloadCacheBuilder, QueryService, TassoError};
use tasso_mock::{DayBehavior, MockGate, MockSource, fixtures};
use tasso_server::AppState;
use tokio::net::TcpListener;

const ORIGIN: &str = "https://cases-per-test.example";

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn latest() -> NaiveDate {
    d(2020, 4, 16)
}

fn builder(src: MockSource) -> PreloadCacheBuilder {
    PreloadCache::builder()
        .source(Arc::new(src))
        .as_of(latest())
}

/// Serve `cache` on an ephemeral port and return its base URL.
async fn start(cache: Arc<PreloadCache>, origin: Option<&str>) -> String {
    let state = AppState::new(QueryService::new(cache), origin).unwrap();
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(tasso_server::serve(listener, state));
    format!("http://{addr}")
}

async fn ready_server(origin: Option<&str>) -> (Arc<PreloadCache>, String) {
    let src = MockSource::new().with_synthetic_days(tasso::EARLIEST_AVAILABLE_DATE, latest());
    let cache = builder(src).spawn().unwrap();
    cache.await_ready().await.unwrap();
    let base = start(Arc::clone(&cache), origin).await;
    (cache, base)
}

fn close(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() < 1e-12
}

async fn get_json(url: &str) -> (reqwest::StatusCode, serde_json::Value) {
    let resp = reqwest::get(url).await.unwrap();
    let status = resp.status();
    let body = resp.text().await.unwrap();
    (status, serde_json::from_str(&body).unwrap())
}

#[tokio::test]
async fn latest_returns_ratio_per_state() {
    let (_cache, base) = ready_server(None).await;
    let resp = reqwest::get(format!("{base}/latest-cases-per-test")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().get("access-control-allow-origin").is_none());
    let body: BTreeMap<String, f64> = serde_json::from_str(&resp.text().await.unwrap()).unwrap();
    assert_eq!(body.len(), fixtures::STATES.len());
    assert!(close(body["Texas"], fixtures::synthetic_ratio(4, d(2020, 4, 15))));
}

#[tokio::test]
async fn historical_keys_are_month_day_year() {
    let (_cache, base) = ready_server(Some(ORIGIN)).await;
    let resp = reqwest::get(format!("{base}/historical-cases-per-test?state=New%20York"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["access-control-allow-origin"], ORIGIN);
    let text = resp.text().await.unwrap();
    let body: BTreeMap<String, f64> = serde_json::from_str(&text).unwrap();
    let keys: Vec<&str> = body.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["04-12-2020", "04-13-2020", "04-14-2020", "04-15-2020"]);
    assert!(close(body["04-12-2020"], fixtures::synthetic_ratio(2, d(2020, 4, 12))));
    assert!(text.starts_with(r#"{"04-12-2020":"#));
}

#[tokio::test]
async fn unknown_state_is_empty_object_and_missing_state_is_400() {
    let (_cache, base) = ready_server(None).await;
    let (status, body) = get_json(&format!("{base}/historical-cases-per-test?state=Atlantis")).await;
    assert_eq!(status, 200);
    assert_eq!(body, serde_json::json!({}));

    let (status, body) = get_json(&format!("{base}/historical-cases-per-test")).await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("state"));
}

#[tokio::test]
async fn preflight_echoes_requested_headers_and_method() {
    let (_cache, base) = ready_server(Some(ORIGIN)).await;
    let client = reqwest::Client::new();
    for path in ["/historical-cases-per-test", "/anything/else"] {
        let resp = client
            .request(reqwest::Method::OPTIONS, format!("{base}{path}"))
            .header("Access-Control-Request-Headers", "content-type,x-requested-with")
            .header("Access-Control-Request-Method", "GET")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let h = resp.headers();
        assert_eq!(h["access-control-allow-headers"], "content-type,x-requested-with");
        assert_eq!(h["access-control-allow-methods"], "GET");
        assert_eq!(h["access-control-allow-origin"], ORIGIN);
        assert_eq!(resp.text().await.unwrap(), "OK");
    }
}

#[tokio::test]
async fn unknown_path_is_404_with_origin() {
    let (_cache, base) = ready_server(Some(ORIGIN)).await;
    let resp = reqwest::get(format!("{base}/nope")).await.unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(resp.headers()["access-control-allow-origin"], ORIGIN);
}

#[tokio::test]
async fn health_reports_ready_snapshot() {
    let (_cache, base) = ready_server(None).await;
    let (status, body) = get_json(&format!("{base}/health")).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["days_loaded"], 4);
    assert_eq!(body["from"], "04-12-2020");
    assert_eq!(body["until"], "04-16-2020");
}

#[tokio::test]
async fn latest_is_served_while_loading_and_historical_times_out() {
    let gate = MockGate::new();
    let mut src = MockSource::new().with_synthetic_days(tasso::EARLIEST_AVAILABLE_DATE, latest());
    for date in DateRange::new(tasso::EARLIEST_AVAILABLE_DATE, latest()).iter() {
        src = src.with_behavior(date, DayBehavior::WaitFor(gate.clone()));
    }
    let cache = builder(src)
        .ready_timeout(Duration::from_millis(200))
        .spawn()
        .unwrap();
    let base = start(Arc::clone(&cache), None).await;

    let (status, body) = get_json(&format!("{base}/latest-cases-per-test")).await;
    assert_eq!(status, 200);
    let ohio = body["Ohio"].as_f64().unwrap();
    assert!(close(ohio, fixtures::synthetic_ratio(3, latest())));

    let (status, body) = get_json(&format!("{base}/historical-cases-per-test?state=Ohio")).await;
    assert_eq!(status, 503);
    assert!(body["error"].as_str().unwrap().contains("timed out"));

    let (_, health) = get_json(&format!("{base}/health")).await;
    assert_eq!(health, serde_json::json!({ "status": "loading" }));
    gate.open();
}

#[tokio::test]
async fn failed_preload_is_500_on_historical_and_503_on_health() {
    let src = MockSource::new()
        .with_synthetic_days(tasso::EARLIEST_AVAILABLE_DATE, latest())
        .with_behavior(
            d(2020, 4, 13),
            DayBehavior::Fail(TassoError::fetch("tasso-mock", "status 500")),
        );
    let cache = builder(src).spawn().unwrap();
    assert!(cache.failure().await.is_some());
    let base = start(Arc::clone(&cache), None).await;

    let (status, body) = get_json(&format!("{base}/historical-cases-per-test?state=Ohio")).await;
    assert_eq!(status, 500);
    assert!(body["error"].as_str().unwrap().contains("2020-04-13"));

    let (status, body) = get_json(&format!("{base}/health")).await;
    assert_eq!(status, 503);
    assert_eq!(body["status"], "failed");
}
