mod helpers;

use std::sync::Arc;
use std::time::Duration;

use helpers::*;
use tasso::{CacheStatus, DateRange, QueryService, TassoError};
use tasso_mock::{DayBehavior, MockGate, fixtures};
use tokio_test::{assert_pending, assert_ready_ok};

#[tokio::test(start_paused = true)]
async fn historical_waits_for_publish_and_matches_later_reads() {
    let latest = d(2020, 4, 21);
    let gate = MockGate::new();
    let src = Arc::new(gate_range(
        synthetic_source(latest),
        DateRange::new(FIRST, latest),
        &gate,
    ));
    let query = QueryService::new(cache_builder(&src, latest).spawn().unwrap());

    // Let the preload reach the gate.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!query.cache().is_ready());

    let mut early = tokio_test::task::spawn(query.historical_cases_per_test("Ohio"));
    assert_pending!(early.poll());
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_pending!(early.poll());

    gate.open();
    query.cache().await_ready().await.unwrap();
    assert!(early.is_woken());
    let before = assert_ready_ok!(early.poll());

    let after = query.historical_cases_per_test("Ohio").await.unwrap();
    assert_eq!(before, after);
    let series = after.unwrap();
    assert_eq!(series.len(), 9);
    let ohio = fixtures::STATES.iter().position(|s| *s == "Ohio").unwrap();
    assert_eq!(
        series.get(&FIRST).copied(),
        Some(fixtures::synthetic_ratio(ohio, FIRST))
    );
}

#[tokio::test(start_paused = true)]
async fn latest_before_publish_fetches_latest_day_once_without_storing() {
    let latest = d(2020, 4, 21);
    let gate = MockGate::new();
    let src = Arc::new(gate_range(
        synthetic_source(latest),
        DateRange::new(FIRST, latest),
        &gate,
    ));
    let query = QueryService::new(cache_builder(&src, latest).spawn().unwrap());
    tokio::time::sleep(Duration::from_millis(10)).await;

    let direct = query.latest_cases_per_test().await.unwrap();
    assert_eq!(direct.len(), fixtures::STATES.len());
    for (i, state) in fixtures::STATES.iter().enumerate() {
        assert_eq!(direct[*state], fixtures::synthetic_ratio(i, latest));
    }
    assert_eq!(src.fetches_of(latest).await, 1);
    assert!(query.cache().snapshot().is_none());

    gate.open();
    query.cache().await_ready().await.unwrap();

    // Published: latest comes from the snapshot, whose range stops before `latest`.
    let cached = query.latest_cases_per_test().await.unwrap();
    let last_loaded = d(2020, 4, 20);
    for (i, state) in fixtures::STATES.iter().enumerate() {
        assert_eq!(cached[*state], fixtures::synthetic_ratio(i, last_loaded));
    }
    assert_eq!(src.fetches_of(latest).await, 1);
}

#[tokio::test]
async fn latest_before_publish_reports_unavailable_range() {
    let src = Arc::new(synthetic_source(d(2020, 4, 21)));
    let query = QueryService::new(cache_builder(&src, d(2020, 5, 1)).spawn().unwrap());
    let err = query.latest_cases_per_test().await.unwrap_err();
    assert!(matches!(err, TassoError::UnavailableRange { .. }));
}

#[tokio::test(start_paused = true)]
async fn latest_before_publish_is_bounded_by_fetch_timeout_when_exists_stalls() {
    let latest = d(2020, 4, 16);
    let src = Arc::new(synthetic_source(latest).with_stalled_exists(latest));
    let cache = cache_builder(&src, latest)
        .fetch_timeout(Some(Duration::from_secs(1)))
        .spawn()
        .unwrap();
    let query = QueryService::new(cache);

    let res = tokio::time::timeout(Duration::from_secs(3600), query.latest_cases_per_test())
        .await
        .expect("fallback settles");
    assert!(matches!(res, Err(TassoError::Timeout { .. })));
    assert_eq!(src.fetch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn readiness_wait_times_out() {
    let latest = d(2020, 4, 16);
    let gate = MockGate::new();
    let src = Arc::new(gate_range(
        synthetic_source(latest),
        DateRange::new(FIRST, latest),
        &gate,
    ));
    let cache = cache_builder(&src, latest)
        .ready_timeout(Duration::from_secs(5))
        .spawn()
        .unwrap();
    let query = QueryService::new(cache);

    let err = query.historical_cases_per_test("Ohio").await.unwrap_err();
    assert_eq!(err, TassoError::timeout("preload readiness"));

    // An explicit wait without a bound still completes once the gate opens.
    gate.open();
    assert!(query.cache().await_ready_timeout(None).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn waiters_receive_the_preload_failure() {
    let latest = d(2020, 4, 16);
    let src = Arc::new(
        synthetic_source(latest)
            .with_latency(Duration::from_millis(200))
            .with_behavior(
                d(2020, 4, 14),
                DayBehavior::Fail(TassoError::fetch("tasso-mock", "status 500")),
            ),
    );
    let query = QueryService::new(cache_builder(&src, latest).spawn().unwrap());

    let (a, b) = tokio::join!(
        query.historical_cases_per_test("Ohio"),
        query.historical_tests("Texas"),
    );
    let a = a.unwrap_err();
    assert!(matches!(a, TassoError::PreloadFailure { .. }));
    assert_eq!(Err(a.clone()), b);
    assert_eq!(query.cache().failure().await, Some(a));
}

#[tokio::test]
async fn unknown_state_is_absent_and_per_metric_series_are_served() {
    let latest = d(2020, 4, 16);
    let src = Arc::new(synthetic_source(latest));
    let query = QueryService::new(cache_builder(&src, latest).spawn().unwrap());

    assert_eq!(query.historical_cases_per_test("Atlantis").await.unwrap(), None);
    assert_eq!(query.historical_cases("Atlantis").await.unwrap(), None);

    let cases = query.historical_cases("Alaska").await.unwrap().unwrap();
    let tests = query.historical_tests("Alaska").await.unwrap().unwrap();
    assert_eq!(cases.get(&FIRST).copied(), Some(fixtures::synthetic_cases(1, FIRST)));
    assert_eq!(tests.get(&FIRST).copied(), Some(fixtures::synthetic_tests(1, FIRST)));
    assert_eq!(cases.len(), 4);

    let states = query.states().await.unwrap();
    assert_eq!(states, fixtures::STATES.to_vec());
    assert_eq!(query.cache().failure().await, None);
}

#[tokio::test(start_paused = true)]
async fn status_moves_from_loading_to_ready() {
    let latest = d(2020, 4, 21);
    let gate = MockGate::new();
    let src = Arc::new(gate_range(
        synthetic_source(latest),
        DateRange::new(FIRST, latest),
        &gate,
    ));
    let query = QueryService::new(cache_builder(&src, latest).spawn().unwrap());
    assert_eq!(query.status(), CacheStatus::Loading);
    assert_eq!(
        serde_json::to_value(query.status()).unwrap(),
        serde_json::json!({ "status": "loading" })
    );

    gate.open();
    query.cache().await_ready().await.unwrap();
    assert_eq!(
        serde_json::to_value(query.status()).unwrap(),
        serde_json::json!({
            "status": "ready",
            "days_loaded": 9,
            "states": 5,
            "from": "04-12-2020",
            "until": "04-21-2020",
        })
    );
}
