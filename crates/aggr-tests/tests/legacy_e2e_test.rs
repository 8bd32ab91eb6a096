//! End-to-end tests for the path-parameter routes kept for old clients

use aggr_tests::{ids, names, nine_devices, Fixture, Stack, StackOptions};
use pretty_assertions::assert_eq;

fn fixture() -> Fixture {
    nine_devices()
        .hub("h1", "hub-kitchen")
        .hub("h2", "hub-garage")
        .device_state("d1", true)
        .device_state("d5", false)
        .hub_state("h1", true)
        .history("d1")
        .history("h1")
}

#[tokio::test]
async fn test_legacy_routes_match_query_routes() {
    let stack = Stack::start(fixture()).await;

    for (legacy, modern) in [
        ("/list/devices/3/2", "/devices?limit=3&offset=2"),
        (
            "/list/devices/3/2/name/desc",
            "/devices?limit=3&offset=2&sort=name.desc",
        ),
        ("/search/devices/bar/10/0", "/devices?search=bar&limit=10&offset=0"),
        (
            "/search/devices/bar/10/1/name/desc",
            "/devices?search=bar&limit=10&offset=1&sort=name.desc",
        ),
        ("/history/gateways/1d", "/hubs?log=1d"),
        ("/list/gateways/1/1", "/hubs?limit=1&offset=1"),
        ("/search/gateways/kit/5/0", "/hubs?search=kit&limit=5&offset=0"),
    ] {
        let old = stack.get_json(legacy).await;
        let old_queries = stack.take_queries();
        let new = stack.get_json(modern).await;
        let new_queries = stack.take_queries();

        assert_eq!(old, new, "{} vs {}", legacy, modern);
        assert_eq!(old_queries, new_queries, "{} vs {}", legacy, modern);
    }
}

#[tokio::test]
async fn test_legacy_filter_and_history_list_every_match() {
    let stack = Stack::start(fixture()).await;

    for (legacy, modern) in [
        ("/filter/devices/state/connected", "/devices?state=connected"),
        (
            "/filter/devices/state/unknown/name/desc",
            "/devices?state=unknown&sort=name.desc",
        ),
        ("/history/devices/1d", "/devices?log=1d"),
    ] {
        assert_eq!(
            stack.get_json(legacy).await,
            stack.get_json(modern).await,
            "{} vs {}",
            legacy,
            modern
        );
    }
}

#[tokio::test]
async fn test_legacy_filter_and_history_are_not_capped() {
    let mut fixture = Fixture::default();
    for i in 0..150 {
        fixture = fixture.device(&format!("d{:03}", i), &format!("sensor{:03}", i), None);
    }
    let stack = Stack::start(fixture).await;

    let history = stack.get_json("/history/devices/1h").await;
    let unknown = stack.get_json("/filter/devices/state/unknown").await;
    let newest_first = stack
        .get_json("/filter/devices/state/unknown/name/desc")
        .await;

    assert_eq!(ids(&history).len(), 150);
    assert_eq!(ids(&unknown).len(), 150);
    assert_eq!(names(&newest_first)[0], "sensor149");
    assert!(history
        .as_array()
        .unwrap()
        .iter()
        .all(|d| d["log_state"] == "unknown"));
    // The query routes keep their default page
    assert_eq!(ids(&stack.get_json("/devices?state=unknown").await).len(), 100);
}

#[tokio::test]
async fn test_legacy_search_results() {
    let stack = Stack::start(fixture()).await;

    let body = stack.get_json("/search/devices/bar/2/1/name/desc").await;

    assert_eq!(names(&body), vec!["bar2", "bar1"]);
}

#[tokio::test]
async fn test_legacy_direction_must_be_asc_or_desc() {
    let stack = Stack::start(fixture()).await;

    let response = stack.get("/list/devices/3/0/name/sideways").await;

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_legacy_routes_can_be_disabled() {
    let options = StackOptions {
        legacy_routes: false,
        ..Default::default()
    };
    let stack = Stack::start_with(fixture(), options).await;

    assert_eq!(stack.get("/list/devices/3/0").await.status(), 404);
    assert_eq!(stack.get("/history/gateways/1d").await.status(), 404);
    // Query routes are unaffected
    assert_eq!(stack.get("/devices?limit=3").await.status(), 200);
}
