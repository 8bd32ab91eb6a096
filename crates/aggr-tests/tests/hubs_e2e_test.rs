//! End-to-end tests for `GET /hubs` and `GET /hubs/{id}/devices`

use aggr_tests::{ids, names, nine_devices, Fixture, Stack, StackOptions};
use pretty_assertions::assert_eq;
use serde_json::Value;

fn five_hubs() -> Fixture {
    nine_devices()
        .hub("h1", "hub-kitchen")
        .hub("h2", "hub-garage")
        .hub("h3", "hub-attic")
        .hub("h4", "hub-cellar")
        .hub("h5", "hub-bedroom")
        .hub_state("h1", true)
        .hub_state("h2", false)
}

// =============================================================================
// /hubs
// =============================================================================

#[tokio::test]
async fn test_list_all_walks_in_batches() {
    let options = StackOptions {
        find_all_batch_size: 2,
        ..Default::default()
    };
    let stack = Stack::start_with(five_hubs(), options).await;

    let body = stack.get_json("/hubs").await;

    assert_eq!(
        names(&body),
        vec!["hub-attic", "hub-bedroom", "hub-cellar", "hub-garage", "hub-kitchen"]
    );
    let walks: Vec<_> = stack
        .take_queries()
        .into_iter()
        .filter(|q| q.resource == "hubs")
        .collect();
    assert_eq!(walks.len(), 3);
    assert!(walks[0].find.as_ref().unwrap().commons.after.is_none());
    assert_eq!(
        walks[1].find.as_ref().unwrap().commons.after.as_ref().unwrap().id,
        "h5"
    );
}

#[tokio::test]
async fn test_hub_states() {
    let stack = Stack::start(five_hubs()).await;

    let body = stack.get_json("/hubs").await;
    let state_of = |id: &str| {
        body.as_array()
            .unwrap()
            .iter()
            .find(|h| h["id"] == id)
            .map(|h| h.get("log_state").cloned())
            .unwrap()
    };

    assert_eq!(state_of("h1"), Some(Value::from("connected")));
    assert_eq!(state_of("h2"), Some(Value::from("disconnected")));
    assert_eq!(state_of("h3"), None);
}

#[tokio::test]
async fn test_paged_and_searched_hubs() {
    let stack = Stack::start(five_hubs()).await;

    let page = stack.get_json("/hubs?limit=2&offset=1").await;
    assert_eq!(names(&page), vec!["hub-bedroom", "hub-cellar"]);

    let sorted = stack.get_json("/hubs?sort=name.desc&limit=1").await;
    assert_eq!(names(&sorted), vec!["hub-kitchen"]);

    let searched = stack.get_json("/hubs?search=ar").await;
    assert_eq!(names(&searched), vec!["hub-cellar", "hub-garage"]);
}

#[tokio::test]
async fn test_hub_history_normalizes_state() {
    let stack = Stack::start(five_hubs().history("h1")).await;

    let body = stack.get_json("/hubs?log=7d").await;
    let items = body.as_array().unwrap();

    assert_eq!(items.len(), 5);
    assert!(items.iter().all(|h| h.get("log_state").is_some()));
    let kitchen = items.iter().find(|h| h["id"] == "h1").unwrap();
    assert_eq!(kitchen["log_history"]["tags"]["gateway"], "h1");
    let attic = items.iter().find(|h| h["id"] == "h3").unwrap();
    assert_eq!(attic["log_state"], "unknown");
}

// =============================================================================
// /hubs/{id}/devices
// =============================================================================

#[tokio::test]
async fn test_hub_devices_returns_all_members() {
    let fixture = nine_devices()
        .hub_devices("h1", &["d1", "d5", "d9"])
        .device_state("d5", true);
    let stack = Stack::start(fixture).await;

    let body = stack.get_json("/hubs/h1/devices").await;

    assert_eq!(names(&body), vec!["bar2", "batz3", "foo1"]);
    assert_eq!(body[0]["log_state"], "connected");
}

#[tokio::test]
async fn test_hub_devices_paging_and_state() {
    let fixture = nine_devices()
        .hub_devices("h1", &["d1", "d2", "d3", "d4"])
        .device_state("d2", true)
        .device_state("d3", true);
    let stack = Stack::start(fixture).await;

    let page = stack.get_json("/hubs/h1/devices?limit=2&offset=1").await;
    assert_eq!(names(&page), vec!["foo1", "foo2"]);

    let online = stack.get_json("/hubs/h1/devices?state=connected").await;
    assert_eq!(ids(&online), vec!["d2", "d3"]);
}

#[tokio::test]
async fn test_hub_without_devices() {
    let stack = Stack::start(nine_devices().hub_devices("h-empty", &[])).await;

    let body = stack.get_json("/hubs/h-empty/devices").await;

    assert_eq!(body, Value::Array(vec![]));
}

#[tokio::test]
async fn test_unknown_hub_is_bad_gateway() {
    let stack = Stack::start(nine_devices()).await;

    let response = stack.get("/hubs/missing/devices").await;

    assert_eq!(response.status(), 502);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "bad_gateway");
}
