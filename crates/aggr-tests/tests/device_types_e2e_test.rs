//! End-to-end tests for devices listed by device type

use aggr_tests::{ids, names, Fixture, Stack, StackOptions};
use pretty_assertions::assert_eq;
use serde_json::json;

fn fixture() -> Fixture {
    Fixture::default()
        .device_type("dt-lamp", "Lamp")
        .device_type("dt-switch", "Switch")
        .device("d1", "lamp-kitchen", Some("dt-lamp"))
        .device("d2", "lamp-attic", Some("dt-lamp"))
        .device("d3", "lamp-garage", Some("dt-lamp"))
        .device("d4", "switch-door", Some("dt-switch"))
        .device("d5", "button", Some("dt-button"))
        .device("d6", "bare", None)
        .device_state("d1", true)
        .device_state("d2", false)
        .device_state("d4", true)
}

#[tokio::test]
async fn test_devices_of_one_type() {
    let stack = Stack::start(fixture()).await;

    let body = stack.get_json("/device-types/dt-lamp/devices").await;

    assert_eq!(
        names(&body),
        vec!["lamp-attic", "lamp-garage", "lamp-kitchen"]
    );
    assert_eq!(body[0]["device_type"]["name"], "Lamp");
    assert_eq!(body[0]["log_state"], "disconnected");
    assert_eq!(body[2]["log_state"], "connected");
    assert!(body[1].get("log_state").is_none());
}

#[tokio::test]
async fn test_type_devices_paging_sort_and_state() {
    let stack = Stack::start(fixture()).await;

    let page = stack
        .get_json("/device-types/dt-lamp/devices?limit=2&offset=1&sort=name.desc")
        .await;
    let connected = stack
        .get_json("/device-types/dt-lamp/devices?state=connected")
        .await;

    assert_eq!(names(&page), vec!["lamp-garage", "lamp-attic"]);
    assert_eq!(ids(&connected), vec!["d1"]);
}

#[tokio::test]
async fn test_unknown_type_has_no_devices() {
    let stack = Stack::start(fixture()).await;

    let body = stack.get_json("/device-types/dt-none/devices").await;

    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_devices_of_several_types_sorted_by_name() {
    let stack = Stack::start(fixture()).await;

    let body = stack
        .post_json(
            "/device-types-devices",
            &json!({"ids": ["dt-switch", "dt-lamp", "dt-lamp"]}),
        )
        .await;

    assert_eq!(
        names(&body),
        vec!["lamp-attic", "lamp-garage", "lamp-kitchen", "switch-door"]
    );
    assert_eq!(body[3]["device_type"]["name"], "Switch");
}

#[tokio::test]
async fn test_devices_of_several_types_by_state() {
    let stack = Stack::start(fixture()).await;

    let connected = stack
        .post_json(
            "/device-types-devices?state=connected",
            &json!({"ids": ["dt-lamp", "dt-switch"]}),
        )
        .await;
    let unknown = stack
        .post_json(
            "/device-types-devices?state=unknown",
            &json!({"ids": ["dt-lamp", "dt-button"]}),
        )
        .await;

    assert_eq!(ids(&connected), vec!["d1", "d4"]);
    assert_eq!(ids(&unknown), vec!["d5", "d3"]);
    // Unknown device types keep their devices, just without `device_type`
    assert!(unknown[0].get("device_type").is_none());
}

#[tokio::test]
async fn test_devices_of_types_are_not_capped() {
    let mut fixture = Fixture::default();
    for i in 0..120 {
        fixture = fixture.device(&format!("d{:03}", i), &format!("lamp{:03}", i), Some("dt-lamp"));
    }
    let options = StackOptions {
        find_all_batch_size: 50,
        ..Default::default()
    };
    let stack = Stack::start_with(fixture, options).await;

    let body = stack
        .post_json("/device-types-devices", &json!({"ids": ["dt-lamp"]}))
        .await;

    assert_eq!(ids(&body).len(), 120);
    // 50 + 50 + 20
    assert_eq!(stack.take_queries().iter().filter(|q| q.find.is_some()).count(), 3);
}

#[tokio::test]
async fn test_no_device_types_is_empty() {
    let stack = Stack::start(fixture()).await;

    let body = stack
        .post_json("/device-types-devices", &json!({"ids": []}))
        .await;

    assert_eq!(body, json!([]));
    assert!(stack.take_queries().is_empty());
}
