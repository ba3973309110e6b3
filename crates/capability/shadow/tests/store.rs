use domain::TwinProperty;
use serde_json::json;
use std::sync::Arc;
use twin_shadow::TwinStore;

fn reading(value: i64) -> Vec<TwinProperty> {
    vec![TwinProperty::new("svc", "temp", json!(value), value)]
}

#[test]
fn ring_keeps_last_capacity_oldest_first() {
    let store = TwinStore::new(20);
    for index in 0..25 {
        store.append_reported_at("dev-1", reading(index), index);
    }

    let history = store.recent_reported("dev-1", 20).expect("history");
    let stamps: Vec<i64> = history.iter().map(|item| item.ts).collect();
    assert_eq!(stamps, (5..25).collect::<Vec<_>>());

    let recent = store.recent_reported("dev-1", 3).expect("history");
    let stamps: Vec<i64> = recent.iter().map(|item| item.ts).collect();
    assert_eq!(stamps, vec![22, 23, 24]);
}

#[test]
fn short_history_is_returned_whole() {
    let store = TwinStore::new(20);
    store.append_reported_at("dev-1", reading(1), 1);
    store.append_reported_at("dev-1", reading(2), 2);
    let history = store.recent_reported("dev-1", 20).expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].ts, 1);
    assert!(store.recent_reported("dev-2", 20).is_none());
}

#[test]
fn desired_merge_is_idempotent() {
    let store = TwinStore::default();
    let properties = vec![
        TwinProperty::new("svc", "a", json!(1), 10),
        TwinProperty::new("svc", "b", json!(2), 10),
    ];
    store.merge_desired("dev-1", properties.clone());
    store.merge_desired("dev-1", properties.clone());
    assert_eq!(store.desired("dev-1"), properties);

    store.merge_desired("dev-1", vec![TwinProperty::new("svc", "a", json!(5), 20)]);
    let desired = store.desired("dev-1");
    assert_eq!(desired.len(), 2);
    assert_eq!(desired[0].value, Some(json!(5)));
}

#[test]
fn desired_expiry_boundaries() {
    let store = TwinStore::default();
    let now = 1_000_000;
    store.merge_desired(
        "dev-1",
        vec![
            TwinProperty::new("svc", "fresh", json!(1), now - 29_000),
            TwinProperty::new("svc", "stale", json!(1), now - 31_000),
            TwinProperty {
                value: None,
                ..TwinProperty::new("svc", "empty", json!(null), now)
            },
        ],
    );

    let valid = store.desired_not_expired_at("dev-1", 30_000, now);
    assert_eq!(valid.len(), 1);
    assert_eq!(valid[0].property_name, "fresh");
    assert!(store.desired_not_expired_at("dev-1", 0, now).is_empty());
}

#[test]
fn remove_device_clears_both_sides() {
    let store = TwinStore::default();
    store.append_reported_at("dev-1", reading(1), 1);
    store.merge_desired("dev-1", reading(1));
    store.remove_device("dev-1");
    assert!(store.recent_reported("dev-1", 20).is_none());
    assert!(store.desired("dev-1").is_empty());
}

#[tokio::test]
async fn concurrent_appends_are_not_lost() {
    let store = Arc::new(TwinStore::new(64));
    let mut handles = Vec::new();
    for task in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            for index in 0..8 {
                store.append_reported_at("dev-1", reading(task * 8 + index), task * 8 + index);
            }
        }));
    }
    for handle in handles {
        handle.await.expect("join");
    }
    let history = store.recent_reported("dev-1", 64).expect("history");
    assert_eq!(history.len(), 64);
}
