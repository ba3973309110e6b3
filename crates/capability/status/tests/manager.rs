use domain::{DeviceState, DeviceStatus, TwinProperty};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use twin_status::{DeviceStatusManager, StatusChange, StatusError};
use twin_storage::{DeviceInstanceRecord, DeviceStore, InMemoryDeviceStore};

fn device(device_id: &str, edge_id: &str, status: DeviceStatus) -> DeviceInstanceRecord {
    DeviceInstanceRecord {
        device_id: device_id.to_string(),
        name: device_id.to_string(),
        edge_id: edge_id.to_string(),
        protocol_type: "modbus".to_string(),
        protocol: "{}".to_string(),
        os: String::new(),
        category: String::new(),
        identification_code: String::new(),
        tags: BTreeMap::new(),
        device_model_id: "model-1".to_string(),
        life_time_of_desired_value: 30_000,
        status,
        state: DeviceState::Started,
        update_ts_ms: 1,
    }
}

fn setup(records: Vec<DeviceInstanceRecord>) -> (Arc<InMemoryDeviceStore>, DeviceStatusManager) {
    let store = Arc::new(InMemoryDeviceStore::new());
    for record in records {
        store.insert_device(record).expect("insert");
    }
    let manager = DeviceStatusManager::new(store.clone());
    (store, manager)
}

#[tokio::test]
async fn get_reads_through_and_misses_quietly() {
    let (_store, manager) = setup(vec![device("dev-1", "edge-1", DeviceStatus::Active)]);

    let details = manager.get("dev-1").await.expect("get").expect("cached");
    assert_eq!(details.edge_id, "edge-1");
    assert_eq!(details.status, DeviceStatus::Active);

    assert!(manager.get("missing").await.expect("get").is_none());
}

#[tokio::test]
async fn unchanged_update_does_no_io() {
    let (store, manager) = setup(vec![device("dev-1", "edge-1", DeviceStatus::Online)]);
    let guard = manager.lock("dev-1").await;

    let changed = manager
        .update(&guard, StatusChange::status(DeviceStatus::Online))
        .await
        .expect("update");
    assert!(!changed);
    assert_eq!(store.status_writes(), 0);
}

#[tokio::test]
async fn changed_update_persists_and_bumps_timestamp() {
    let (store, manager) = setup(vec![device("dev-1", "edge-1", DeviceStatus::Active)]);
    let guard = manager.lock("dev-1").await;

    let changed = manager
        .update(
            &guard,
            StatusChange::both(DeviceStatus::Online, DeviceState::Stopped),
        )
        .await
        .expect("update");
    assert!(changed);
    drop(guard);

    let cached = manager.get("dev-1").await.expect("get").expect("cached");
    assert_eq!(cached.status, DeviceStatus::Online);
    assert_eq!(cached.state, DeviceState::Stopped);
    assert!(cached.update_ts_ms > 1);

    let persisted = store.find_device("dev-1").await.expect("find").expect("some");
    assert_eq!(persisted.status, DeviceStatus::Online);
    assert_eq!(persisted.update_ts_ms, cached.update_ts_ms);
}

#[tokio::test]
async fn failed_persist_keeps_cache() {
    let (store, manager) = setup(vec![device("dev-1", "edge-1", DeviceStatus::Active)]);
    let guard = manager.lock("dev-1").await;
    store.fail_status_writes(true);

    let result = manager
        .update(&guard, StatusChange::status(DeviceStatus::Online))
        .await;
    assert!(matches!(result, Err(StatusError::Storage(_))));

    let cached = manager.get_locked(&guard).await.expect("get").expect("cached");
    assert_eq!(cached.status, DeviceStatus::Active);
}

#[tokio::test]
async fn update_unknown_device_is_rejected() {
    let (_store, manager) = setup(Vec::new());
    let guard = manager.lock("ghost").await;
    let result = manager
        .update(&guard, StatusChange::status(DeviceStatus::Online))
        .await;
    assert!(matches!(result, Err(StatusError::NoSuchDevice(id)) if id == "ghost"));
}

#[tokio::test]
async fn lock_serializes_transitions() {
    let (_store, manager) = setup(vec![device("dev-1", "edge-1", DeviceStatus::Active)]);
    let manager = Arc::new(manager);
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    let guard = manager.lock("dev-1").await;
    let waiter = {
        let manager = manager.clone();
        let order = order.clone();
        tokio::spawn(async move {
            let guard = manager.lock("dev-1").await;
            order.lock().expect("order").push("second");
            manager
                .update(&guard, StatusChange::state(DeviceState::Stopped))
                .await
                .expect("update")
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    order.lock().expect("order").push("first");
    manager
        .update(&guard, StatusChange::status(DeviceStatus::Online))
        .await
        .expect("update");
    drop(guard);

    assert!(waiter.await.expect("join"));
    assert_eq!(*order.lock().expect("order"), vec!["first", "second"]);
    let details = manager.get("dev-1").await.expect("get").expect("cached");
    assert_eq!(details.status, DeviceStatus::Online);
    assert_eq!(details.state, DeviceState::Stopped);
}

#[tokio::test]
async fn delete_removes_entry_and_record() {
    let (store, manager) = setup(vec![device("dev-1", "edge-1", DeviceStatus::Active)]);
    let guard = manager.lock("dev-1").await;
    manager.delete(guard).await.expect("delete");

    assert!(store.find_device("dev-1").await.expect("find").is_none());
    assert!(manager.get("dev-1").await.expect("get").is_none());

    let guard = manager.lock("dev-1").await;
    let result = manager.delete(guard).await;
    assert!(matches!(result, Err(StatusError::NoSuchDevice(_))));
}

#[tokio::test]
async fn edge_wide_update_uses_one_bulk_write() {
    let (store, manager) = setup(vec![
        device("dev-1", "edge-1", DeviceStatus::Online),
        device("dev-2", "edge-1", DeviceStatus::Online),
        device("dev-3", "edge-2", DeviceStatus::Online),
    ]);
    for id in ["dev-1", "dev-2", "dev-3"] {
        manager.get(id).await.expect("get");
    }

    let affected = manager
        .update_all_in_edge("edge-1", DeviceStatus::Offline)
        .await
        .expect("bulk");
    assert_eq!(affected, 2);
    assert_eq!(store.status_writes(), 1);

    let first = manager.get("dev-1").await.expect("get").expect("cached");
    let other = manager.get("dev-3").await.expect("get").expect("cached");
    assert_eq!(first.status, DeviceStatus::Offline);
    assert_eq!(other.status, DeviceStatus::Online);
}

#[tokio::test]
async fn fetch_history_round_trip() {
    let (_store, manager) = setup(Vec::new());
    assert!(!manager.has_fetched("edge-1", "modbus"));
    manager.update_fetch_history("edge-1", "modbus", true);
    assert!(manager.has_fetched("edge-1", "modbus"));
    assert!(!manager.has_fetched("edge-1", "opcua"));
    manager.update_fetch_history("edge-1", "modbus", false);
    assert!(!manager.has_fetched("edge-1", "modbus"));
}

#[tokio::test]
async fn pending_prune_and_acknowledge() {
    let (_store, manager) = setup(Vec::new());
    let now = 100_000;
    manager
        .merge_pending(
            "dev-1",
            vec![
                TwinProperty::new("svc", "old", json!(1), now - 31_000),
                TwinProperty::new("svc", "new", json!(2), now - 29_000),
            ],
        )
        .expect("merge");

    let fresh = manager.prune_pending("dev-1", 30_000, now).expect("prune");
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh[0].property_name, "new");

    // 发送期间合并进来的新值不应被确认移除
    manager
        .merge_pending(
            "dev-1",
            vec![TwinProperty::new("svc", "new", json!(3), now - 1_000)],
        )
        .expect("merge");
    manager.acknowledge_pending("dev-1", &fresh).expect("ack");
    let remaining = manager.pending("dev-1");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].value, Some(json!(3)));

    manager.acknowledge_pending("dev-1", &remaining).expect("ack");
    assert!(manager.pending_devices().is_empty());
}

#[tokio::test]
async fn unknown_devices_leave_no_cached_entries() {
    let (_store, manager) = setup(vec![device("dev-1", "edge-1", DeviceStatus::Active)]);

    for i in 0..1000 {
        let guard = manager.lock(&format!("ghost-{i}")).await;
        assert!(manager.get_locked(&guard).await.expect("get").is_none());
    }
    assert_eq!(manager.cached_devices(), 0);

    let guard = manager.lock("dev-1").await;
    manager.get_locked(&guard).await.expect("get").expect("cached");
    drop(guard);
    assert_eq!(manager.cached_devices(), 1);
}

#[tokio::test]
async fn waiter_on_unknown_device_relocks_after_release() {
    let (_store, manager) = setup(Vec::new());
    let manager = Arc::new(manager);

    let guard = manager.lock("ghost").await;
    let waiter = {
        let manager = manager.clone();
        tokio::spawn(async move {
            let guard = manager.lock("ghost").await;
            manager.get_locked(&guard).await.expect("get").is_none()
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(guard);

    assert!(waiter.await.expect("join"));
    assert_eq!(manager.cached_devices(), 0);
}

#[tokio::test]
async fn expired_pending_releases_entry() {
    let (_store, manager) = setup(Vec::new());
    manager
        .merge_pending(
            "ghost",
            vec![TwinProperty::new("svc", "power", json!(1), i64::MIN)],
        )
        .expect("merge");
    assert_eq!(manager.cached_devices(), 1);

    let fresh = manager
        .prune_pending("ghost", 30_000, 100_000)
        .expect("prune");
    assert!(fresh.is_empty());
    assert_eq!(manager.cached_devices(), 0);
}

#[tokio::test]
async fn resync_lock_serializes_per_edge_protocol() {
    let (_store, manager) = setup(Vec::new());
    let manager = Arc::new(manager);

    let guard = manager.lock_resync("edge-1", "modbus").await;
    // 其他 edge 不受影响
    drop(manager.lock_resync("edge-2", "modbus").await);

    let waiter = {
        let manager = manager.clone();
        tokio::spawn(async move {
            let _guard = manager.lock_resync("edge-1", "modbus").await;
            manager.has_fetched("edge-1", "modbus")
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    manager.update_fetch_history("edge-1", "modbus", true);
    drop(guard);

    assert!(waiter.await.expect("join"));
}
