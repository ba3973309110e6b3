mod common;

use api_contract::{Message, Operation, ReplyCode, Request};
use common::{EDGE, Harness, PROTOCOL, device};
use domain::{
    DeviceDataReport, DeviceEvent, DeviceSpecMeta, DeviceState, DeviceStatus, DeviceStatusReport,
    DevicesDataReport, DevicesStatusReport, TwinProperty,
};
use serde_json::json;
use std::time::Duration;
use twin_storage::ForwardKind;
use twin_transport::Transport;

fn status_report(device_id: &str, status: &str) -> Request {
    Request::new(EDGE, PROTOCOL, Operation::Report, "device_status")
        .with_json(&DevicesStatusReport {
            devices: vec![DeviceStatusReport {
                device_id: device_id.to_string(),
                status: status.to_string(),
            }],
        })
        .expect("encode")
}

fn data_report(devices: &[&str]) -> Request {
    let devices = devices
        .iter()
        .map(|device_id| DeviceDataReport {
            device_id: device_id.to_string(),
            services: vec![TwinProperty::new("energy", "power", json!(42.5), 1_000)],
        })
        .collect();
    Request::new(EDGE, PROTOCOL, Operation::Report, "device_data")
        .with_json(&DevicesDataReport { devices })
        .expect("encode")
}

#[tokio::test]
async fn malformed_content_replies_invalid_message() {
    let harness = Harness::start(Vec::new()).await;

    let response = harness
        .call(Request::new(EDGE, PROTOCOL, Operation::Report, "device_status").with_text("{oops"))
        .await;
    assert_eq!(response.code(), &ReplyCode::InvalidMessage);

    let response = harness
        .call(Request::new(EDGE, PROTOCOL, Operation::Report, "device_gossip").with_text("{}"))
        .await;
    assert_eq!(response.code(), &ReplyCode::InvalidMessage);
    harness.shutdown().await;
}

#[tokio::test]
async fn report_from_offline_edge_is_refused() {
    let harness = Harness::start(vec![device(
        "dev-1",
        DeviceStatus::Online,
        DeviceState::Started,
    )])
    .await;
    harness.set_edge_online(false).await;

    let response = harness.call(status_report("dev-1", "offline")).await;
    assert_eq!(response.code(), &ReplyCode::Error);
    assert_eq!(response.content(), "edge is not online");
    assert_eq!(harness.store.status_writes(), 0);
    harness.shutdown().await;
}

#[tokio::test]
async fn register_persists_protocol_type() {
    let harness = Harness::start(Vec::new()).await;

    let request = Request::new(EDGE, PROTOCOL, Operation::Register, "")
        .with_text(r#"{"type":"modbus","spec":"v1"}"#);
    let response = harness.call(request).await;
    assert_eq!(response.code(), &ReplyCode::Ok);
    assert_eq!(response.content(), "success");

    let record = harness.store.protocol_type("modbus").expect("registered");
    assert_eq!(record.spec, "v1");
    harness.shutdown().await;
}

#[tokio::test]
async fn fetch_returns_active_specs_and_records_history() {
    let harness = Harness::start(vec![
        device("dev-1", DeviceStatus::Active, DeviceState::Started),
        device("dev-2", DeviceStatus::Inactive, DeviceState::Stopped),
    ])
    .await;
    assert!(!harness.engine.status().has_fetched(EDGE, PROTOCOL));

    let response = harness
        .call(Request::new(EDGE, PROTOCOL, Operation::Fetch, ""))
        .await;
    assert_eq!(response.code(), &ReplyCode::Ok);
    let specs: Vec<DeviceSpecMeta> = serde_json::from_str(response.content()).expect("specs");
    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].device_id, "dev-1");
    assert!(harness.engine.status().has_fetched(EDGE, PROTOCOL));
    harness.shutdown().await;
}

#[tokio::test]
async fn device_data_feeds_history_and_sinks() {
    let harness = Harness::start(vec![device(
        "dev-1",
        DeviceStatus::Online,
        DeviceState::Started,
    )])
    .await;

    for _ in 0..2 {
        let response = harness.call(data_report(&["dev-1"])).await;
        assert_eq!(response.code(), &ReplyCode::Ok);
    }

    let history = harness
        .engine
        .twins()
        .recent_reported("dev-1", 20)
        .expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].twins[0].property_name, "power");
    assert_eq!(harness.sink.stored_twins().len(), 2);
    let forwarded = harness.sink.forwarded();
    assert_eq!(forwarded.len(), 2);
    assert_eq!(forwarded[0].kind, ForwardKind::Property);
    assert_eq!(forwarded[0].edge_id, EDGE);
    harness.shutdown().await;
}

#[tokio::test]
async fn time_series_failure_replies_internal_error() {
    let harness = Harness::start(Vec::new()).await;
    harness.sink.fail_twin_writes(true);

    let response = harness.call(data_report(&["dev-1", "dev-2"])).await;
    assert_eq!(response.code(), &ReplyCode::InternalError);
    // 历史照常记录，转发被跳过
    assert!(harness.engine.twins().recent_reported("dev-2", 20).is_some());
    assert!(harness.sink.forwarded().is_empty());
    harness.shutdown().await;
}

#[tokio::test]
async fn device_event_is_stored_and_forwarded() {
    let harness = Harness::start(Vec::new()).await;
    let event = DeviceEvent {
        device_id: "dev-1".to_string(),
        service: "energy".to_string(),
        event_name: "overload".to_string(),
        timestamp_ms: 5,
        params: Some(json!({"level": 2})),
    };

    let request = Request::new(EDGE, PROTOCOL, Operation::Report, "device_event")
        .with_json(&event)
        .expect("encode");
    let response = harness.call(request).await;
    assert_eq!(response.code(), &ReplyCode::Ok);
    assert_eq!(harness.sink.stored_events(), vec![event]);
    assert_eq!(harness.sink.forwarded()[0].kind, ForwardKind::Event);
    harness.shutdown().await;
}

#[tokio::test]
async fn offline_report_invalidates_alerts_on_transition_only() {
    let harness = Harness::start(vec![device(
        "dev-1",
        DeviceStatus::Online,
        DeviceState::Started,
    )])
    .await;

    for _ in 0..2 {
        let response = harness.call(status_report("dev-1", "offline")).await;
        assert_eq!(response.code(), &ReplyCode::Ok);
    }

    let details = harness
        .engine
        .status()
        .get("dev-1")
        .await
        .expect("get")
        .expect("device");
    assert_eq!(details.status, DeviceStatus::Offline);
    assert_eq!(harness.store.invalidated_alerts(), vec!["dev-1".to_string()]);
    harness.shutdown().await;
}

#[tokio::test]
async fn reconnect_without_fetch_resyncs_specs_once() {
    let harness = Harness::start(vec![device(
        "dev-1",
        DeviceStatus::Offline,
        DeviceState::Started,
    )])
    .await;

    harness
        .edge
        .send(Message::Request(status_report("dev-1", "online")))
        .await
        .expect("send");

    // 重推先于上报回复
    let update = harness.next_request().await;
    assert_eq!(update.operation, Operation::LifeControl);
    assert_eq!(update.resource, "update");
    let specs: Vec<DeviceSpecMeta> = serde_json::from_str(update.content()).expect("specs");
    assert_eq!(specs[0].device_id, "dev-1");
    harness.reply(&update, ReplyCode::Ok).await;

    let response = harness.next_response().await;
    assert_eq!(response.code(), &ReplyCode::Ok);
    assert!(harness.engine.status().has_fetched(EDGE, PROTOCOL));

    // 再次离线后上线：拉取历史仍在，不再重推
    harness.call(status_report("dev-1", "offline")).await;
    let response = harness.call(status_report("dev-1", "online")).await;
    assert_eq!(response.code(), &ReplyCode::Ok);
    harness.assert_quiet(Duration::from_millis(50)).await;

    let details = harness
        .engine
        .status()
        .get("dev-1")
        .await
        .expect("get")
        .expect("device");
    assert_eq!(details.status, DeviceStatus::Online);
    harness.shutdown().await;
}

#[tokio::test]
async fn concurrent_reconnect_reports_resync_once() {
    let harness = Harness::start(vec![
        device("dev-1", DeviceStatus::Offline, DeviceState::Started),
        device("dev-2", DeviceStatus::Offline, DeviceState::Started),
    ])
    .await;

    for device_id in ["dev-1", "dev-2"] {
        harness
            .edge
            .send(Message::Request(status_report(device_id, "online")))
            .await
            .expect("send");
    }

    let mut resyncs = 0;
    let mut replies = 0;
    while replies < 2 {
        match harness.next_message().await {
            Message::Request(request) => {
                assert_eq!(request.operation, Operation::LifeControl);
                assert_eq!(request.resource, "update");
                resyncs += 1;
                harness.reply(&request, ReplyCode::Ok).await;
            }
            Message::Response(response) => {
                assert_eq!(response.code(), &ReplyCode::Ok);
                replies += 1;
            }
        }
    }
    harness.assert_quiet(Duration::from_millis(50)).await;
    assert_eq!(resyncs, 1);
    assert!(harness.engine.status().has_fetched(EDGE, PROTOCOL));
    for device_id in ["dev-1", "dev-2"] {
        let details = harness
            .engine
            .status()
            .get(device_id)
            .await
            .expect("get")
            .expect("device");
        assert_eq!(details.status, DeviceStatus::Online);
    }
    harness.shutdown().await;
}

#[tokio::test]
async fn mark_edge_offline_resets_fetch_history() {
    let harness = Harness::start(vec![
        device("dev-1", DeviceStatus::Online, DeviceState::Started),
        device("dev-2", DeviceStatus::Online, DeviceState::Stopped),
    ])
    .await;
    harness
        .call(Request::new(EDGE, PROTOCOL, Operation::Fetch, ""))
        .await;
    assert!(harness.engine.status().has_fetched(EDGE, PROTOCOL));
    harness.engine.status().get("dev-1").await.expect("warm cache");

    let affected = harness
        .engine
        .mark_edge_offline(EDGE)
        .await
        .expect("mark offline");
    assert_eq!(affected, 2);
    assert!(!harness.engine.status().has_fetched(EDGE, PROTOCOL));
    let details = harness
        .engine
        .status()
        .get("dev-1")
        .await
        .expect("get")
        .expect("device");
    assert_eq!(details.status, DeviceStatus::Offline);
    harness.shutdown().await;
}

#[tokio::test]
async fn unknown_device_in_status_report_is_deleted_on_edge() {
    let harness = Harness::start(Vec::new()).await;
    harness
        .edge
        .send(Message::Request(status_report("ghost", "online")))
        .await
        .expect("send");

    let mut saw_reply = false;
    let mut saw_delete = false;
    for _ in 0..2 {
        match harness.next_message().await {
            Message::Response(response) => {
                assert_eq!(response.code(), &ReplyCode::Ok);
                saw_reply = true;
            }
            Message::Request(request) => {
                assert_eq!(request.resource, "delete");
                assert_eq!(request.mapper_id, PROTOCOL);
                let spec: DeviceSpecMeta =
                    serde_json::from_str(request.content()).expect("spec");
                assert_eq!(spec.device_id, "ghost");
                saw_delete = true;
            }
        }
    }
    assert!(saw_reply && saw_delete);
    harness.shutdown().await;
}

#[tokio::test]
async fn control_operations_from_edge_are_refused() {
    let harness = Harness::start(Vec::new()).await;
    let response = harness
        .call(Request::new(EDGE, PROTOCOL, Operation::LifeControl, "create").with_text("{}"))
        .await;
    assert_eq!(response.code(), &ReplyCode::Error);
    harness.shutdown().await;
}
