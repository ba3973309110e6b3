use api_contract::{
    ContractError, EdgeRequest, Message, Operation, ReplyCode, Report, Request, TopicScheme,
};
use serde_json::{Value, json};

#[test]
fn request_topic_includes_resource() {
    let scheme = TopicScheme::default();
    let req = Request::new("edge-1", "modbus", Operation::LifeControl, "create");
    let topic = scheme.outbound_topic(&Message::Request(req));
    assert_eq!(topic, "adv/ithings/server/edge-1/mapper/modbus/life_control/create");
}

#[test]
fn reply_topic_and_payload_shape() {
    let scheme = TopicScheme::default();
    let req = Request::new("edge-1", "modbus", Operation::Fetch, "");
    let resp = req.reply_ok();
    let message = Message::Response(resp);
    assert_eq!(
        scheme.outbound_topic(&message),
        "adv/ithings/server/edge-1/mapper/modbus/reply"
    );
    let payload: Value =
        serde_json::from_slice(&scheme.outbound_payload(&message).expect("encode")).expect("json");
    assert_eq!(payload["pid"], req.id());
    assert_eq!(payload["code"], "200");
    assert_eq!(payload["content"], "success");
    assert!(payload["id"].as_str().is_some_and(|id| id.len() == 32 && !id.contains('-')));
}

#[test]
fn parse_inbound_report_request() {
    let scheme = TopicScheme::default();
    let content = json!({"devices": [{"device_id": "dev-1", "status": "online"}]}).to_string();
    let payload = json!({"id": "abc", "content": content}).to_string();
    let message = scheme
        .parse_inbound(
            "adv/ithings/edge/edge-1/mapper/modbus/report/device_status",
            payload.as_bytes(),
        )
        .expect("parse");
    let Message::Request(req) = message else {
        panic!("expected request");
    };
    assert_eq!(req.edge_id, "edge-1");
    assert_eq!(req.mapper_id, "modbus");
    assert_eq!(req.operation, Operation::Report);
    match req.decode().expect("decode") {
        EdgeRequest::Report(Report::DeviceStatus(report)) => {
            assert_eq!(report.devices[0].device_id, "dev-1");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn parse_inbound_reply() {
    let scheme = TopicScheme::default();
    let payload = json!({"id": "r1", "pid": "q1", "code": "205", "content": "busy"}).to_string();
    let message = scheme
        .parse_inbound("adv/ithings/edge/edge-1/mapper/modbus/reply", payload.as_bytes())
        .expect("parse");
    let Message::Response(resp) = message else {
        panic!("expected response");
    };
    assert_eq!(resp.parent_id(), "q1");
    assert_eq!(resp.code(), &ReplyCode::Error);
}

#[test]
fn unknown_operation_is_rejected() {
    let scheme = TopicScheme::default();
    let err = scheme
        .parse_inbound("adv/ithings/edge/edge-1/mapper/modbus/explode", br#"{"id":"1"}"#)
        .expect_err("unknown op");
    assert!(matches!(err, ContractError::UnknownOperation(op) if op == "explode"));
}

#[test]
fn unknown_report_resource_is_rejected() {
    let req = Request::new("edge-1", "modbus", Operation::Report, "device_mood").with_text("{}");
    let err = req.decode().expect_err("unknown resource");
    assert!(matches!(err, ContractError::UnknownResource(_)));
}

#[test]
fn unusual_codes_round_trip_as_text() {
    let code: ReplyCode = serde_json::from_str("\"299\"").expect("parse");
    assert_eq!(code, ReplyCode::Other("299".to_string()));
    assert_eq!(serde_json::to_string(&code).expect("encode"), "\"299\"");
}
