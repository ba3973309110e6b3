use api_contract::{ApiResponse, DesiredTwinsRequest};

#[test]
fn api_response_success() {
    let response = ApiResponse::success("ok");
    assert!(response.success);
    assert!(response.data.is_some());
    assert!(response.error.is_none());
}

#[test]
fn api_response_error() {
    let response = ApiResponse::<()>::error("DEVICE.NOT_FOUND", "no such device");
    assert!(!response.success);
    assert!(response.data.is_none());
    assert_eq!(
        response.error.as_ref().map(|err| err.code.as_str()),
        Some("DEVICE.NOT_FOUND")
    );
}

#[test]
fn desired_request_accepts_camel_case() {
    let payload = r#"{"desiredTwins":[{"svc":"s","pn":"p","val":1,"ts":5}]}"#;
    let req: DesiredTwinsRequest = serde_json::from_str(payload).expect("parse");
    assert_eq!(req.desired_twins.len(), 1);
}
