//! 请求上下文中间件：为每个 HTTP 请求注入 request_id/trace_id，并回写到响应头。

use axum::{
    body::Body,
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, info_span};
use twin_telemetry::new_request_ids;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const TRACE_ID_HEADER: &str = "x-trace-id";

pub async fn request_context(mut req: Request<Body>, next: Next) -> Response {
    let ids = new_request_ids();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(ids.clone());

    let span = info_span!(
        "request",
        request_id = %ids.request_id,
        trace_id = %ids.trace_id,
        method = %method,
        path = %path
    );

    let mut response = next.run(req).instrument(span).await;
    response.headers_mut().insert(
        REQUEST_ID_HEADER,
        HeaderValue::from_str(&ids.request_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response.headers_mut().insert(
        TRACE_ID_HEADER,
        HeaderValue::from_str(&ids.trace_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response
}
