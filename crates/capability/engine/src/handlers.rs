//! edge 请求处理：每个请求在工作池中执行，并以固定回复码应答。
//!
//! | 请求 | 成功 | 失败 |
//! |------|------|------|
//! | 内容无法解码 | - | 201 |
//! | register | 200 success | 205 |
//! | fetch | 200 规格列表 | 205 |
//! | report（edge 不在线） | - | 205 edge is not online |
//! | report/device_data | 200 | 202（时序写入失败） |
//! | life_control / set_property | - | 205 |

use crate::engine::TwinEngine;
use api_contract::{EdgeRequest, ReplyCode, Report, Request, Response};
use domain::{DeviceEvent, DevicesDataReport, ProtocolRegistration};
use tracing::{debug, info, warn};
use twin_storage::{ForwardKind, ProtocolTypeRecord};
use twin_telemetry::record_reported_batch;

pub const EDGE_NOT_ONLINE_TEXT: &str = "edge is not online";
pub const UNSUPPORTED_OPERATION_TEXT: &str = "unsupported operation";

impl TwinEngine {
    pub(crate) async fn handle_request(&self, request: Request) {
        let response = self.process_request(&request).await;
        self.send_reply(response).await;
    }

    async fn process_request(&self, request: &Request) -> Response {
        let decoded = match request.decode() {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(
                    target: "twin.engine",
                    edge_id = %request.edge_id,
                    mapper_id = %request.mapper_id,
                    operation = %request.operation,
                    resource = %request.resource,
                    error = %err,
                    "edge_request_rejected"
                );
                return request.reply_invalid();
            }
        };

        match decoded {
            EdgeRequest::Register(registration) => {
                self.handle_register(request, registration).await
            }
            EdgeRequest::Fetch => self.handle_fetch(request).await,
            EdgeRequest::Report(report) => self.handle_report(request, report).await,
            EdgeRequest::LifeControl { resource } | EdgeRequest::SetProperty { resource } => {
                warn!(
                    target: "twin.engine",
                    edge_id = %request.edge_id,
                    operation = %request.operation,
                    resource = %resource,
                    "edge_request_unsupported"
                );
                request.reply(ReplyCode::Error, UNSUPPORTED_OPERATION_TEXT)
            }
        }
    }

    async fn handle_register(
        &self,
        request: &Request,
        registration: ProtocolRegistration,
    ) -> Response {
        let record = ProtocolTypeRecord {
            protocol_type: registration.protocol_type,
            spec: registration.spec,
        };
        let protocol_type = record.protocol_type.clone();
        match self.inner.deps.devices.upsert_protocol_type(record).await {
            Ok(()) => {
                info!(
                    target: "twin.engine",
                    edge_id = %request.edge_id,
                    mapper_id = %request.mapper_id,
                    protocol_type = %protocol_type,
                    "protocol_type_registered"
                );
                request.reply_ok()
            }
            Err(err) => {
                warn!(
                    target: "twin.engine",
                    protocol_type = %protocol_type,
                    error = %err,
                    "protocol_type_register_failed"
                );
                request.reply(ReplyCode::Error, err.to_string())
            }
        }
    }

    async fn handle_fetch(&self, request: &Request) -> Response {
        let edge_id = &request.edge_id;
        let protocol_type = &request.mapper_id;
        let specs = match self.device_spec_list(edge_id, protocol_type).await {
            Ok(specs) => specs,
            Err(err) => {
                warn!(
                    target: "twin.engine",
                    edge_id = %edge_id,
                    protocol_type = %protocol_type,
                    error = %err,
                    "device_spec_fetch_failed"
                );
                return request.reply(ReplyCode::Error, err.to_string());
            }
        };
        match request.reply_json(ReplyCode::Ok, &specs) {
            Ok(response) => {
                self.inner
                    .status
                    .update_fetch_history(edge_id, protocol_type, true);
                info!(
                    target: "twin.engine",
                    edge_id = %edge_id,
                    protocol_type = %protocol_type,
                    devices = specs.len(),
                    "device_specs_fetched"
                );
                response
            }
            Err(err) => request.reply(ReplyCode::Error, err.to_string()),
        }
    }

    async fn handle_report(&self, request: &Request, report: Report) -> Response {
        match self.inner.deps.presence.is_online(&request.edge_id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    target: "twin.engine",
                    edge_id = %request.edge_id,
                    resource = %request.resource,
                    "report_from_offline_edge"
                );
                return request.reply(ReplyCode::Error, EDGE_NOT_ONLINE_TEXT);
            }
            Err(err) => {
                warn!(
                    target: "twin.engine",
                    edge_id = %request.edge_id,
                    error = %err,
                    "edge_presence_check_failed"
                );
                return request.reply(ReplyCode::Error, EDGE_NOT_ONLINE_TEXT);
            }
        }

        match report {
            Report::DeviceStatus(report) => {
                self.apply_status_report(&request.edge_id, &request.mapper_id, report)
                    .await;
                request.reply_ok()
            }
            Report::DeviceData(report) => {
                if self.ingest_device_data(&request.edge_id, report).await {
                    request.reply_ok()
                } else {
                    request.reply_internal_error()
                }
            }
            Report::DeviceEvent(event) => {
                self.ingest_device_event(&request.edge_id, event).await;
                request.reply_ok()
            }
            Report::EventRecover(event) => {
                debug!(
                    target: "twin.engine",
                    edge_id = %request.edge_id,
                    device_id = %event.device_id,
                    event = %event.event_name,
                    "event_recovered"
                );
                request.reply_ok()
            }
        }
    }

    /// 写入上报历史、时序库并转发；返回 false 表示至少一台设备时序写入失败。
    async fn ingest_device_data(&self, edge_id: &str, report: DevicesDataReport) -> bool {
        let mut all_stored = true;
        for device in report.devices {
            if device.device_id.is_empty() {
                continue;
            }
            record_reported_batch();
            self.inner
                .twins
                .append_reported(&device.device_id, device.services.clone());

            if let Err(err) = self
                .inner
                .deps
                .time_series
                .store_twins(&device.device_id, &device.services)
                .await
            {
                all_stored = false;
                warn!(
                    target: "twin.engine",
                    edge_id = %edge_id,
                    device_id = %device.device_id,
                    error = %err,
                    "reported_twins_store_failed"
                );
                continue;
            }

            let payload = match serde_json::to_value(&device) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(
                        target: "twin.engine",
                        device_id = %device.device_id,
                        error = %err,
                        "forward_encode_failed"
                    );
                    continue;
                }
            };
            if let Err(err) = self
                .inner
                .deps
                .forwarder
                .forward(&device.device_id, edge_id, ForwardKind::Property, &payload)
                .await
            {
                warn!(
                    target: "twin.engine",
                    edge_id = %edge_id,
                    device_id = %device.device_id,
                    error = %err,
                    "reported_twins_forward_failed"
                );
            }
        }
        all_stored
    }

    async fn ingest_device_event(&self, edge_id: &str, event: DeviceEvent) {
        if let Err(err) = self.inner.deps.time_series.store_event(&event).await {
            warn!(
                target: "twin.engine",
                edge_id = %edge_id,
                device_id = %event.device_id,
                event = %event.event_name,
                error = %err,
                "device_event_store_failed"
            );
        }
        let payload = match serde_json::to_value(&event) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(
                    target: "twin.engine",
                    device_id = %event.device_id,
                    error = %err,
                    "forward_encode_failed"
                );
                return;
            }
        };
        if let Err(err) = self
            .inner
            .deps
            .forwarder
            .forward(&event.device_id, edge_id, ForwardKind::Event, &payload)
            .await
        {
            warn!(
                target: "twin.engine",
                edge_id = %edge_id,
                device_id = %event.device_id,
                error = %err,
                "device_event_forward_failed"
            );
        }
    }
}
