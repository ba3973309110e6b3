//! 由设备实例、服务实例与设备模型按 ID 组装下发规格。

use domain::{
    DeviceCommandSpec, DeviceEventSpec, DevicePropertySpec, DeviceServiceSpec, DeviceSpecMeta,
    DeviceState,
};
use std::collections::BTreeMap;
use twin_storage::{DeviceInstanceRecord, DeviceModelRecord, ServiceInstanceRecord, ServiceModelRecord};

/// 没有可下发的服务时返回 None。
pub fn build_device_spec(
    device: &DeviceInstanceRecord,
    services: &[ServiceInstanceRecord],
    model: &DeviceModelRecord,
    state: DeviceState,
) -> Option<DeviceSpecMeta> {
    let services: Vec<DeviceServiceSpec> = services
        .iter()
        .filter_map(|service| build_service_spec(&device.device_id, service, model))
        .collect();
    if services.is_empty() {
        return None;
    }
    Some(DeviceSpecMeta {
        device_id: device.device_id.clone(),
        os: device.os.clone(),
        category: device.category.clone(),
        identification_code: device.identification_code.clone(),
        protocol: device.protocol.clone(),
        state: Some(state),
        tags: device.tags.clone(),
        services,
    })
}

fn build_service_spec(
    device_id: &str,
    service: &ServiceInstanceRecord,
    model: &DeviceModelRecord,
) -> Option<DeviceServiceSpec> {
    let Some(service_model) = model.service(&service.name) else {
        tracing::warn!(
            target: "twin.engine",
            device_id = %device_id,
            service = %service.name,
            "service_model_missing"
        );
        return None;
    };

    let spec = DeviceServiceSpec {
        name: service.name.clone(),
        properties: service
            .properties
            .iter()
            .filter(|item| !item.access_config.is_empty())
            .filter_map(|item| property_spec(service_model, &item.name, &item.access_config))
            .collect(),
        events: service
            .events
            .iter()
            .filter(|item| !item.access_config.is_empty())
            .filter_map(|item| {
                let model = service_model.events.iter().find(|m| m.name == item.name)?;
                Some(DeviceEventSpec {
                    name: item.name.clone(),
                    event_type: model.event_type.clone(),
                    access_config: item.access_config.clone(),
                })
            })
            .collect(),
        commands: service
            .commands
            .iter()
            .filter(|item| !item.access_config.is_empty())
            .filter_map(|item| {
                let model = service_model.commands.iter().find(|m| m.name == item.name)?;
                Some(DeviceCommandSpec {
                    name: item.name.clone(),
                    req_param: parse_request_param(&model.request_param),
                    access_config: item.access_config.clone(),
                })
            })
            .collect(),
    };
    if spec.is_empty() {
        return None;
    }
    Some(spec)
}

fn property_spec(
    service_model: &ServiceModelRecord,
    name: &str,
    access_config: &str,
) -> Option<DevicePropertySpec> {
    let model = service_model.properties.iter().find(|m| m.name == name)?;
    Some(DevicePropertySpec {
        name: name.to_string(),
        writable: model.writable,
        max_value: model.max_value,
        min_value: model.min_value,
        unit: model.unit.clone(),
        data_type: model.data_type.clone(),
        access_config: access_config.to_string(),
    })
}

/// 请求参数为 JSON 对象文本，解析失败时视为无参数。
fn parse_request_param(raw: &str) -> BTreeMap<String, String> {
    if raw.trim().is_empty() {
        return BTreeMap::new();
    }
    serde_json::from_str(raw).unwrap_or_default()
}
