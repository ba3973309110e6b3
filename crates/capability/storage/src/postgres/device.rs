//! Postgres 设备存储实现

use crate::error::StorageError;
use crate::models::{
    CommandModelRecord, DeviceInstanceRecord, DeviceModelRecord, DeviceStatusUpdate,
    EventModelRecord, InstanceAccess, PropertyModelRecord, ProtocolTypeRecord,
    ServiceInstanceRecord, ServiceModelRecord,
};
use crate::traits::DeviceStore;
use domain::{DeviceState, DeviceStatus};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::{BTreeMap, HashMap};

/// 告警失效后的状态值。
const ALERT_STATUS_INVALID: &str = "invalid";

const DEVICE_COLUMNS: &str = "device_id, name, edge_id, protocol_type, protocol, os, category, \
     id_code, tags, device_model_id, life_time_of_desired_value, device_status, state, update_ts";

pub struct PgDeviceStore {
    pub pool: PgPool,
}

impl PgDeviceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn device_from_row(row: &PgRow) -> Result<DeviceInstanceRecord, StorageError> {
    let device_id: String = row.try_get("device_id")?;
    let tags: Option<String> = row.try_get("tags")?;
    // 标签解析失败时按空标签处理，不影响设备加载
    let tags = tags
        .filter(|raw| !raw.is_empty())
        .and_then(|raw| match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
            Ok(tags) => Some(tags),
            Err(err) => {
                tracing::warn!(
                    target: "twin.storage",
                    device_id = %device_id,
                    error = %err,
                    "device_tags_decode_failed"
                );
                None
            }
        })
        .unwrap_or_default();
    let status: String = row.try_get("device_status")?;
    let state: String = row.try_get("state")?;
    Ok(DeviceInstanceRecord {
        name: row.try_get("name")?,
        edge_id: row.try_get("edge_id")?,
        protocol_type: row.try_get("protocol_type")?,
        protocol: row.try_get("protocol")?,
        os: row.try_get("os")?,
        category: row.try_get("category")?,
        identification_code: row.try_get("id_code")?,
        tags,
        device_model_id: row.try_get("device_model_id")?,
        life_time_of_desired_value: row.try_get("life_time_of_desired_value")?,
        status: status
            .parse::<DeviceStatus>()
            .map_err(|err| StorageError::Decode(err.to_string()))?,
        state: state
            .parse::<DeviceState>()
            .map_err(|err| StorageError::Decode(err.to_string()))?,
        update_ts_ms: row.try_get("update_ts")?,
        device_id,
    })
}

fn access_from_row(row: &PgRow) -> Result<(i64, InstanceAccess), StorageError> {
    Ok((
        row.try_get("service_id")?,
        InstanceAccess {
            name: row.try_get("name")?,
            access_config: row.try_get("access_config")?,
        },
    ))
}

#[async_trait::async_trait]
impl DeviceStore for PgDeviceStore {
    async fn find_device(
        &self,
        device_id: &str,
    ) -> Result<Option<DeviceInstanceRecord>, StorageError> {
        let sql = format!("select {DEVICE_COLUMNS} from device_instances where device_id = $1");
        let row = sqlx::query(&sql)
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(device_from_row).transpose()
    }

    async fn list_devices_in_edge(
        &self,
        edge_id: &str,
        protocol_type: &str,
    ) -> Result<Vec<DeviceInstanceRecord>, StorageError> {
        let sql = format!(
            "select {DEVICE_COLUMNS} from device_instances \
             where edge_id = $1 and protocol_type = $2 order by device_id"
        );
        let rows = sqlx::query(&sql)
            .bind(edge_id)
            .bind(protocol_type)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(device_from_row).collect()
    }

    async fn update_device_status(
        &self,
        device_id: &str,
        update: &DeviceStatusUpdate,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "update device_instances set device_status = $1, state = $2, update_ts = $3 \
             where device_id = $4",
        )
        .bind(update.status.as_str())
        .bind(update.state.as_str())
        .bind(update.update_ts_ms)
        .bind(device_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_all_status_in_edge(
        &self,
        edge_id: &str,
        status: DeviceStatus,
        update_ts_ms: i64,
    ) -> Result<u64, StorageError> {
        let result = sqlx::query(
            "update device_instances set device_status = $1, update_ts = $2 where edge_id = $3",
        )
        .bind(status.as_str())
        .bind(update_ts_ms)
        .bind(edge_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_device(&self, device_id: &str) -> Result<bool, StorageError> {
        let mut tx = self.pool.begin().await?;
        for table in ["property_instances", "event_instances", "command_instances"] {
            let sql = format!(
                "delete from {table} where service_id in \
                 (select id from service_instances where device_id = $1)"
            );
            sqlx::query(&sql).bind(device_id).execute(&mut *tx).await?;
        }
        sqlx::query("delete from service_instances where device_id = $1")
            .bind(device_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("delete from device_instances where device_id = $1")
            .bind(device_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_service_instances(
        &self,
        device_id: &str,
    ) -> Result<Vec<ServiceInstanceRecord>, StorageError> {
        let rows = sqlx::query(
            "select id, name from service_instances where device_id = $1 order by name",
        )
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;
        let mut order = Vec::with_capacity(rows.len());
        let mut services: HashMap<i64, ServiceInstanceRecord> = HashMap::new();
        for row in rows {
            let id: i64 = row.try_get("id")?;
            order.push(id);
            services.insert(
                id,
                ServiceInstanceRecord {
                    name: row.try_get("name")?,
                    ..Default::default()
                },
            );
        }

        for (table, kind) in [
            ("property_instances", 0),
            ("event_instances", 1),
            ("command_instances", 2),
        ] {
            let sql = format!(
                "select i.service_id, i.name, i.access_config from {table} i \
                 join service_instances s on s.id = i.service_id \
                 where s.device_id = $1 order by i.name"
            );
            let rows = sqlx::query(&sql)
                .bind(device_id)
                .fetch_all(&self.pool)
                .await?;
            for row in rows {
                let (service_id, access) = access_from_row(&row)?;
                let Some(service) = services.get_mut(&service_id) else {
                    continue;
                };
                match kind {
                    0 => service.properties.push(access),
                    1 => service.events.push(access),
                    _ => service.commands.push(access),
                }
            }
        }

        Ok(order
            .into_iter()
            .filter_map(|id| services.remove(&id))
            .collect())
    }

    async fn find_device_model(
        &self,
        model_id: &str,
    ) -> Result<Option<DeviceModelRecord>, StorageError> {
        let row = sqlx::query("select model_id, name from device_models where model_id = $1")
            .bind(model_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut model = DeviceModelRecord {
            model_id: row.try_get("model_id")?,
            name: row.try_get("name")?,
            services: Vec::new(),
        };

        let rows =
            sqlx::query("select id, name from service_models where model_id = $1 order by name")
                .bind(model_id)
                .fetch_all(&self.pool)
                .await?;
        let mut index: HashMap<i64, usize> = HashMap::new();
        for row in rows {
            index.insert(row.try_get("id")?, model.services.len());
            model.services.push(ServiceModelRecord {
                name: row.try_get("name")?,
                ..Default::default()
            });
        }

        let rows = sqlx::query(
            "select p.service_model_id, p.name, p.writable, p.max_value, p.min_value, p.unit, \
             p.data_type from property_models p \
             join service_models s on s.id = p.service_model_id \
             where s.model_id = $1 order by p.name",
        )
        .bind(model_id)
        .fetch_all(&self.pool)
        .await?;
        for row in rows {
            let service_id: i64 = row.try_get("service_model_id")?;
            if let Some(service) = index.get(&service_id).map(|i| &mut model.services[*i]) {
                service.properties.push(PropertyModelRecord {
                    name: row.try_get("name")?,
                    writable: row.try_get("writable")?,
                    max_value: row.try_get("max_value")?,
                    min_value: row.try_get("min_value")?,
                    unit: row.try_get("unit")?,
                    data_type: row.try_get("data_type")?,
                });
            }
        }

        let rows = sqlx::query(
            "select e.service_model_id, e.name, e.event_type from event_models e \
             join service_models s on s.id = e.service_model_id \
             where s.model_id = $1 order by e.name",
        )
        .bind(model_id)
        .fetch_all(&self.pool)
        .await?;
        for row in rows {
            let service_id: i64 = row.try_get("service_model_id")?;
            if let Some(service) = index.get(&service_id).map(|i| &mut model.services[*i]) {
                service.events.push(EventModelRecord {
                    name: row.try_get("name")?,
                    event_type: row.try_get("event_type")?,
                });
            }
        }

        let rows = sqlx::query(
            "select c.service_model_id, c.name, c.request_param from command_models c \
             join service_models s on s.id = c.service_model_id \
             where s.model_id = $1 order by c.name",
        )
        .bind(model_id)
        .fetch_all(&self.pool)
        .await?;
        for row in rows {
            let service_id: i64 = row.try_get("service_model_id")?;
            if let Some(service) = index.get(&service_id).map(|i| &mut model.services[*i]) {
                service.commands.push(CommandModelRecord {
                    name: row.try_get("name")?,
                    request_param: row.try_get("request_param")?,
                });
            }
        }

        Ok(Some(model))
    }

    async fn upsert_protocol_type(&self, record: ProtocolTypeRecord) -> Result<(), StorageError> {
        sqlx::query(
            "insert into protocol_types (protocol_type, spec) values ($1, $2) \
             on conflict (protocol_type) do update set spec = excluded.spec",
        )
        .bind(&record.protocol_type)
        .bind(&record.spec)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_protocol_types_in_edge(
        &self,
        edge_id: &str,
    ) -> Result<Vec<String>, StorageError> {
        let rows = sqlx::query(
            "select distinct protocol_type from device_instances where edge_id = $1 \
             order by protocol_type",
        )
        .bind(edge_id)
        .fetch_all(&self.pool)
        .await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(row.try_get("protocol_type")?);
        }
        Ok(items)
    }

    async fn invalidate_alerts(&self, device_id: &str) -> Result<(), StorageError> {
        sqlx::query("update alert_logs set status = $1 where device_id = $2")
            .bind(ALERT_STATUS_INVALID)
            .bind(device_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
