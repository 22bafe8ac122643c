use serde_json::{Map, Value};

use super::types::{DEFAULT_MAX_LIST_SIZE, SYS_UPTIME_KEY};
use crate::config::ItemConfig;
use crate::error::GatewayError;
use crate::snmp::oid::normalize;
use crate::snmp::value::format_uptime;
use crate::snmp::{SnmpSession, SnmpValue, VarBind};

/// Методы, работающие с отдельными OID: get, multiget, getnext, set, multiset, bulkget
pub struct ScalarCollector;

impl ScalarCollector {
    pub async fn get(
        session: &mut dyn SnmpSession,
        item: &ItemConfig,
    ) -> Result<Map<String, Value>, GatewayError> {
        let oid = require_oid(item)?;
        let value = session.get(oid).await?;

        let key = result_key(item, oid);
        let text = match (&value, key.as_str()) {
            (SnmpValue::Timeticks(ticks), SYS_UPTIME_KEY) => format_uptime(*ticks),
            _ => value.to_string(),
        };

        Ok(Map::from_iter([(key, Value::String(text))]))
    }

    pub async fn multiget(
        session: &mut dyn SnmpSession,
        item: &ItemConfig,
    ) -> Result<Map<String, Value>, GatewayError> {
        let oids = require_oids(item)?;
        let varbinds = session.multiget(&oids).await?;
        Ok(flatten(varbinds))
    }

    /// Ключ результата: OID, который вернул агент
    pub async fn getnext(
        session: &mut dyn SnmpSession,
        item: &ItemConfig,
    ) -> Result<Map<String, Value>, GatewayError> {
        let oid = require_oid(item)?;
        let varbind = session.getnext(oid).await?;
        Ok(flatten([varbind]))
    }

    pub async fn set(
        session: &mut dyn SnmpSession,
        item: &ItemConfig,
    ) -> Result<Map<String, Value>, GatewayError> {
        let oid = require_oid(item)?;
        let value = item
            .value
            .as_ref()
            .map(to_snmp_value)
            .ok_or_else(|| missing(item, "value"))?;

        let acknowledged = session.set(oid, value).await?;
        Ok(flatten(acknowledged))
    }

    pub async fn multiset(
        session: &mut dyn SnmpSession,
        item: &ItemConfig,
    ) -> Result<Map<String, Value>, GatewayError> {
        if item.mappings.is_empty() {
            return Err(missing(item, "mappings"));
        }

        let mappings: Vec<(String, SnmpValue)> = item
            .mappings
            .iter()
            .map(|(oid, value)| (normalize(oid), to_snmp_value(value)))
            .collect();

        let acknowledged = session.multiset(&mappings).await?;
        Ok(flatten(acknowledged))
    }

    /// Возвращает только скалярную часть ответа GETBULK
    pub async fn bulkget(
        session: &mut dyn SnmpSession,
        item: &ItemConfig,
    ) -> Result<Map<String, Value>, GatewayError> {
        if item.scalar_oid.is_empty() && item.repeating_oid.is_empty() {
            return Err(missing(item, "scalarOid/repeatingOid"));
        }

        let response = session
            .bulkget(
                &item.scalar_oid,
                &item.repeating_oid,
                item.max_list_size.unwrap_or(DEFAULT_MAX_LIST_SIZE),
            )
            .await?;

        Ok(flatten(response.scalars))
    }
}

/// OID -> строковое значение
pub fn flatten(varbinds: impl IntoIterator<Item = VarBind>) -> Map<String, Value> {
    varbinds
        .into_iter()
        .map(|vb| (vb.oid, Value::String(vb.value.to_string())))
        .collect()
}

/// Ключ результата элемента; без ключа используется OID
pub fn result_key(item: &ItemConfig, oid: &str) -> String {
    if item.key.is_empty() {
        normalize(oid)
    } else {
        item.key.clone()
    }
}

pub fn require_oid(item: &ItemConfig) -> Result<&str, GatewayError> {
    item.single_oid().ok_or_else(|| missing(item, "oid"))
}

pub fn require_oids(item: &ItemConfig) -> Result<Vec<String>, GatewayError> {
    let oids = item.oid_list();
    if oids.is_empty() {
        return Err(missing(item, "oids"));
    }
    Ok(oids)
}

fn missing(item: &ItemConfig, parameter: &str) -> GatewayError {
    GatewayError::Config(format!(
        "у элемента '{}' ({}) нет параметра {}",
        item.key, item.method, parameter
    ))
}

/// Текст из RPC и атрибутов: целые числа отправляются как INTEGER
fn to_snmp_value(value: &Value) -> SnmpValue {
    match value {
        Value::String(text) => SnmpValue::infer(text),
        other => SnmpValue::from_json(other),
    }
}
