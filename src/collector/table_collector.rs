use serde_json::{Map, Value};

use super::scalar_collector::{flatten, require_oid, require_oids, result_key};
use super::types::{DEFAULT_BULK_SIZE, INTERFACE_METRICS_KEY, INTERFACE_NAME_KEY};
use crate::config::ItemConfig;
use crate::error::GatewayError;
use crate::formatter::json::format_table;
use crate::formatter::{build_interfaces, RawMap, RawValue};
use crate::metrics::{IndexCorrelator, RateEngine, IF_DESCR_ROOT};
use crate::snmp::oid::normalize;
use crate::snmp::SnmpSession;

/// Методы обхода поддеревьев и таблиц
pub struct TableCollector;

impl TableCollector {
    /// Обход поддерева. Элемент `interfaceName` по ifDescr обновляет карту имен
    /// интерфейсов и возвращает ее саму.
    pub async fn walk(
        session: &mut dyn SnmpSession,
        item: &ItemConfig,
        device: &str,
        correlator: &mut IndexCorrelator,
        now_ms: u64,
    ) -> Result<Map<String, Value>, GatewayError> {
        let oid = require_oid(item)?;
        let varbinds = session.walk(oid).await?;

        if item.key == INTERFACE_NAME_KEY && normalize(oid) == IF_DESCR_ROOT {
            let names = correlator.refresh(
                device,
                varbinds.into_iter().map(|vb| (vb.oid, vb.value.to_string())),
                now_ms,
            );
            let names: Map<String, Value> = names
                .iter()
                .map(|(index, name)| (index.clone(), Value::String(name.clone())))
                .collect();

            return Ok(Map::from_iter([(item.key.clone(), Value::Object(names))]));
        }

        Ok(flatten(varbinds))
    }

    pub async fn multiwalk(
        session: &mut dyn SnmpSession,
        item: &ItemConfig,
    ) -> Result<Map<String, Value>, GatewayError> {
        let roots = require_oids(item)?;
        let varbinds = session.multiwalk(&roots).await?;
        Ok(flatten(varbinds))
    }

    /// Обход через GETBULK. Для `interfaceMetrics` собирает записи интерфейсов
    /// со скоростями и именами из карты индексов.
    pub async fn bulkwalk(
        session: &mut dyn SnmpSession,
        item: &ItemConfig,
        device: &str,
        correlator: &IndexCorrelator,
        rates: &mut RateEngine,
        now_ms: u64,
    ) -> Result<Map<String, Value>, GatewayError> {
        let roots = require_oids(item)?;
        let bulk_size = item.bulk_size.unwrap_or(DEFAULT_BULK_SIZE);

        if item.key != INTERFACE_METRICS_KEY {
            let varbinds = session.bulkwalk(&roots, bulk_size).await?;
            return Ok(flatten(varbinds));
        }

        let mut raw = RawMap::new();
        for root in &roots {
            let varbinds = session.bulkwalk(std::slice::from_ref(root), bulk_size).await?;
            if varbinds.is_empty() {
                tracing::warn!(device = %device, root = %root, "bulkwalk не вернул данных, корень пропущен");
                continue;
            }
            raw.extend(varbinds.into_iter().map(|vb| (vb.oid, RawValue::from(vb.value))));
        }

        if correlator.names(device).map_or(true, |names| names.is_empty()) {
            tracing::warn!(device = %device, "Карта имен интерфейсов пуста, будут синтетические имена");
        }

        let mut records = build_interfaces(raw, device, rates, now_ms)?;
        for record in &mut records {
            record.interface = Some(correlator.lookup(device, &record.if_index.to_string()));
        }

        let records = records
            .iter()
            .filter_map(|record| serde_json::to_value(record).ok())
            .collect();

        Ok(Map::from_iter([(item.key.clone(), Value::Array(records))]))
    }

    pub async fn table(
        session: &mut dyn SnmpSession,
        item: &ItemConfig,
    ) -> Result<Map<String, Value>, GatewayError> {
        let oid = require_oid(item)?;
        let rows = session.table(oid).await?;
        Ok(Map::from_iter([(result_key(item, oid), format_table(&rows))]))
    }

    pub async fn bulktable(
        session: &mut dyn SnmpSession,
        item: &ItemConfig,
    ) -> Result<Map<String, Value>, GatewayError> {
        let oid = require_oid(item)?;
        let bulk_size = item.bulk_size.unwrap_or(DEFAULT_BULK_SIZE);
        let rows = session.bulktable(oid, bulk_size).await?;
        Ok(Map::from_iter([(result_key(item, oid), format_table(&rows))]))
    }
}
