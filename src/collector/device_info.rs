use serde_json::{Map, Value};

use crate::config::DeviceConfig;
use crate::snmp::device_profiles::SYS_OBJECT_ID;
use crate::snmp::{DeviceDetector, SnmpSession, SnmpValue};

/// Модуль для работы с информацией об устройстве
pub struct DeviceInfo;

impl DeviceInfo {
    /// Получает sysObjectID устройства
    pub async fn get_sys_object_id(session: &mut dyn SnmpSession) -> Option<String> {
        match session.get(SYS_OBJECT_ID).await {
            Ok(SnmpValue::ObjectIdentifier(oid)) => Some(oid),
            Ok(SnmpValue::OctetString(bytes)) => String::from_utf8(bytes).ok(),
            Ok(other) => {
                tracing::debug!(value = %other, "sysObjectID неожиданного типа");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ошибка получения sysObjectID");
                None
            }
        }
    }

    /// Метаданные события подключения: тип устройства и производитель, если удалось определить
    pub async fn connect_metadata(session: &mut dyn SnmpSession, device: &DeviceConfig) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("deviceType".to_string(), Value::String(device.device_type.clone()));

        if let Some(sys_object_id) = Self::get_sys_object_id(session).await {
            let vendor = DeviceDetector::detect(&sys_object_id);
            tracing::info!(device = %device.device_name, vendor = %vendor.vendor, "Производитель определен");

            metadata.insert("vendor".to_string(), Value::String(vendor.vendor));
            metadata.insert("vendorDescription".to_string(), Value::String(vendor.description));
        }

        metadata
    }
}
