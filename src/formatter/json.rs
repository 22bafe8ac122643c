use serde::Serialize;
use serde_json::{Map, Value};

use crate::snmp::session::TableRow;
use crate::snmp::value::SnmpValue;

/// Тип сообщения для вышестоящей платформы
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeKind {
    Attributes,
    Telemetry,
    Connect,
    Disconnect,
    RpcReply,
}

/// JSON структура для отдачи платформе
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    pub device: String,
    pub ts: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Value>,
    pub data: Value,
}

impl Envelope {
    pub fn new(kind: EnvelopeKind, device: &str, data: Value) -> Self {
        Self {
            kind,
            device: device.to_string(),
            ts: chrono::Utc::now().to_rfc3339(),
            request_id: None,
            data,
        }
    }

    pub fn with_request_id(mut self, request_id: Value) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Сериализует в компактный JSON
    pub fn to_json_compact(&self) -> anyhow::Result<String> {
        serde_json::to_string(self).map_err(|e| anyhow::anyhow!("Ошибка сериализации в JSON: {}", e))
    }
}

/// Строки таблицы в JSON: `index` плюс значения по именам колонок
pub fn format_table(rows: &[TableRow]) -> Value {
    let rows = rows
        .iter()
        .map(|row| {
            let mut object = Map::new();
            object.insert("index".to_string(), Value::String(row.index.clone()));
            for (column_oid, value) in &row.columns {
                object.insert(column_name(column_oid), stringify(value));
            }
            Value::Object(object)
        })
        .collect();

    Value::Array(rows)
}

fn stringify(value: &SnmpValue) -> Value {
    Value::String(value.to_string())
}

/// Получает имя колонки по OID
pub fn column_name(column_oid: &str) -> String {
    let column_oid = column_oid.trim_start_matches('.');
    let name = match column_oid {
        // Interface Table columns
        "1.3.6.1.2.1.2.2.1.1" => "ifIndex",
        "1.3.6.1.2.1.2.2.1.2" => "ifDescr",
        "1.3.6.1.2.1.2.2.1.3" => "ifType",
        "1.3.6.1.2.1.2.2.1.4" => "ifMtu",
        "1.3.6.1.2.1.2.2.1.5" => "ifSpeed",
        "1.3.6.1.2.1.2.2.1.6" => "ifPhysAddress",
        "1.3.6.1.2.1.2.2.1.7" => "ifAdminStatus",
        "1.3.6.1.2.1.2.2.1.8" => "ifOperStatus",
        "1.3.6.1.2.1.2.2.1.9" => "ifLastChange",
        "1.3.6.1.2.1.2.2.1.10" => "ifInOctets",
        "1.3.6.1.2.1.2.2.1.13" => "ifInDiscards",
        "1.3.6.1.2.1.2.2.1.14" => "ifInErrors",
        "1.3.6.1.2.1.2.2.1.16" => "ifOutOctets",
        "1.3.6.1.2.1.2.2.1.19" => "ifOutDiscards",
        "1.3.6.1.2.1.2.2.1.20" => "ifOutErrors",
        "1.3.6.1.2.1.2.2.1.21" => "ifOutQLen",

        // Host Resources Storage Table
        "1.3.6.1.2.1.25.2.3.1.1" => "hrStorageIndex",
        "1.3.6.1.2.1.25.2.3.1.2" => "hrStorageType",
        "1.3.6.1.2.1.25.2.3.1.3" => "hrStorageDescr",
        "1.3.6.1.2.1.25.2.3.1.4" => "hrStorageAllocationUnits",
        "1.3.6.1.2.1.25.2.3.1.5" => "hrStorageSize",
        "1.3.6.1.2.1.25.2.3.1.6" => "hrStorageUsed",

        // Host Resources Device Table
        "1.3.6.1.2.1.25.3.2.1.1" => "hrDeviceIndex",
        "1.3.6.1.2.1.25.3.2.1.2" => "hrDeviceType",
        "1.3.6.1.2.1.25.3.2.1.3" => "hrDeviceDescr",

        _ => return format!("column_{}", column_oid.replace('.', "_")),
    };

    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn known_and_unknown_columns() {
        assert_eq!(column_name(".1.3.6.1.2.1.2.2.1.2"), "ifDescr");
        assert_eq!(column_name("1.3.6.1.2.1.25.2.3.1.6"), "hrStorageUsed");
        assert_eq!(column_name("1.3.6.1.4.1.9.2"), "column_1_3_6_1_4_1_9_2");
    }

    #[test]
    fn table_rows_are_named_objects() {
        let rows = vec![TableRow {
            index: "1".to_string(),
            columns: BTreeMap::from([
                ("1.3.6.1.2.1.2.2.1.2".to_string(), SnmpValue::OctetString(b"eth0".to_vec())),
                ("1.3.6.1.2.1.2.2.1.8".to_string(), SnmpValue::Integer(1)),
            ]),
        }];

        assert_eq!(
            format_table(&rows),
            json!([{"index": "1", "ifDescr": "eth0", "ifOperStatus": "1"}])
        );
    }

    #[test]
    fn envelope_shape() {
        let envelope = Envelope::new(EnvelopeKind::RpcReply, "r1", json!({"result": "ok"}))
            .with_request_id(json!(7));
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["type"], json!("rpc_reply"));
        assert_eq!(value["device"], json!("r1"));
        assert_eq!(value["request_id"], json!(7));
        assert!(chrono::DateTime::parse_from_rfc3339(value["ts"].as_str().unwrap()).is_ok());
    }
}
