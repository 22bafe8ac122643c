use serde::Serialize;
use serde_json::Value;

use super::value::{coerce, RawInput};
use super::{group_by_index, FieldTable};
use crate::error::ParseError;
use crate::snmp::oid::normalize;

/// hrStorageTable: корень колонки -> поле
pub const STORAGE_FIELDS: FieldTable = &[
    ("1.3.6.1.2.1.25.2.3.1.1", "index"),
    ("1.3.6.1.2.1.25.2.3.1.2", "type_oid"),
    ("1.3.6.1.2.1.25.2.3.1.3", "name"),
    ("1.3.6.1.2.1.25.2.3.1.4", "unit_size"),
    ("1.3.6.1.2.1.25.2.3.1.5", "size_units"),
    ("1.3.6.1.2.1.25.2.3.1.6", "used_units"),
];

/// hrStorageType -> метка
const STORAGE_TYPES: &[(&str, &str)] = &[
    ("1.3.6.1.2.1.25.2.1.1", "other"),
    ("1.3.6.1.2.1.25.2.1.2", "ram"),
    ("1.3.6.1.2.1.25.2.1.3", "virtual_memory"),
    ("1.3.6.1.2.1.25.2.1.4", "fixed_disk"),
    ("1.3.6.1.2.1.25.2.1.5", "removable_disk"),
    ("1.3.6.1.2.1.25.2.1.6", "floppy_disk"),
    ("1.3.6.1.2.1.25.2.1.7", "compact_disk"),
    ("1.3.6.1.2.1.25.2.1.8", "ram_disk"),
    ("1.3.6.1.2.1.25.2.1.9", "flash_memory"),
    ("1.3.6.1.2.1.25.2.1.10", "network_disk"),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageRecord {
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_oid: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_size: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_units: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_units: Option<Value>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<String>,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub total_human: String,
    pub used_human: String,
    pub free_human: String,
    pub usage_percent: f64,
}

/// Метка типа хранилища по hrStorageType
pub fn storage_type_label(type_oid: &str) -> &'static str {
    let type_oid = normalize(type_oid);
    STORAGE_TYPES
        .iter()
        .find(|(oid, _)| *oid == type_oid)
        .map(|(_, label)| *label)
        .unwrap_or("unknown")
}

/// Размер в двоичных единицах: "3.91 MB"
pub fn bytes_to_human(bytes: f64) -> String {
    let mut size = bytes;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if size < 1024.0 {
            return format!("{:.2} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.2} PB", size)
}

fn saturate(bytes: u128) -> u64 {
    u64::try_from(bytes).unwrap_or(u64::MAX)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn build_storages(input: impl Into<RawInput>) -> Result<Vec<StorageRecord>, ParseError> {
    let data = input.into().into_map()?;

    let records = group_by_index(STORAGE_FIELDS, &data)
        .into_iter()
        .map(|(index, raw_fields)| {
            let field = |name: &str| raw_fields.get(name).map(|raw| coerce(raw));

            let type_oid = field("type_oid");
            let storage_type = type_oid.as_ref().map(|t| {
                let text = match t {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                storage_type_label(&text).to_string()
            });

            let mut record = StorageRecord {
                index,
                type_oid,
                name: field("name"),
                unit_size: field("unit_size"),
                size_units: field("size_units"),
                used_units: field("used_units"),
                storage_type,
                total_bytes: 0,
                used_bytes: 0,
                free_bytes: 0,
                total_human: "0 B".to_string(),
                used_human: "0 B".to_string(),
                free_human: "0 B".to_string(),
                usage_percent: 0.0,
            };

            let integral = |value: &Option<Value>, default: u128| match value {
                None => Some(default),
                Some(Value::Number(n)) => n
                    .as_u64()
                    .map(u128::from)
                    .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u128)),
                Some(_) => None,
            };

            if let (Some(unit_size), Some(size_units), Some(used_units)) = (
                integral(&record.unit_size, 1),
                integral(&record.size_units, 0),
                integral(&record.used_units, 0),
            ) {
                let total = saturate(unit_size.saturating_mul(size_units));
                let used = saturate(unit_size.saturating_mul(used_units));
                // занято больше, чем есть: свободного нет
                let free = total.saturating_sub(used);

                record.total_bytes = total;
                record.used_bytes = used;
                record.free_bytes = free;
                record.total_human = bytes_to_human(total as f64);
                record.used_human = bytes_to_human(used as f64);
                record.free_human = bytes_to_human(free as f64);
                record.usage_percent = if total > 0 {
                    round2(used as f64 / total as f64 * 100.0)
                } else {
                    0.0
                };
            }

            record
        })
        .collect();

    Ok(records)
}
