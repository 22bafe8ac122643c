use std::collections::BTreeMap;

use serde::Serialize;

use super::value::{RawInput, RawValue};
use crate::error::ParseError;
use crate::snmp::oid::{is_in_subtree, trailing_index};

/// hrProcessorLoad
pub const PROCESSOR_LOAD_ROOT: &str = "1.3.6.1.2.1.25.3.3.1.2";

/// Тип синтетической записи со средней загрузкой
pub const SYSTEM_AVERAGE: &str = "system_average";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessorRecord {
    pub index: u32,
    pub load: f64,
    pub load_percent: f64,
    pub status: &'static str,
    pub level: &'static str,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
}

pub fn load_status(load: f64) -> &'static str {
    if load < 50.0 {
        "normal"
    } else if load < 75.0 {
        "moderate"
    } else if load < 90.0 {
        "high"
    } else {
        "critical"
    }
}

pub fn load_level(load: f64) -> &'static str {
    if load < 25.0 {
        "low"
    } else if load < 50.0 {
        "medium"
    } else if load < 75.0 {
        "high"
    } else {
        "very_high"
    }
}

/// Загрузка как целое, 0 если значение не число
fn coerce_load(raw: &RawValue) -> i64 {
    match raw {
        RawValue::Integer(i) => *i,
        RawValue::Unsigned(u) => i64::try_from(*u).unwrap_or(i64::MAX),
        RawValue::Float(f) => *f as i64,
        RawValue::Text(text) => text.trim().parse().unwrap_or(0),
        RawValue::Bytes(bytes) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|t| t.trim().parse().ok())
            .unwrap_or(0),
        RawValue::Structured(value) => value.as_i64().unwrap_or(0),
        RawValue::Duration(_) => 0,
    }
}

/// Записи процессоров по индексу. При нескольких процессорах первой идет
/// синтетическая запись с индексом 0 и средней загрузкой.
pub fn build_processors(input: impl Into<RawInput>) -> Result<Vec<ProcessorRecord>, ParseError> {
    let data = input.into().into_map()?;

    let loads: BTreeMap<u32, i64> = data
        .iter()
        .filter(|(oid, _)| is_in_subtree(PROCESSOR_LOAD_ROOT, oid))
        .filter_map(|(oid, raw)| {
            let index = trailing_index(oid)?.parse::<u32>().ok()?;
            Some((index, coerce_load(raw)))
        })
        .collect();

    let mut records: Vec<ProcessorRecord> = loads
        .iter()
        .map(|(&index, &load)| {
            let load = load as f64;
            ProcessorRecord {
                index,
                load,
                load_percent: load,
                status: load_status(load),
                level: load_level(load),
                kind: None,
            }
        })
        .collect();

    if records.len() > 1 {
        let average = records.iter().map(|r| r.load).sum::<f64>() / records.len() as f64;
        let rounded = (average * 100.0).round() / 100.0;

        records.insert(
            0,
            ProcessorRecord {
                index: 0,
                load: rounded,
                load_percent: rounded,
                status: load_status(average),
                level: load_level(average),
                kind: Some(SYSTEM_AVERAGE),
            },
        );
    }

    Ok(records)
}
