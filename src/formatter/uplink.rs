use serde_json::{Map, Value};

use super::interface::build_interfaces;
use super::processor::{build_processors, PROCESSOR_LOAD_ROOT};
use super::storage::build_storages;
use super::value::RawInput;
use crate::error::ParseError;
use crate::metrics::{IndexCorrelator, RateEngine};
use crate::snmp::oid::is_in_subtree;

pub const INTERFACE_METRICS_KEY: &str = "interfaceMetrics";
pub const STORAGE_METRICS_KEY: &str = "storageMetrics";
pub const PROCESSOR_LOAD_KEY: &str = "hrProcessorLoad";

const INTERFACE_ROOTS: &[&str] = &["1.3.6.1.2.1.2.2.1", "1.3.6.1.2.1.31.1.1.1"];
const STORAGE_ROOTS: &[&str] = &["1.3.6.1.2.1.25.2.3.1"];
const PROCESSOR_ROOTS: &[&str] = &[PROCESSOR_LOAD_ROOT];

/// Множители для числовых ключей телеметрии
const SCALE_MAP: &[(&str, f64)] = &[("cpuTemperature", 0.1)];

/// Превращает сырую телеметрию цикла в массивы записей
/// `interfaces`, `storages`, `processors`.
pub struct UplinkConverter<'a> {
    device: &'a str,
    rates: &'a mut RateEngine,
    correlator: &'a IndexCorrelator,
}

impl<'a> UplinkConverter<'a> {
    pub fn new(device: &'a str, rates: &'a mut RateEngine, correlator: &'a IndexCorrelator) -> Self {
        Self {
            device,
            rates,
            correlator,
        }
    }

    pub fn convert(&mut self, mut data: Map<String, Value>, now_ms: u64) -> Map<String, Value> {
        let mut storages = Vec::new();
        let mut processors = Vec::new();
        let mut interfaces = Vec::new();

        if let Some(raw) = data.remove(STORAGE_METRICS_KEY) {
            storages.extend(self.group("storages", to_input(raw).and_then(|input| build_storages(input))));
        }
        if let Some(raw) = data.remove(PROCESSOR_LOAD_KEY) {
            processors.extend(self.group("processors", to_input(raw).and_then(|input| build_processors(input))));
        }

        if !data.contains_key(INTERFACE_METRICS_KEY) {
            if let Some(direct) = take_subtrees(&mut data, INTERFACE_ROOTS) {
                let built = build_interfaces(direct, self.device, &mut *self.rates, now_ms).map(|mut records| {
                    for record in &mut records {
                        record.interface = Some(self.correlator.lookup(self.device, &record.if_index.to_string()));
                    }
                    records
                });
                interfaces.extend(self.group("interfaces", built));
            }
        }
        if storages.is_empty() {
            if let Some(direct) = take_subtrees(&mut data, STORAGE_ROOTS) {
                storages.extend(self.group("storages", build_storages(direct)));
            }
        }
        if processors.is_empty() {
            if let Some(direct) = take_subtrees(&mut data, PROCESSOR_ROOTS) {
                processors.extend(self.group("processors", build_processors(direct)));
            }
        }

        for (key, scale) in SCALE_MAP {
            if let Some(value) = data.get_mut(*key) {
                if let Some(scaled) = numeric(value).map(|n| n * scale) {
                    *value = Value::from(scaled);
                }
            }
        }

        for (key, records) in [
            ("interfaces", interfaces),
            ("storages", storages),
            ("processors", processors),
        ] {
            if !records.is_empty() {
                data.insert(key.to_string(), Value::Array(records));
            }
        }

        data
    }

    /// Ошибка разбора сбрасывает только свою группу
    fn group<T: serde::Serialize>(&self, name: &str, built: Result<Vec<T>, ParseError>) -> Vec<Value> {
        match built {
            Ok(records) => {
                tracing::debug!(device = %self.device, group = name, count = records.len(), "Записи собраны");
                records
                    .iter()
                    .filter_map(|record| serde_json::to_value(record).ok())
                    .collect()
            }
            Err(e) => {
                tracing::error!(device = %self.device, group = name, error = %e, "Группа телеметрии пропущена");
                Vec::new()
            }
        }
    }
}

fn to_input(raw: Value) -> Result<RawInput, ParseError> {
    match raw {
        Value::Object(map) => Ok(RawInput::from(map)),
        Value::String(text) => Ok(RawInput::from(text)),
        other => Err(ParseError::NotAMapping(other.to_string())),
    }
}

/// Вынимает из телеметрии все записи, чей ключ лежит в одном из поддеревьев
fn take_subtrees(data: &mut Map<String, Value>, roots: &[&str]) -> Option<Map<String, Value>> {
    let keys: Vec<String> = data
        .keys()
        .filter(|key| roots.iter().any(|root| is_in_subtree(root, key)))
        .cloned()
        .collect();

    if keys.is_empty() {
        return None;
    }

    let mut taken = Map::new();
    for key in keys {
        if let Some(value) = data.remove(&key) {
            taken.insert(key, value);
        }
    }
    Some(taken)
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn convert(data: Value, rates: &mut RateEngine, correlator: &IndexCorrelator) -> Map<String, Value> {
        let Value::Object(map) = data else {
            panic!("ожидался объект");
        };
        UplinkConverter::new("r1", rates, correlator).convert(map, 0)
    }

    #[test]
    fn direct_oids_become_record_arrays() {
        let mut rates = RateEngine::new();
        let mut correlator = IndexCorrelator::new();
        correlator.refresh("r1", [("1.3.6.1.2.1.2.2.1.2.1", "eth0".to_string())], 0);

        let out = convert(
            json!({
                "1.3.6.1.2.1.2.2.1.4.1": "1500",
                "1.3.6.1.2.1.25.2.3.1.4.1": "4096",
                "1.3.6.1.2.1.25.2.3.1.5.1": "1000",
                "1.3.6.1.2.1.25.2.3.1.6.1": "400",
                "1.3.6.1.2.1.25.3.3.1.2.196608": "12",
                "sysName": "core-1"
            }),
            &mut rates,
            &correlator,
        );

        assert_eq!(out["sysName"], json!("core-1"));
        assert_eq!(out["interfaces"][0]["ifMtu"], json!(1500));
        assert_eq!(out["interfaces"][0]["interface"], json!("eth0"));
        assert_eq!(out["storages"][0]["usage_percent"], json!(40.0));
        assert_eq!(out["processors"][0]["load"], json!(12.0));
        assert!(!out.contains_key("1.3.6.1.2.1.2.2.1.4.1"));
    }

    #[test]
    fn interface_metrics_key_suppresses_direct_interfaces() {
        let mut rates = RateEngine::new();
        let correlator = IndexCorrelator::new();

        let out = convert(
            json!({
                "interfaceMetrics": [{"ifIndex": 1}],
                "1.3.6.1.2.1.2.2.1.4.1": "1500"
            }),
            &mut rates,
            &correlator,
        );

        assert!(!out.contains_key("interfaces"));
        assert_eq!(out["interfaceMetrics"], json!([{"ifIndex": 1}]));
    }

    #[test]
    fn named_groups_and_parse_failures() {
        let mut rates = RateEngine::new();
        let correlator = IndexCorrelator::new();

        let out = convert(
            json!({
                "storageMetrics": "definitely not a mapping",
                "hrProcessorLoad": {"1.3.6.1.2.1.25.3.3.1.2.1": "80"},
                "cpuTemperature": "452"
            }),
            &mut rates,
            &correlator,
        );

        assert!(!out.contains_key("storages"));
        assert!(!out.contains_key("storageMetrics"));
        assert_eq!(out["processors"][0]["status"], json!("high"));
        let temperature = out["cpuTemperature"].as_f64().unwrap();
        assert!((temperature - 45.2).abs() < 1e-9);
    }
}
