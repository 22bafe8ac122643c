use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::value::{as_u64, coerce, RawInput};
use super::{group_by_index, FieldTable};
use crate::error::ParseError;
use crate::metrics::{CounterWidth, RateEngine, Throughput};

/// Корень поддерева -> поле записи интерфейса
pub const INTERFACE_FIELDS: FieldTable = &[
    ("1.3.6.1.2.1.2.2.1.2", "ifDescr"),
    ("1.3.6.1.2.1.2.2.1.3", "ifType"),
    ("1.3.6.1.2.1.2.2.1.4", "ifMtu"),
    ("1.3.6.1.2.1.2.2.1.8", "ifOperStatus"),
    ("1.3.6.1.2.1.2.2.1.9", "ifLastChange"),
    ("1.3.6.1.2.1.2.2.1.10", "ifInOctets"),
    ("1.3.6.1.2.1.2.2.1.13", "ifInDiscards"),
    ("1.3.6.1.2.1.2.2.1.14", "ifInErrors"),
    ("1.3.6.1.2.1.2.2.1.16", "ifOutOctets"),
    ("1.3.6.1.2.1.2.2.1.19", "ifOutDiscards"),
    ("1.3.6.1.2.1.2.2.1.20", "ifOutErrors"),
    ("1.3.6.1.2.1.31.1.1.1.6", "ifHCInOctets"),
    ("1.3.6.1.2.1.31.1.1.1.10", "ifHCOutOctets"),
    ("1.3.6.1.2.1.31.1.1.1.15", "ifHighSpeed"),
];

/// Запись сетевого интерфейса за один цикл опроса
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceRecord {
    #[serde(rename = "ifIndex")]
    pub if_index: u32,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
    #[serde(rename = "ifInThroughputBps")]
    pub in_throughput_bps: u64,
    #[serde(rename = "ifOutThroughputBps")]
    pub out_throughput_bps: u64,
    /// Имя из карты индексов
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
}

impl InterfaceRecord {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Собирает записи интерфейсов и прикладывает скорости из истории счетчиков
pub fn build_interfaces(
    input: impl Into<RawInput>,
    device: &str,
    rates: &mut RateEngine,
    now_ms: u64,
) -> Result<Vec<InterfaceRecord>, ParseError> {
    let data = input.into().into_map()?;

    rates.sweep(device, now_ms);

    let grouped = group_by_index(INTERFACE_FIELDS, &data);
    let records = grouped
        .into_iter()
        .map(|(if_index, raw_fields)| {
            let fields: BTreeMap<String, Value> = raw_fields
                .into_iter()
                .map(|(name, raw)| (name.to_string(), coerce(raw)))
                .collect();

            let throughput = observe_octets(&fields, device, if_index, rates, now_ms);

            InterfaceRecord {
                if_index,
                fields,
                in_throughput_bps: throughput.in_bps,
                out_throughput_bps: throughput.out_bps,
                interface: None,
            }
        })
        .collect();

    Ok(records)
}

/// Скорость по октетным счетчикам: 64-битные ifHC*, иначе 32-битные ifIn/OutOctets
fn observe_octets(
    fields: &BTreeMap<String, Value>,
    device: &str,
    if_index: u32,
    rates: &mut RateEngine,
    now_ms: u64,
) -> Throughput {
    let counter = |name: &str| fields.get(name).and_then(as_u64);

    let (width, in_octets, out_octets) = match (counter("ifHCInOctets"), counter("ifHCOutOctets")) {
        (None, None) => (CounterWidth::Bits32, counter("ifInOctets"), counter("ifOutOctets")),
        (hc_in, hc_out) => (CounterWidth::Bits64, hc_in, hc_out),
    };

    if in_octets.is_none() && out_octets.is_none() {
        return Throughput::default();
    }

    rates.observe_with_width(
        device,
        if_index,
        now_ms,
        in_octets.unwrap_or(0),
        out_octets.unwrap_or(0),
        width,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::value::{RawMap, RawValue};
    use serde_json::json;

    fn sample(in_octets: u64, out_octets: u64) -> RawMap {
        RawMap::from([
            ("1.3.6.1.2.1.2.2.1.2.2".to_string(), RawValue::Bytes(b"eth1".to_vec())),
            ("1.3.6.1.2.1.2.2.1.2.1".to_string(), RawValue::from("b'eth0'")),
            ("1.3.6.1.2.1.2.2.1.4.1".to_string(), RawValue::from("1500")),
            ("1.3.6.1.2.1.31.1.1.1.6.1".to_string(), RawValue::Unsigned(in_octets)),
            ("1.3.6.1.2.1.31.1.1.1.10.1".to_string(), RawValue::Unsigned(out_octets)),
            ("1.3.6.1.2.1.1.5.0".to_string(), RawValue::from("not an interface")),
        ])
    }

    #[test]
    fn assembles_records_sorted_by_index() {
        let mut rates = RateEngine::new();
        let records = build_interfaces(sample(0, 0), "r1", &mut rates, 0).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].if_index, 1);
        assert_eq!(records[0].field("ifDescr"), Some(&json!("eth0")));
        assert_eq!(records[0].field("ifMtu"), Some(&json!(1500)));
        assert_eq!(records[1].field("ifDescr"), Some(&json!("eth1")));
    }

    #[test]
    fn attaches_throughput_on_second_cycle() {
        let mut rates = RateEngine::new();
        build_interfaces(sample(1_000, 1_000), "r1", &mut rates, 0).unwrap();
        let records = build_interfaces(sample(11_000, 6_000), "r1", &mut rates, 10_000).unwrap();

        assert_eq!(records[0].in_throughput_bps, 8_000);
        assert_eq!(records[0].out_throughput_bps, 4_000);
        // у eth1 нет счетчиков, скорость нулевая
        assert_eq!(records[1].in_throughput_bps, 0);
    }

    #[test]
    fn legacy_counters_wrap_at_32_bits() {
        let legacy = |in_octets: u64| {
            RawMap::from([
                ("1.3.6.1.2.1.2.2.1.10.3".to_string(), RawValue::Unsigned(in_octets)),
                ("1.3.6.1.2.1.2.2.1.16.3".to_string(), RawValue::Unsigned(0)),
            ])
        };

        let mut rates = RateEngine::new();
        build_interfaces(legacy(u64::from(u32::MAX) - 999), "r1", &mut rates, 0).unwrap();
        let records = build_interfaces(legacy(1_000), "r1", &mut rates, 8_000).unwrap();

        // 2000 байт через ноль за 8 с
        assert_eq!(records[0].in_throughput_bps, 2_000);
        assert_eq!(records[0].field("ifInOctets"), Some(&json!(1_000)));
    }

    #[test]
    fn serializes_with_protocol_field_names() {
        let mut rates = RateEngine::new();
        let mut records = build_interfaces(sample(0, 0), "r1", &mut rates, 0).unwrap();
        records[0].interface = Some("eth0".to_string());

        let json = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(json["ifIndex"], json!(1));
        assert_eq!(json["ifInThroughputBps"], json!(0));
        assert_eq!(json["interface"], json!("eth0"));
        assert_eq!(json["ifHCInOctets"], json!(0));
    }

    #[test]
    fn undecodable_text_is_a_parse_error() {
        let mut rates = RateEngine::new();
        assert!(build_interfaces("not a mapping", "r1", &mut rates, 0).is_err());
    }
}
