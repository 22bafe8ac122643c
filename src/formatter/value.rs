use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::{Number, Value};

use super::decode::decode_mapping;
use crate::error::ParseError;
use crate::snmp::value::to_hex;
use crate::snmp::SnmpValue;

/// Сырое значение до приведения типов
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Bytes(Vec<u8>),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    Duration(Duration),
    /// Уже JSON-представимое значение (bool, null, вложенные структуры)
    Structured(Value),
}

/// Сырые данные построителя: OID -> значение
pub type RawMap = BTreeMap<String, RawValue>;

/// Вход построителя записей: готовый словарь или строка для декодирования
#[derive(Debug, Clone)]
pub enum RawInput {
    Parsed(RawMap),
    Encoded(String),
}

impl RawInput {
    pub fn into_map(self) -> Result<RawMap, ParseError> {
        match self {
            RawInput::Parsed(map) => Ok(map),
            RawInput::Encoded(text) => decode_mapping(&text),
        }
    }
}

impl From<RawMap> for RawInput {
    fn from(map: RawMap) -> Self {
        RawInput::Parsed(map)
    }
}

impl From<String> for RawInput {
    fn from(text: String) -> Self {
        RawInput::Encoded(text)
    }
}

impl From<&str> for RawInput {
    fn from(text: &str) -> Self {
        RawInput::Encoded(text.to_string())
    }
}

impl From<serde_json::Map<String, Value>> for RawInput {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        RawInput::Parsed(map.into_iter().map(|(k, v)| (k, RawValue::from(v))).collect())
    }
}

impl From<SnmpValue> for RawValue {
    fn from(value: SnmpValue) -> Self {
        match value {
            SnmpValue::OctetString(bytes) | SnmpValue::Opaque(bytes) => RawValue::Bytes(bytes),
            SnmpValue::Integer(i) => RawValue::Integer(i),
            SnmpValue::Counter32(v) | SnmpValue::Unsigned32(v) => RawValue::Unsigned(u64::from(v)),
            SnmpValue::Counter64(v) => RawValue::Unsigned(v),
            SnmpValue::Timeticks(ticks) => RawValue::Duration(Duration::from_millis(u64::from(ticks) * 10)),
            SnmpValue::Boolean(b) => RawValue::Structured(Value::Bool(b)),
            SnmpValue::Null => RawValue::Structured(Value::Null),
            other => RawValue::Text(other.to_string()),
        }
    }
}

impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => RawValue::Text(s),
            Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
                (Some(i), _, _) => RawValue::Integer(i),
                (None, Some(u), _) => RawValue::Unsigned(u),
                (None, None, Some(f)) => RawValue::Float(f),
                _ => RawValue::Structured(Value::Number(n)),
            },
            other => RawValue::Structured(other),
        }
    }
}

impl From<&str> for RawValue {
    fn from(text: &str) -> Self {
        RawValue::Text(text.to_string())
    }
}

/// Приведение сырого значения к JSON:
/// байтовые кавычки `b'..'` снимаются, строки из цифр становятся числами,
/// байты декодируются как UTF-8 (иначе hex), длительности превращаются в строку.
pub fn coerce(raw: &RawValue) -> Value {
    match raw {
        RawValue::Text(text) => coerce_text(text),
        RawValue::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => Value::String(text.to_string()),
            Err(_) => Value::String(to_hex(bytes)),
        },
        RawValue::Integer(i) => Value::from(*i),
        RawValue::Unsigned(u) => Value::from(*u),
        RawValue::Float(f) => Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(f.to_string())),
        RawValue::Duration(d) => Value::String(format_duration(*d)),
        RawValue::Structured(v) => v.clone(),
    }
}

/// Строка из цифр становится числом, только если помещается в u64:
/// длиннее остается строкой, чтобы не терять разряды во f64.
fn coerce_text(text: &str) -> Value {
    if let Some(inner) = unquote_bytes(text) {
        return Value::String(inner.to_string());
    }
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(number) = text.parse::<u64>() {
            return Value::from(number);
        }
    }
    Value::String(text.to_string())
}

/// `b'...'` или `b"..."` -> содержимое
pub fn unquote_bytes(text: &str) -> Option<&str> {
    let rest = text.strip_prefix('b')?;
    rest.strip_prefix('\'')
        .and_then(|r| r.strip_suffix('\''))
        .or_else(|| rest.strip_prefix('"').and_then(|r| r.strip_suffix('"')))
}

/// Длительность в виде "1 day, 2:03:04" (микросекунды, если есть)
pub fn format_duration(d: Duration) -> String {
    let total = d.as_secs();
    let days = total / 86_400;
    let clock = format!("{}:{:02}:{:02}", (total % 86_400) / 3_600, (total % 3_600) / 60, total % 60);
    let clock = match d.subsec_micros() {
        0 => clock,
        micros => format!("{}.{:06}", clock, micros),
    };

    match days {
        0 => clock,
        1 => format!("1 day, {}", clock),
        n => format!("{} days, {}", n, clock),
    }
}

/// Целое из приведенного значения
pub fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        _ => None,
    }
}
