use std::fmt;

use serde::{Serialize, Serializer};
use snmp2::Value;

use super::oid::parse_oid;
use crate::error::ProtocolError;

/// Владеющее SNMP значение. Конвертируется из `snmp2::Value` сразу при
/// получении ответа, чтобы не держать заимствование буфера сессии.
#[derive(Debug, Clone, PartialEq)]
pub enum SnmpValue {
    Null,
    Boolean(bool),
    Integer(i64),
    OctetString(Vec<u8>),
    ObjectIdentifier(String),
    IpAddress([u8; 4]),
    Counter32(u32),
    Unsigned32(u32),
    /// Сотые доли секунды
    Timeticks(u32),
    Opaque(Vec<u8>),
    Counter64(u64),
    EndOfMibView,
    NoSuchObject,
    NoSuchInstance,
    Other(String),
}

impl SnmpValue {
    /// Значение из текстового параметра (RPC, атрибуты): целое число или строка
    pub fn infer(text: &str) -> Self {
        match text.trim().parse::<i64>() {
            Ok(number) => SnmpValue::Integer(number),
            Err(_) => SnmpValue::OctetString(text.as_bytes().to_vec()),
        }
    }

    /// Значение из JSON: числа остаются числами, строки становятся OCTET STRING
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => SnmpValue::Null,
            serde_json::Value::Bool(b) => SnmpValue::Boolean(*b),
            serde_json::Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => SnmpValue::Integer(i),
                (None, Some(u)) => SnmpValue::Counter64(u),
                _ => SnmpValue::OctetString(n.to_string().into_bytes()),
            },
            serde_json::Value::String(s) => SnmpValue::OctetString(s.as_bytes().to_vec()),
            other => SnmpValue::OctetString(other.to_string().into_bytes()),
        }
    }

    /// Числовое значение счетчика, если оно есть
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            SnmpValue::Integer(i) => u64::try_from(*i).ok(),
            SnmpValue::Counter32(v) | SnmpValue::Unsigned32(v) | SnmpValue::Timeticks(v) => {
                Some(u64::from(*v))
            }
            SnmpValue::Counter64(v) => Some(*v),
            SnmpValue::OctetString(bytes) => std::str::from_utf8(bytes).ok()?.trim().parse().ok(),
            _ => None,
        }
    }

    /// Признак конца обхода поддерева
    pub fn is_end_of_walk(&self) -> bool {
        matches!(
            self,
            SnmpValue::EndOfMibView | SnmpValue::NoSuchObject | SnmpValue::NoSuchInstance
        )
    }

    /// Конвертирует в `snmp2::Value` для SET запросов
    pub fn to_snmp2(&self) -> Result<Value<'_>, ProtocolError> {
        let value = match self {
            SnmpValue::Null => Value::Null,
            SnmpValue::Boolean(b) => Value::Boolean(*b),
            SnmpValue::Integer(i) => Value::Integer(*i),
            SnmpValue::OctetString(bytes) => Value::OctetString(bytes),
            SnmpValue::ObjectIdentifier(oid) => Value::ObjectIdentifier(parse_oid(oid)?),
            SnmpValue::IpAddress(ip) => Value::IpAddress(*ip),
            SnmpValue::Counter32(v) => Value::Counter32(*v),
            SnmpValue::Unsigned32(v) => Value::Unsigned32(*v),
            SnmpValue::Timeticks(v) => Value::Timeticks(*v),
            SnmpValue::Opaque(bytes) => Value::Opaque(bytes),
            SnmpValue::Counter64(v) => Value::Counter64(*v),
            other => {
                return Err(ProtocolError::InvalidValue {
                    oid: String::new(),
                    reason: format!("значение {:?} нельзя записать", other),
                })
            }
        };

        Ok(value)
    }
}

impl From<&Value<'_>> for SnmpValue {
    fn from(value: &Value<'_>) -> Self {
        match value {
            Value::Null => SnmpValue::Null,
            Value::Boolean(b) => SnmpValue::Boolean(*b),
            Value::Integer(i) => SnmpValue::Integer(*i),
            Value::OctetString(bytes) => SnmpValue::OctetString(bytes.to_vec()),
            Value::ObjectIdentifier(oid) => SnmpValue::ObjectIdentifier(oid.to_string()),
            Value::IpAddress(ip) => SnmpValue::IpAddress(*ip),
            Value::Counter32(v) => SnmpValue::Counter32(*v),
            Value::Unsigned32(v) => SnmpValue::Unsigned32(*v),
            Value::Timeticks(v) => SnmpValue::Timeticks(*v),
            Value::Opaque(bytes) => SnmpValue::Opaque(bytes.to_vec()),
            Value::Counter64(v) => SnmpValue::Counter64(*v),
            Value::EndOfMibView => SnmpValue::EndOfMibView,
            Value::NoSuchObject => SnmpValue::NoSuchObject,
            Value::NoSuchInstance => SnmpValue::NoSuchInstance,
            other => SnmpValue::Other(format!("{:?}", other)),
        }
    }
}

impl fmt::Display for SnmpValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnmpValue::Null => write!(f, "null"),
            SnmpValue::Boolean(b) => write!(f, "{}", b),
            SnmpValue::Integer(i) => write!(f, "{}", i),
            SnmpValue::OctetString(bytes) | SnmpValue::Opaque(bytes) => {
                match std::str::from_utf8(bytes) {
                    Ok(text) => write!(f, "{}", text),
                    Err(_) => write!(f, "{}", to_hex(bytes)),
                }
            }
            SnmpValue::ObjectIdentifier(oid) => write!(f, "{}", oid),
            SnmpValue::IpAddress([a, b, c, d]) => write!(f, "{}.{}.{}.{}", a, b, c, d),
            SnmpValue::Counter32(v) | SnmpValue::Unsigned32(v) => write!(f, "{}", v),
            SnmpValue::Timeticks(ticks) => write!(f, "{}", format_timeticks(*ticks)),
            SnmpValue::Counter64(v) => write!(f, "{}", v),
            SnmpValue::EndOfMibView => write!(f, "endOfMibView"),
            SnmpValue::NoSuchObject => write!(f, "noSuchObject"),
            SnmpValue::NoSuchInstance => write!(f, "noSuchInstance"),
            SnmpValue::Other(text) => write!(f, "{}", text),
        }
    }
}

impl Serialize for SnmpValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Hex без разделителей
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Timeticks в вид "1 day, 2:03:04.05"
pub fn format_timeticks(ticks: u32) -> String {
    let total_secs = u64::from(ticks) / 100;
    let hundredths = ticks % 100;
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;

    let clock = if hundredths > 0 {
        format!("{}:{:02}:{:02}.{:02}", hours, minutes, seconds, hundredths)
    } else {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    };

    match days {
        0 => clock,
        1 => format!("1 day, {}", clock),
        n => format!("{} days, {}", n, clock),
    }
}

/// Формат для sysUpTime: "D days, H hours, M minutes, S seconds"
pub fn format_uptime(ticks: u32) -> String {
    let total_secs = u64::from(ticks) / 100;
    let days = total_secs / (24 * 3600);
    let hours = (total_secs % (24 * 3600)) / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    format!("{} days, {} hours, {} minutes, {} seconds", days, hours, minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_is_formatted_with_all_units() {
        // 1 день 2 часа 3 минуты 4 секунды
        let ticks = ((86_400 + 2 * 3600 + 3 * 60 + 4) * 100) as u32;
        assert_eq!(format_uptime(ticks), "1 days, 2 hours, 3 minutes, 4 seconds");
        assert_eq!(format_uptime(0), "0 days, 0 hours, 0 minutes, 0 seconds");
    }

    #[test]
    fn timeticks_display_like_a_duration() {
        assert_eq!(format_timeticks(500), "0:00:05");
        assert_eq!(format_timeticks(8_640_050), "1 day, 0:00:00.50");
    }

    #[test]
    fn octet_strings_fall_back_to_hex() {
        assert_eq!(SnmpValue::OctetString(b"eth0".to_vec()).to_string(), "eth0");
        assert_eq!(SnmpValue::OctetString(vec![0xff, 0x00, 0x1a]).to_string(), "ff001a");
    }

    #[test]
    fn infers_integers_from_text() {
        assert_eq!(SnmpValue::infer("42"), SnmpValue::Integer(42));
        assert_eq!(SnmpValue::infer("up"), SnmpValue::OctetString(b"up".to_vec()));
    }
}
