use std::fmt;
use std::str::FromStr;

/// Ключ элемента, запускающий обновление карты имен интерфейсов
pub const INTERFACE_NAME_KEY: &str = "interfaceName";

/// Ключ элемента, для которого bulkwalk собирает записи интерфейсов
pub use crate::formatter::uplink::INTERFACE_METRICS_KEY;

/// Ключ, значение которого форматируется как время работы
pub const SYS_UPTIME_KEY: &str = "sysUpTime";

pub const DEFAULT_BULK_SIZE: u32 = 10;
pub const DEFAULT_MAX_LIST_SIZE: u32 = 1;

/// Логический метод опроса из конфигурации элемента
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Multiget,
    Getnext,
    Walk,
    Multiwalk,
    Set,
    Multiset,
    Bulkget,
    Bulkwalk,
    Table,
    Bulktable,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Multiget => "multiget",
            Method::Getnext => "getnext",
            Method::Walk => "walk",
            Method::Multiwalk => "multiwalk",
            Method::Set => "set",
            Method::Multiset => "multiset",
            Method::Bulkget => "bulkget",
            Method::Bulkwalk => "bulkwalk",
            Method::Table => "table",
            Method::Bulktable => "bulktable",
        }
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "get" => Ok(Method::Get),
            "multiget" => Ok(Method::Multiget),
            "getnext" => Ok(Method::Getnext),
            "walk" => Ok(Method::Walk),
            "multiwalk" => Ok(Method::Multiwalk),
            "set" => Ok(Method::Set),
            "multiset" => Ok(Method::Multiset),
            "bulkget" => Ok(Method::Bulkget),
            "bulkwalk" => Ok(Method::Bulkwalk),
            "table" => Ok(Method::Table),
            "bulktable" => Ok(Method::Bulktable),
            other => Err(format!("Метод \"{}\" не поддерживается", other)),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
