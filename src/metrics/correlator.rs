use std::collections::{BTreeMap, HashMap};

use crate::snmp::oid::trailing_index;

/// OID ifDescr: поддерево имен интерфейсов
pub const IF_DESCR_ROOT: &str = "1.3.6.1.2.1.2.2.1.2";

/// Индекс интерфейса -> имя
pub type IndexNameMap = BTreeMap<String, String>;

#[derive(Debug, Default)]
struct DeviceNames {
    names: IndexNameMap,
    updated_at_ms: u64,
}

/// Хранит последнее соответствие индекс -> имя интерфейса по устройствам
#[derive(Debug, Default)]
pub struct IndexCorrelator {
    devices: HashMap<String, DeviceNames>,
}

impl IndexCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Полностью заменяет карту устройства результатами обхода ifDescr
    pub fn refresh<I, S>(&mut self, device: &str, walk_results: I, now_ms: u64) -> &IndexNameMap
    where
        I: IntoIterator<Item = (S, String)>,
        S: AsRef<str>,
    {
        let names: IndexNameMap = walk_results
            .into_iter()
            .filter_map(|(oid, value)| {
                let index = trailing_index(oid.as_ref())?;
                Some((index.to_string(), clean_name(&value)))
            })
            .collect();

        tracing::debug!(device = %device, interfaces = names.len(), "Карта имен интерфейсов обновлена");

        let entry = self.devices.entry(device.to_string()).or_default();
        entry.names = names;
        entry.updated_at_ms = now_ms;
        &entry.names
    }

    /// Имя интерфейса или синтетическое `if-<index>`
    pub fn lookup(&self, device: &str, index: &str) -> String {
        self.devices
            .get(device)
            .and_then(|d| d.names.get(index))
            .cloned()
            .unwrap_or_else(|| format!("if-{}", index))
    }

    pub fn names(&self, device: &str) -> Option<&IndexNameMap> {
        self.devices.get(device).map(|d| &d.names)
    }

    pub fn last_updated(&self, device: &str) -> Option<u64> {
        self.devices.get(device).map(|d| d.updated_at_ms)
    }
}

/// Снимает артефакты байтовой строки вида `b'eth0'`
pub fn clean_name(value: &str) -> String {
    let trimmed = value.trim();
    for quote in ['\'', '"'] {
        if let Some(inner) = trimmed
            .strip_prefix('b')
            .and_then(|rest| rest.strip_prefix(quote))
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner.to_string();
        }
    }
    trimmed.to_string()
}
