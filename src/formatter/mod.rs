use std::collections::BTreeMap;

pub mod decode;
pub mod interface;
pub mod json;
pub mod processor;
pub mod storage;
pub mod uplink;
pub mod value;

pub use interface::{build_interfaces, InterfaceRecord};
pub use json::{column_name, Envelope, EnvelopeKind};
pub use processor::{build_processors, ProcessorRecord};
pub use storage::{build_storages, StorageRecord};
pub use uplink::UplinkConverter;
pub use value::{coerce, RawInput, RawMap, RawValue};

use crate::snmp::oid::{is_in_subtree, trailing_index};

/// Таблица соответствия: корень поддерева -> имя поля записи
pub type FieldTable = &'static [(&'static str, &'static str)];

/// Раскладывает плоский словарь OID -> значение по индексам сущностей.
/// Индекс берется из последнего компонента OID, поле из таблицы по корню.
pub fn group_by_index<'a>(
    table: FieldTable,
    data: &'a RawMap,
) -> BTreeMap<u32, BTreeMap<&'static str, &'a RawValue>> {
    let mut grouped: BTreeMap<u32, BTreeMap<&'static str, &'a RawValue>> = BTreeMap::new();

    for (oid, raw) in data {
        let Some((_, field)) = table.iter().find(|(root, _)| is_in_subtree(root, oid)) else {
            continue;
        };
        let Some(index) = trailing_index(oid).and_then(|i| i.parse::<u32>().ok()) else {
            tracing::warn!(oid = %oid, "Не удалось извлечь индекс из OID");
            continue;
        };

        grouped.entry(index).or_default().insert(*field, raw);
    }

    grouped
}
