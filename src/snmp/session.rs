use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;

use super::oid::{compare, is_in_subtree, normalize, suffix};
use super::value::SnmpValue;
use crate::config::DeviceConfig;
use crate::error::{GatewayError, ProtocolError};

/// Пара OID -> значение из ответа агента
#[derive(Debug, Clone, PartialEq)]
pub struct VarBind {
    pub oid: String,
    pub value: SnmpValue,
}

impl VarBind {
    pub fn new(oid: impl Into<String>, value: SnmpValue) -> Self {
        Self {
            oid: normalize(&oid.into()),
            value,
        }
    }
}

/// Ответ GETBULK, разделенный на скалярную и повторяющуюся части
#[derive(Debug, Clone, Default)]
pub struct BulkResponse {
    pub scalars: Vec<VarBind>,
    pub repeating: Vec<VarBind>,
}

/// Строка SNMP таблицы: индекс и значения колонок по OID колонки
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub index: String,
    pub columns: BTreeMap<String, SnmpValue>,
}

/// Живая SNMP сессия с устройством.
///
/// Реализация обязана предоставить четыре примитива PDU; обход поддеревьев,
/// таблицы и мульти-операции собраны из них.
#[async_trait]
pub trait SnmpSession: Send {
    /// GET нескольких OID одним PDU
    async fn get_many(&mut self, oids: &[String]) -> Result<Vec<VarBind>, ProtocolError>;

    /// GETNEXT для одного OID
    async fn get_next(&mut self, oid: &str) -> Result<VarBind, ProtocolError>;

    /// GETBULK: первые `non_repeaters` OID запрашиваются один раз
    async fn get_bulk(
        &mut self,
        oids: &[String],
        non_repeaters: u32,
        max_repetitions: u32,
    ) -> Result<Vec<VarBind>, ProtocolError>;

    /// SET нескольких OID одним PDU
    async fn set_many(
        &mut self,
        values: &[(String, SnmpValue)],
    ) -> Result<Vec<VarBind>, ProtocolError>;

    /// `false` после транспортной ошибки: сессию нужно пересоздать
    fn is_connected(&self) -> bool;

    async fn close(&mut self);

    async fn get(&mut self, oid: &str) -> Result<SnmpValue, ProtocolError> {
        let varbinds = self.get_many(&[oid.to_string()]).await?;
        varbinds
            .into_iter()
            .next()
            .map(|vb| vb.value)
            .ok_or(ProtocolError::EmptyResponse)
    }

    async fn multiget(&mut self, oids: &[String]) -> Result<Vec<VarBind>, ProtocolError> {
        self.get_many(oids).await
    }

    async fn getnext(&mut self, oid: &str) -> Result<VarBind, ProtocolError> {
        self.get_next(oid).await
    }

    /// Обход поддерева через GETNEXT
    async fn walk(&mut self, root: &str) -> Result<Vec<VarBind>, ProtocolError> {
        let mut results = Vec::new();
        let mut current = normalize(root);

        loop {
            let vb = self.get_next(&current).await?;

            if vb.value.is_end_of_walk()
                || !is_in_subtree(root, &vb.oid)
                || compare(&vb.oid, &current) != Ordering::Greater
            {
                break;
            }

            current = vb.oid.clone();
            results.push(vb);
        }

        Ok(results)
    }

    async fn multiwalk(&mut self, roots: &[String]) -> Result<Vec<VarBind>, ProtocolError> {
        let mut results = Vec::new();
        for root in roots {
            results.extend(self.walk(root).await?);
        }
        Ok(results)
    }

    async fn bulkget(
        &mut self,
        scalar_oids: &[String],
        repeating_oids: &[String],
        max_list_size: u32,
    ) -> Result<BulkResponse, ProtocolError> {
        let mut oids = scalar_oids.to_vec();
        oids.extend_from_slice(repeating_oids);

        let non_repeaters = scalar_oids.len() as u32;
        let mut varbinds = self.get_bulk(&oids, non_repeaters, max_list_size).await?;

        let split = scalar_oids.len().min(varbinds.len());
        let repeating = varbinds.split_off(split);

        Ok(BulkResponse {
            scalars: varbinds,
            repeating,
        })
    }

    /// Обход поддеревьев через GETBULK, по одному корню за раз
    async fn bulkwalk(
        &mut self,
        roots: &[String],
        bulk_size: u32,
    ) -> Result<Vec<VarBind>, ProtocolError> {
        let mut results = Vec::new();

        for root in roots {
            let mut current = normalize(root);

            'root: loop {
                let varbinds = self
                    .get_bulk(std::slice::from_ref(&current), 0, bulk_size.max(1))
                    .await?;

                if varbinds.is_empty() {
                    break;
                }

                for vb in varbinds {
                    if vb.value.is_end_of_walk()
                        || !is_in_subtree(root, &vb.oid)
                        || compare(&vb.oid, &current) != Ordering::Greater
                    {
                        break 'root;
                    }

                    current = vb.oid.clone();
                    results.push(vb);
                }
            }
        }

        Ok(results)
    }

    async fn set(&mut self, oid: &str, value: SnmpValue) -> Result<Vec<VarBind>, ProtocolError> {
        self.set_many(&[(normalize(oid), value)]).await
    }

    async fn multiset(
        &mut self,
        mappings: &[(String, SnmpValue)],
    ) -> Result<Vec<VarBind>, ProtocolError> {
        self.set_many(mappings).await
    }

    async fn table(&mut self, oid: &str) -> Result<Vec<TableRow>, ProtocolError> {
        let varbinds = self.walk(oid).await?;
        Ok(group_rows(oid, varbinds))
    }

    async fn bulktable(&mut self, oid: &str, bulk_size: u32) -> Result<Vec<TableRow>, ProtocolError> {
        let varbinds = self.bulkwalk(&[oid.to_string()], bulk_size).await?;
        Ok(group_rows(oid, varbinds))
    }
}

/// Группирует обход таблицы `<table>.1.<column>.<index>` в строки.
/// Порядок строк совпадает с порядком индексов в первой колонке.
pub fn group_rows(table_oid: &str, varbinds: Vec<VarBind>) -> Vec<TableRow> {
    let table_oid = normalize(table_oid);
    let mut rows: Vec<TableRow> = Vec::new();
    let mut positions: BTreeMap<String, usize> = BTreeMap::new();

    for vb in varbinds {
        // entry.column.index...
        let Some(rest) = suffix(&table_oid, &vb.oid) else {
            continue;
        };
        let mut parts = rest.splitn(3, '.');
        let (Some(entry), Some(column), Some(index)) = (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };

        let column_oid = format!("{}.{}.{}", table_oid, entry, column);
        match positions.get(index) {
            Some(&position) => {
                rows[position].columns.insert(column_oid, vb.value);
            }
            None => {
                positions.insert(index.to_string(), rows.len());
                rows.push(TableRow {
                    index: index.to_string(),
                    columns: BTreeMap::from([(column_oid, vb.value)]),
                });
            }
        }
    }

    rows
}

/// Фабрика сессий: одна живая сессия на устройство
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn connect(&self, device: &DeviceConfig) -> Result<Box<dyn SnmpSession>, GatewayError>;
}
