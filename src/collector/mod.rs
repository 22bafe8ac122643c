use serde_json::{Map, Value};

pub mod device_info;
pub mod scalar_collector;
pub mod scheduler;
pub mod table_collector;
pub mod types;

pub use device_info::DeviceInfo;
pub use scheduler::Scheduler;
pub use types::Method;

use scalar_collector::ScalarCollector;
use table_collector::TableCollector;

use crate::config::ItemConfig;
use crate::error::GatewayError;
use crate::metrics::{IndexCorrelator, RateEngine};
use crate::snmp::SnmpSession;

/// Диспетчер методов опроса. Сам общего состояния не меняет: карту имен
/// и историю счетчиков обновляют коррелятор и движок скоростей.
pub struct Dispatcher<'a> {
    correlator: &'a mut IndexCorrelator,
    rates: &'a mut RateEngine,
}

impl<'a> Dispatcher<'a> {
    pub fn new(correlator: &'a mut IndexCorrelator, rates: &'a mut RateEngine) -> Self {
        Self { correlator, rates }
    }

    /// Выполняет метод элемента. Любая ошибка логируется и дает пустой результат.
    pub async fn execute(
        &mut self,
        method: &str,
        session: &mut dyn SnmpSession,
        device: &str,
        item: &ItemConfig,
        now_ms: u64,
    ) -> Map<String, Value> {
        match self.try_execute(method, session, device, item, now_ms).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(
                    device = %device,
                    key = %item.key,
                    method = %method,
                    error = %e,
                    "Элемент опроса не выполнен"
                );
                Map::new()
            }
        }
    }

    /// То же, но с ошибкой для вызывающего (входящие запросы)
    pub async fn try_execute(
        &mut self,
        method: &str,
        session: &mut dyn SnmpSession,
        device: &str,
        item: &ItemConfig,
        now_ms: u64,
    ) -> Result<Map<String, Value>, GatewayError> {
        let method: Method = method.parse().map_err(GatewayError::NotFound)?;

        tracing::debug!(device = %device, key = %item.key, method = %method, "Выполнение метода");

        match method {
            Method::Get => ScalarCollector::get(session, item).await,
            Method::Multiget => ScalarCollector::multiget(session, item).await,
            Method::Getnext => ScalarCollector::getnext(session, item).await,
            Method::Set => ScalarCollector::set(session, item).await,
            Method::Multiset => ScalarCollector::multiset(session, item).await,
            Method::Bulkget => ScalarCollector::bulkget(session, item).await,
            Method::Walk => {
                TableCollector::walk(session, item, device, &mut *self.correlator, now_ms).await
            }
            Method::Multiwalk => TableCollector::multiwalk(session, item).await,
            Method::Bulkwalk => {
                TableCollector::bulkwalk(
                    session,
                    item,
                    device,
                    &*self.correlator,
                    &mut *self.rates,
                    now_ms,
                )
                .await
            }
            Method::Table => TableCollector::table(session, item).await,
            Method::Bulktable => TableCollector::bulktable(session, item).await,
        }
    }
}
