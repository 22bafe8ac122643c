use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::device_info::DeviceInfo;
use super::Dispatcher;
use crate::config::{AppConfig, DeviceConfig, ItemConfig};
use crate::error::GatewayError;
use crate::formatter::UplinkConverter;
use crate::metrics::{IndexCorrelator, RateEngine};
use crate::sink::TelemetrySink;
use crate::snmp::{SessionFactory, SnmpSession};

/// Элемент опроса с собственным периодом
#[derive(Debug, Clone)]
pub struct PollItem {
    pub config: ItemConfig,
    /// Период опроса, мс
    pub cadence_ms: u64,
    /// Время последней попытки опроса; `None` до первой попытки
    pub last_poll: Option<u64>,
}

impl PollItem {
    fn new(config: ItemConfig, default_cadence_ms: u64) -> Self {
        let cadence_ms = config.poll_period.unwrap_or(default_cadence_ms);
        Self {
            config,
            cadence_ms,
            last_poll: None,
        }
    }

    /// Запоминает попытку опроса. Время последней попытки не убывает.
    pub fn mark_polled(&mut self, now_ms: u64) {
        self.last_poll = Some(self.last_poll.map_or(now_ms, |last| last.max(now_ms)));
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        match self.last_poll {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.cadence_ms,
        }
    }
}

#[derive(Debug)]
struct DeviceState {
    config: DeviceConfig,
    attributes: Vec<PollItem>,
    telemetry: Vec<PollItem>,
    /// Платформа уже получала событие подключения
    announced: bool,
    online: bool,
}

#[derive(Debug, Clone, Copy)]
enum Group {
    Attributes,
    Telemetry,
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Connect,
    Poll { group: Group, next: usize },
}

enum Polled {
    Item(usize),
    GroupDone,
    SessionLost,
}

/// Незавершенный цикл: текущее устройство, стадия и собранные данные
#[derive(Debug)]
struct Cycle {
    now_ms: u64,
    /// Только подключение, без опроса элементов
    connect_only: bool,
    device: usize,
    stage: Stage,
    attributes: Map<String, Value>,
    telemetry: Map<String, Value>,
}

impl Cycle {
    fn new(now_ms: u64, connect_only: bool) -> Self {
        Self {
            now_ms,
            connect_only,
            device: 0,
            stage: Stage::Connect,
            attributes: Map::new(),
            telemetry: Map::new(),
        }
    }

    fn next_device(&mut self) {
        self.device += 1;
        self.stage = Stage::Connect;
        self.attributes.clear();
        self.telemetry.clear();
    }
}

/// Планировщик опроса устройств. Владеет устройствами, сессиями,
/// картой имен интерфейсов и историей счетчиков.
pub struct Scheduler {
    devices: Vec<DeviceState>,
    /// Сессии по адресу устройства
    sessions: HashMap<String, Box<dyn SnmpSession>>,
    correlator: IndexCorrelator,
    rates: RateEngine,
    factory: Arc<dyn SessionFactory>,
    sink: Arc<dyn TelemetrySink>,
    cycle: Option<Cycle>,
}

impl Scheduler {
    pub fn new(config: &AppConfig, factory: Arc<dyn SessionFactory>, sink: Arc<dyn TelemetrySink>) -> Self {
        let devices = config
            .devices
            .iter()
            .map(|device| {
                let default_cadence = device.poll_period.unwrap_or(config.settings.poll_period);
                DeviceState {
                    config: device.clone(),
                    attributes: device
                        .attributes
                        .iter()
                        .map(|item| PollItem::new(item.clone(), default_cadence))
                        .collect(),
                    telemetry: device
                        .telemetry
                        .iter()
                        .map(|item| PollItem::new(item.clone(), default_cadence))
                        .collect(),
                    announced: false,
                    online: false,
                }
            })
            .collect();

        Self {
            devices,
            sessions: HashMap::new(),
            correlator: IndexCorrelator::new(),
            rates: RateEngine::new(),
            factory,
            sink,
            cycle: None,
        }
    }

    pub fn sink(&self) -> Arc<dyn TelemetrySink> {
        Arc::clone(&self.sink)
    }

    pub fn device(&self, name: &str) -> Option<&DeviceConfig> {
        self.devices.iter().map(|d| &d.config).find(|d| d.device_name == name)
    }

    pub fn device_names(&self) -> impl Iterator<Item = &str> {
        self.devices.iter().map(|d| d.config.device_name.as_str())
    }

    /// Элементы опроса устройства: атрибуты, затем телеметрия
    pub fn poll_items(&self, name: &str) -> Option<impl Iterator<Item = &PollItem>> {
        self.devices
            .iter()
            .find(|d| d.config.device_name == name)
            .map(|d| d.attributes.iter().chain(d.telemetry.iter()))
    }

    pub fn is_online(&self, name: &str) -> bool {
        self.devices
            .iter()
            .any(|d| d.config.device_name == name && d.online)
    }

    pub fn correlator(&self) -> &IndexCorrelator {
        &self.correlator
    }

    /// Первичное подключение ко всем устройствам. Неудача не фатальна:
    /// устройство переподключится на следующем тике.
    pub async fn start(&mut self, now_ms: u64) {
        self.begin_start(now_ms);
        while self.step().await {}
    }

    /// Один проход по всем устройствам в порядке конфигурации
    pub async fn tick(&mut self, now_ms: u64) {
        self.begin_tick(now_ms);
        while self.step().await {}
    }

    /// Начинает цикл подключения без опроса элементов
    pub fn begin_start(&mut self, now_ms: u64) {
        tracing::info!(devices = self.devices.len(), now_ms, "Планировщик запущен");
        self.begin(now_ms, true);
    }

    /// Начинает цикл опроса. Шаги выполняет [`Scheduler::step`].
    pub fn begin_tick(&mut self, now_ms: u64) {
        self.begin(now_ms, false);
    }

    fn begin(&mut self, now_ms: u64, connect_only: bool) {
        if self.cycle.is_some() {
            tracing::warn!(now_ms, "Предыдущий цикл не завершен, новый не начат");
            return;
        }
        if !self.devices.is_empty() {
            self.cycle = Some(Cycle::new(now_ms, connect_only));
        }
    }

    /// Цикл начат и еще не завершен
    pub fn in_cycle(&self) -> bool {
        self.cycle.is_some()
    }

    /// Выполняет один шаг цикла: подключение устройства или опрос одного
    /// элемента. Между шагами можно обслуживать входящие запросы.
    /// Возвращает `true`, пока в цикле остается работа.
    pub async fn step(&mut self) -> bool {
        let Some(mut cycle) = self.cycle.take() else {
            return false;
        };

        match cycle.stage {
            Stage::Connect => match self.ensure_session(cycle.device).await {
                Ok(()) if cycle.connect_only => cycle.next_device(),
                Ok(()) => {
                    cycle.stage = Stage::Poll {
                        group: Group::Attributes,
                        next: 0,
                    }
                }
                Err(e) => {
                    tracing::error!(
                        device = %self.devices[cycle.device].config.device_name,
                        error = %e,
                        "Устройство пропущено в этом цикле"
                    );
                    cycle.next_device();
                }
            },
            Stage::Poll { group, next } => match self.poll_next(&mut cycle, group, next).await {
                Polled::Item(position) => {
                    cycle.stage = Stage::Poll {
                        group,
                        next: position + 1,
                    }
                }
                Polled::GroupDone => match group {
                    Group::Attributes => {
                        cycle.stage = Stage::Poll {
                            group: Group::Telemetry,
                            next: 0,
                        }
                    }
                    Group::Telemetry => {
                        self.flush(&mut cycle, true);
                        cycle.next_device();
                    }
                },
                Polled::SessionLost => {
                    self.flush(&mut cycle, false);
                    cycle.next_device();
                }
            },
        }

        let more = cycle.device < self.devices.len();
        if more {
            self.cycle = Some(cycle);
        }
        more
    }

    /// Закрывает все сессии
    pub async fn stop(&mut self) {
        self.cycle = None;
        for (address, mut session) in self.sessions.drain() {
            session.close().await;
            tracing::debug!(address = %address, "Сессия закрыта");
        }
        for device in &mut self.devices {
            device.online = false;
        }
        self.rates.clear();
        tracing::info!("Планировщик остановлен");
    }

    /// Выполняет элемент для устройства вне расписания (входящие запросы)
    pub async fn execute_for_device(
        &mut self,
        device_name: &str,
        item: &ItemConfig,
        now_ms: u64,
    ) -> Result<Map<String, Value>, GatewayError> {
        let position = self
            .devices
            .iter()
            .position(|d| d.config.device_name == device_name)
            .ok_or_else(|| GatewayError::NotFound(format!("устройство \"{}\"", device_name)))?;

        self.ensure_session(position).await?;

        let Self {
            devices,
            sessions,
            correlator,
            rates,
            ..
        } = self;
        let device = &devices[position].config;
        let session = sessions
            .get_mut(&device.address())
            .ok_or_else(|| connect_error(device, "сессия отсутствует"))?;

        Dispatcher::new(correlator, rates)
            .try_execute(&item.method, session.as_mut(), &device.device_name, item, now_ms)
            .await
    }

    /// Отправляет собранное за цикл устройства. `completed == false`:
    /// сессия умерла по ходу, оставшиеся элементы пропущены.
    fn flush(&mut self, cycle: &mut Cycle, completed: bool) {
        let Self {
            devices,
            correlator,
            rates,
            sink,
            ..
        } = self;
        let device = &mut devices[cycle.device];
        let name = device.config.device_name.clone();

        if !completed && device.online {
            device.online = false;
            tracing::warn!(device = %name, "Связь с устройством потеряна, оставшиеся элементы пропущены");
            sink.send_disconnect_event(&name);
        }

        let attributes = std::mem::take(&mut cycle.attributes);
        if !attributes.is_empty() {
            tracing::debug!(device = %name, data = ?attributes, "Отправка атрибутов");
            sink.send_attributes(&name, attributes);
        }

        let telemetry = std::mem::take(&mut cycle.telemetry);
        if !telemetry.is_empty() {
            let telemetry = UplinkConverter::new(&name, rates, correlator).convert(telemetry, cycle.now_ms);
            tracing::debug!(device = %name, data = ?telemetry, "Отправка телеметрии");
            sink.send_telemetry(&name, telemetry);
        }
    }

    /// Опрашивает следующий просроченный элемент группы, начиная с `from`
    async fn poll_next(&mut self, cycle: &mut Cycle, group: Group, from: usize) -> Polled {
        let Self {
            devices,
            sessions,
            correlator,
            rates,
            ..
        } = self;
        let device = &mut devices[cycle.device];
        let Some(session) = sessions
            .get_mut(&device.config.address())
            .filter(|session| session.is_connected())
        else {
            return Polled::SessionLost;
        };

        let (items, results) = match group {
            Group::Attributes => (&mut device.attributes, &mut cycle.attributes),
            Group::Telemetry => (&mut device.telemetry, &mut cycle.telemetry),
        };

        let Some(position) = items
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, item)| item.is_due(cycle.now_ms))
            .map(|(position, _)| position)
        else {
            return Polled::GroupDone;
        };

        let item = &mut items[position];
        // слот занят до получения результата, даже если опрос упадет
        item.mark_polled(cycle.now_ms);

        let result = Dispatcher::new(correlator, rates)
            .execute(
                &item.config.method,
                session.as_mut(),
                &device.config.device_name,
                &item.config,
                cycle.now_ms,
            )
            .await;
        results.extend(result);

        if session.is_connected() {
            Polled::Item(position)
        } else {
            Polled::SessionLost
        }
    }

    /// Проверяет живость сессии и пересоздает ее при необходимости
    async fn ensure_session(&mut self, position: usize) -> Result<(), GatewayError> {
        let address = self.devices[position].config.address();

        let alive = self.sessions.get(&address).map(|s| s.is_connected());
        if alive == Some(true) {
            return Ok(());
        }

        if alive == Some(false) {
            if let Some(mut dead) = self.sessions.remove(&address) {
                dead.close().await;
            }
        }

        let device = &mut self.devices[position];
        if device.online {
            device.online = false;
            tracing::warn!(device = %device.config.device_name, "Сессия потеряна, переподключение");
            self.sink.send_disconnect_event(&device.config.device_name);
        }

        let mut session = self.factory.connect(&device.config).await?;
        let metadata = DeviceInfo::connect_metadata(session.as_mut(), &device.config).await;

        if !device.announced {
            // сброс состояния на платформе
            self.sink.send_disconnect_event(&device.config.device_name);
            device.announced = true;
        }
        self.sink.send_connect_event(&device.config.device_name, metadata);
        device.online = true;

        tracing::info!(device = %device.config.device_name, address = %address, "Устройство подключено");
        self.sessions.insert(address, session);

        Ok(())
    }
}

fn connect_error(device: &DeviceConfig, reason: &str) -> GatewayError {
    GatewayError::Connect {
        address: device.address(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(cadence_ms: u64) -> PollItem {
        PollItem::new(
            ItemConfig {
                poll_period: Some(cadence_ms),
                ..Default::default()
            },
            60_000,
        )
    }

    #[test]
    fn due_until_first_attempt() {
        let mut item = item(10_000);
        assert!(item.is_due(0));

        item.mark_polled(0);
        assert!(!item.is_due(9_999));
        assert!(item.is_due(10_000));
    }

    #[test]
    fn last_poll_never_moves_back() {
        let mut item = item(10_000);
        item.mark_polled(50_000);
        item.mark_polled(20_000);

        assert_eq!(item.last_poll, Some(50_000));
        assert!(!item.is_due(20_000));
    }
}
