use std::collections::HashMap;

/// Срок хранения снимка счетчиков
pub const RETENTION_MS: u64 = 24 * 60 * 60 * 1000;

/// Минимальный интервал между снимками, дающий осмысленную скорость
pub const MIN_INTERVAL_MS: u64 = 5_000;

/// Разрядность аппаратного счетчика
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterWidth {
    Bits32,
    Bits64,
}

impl CounterWidth {
    pub const fn max(self) -> u64 {
        match self {
            CounterWidth::Bits32 => u32::MAX as u64,
            CounterWidth::Bits64 => u64::MAX,
        }
    }
}

/// Приращение счетчика с учетом переполнения.
/// При `current < previous` счетчик прошел через ноль: `(MAX - previous) + current + 1`.
pub fn counter_delta(previous: u64, current: u64, width: CounterWidth) -> u128 {
    if current >= previous {
        u128::from(current - previous)
    } else {
        u128::from(width.max() - previous.min(width.max())) + u128::from(current) + 1
    }
}

/// Последний снимок счетчиков интерфейса
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub timestamp_ms: u64,
    pub in_counter: u64,
    pub out_counter: u64,
}

/// Скорость в битах в секунду
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Throughput {
    pub in_bps: u64,
    pub out_bps: u64,
}

/// История счетчиков по устройствам и индексам.
///
/// Единственный владелец состояния; создается один раз и передается по ссылке
/// туда, где собираются метрики интерфейсов.
#[derive(Debug, Default)]
pub struct RateEngine {
    history: HashMap<String, HashMap<u32, CounterSnapshot>>,
}

impl RateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Скорость для 64-битных октетных счетчиков
    pub fn observe(
        &mut self,
        device: &str,
        index: u32,
        now_ms: u64,
        in_counter: u64,
        out_counter: u64,
    ) -> Throughput {
        self.observe_with_width(device, index, now_ms, in_counter, out_counter, CounterWidth::Bits64)
    }

    pub fn observe_with_width(
        &mut self,
        device: &str,
        index: u32,
        now_ms: u64,
        in_counter: u64,
        out_counter: u64,
        width: CounterWidth,
    ) -> Throughput {
        let device_history = self.history.entry(device.to_string()).or_default();

        let previous = device_history
            .get(&index)
            .copied()
            .filter(|snapshot| !is_expired(snapshot, now_ms));

        let throughput = match previous {
            Some(prev) if now_ms.saturating_sub(prev.timestamp_ms) >= MIN_INTERVAL_MS => {
                let elapsed_ms = now_ms - prev.timestamp_ms;
                Throughput {
                    in_bps: rate(counter_delta(prev.in_counter, in_counter, width), elapsed_ms),
                    out_bps: rate(counter_delta(prev.out_counter, out_counter, width), elapsed_ms),
                }
            }
            _ => Throughput::default(),
        };

        device_history.insert(
            index,
            CounterSnapshot {
                timestamp_ms: now_ms,
                in_counter,
                out_counter,
            },
        );

        throughput
    }

    /// Удаляет снимки старше срока хранения. Возвращает число удаленных.
    pub fn sweep(&mut self, device: &str, now_ms: u64) -> usize {
        let Some(device_history) = self.history.get_mut(device) else {
            return 0;
        };

        let before = device_history.len();
        device_history.retain(|_, snapshot| !is_expired(snapshot, now_ms));
        let removed = before - device_history.len();

        if removed > 0 {
            tracing::debug!(device = %device, removed, "Устаревшие снимки счетчиков удалены");
        }
        removed
    }

    pub fn snapshot(&self, device: &str, index: u32) -> Option<&CounterSnapshot> {
        self.history.get(device)?.get(&index)
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

fn is_expired(snapshot: &CounterSnapshot, now_ms: u64) -> bool {
    now_ms.saturating_sub(snapshot.timestamp_ms) > RETENTION_MS
}

/// Биты в секунду в целых числах, с насыщением до u64
fn rate(delta: u128, elapsed_ms: u64) -> u64 {
    let bps = delta.saturating_mul(8_000) / u128::from(elapsed_ms.max(1));
    u64::try_from(bps).unwrap_or(u64::MAX)
}
