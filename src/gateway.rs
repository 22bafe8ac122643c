use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};

use crate::collector::Scheduler;
use crate::error::GatewayError;
use crate::handlers::inbound::{handle_attribute_update, handle_rpc};
use crate::models::{AttributeUpdate, RpcReply, RpcRequest};

/// Емкость очереди входящих запросов
pub const INBOUND_CAPACITY: usize = 64;

/// Входящее событие для единого контекста исполнения
#[derive(Debug)]
pub enum InboundEvent {
    Rpc {
        request: RpcRequest,
        reply: oneshot::Sender<RpcReply>,
    },
    Attributes(AttributeUpdate),
}

/// Отправляющая сторона очереди входящих запросов. Клонируется в HTTP обработчики.
#[derive(Debug, Clone)]
pub struct InboundQueue {
    tx: mpsc::Sender<InboundEvent>,
    /// Сколько ждать ответа на RPC без собственного `timeout`
    limit: Duration,
}

impl InboundQueue {
    pub fn channel(capacity: usize, limit: Duration) -> (Self, mpsc::Receiver<InboundEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx, limit }, rx)
    }

    /// Ставит RPC в очередь и ждет ответа. Время ожидания отсчитывается
    /// от постановки в очередь, а не от начала исполнения.
    pub async fn rpc(&self, request: RpcRequest) -> Result<RpcReply, GatewayError> {
        let limit = request
            .data
            .timeout
            .map(Duration::from_millis)
            .unwrap_or(self.limit);
        let device = request.device.clone();

        let (reply, response) = oneshot::channel();
        let exchange = async {
            self.tx
                .send(InboundEvent::Rpc { request, reply })
                .await
                .map_err(|_| GatewayError::NotFound("шлюз остановлен".to_string()))?;

            response
                .await
                .map_err(|_| GatewayError::NotFound("ответ на RPC потерян".to_string()))
        };

        match timeout(limit, exchange).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(device = %device, limit = ?limit, "RPC не дождался ответа шлюза");
                Err(GatewayError::Timeout(limit))
            }
        }
    }

    pub async fn attributes(&self, update: AttributeUpdate) -> Result<(), GatewayError> {
        self.tx
            .send(InboundEvent::Attributes(update))
            .await
            .map_err(|_| GatewayError::NotFound("шлюз остановлен".to_string()))
    }
}

/// Монотонные часы расписания, мс от запуска шлюза.
/// Перевод системных часов на расписание не влияет.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }

    pub fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Единый контекст исполнения: шаги планировщика и входящие запросы
/// обрабатываются по очереди в одной задаче.
pub struct Gateway {
    scheduler: Scheduler,
    inbound: mpsc::Receiver<InboundEvent>,
    tick_period: Duration,
    rpc_timeout: Duration,
    clock: MonotonicClock,
}

impl Gateway {
    pub fn new(
        scheduler: Scheduler,
        inbound: mpsc::Receiver<InboundEvent>,
        tick_period: Duration,
        rpc_timeout: Duration,
    ) -> Self {
        Self {
            scheduler,
            inbound,
            tick_period,
            rpc_timeout,
            clock: MonotonicClock::new(),
        }
    }

    /// Между шагами цикла опроса (подключение устройства или один элемент)
    /// обслуживает накопившиеся входящие запросы.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        self.scheduler.begin_start(self.clock.now_ms());

        let mut ticker = interval(self.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            if self.scheduler.in_cycle() {
                while let Ok(event) = self.inbound.try_recv() {
                    self.dispatch(event).await;
                }

                tokio::select! {
                    biased;
                    _ = &mut shutdown => {
                        tracing::info!("Получен сигнал остановки");
                        break;
                    }
                    _ = self.scheduler.step() => {}
                }
                continue;
            }

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Получен сигнал остановки");
                    break;
                }
                _ = ticker.tick() => {
                    self.scheduler.begin_tick(self.clock.now_ms());
                }
                Some(event) = self.inbound.recv() => {
                    self.dispatch(event).await;
                }
            }
        }

        self.scheduler.stop().await;
    }

    async fn dispatch(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::Rpc { request, reply } => {
                tracing::debug!(device = %request.device, method = %request.data.method, "Получен RPC запрос");

                // отправитель уже получил таймаут: на устройство не ходим
                let response = if reply.is_closed() {
                    tracing::warn!(device = %request.device, method = %request.data.method, "RPC просрочен в очереди");
                    let waited = request
                        .data
                        .timeout
                        .map(Duration::from_millis)
                        .unwrap_or(self.rpc_timeout);
                    RpcReply::failure(GatewayError::Timeout(waited))
                } else {
                    handle_rpc(&mut self.scheduler, &request, self.rpc_timeout, self.clock.now_ms()).await
                };

                self.scheduler
                    .sink()
                    .send_rpc_reply(&request.device, &request.data.id, response.to_value());

                if reply.send(response).is_err() {
                    tracing::warn!(device = %request.device, "Отправитель RPC больше не ждет ответа");
                }
            }
            InboundEvent::Attributes(update) => {
                let now_ms = self.clock.now_ms();
                if let Err(e) = handle_attribute_update(&mut self.scheduler, &update, self.rpc_timeout, now_ms).await {
                    tracing::error!(device = %update.device, error = %e, "Обновление атрибутов отклонено");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn clock_counts_from_creation() {
        let clock = MonotonicClock::new();
        assert_eq!(clock.now_ms(), 0);

        tokio::time::advance(Duration::from_millis(1_500)).await;
        assert_eq!(clock.now_ms(), 1_500);
    }
}
