use serde::{Deserialize, Serialize};

/// Базовые настройки шлюза (секция `gateway`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Период опроса по умолчанию, мс
    pub poll_period: u64,
    /// Интервал глобального тика планировщика, мс
    pub tick_period: u64,
    /// Таймаут одной SNMP операции, секунды
    pub timeout: u64,
    /// Ограничение входящего запроса по умолчанию, секунды
    pub rpc_timeout: u64,
    /// Адрес HTTP сервера для входящих запросов
    pub listen: String,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_period: 60_000,
            tick_period: 1_000,
            timeout: 10,
            rpc_timeout: 5,
            listen: "127.0.0.1:8088".to_string(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Deserialize)]
struct GatewaySection {
    #[serde(default)]
    gateway: Settings,
}

impl Settings {
    /// Только секция `gateway`, без разбора инвентаря. Нужна до инициализации логов.
    pub fn peek(content: &str) -> Self {
        serde_yml::from_str::<GatewaySection>(content)
            .map(|section| section.gateway)
            .unwrap_or_default()
    }
}
