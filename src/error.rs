use std::time::Duration;

use thiserror::Error;

/// Ошибки шлюза. Каждая ошибка локализуется на своей границе
/// (элемент опроса, устройство, входящий запрос) и не останавливает цикл.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Некорректная запись инвентаря устройств
    #[error("Ошибка конфигурации: {0}")]
    Config(String),

    /// Не удалось установить SNMP сессию
    #[error("Не удалось подключиться к {address}: {reason}")]
    Connect { address: String, reason: String },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Входящий запрос не уложился в отведенное время
    #[error("Превышено время ожидания ({0:?})")]
    Timeout(Duration),

    /// Неизвестное устройство или RPC метод
    #[error("Не найдено: {0}")]
    NotFound(String),
}

/// Ошибки уровня SNMP сессии
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("SNMP таймаут после {0:?}")]
    Timeout(Duration),

    #[error("Ошибка транспорта: {0}")]
    Transport(String),

    /// Агент вернул ненулевой error-status
    #[error("Агент вернул ошибку {status} (индекс {index})")]
    Agent { status: u32, index: u32 },

    #[error("Невалидный OID: {0}")]
    InvalidOid(String),

    #[error("Невалидное значение для {oid}: {reason}")]
    InvalidValue { oid: String, reason: String },

    #[error("SNMP ответ пустой")]
    EmptyResponse,
}

impl ProtocolError {
    /// Ошибки, после которых сессию нужно пересоздать
    pub fn is_transport(&self) -> bool {
        matches!(self, ProtocolError::Timeout(_) | ProtocolError::Transport(_))
    }
}

/// Ошибки разбора сырых данных построителями записей
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Не удалось распарсить данные ни как JSON, ни как словарь: {0}")]
    Undecodable(String),

    #[error("Ожидался словарь OID -> значение, получено: {0}")]
    NotAMapping(String),
}

pub type Result<T, E = GatewayError> = std::result::Result<T, E>;
