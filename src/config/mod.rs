use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

pub mod profile;
pub mod settings;

pub use profile::{DeviceConfig, ItemConfig, OidList, SnmpVersion};
pub use settings::Settings;

/// Главная конфигурация шлюза
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Базовые настройки
    pub settings: Settings,
    /// Инвентарь устройств в порядке конфигурации
    pub devices: Vec<DeviceConfig>,
}

#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    gateway: Settings,
    #[serde(default)]
    devices: Vec<serde_yml::Value>,
}

impl AppConfig {
    /// Загружает конфигурацию из YAML файла
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Не удалось прочитать файл: {}", path.display()))?;

        Self::from_yaml_str(&content)
    }

    /// Разбирает конфигурацию. Битые записи устройств пропускаются с ошибкой в лог.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let raw: RawConfig = serde_yml::from_str(content).context("Не удалось распарсить YAML")?;

        let mut devices: Vec<DeviceConfig> = Vec::new();
        for (position, value) in raw.devices.into_iter().enumerate() {
            let parsed = serde_yml::from_value::<DeviceConfig>(value)
                .map_err(|e| crate::error::GatewayError::Config(e.to_string()))
                .and_then(DeviceConfig::validate);

            match parsed {
                Ok(device) if devices.iter().any(|d| d.device_name == device.device_name) => {
                    tracing::error!(device = %device.device_name, "Дубликат устройства пропущен");
                }
                Ok(device) => devices.push(device),
                Err(e) => {
                    tracing::error!(position, error = %e, "Запись устройства пропущена");
                }
            }
        }

        if devices.is_empty() {
            tracing::warn!("Инвентарь устройств пуст");
        }

        Ok(Self {
            settings: raw.gateway,
            devices,
        })
    }

    /// Таймаут SNMP операции из переменной окружения или из настроек
    pub fn get_timeout(&self) -> Duration {
        let secs = env::var("SNMP_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(self.settings.timeout);
        Duration::from_secs(secs)
    }

    /// Адрес HTTP сервера из переменной окружения или из настроек
    pub fn get_listen(&self) -> String {
        env::var("SNMP_GATEWAY_LISTEN").unwrap_or_else(|_| self.settings.listen.clone())
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.settings.tick_period.max(1))
    }

    /// Сколько HTTP клиент ждет ответа на RPC без собственного `timeout`:
    /// не меньше таймаута любого настроенного RPC, включая время в очереди
    pub fn rpc_wait_limit(&self) -> Duration {
        let longest_item = self
            .devices
            .iter()
            .flat_map(|device| &device.server_side_rpc_requests)
            .filter_map(|rpc| rpc.timeout)
            .max()
            .unwrap_or(0);
        Duration::from_secs(self.settings.rpc_timeout.max(longest_item))
    }

    pub fn debug_config(&self) {
        tracing::info!(
            devices = self.devices.len(),
            poll_period_ms = self.settings.poll_period,
            tick_period_ms = self.settings.tick_period,
            timeout_s = self.get_timeout().as_secs(),
            "Конфигурация шлюза загружена"
        );
    }
}
