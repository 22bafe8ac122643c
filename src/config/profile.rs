use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Версия SNMP протокола устройства
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SnmpVersion {
    #[serde(rename = "v1")]
    V1,
    #[default]
    #[serde(rename = "v2c")]
    V2c,
    #[serde(rename = "v3")]
    V3,
}

/// Один OID или список OID (bulkwalk принимает список в поле `oid`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OidList {
    One(String),
    Many(Vec<String>),
}

impl OidList {
    pub fn first(&self) -> Option<&str> {
        match self {
            OidList::One(oid) => Some(oid.as_str()),
            OidList::Many(oids) => oids.first().map(String::as_str),
        }
    }

    pub fn to_vec(&self) -> Vec<String> {
        match self {
            OidList::One(oid) => vec![oid.clone()],
            OidList::Many(oids) => oids.clone(),
        }
    }
}

/// Элемент опроса, запрос обновления атрибута или RPC запрос
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemConfig {
    #[serde(default)]
    pub key: String,
    pub method: String,
    pub oid: Option<OidList>,
    #[serde(default)]
    pub oids: Vec<String>,
    /// Период опроса, мс
    pub poll_period: Option<u64>,
    pub bulk_size: Option<u32>,
    #[serde(default)]
    pub scalar_oid: Vec<String>,
    #[serde(default)]
    pub repeating_oid: Vec<String>,
    pub max_list_size: Option<u32>,
    /// OID -> значение для multiset
    #[serde(default)]
    pub mappings: BTreeMap<String, serde_json::Value>,
    /// Значение для set
    pub value: Option<serde_json::Value>,
    /// Ограничение на входящий запрос, секунды
    pub timeout: Option<u64>,
    pub request_filter: Option<String>,
    pub attribute_filter: Option<String>,
}

impl ItemConfig {
    /// Все OID элемента: поле `oid` (один или список) плюс `oids`
    pub fn oid_list(&self) -> Vec<String> {
        let mut list = self.oid.as_ref().map(OidList::to_vec).unwrap_or_default();
        list.extend(self.oids.iter().cloned());
        list
    }

    pub fn single_oid(&self) -> Option<&str> {
        self.oid.as_ref().and_then(OidList::first)
    }
}

/// Устройство из инвентаря
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    pub device_name: String,
    #[serde(default = "default_device_type")]
    pub device_type: String,
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub snmp_version: SnmpVersion,
    pub community: Option<String>,
    pub security_name: Option<String>,
    #[serde(alias = "authenticationProtocol")]
    pub auth_protocol: Option<String>,
    #[serde(alias = "authenticationPassphrase")]
    pub auth_passphrase: Option<String>,
    #[serde(alias = "privacyProtocol")]
    pub priv_protocol: Option<String>,
    #[serde(alias = "privacyPassphrase")]
    pub priv_passphrase: Option<String>,
    /// Период опроса по умолчанию для элементов устройства, мс
    pub poll_period: Option<u64>,
    #[serde(default)]
    pub attributes: Vec<ItemConfig>,
    #[serde(default)]
    pub telemetry: Vec<ItemConfig>,
    #[serde(default)]
    pub attribute_update_requests: Vec<ItemConfig>,
    #[serde(default)]
    pub server_side_rpc_requests: Vec<ItemConfig>,
}

fn default_device_type() -> String {
    "default".to_string()
}

fn default_port() -> u16 {
    161
}

impl DeviceConfig {
    /// Адрес устройства, он же ключ сессии
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    pub fn community_or_default(&self) -> String {
        self.community.clone().unwrap_or_else(|| "public".to_string())
    }

    /// Проверяет запись и выкидывает запросы с невалидными фильтрами
    pub fn validate(mut self) -> Result<Self, GatewayError> {
        if self.device_name.trim().is_empty() {
            return Err(GatewayError::Config("пустой deviceName".to_string()));
        }
        if self.ip.trim().is_empty() {
            return Err(GatewayError::Config(format!(
                "устройство '{}' без ip",
                self.device_name
            )));
        }
        if self.snmp_version == SnmpVersion::V3 && self.security_name.is_none() {
            return Err(GatewayError::Config(format!(
                "устройство '{}': SNMPv3 требует securityName",
                self.device_name
            )));
        }

        let device_name = self.device_name.clone();
        self.attribute_update_requests
            .retain(|item| filter_is_valid(&device_name, item.attribute_filter.as_deref()));
        self.server_side_rpc_requests
            .retain(|item| filter_is_valid(&device_name, item.request_filter.as_deref()));

        Ok(self)
    }
}

fn filter_is_valid(device_name: &str, filter: Option<&str>) -> bool {
    match filter {
        None => {
            tracing::error!(device = %device_name, "Запрос без фильтра пропущен");
            false
        }
        Some(pattern) => match Regex::new(pattern) {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(device = %device_name, pattern = %pattern, error = %e, "Невалидный фильтр запроса пропущен");
                false
            }
        },
    }
}
