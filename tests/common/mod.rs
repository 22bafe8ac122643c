#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound::{Excluded, Unbounded};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use snmp_gateway::config::{AppConfig, DeviceConfig};
use snmp_gateway::error::{GatewayError, ProtocolError};
use snmp_gateway::sink::TelemetrySink;
use snmp_gateway::snmp::oid::components;
use snmp_gateway::snmp::{SessionFactory, SnmpSession, SnmpValue, VarBind};

/// Состояние поддельного SNMP агента
#[derive(Debug, Default)]
pub struct AgentState {
    pub tree: BTreeMap<Vec<u64>, SnmpValue>,
    /// Агент не отвечает: подключение и запросы падают
    pub down: bool,
    /// Задержка каждого ответа
    pub delay: Option<Duration>,
    pub requests: usize,
    pub connects: usize,
    /// После этого числа запросов агент перестает отвечать
    pub down_after: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeAgent(pub Arc<Mutex<AgentState>>);

impl FakeAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, oid: &str, value: SnmpValue) -> Self {
        self.insert(oid, value);
        self
    }

    pub fn insert(&self, oid: &str, value: SnmpValue) {
        let key = components(oid).expect("валидный OID");
        self.0.lock().unwrap().tree.insert(key, value);
    }

    pub fn value(&self, oid: &str) -> Option<SnmpValue> {
        let key = components(oid)?;
        self.0.lock().unwrap().tree.get(&key).cloned()
    }

    pub fn set_down(&self, down: bool) {
        self.0.lock().unwrap().down = down;
    }

    pub fn set_delay(&self, delay: Duration) {
        self.0.lock().unwrap().delay = Some(delay);
    }

    /// Агент ответит еще на `more` запросов и пропадет
    pub fn fail_after(&self, more: usize) {
        let mut state = self.0.lock().unwrap();
        state.down_after = Some(state.requests + more);
    }

    pub fn requests(&self) -> usize {
        self.0.lock().unwrap().requests
    }

    pub fn connects(&self) -> usize {
        self.0.lock().unwrap().connects
    }
}

fn oid_string(key: &[u64]) -> String {
    key.iter().map(u64::to_string).collect::<Vec<_>>().join(".")
}

pub struct FakeSession {
    agent: FakeAgent,
    connected: bool,
}

impl FakeSession {
    /// Общая часть каждого запроса: задержка, учет, проверка доступности
    async fn begin(&mut self) -> Result<(), ProtocolError> {
        let delay = self.agent.0.lock().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.agent.0.lock().unwrap();
        state.requests += 1;
        if state.down_after.is_some_and(|limit| state.requests > limit) {
            state.down = true;
        }
        if state.down {
            self.connected = false;
            return Err(ProtocolError::Timeout(Duration::from_secs(1)));
        }
        Ok(())
    }

    fn next_after(&self, oid: &str) -> Result<VarBind, ProtocolError> {
        let key = components(oid).ok_or_else(|| ProtocolError::InvalidOid(oid.to_string()))?;
        let state = self.agent.0.lock().unwrap();

        Ok(match state.tree.range((Excluded(key), Unbounded)).next() {
            Some((next, value)) => VarBind::new(oid_string(next), value.clone()),
            None => VarBind::new(oid, SnmpValue::EndOfMibView),
        })
    }
}

#[async_trait]
impl SnmpSession for FakeSession {
    async fn get_many(&mut self, oids: &[String]) -> Result<Vec<VarBind>, ProtocolError> {
        self.begin().await?;
        let state = self.agent.0.lock().unwrap();

        oids.iter()
            .map(|oid| {
                let key = components(oid).ok_or_else(|| ProtocolError::InvalidOid(oid.clone()))?;
                let value = state.tree.get(&key).cloned().unwrap_or(SnmpValue::NoSuchObject);
                Ok(VarBind::new(oid.as_str(), value))
            })
            .collect()
    }

    async fn get_next(&mut self, oid: &str) -> Result<VarBind, ProtocolError> {
        self.begin().await?;
        self.next_after(oid)
    }

    async fn get_bulk(
        &mut self,
        oids: &[String],
        non_repeaters: u32,
        max_repetitions: u32,
    ) -> Result<Vec<VarBind>, ProtocolError> {
        self.begin().await?;

        let split = (non_repeaters as usize).min(oids.len());
        let mut varbinds = Vec::new();
        for oid in &oids[..split] {
            varbinds.push(self.next_after(oid)?);
        }

        let mut cursors: Vec<String> = oids[split..].to_vec();
        for _ in 0..max_repetitions {
            for cursor in cursors.iter_mut() {
                let vb = self.next_after(cursor)?;
                *cursor = vb.oid.clone();
                varbinds.push(vb);
            }
        }

        Ok(varbinds)
    }

    async fn set_many(&mut self, values: &[(String, SnmpValue)]) -> Result<Vec<VarBind>, ProtocolError> {
        self.begin().await?;
        for (oid, value) in values {
            self.agent.insert(oid, value.clone());
        }
        Ok(values
            .iter()
            .map(|(oid, value)| VarBind::new(oid.as_str(), value.clone()))
            .collect())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn close(&mut self) {
        self.connected = false;
    }
}

/// Фабрика сессий: агенты по адресу устройства
#[derive(Default)]
pub struct FakeConnector {
    agents: Mutex<HashMap<String, FakeAgent>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agent(self, address: &str, agent: FakeAgent) -> Self {
        self.add(address, agent);
        self
    }

    pub fn add(&self, address: &str, agent: FakeAgent) {
        self.agents.lock().unwrap().insert(address.to_string(), agent);
    }
}

#[async_trait]
impl SessionFactory for FakeConnector {
    async fn connect(&self, device: &DeviceConfig) -> Result<Box<dyn SnmpSession>, GatewayError> {
        let address = device.address();
        let agent = self.agents.lock().unwrap().get(&address).cloned();

        let Some(agent) = agent else {
            return Err(GatewayError::Connect {
                address,
                reason: "нет маршрута".to_string(),
            });
        };

        {
            let mut state = agent.0.lock().unwrap();
            if state.down {
                return Err(GatewayError::Connect {
                    address,
                    reason: "агент недоступен".to_string(),
                });
            }
            state.connects += 1;
        }

        Ok(Box::new(FakeSession {
            agent,
            connected: true,
        }))
    }
}

/// Сообщение, записанное поддельной платформой
#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub kind: &'static str,
    pub device: String,
    pub data: Value,
}

#[derive(Debug, Default)]
pub struct MemorySink {
    sent: Mutex<Vec<Sent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn of_kind(&self, kind: &str) -> Vec<Sent> {
        self.all().into_iter().filter(|s| s.kind == kind).collect()
    }

    pub fn kinds_for(&self, device: &str) -> Vec<&'static str> {
        self.all()
            .into_iter()
            .filter(|s| s.device == device)
            .map(|s| s.kind)
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    fn push(&self, kind: &'static str, device: &str, data: Value) {
        self.sent.lock().unwrap().push(Sent {
            kind,
            device: device.to_string(),
            data,
        });
    }
}

impl TelemetrySink for MemorySink {
    fn send_attributes(&self, device: &str, data: Map<String, Value>) {
        self.push("attributes", device, Value::Object(data));
    }

    fn send_telemetry(&self, device: &str, data: Map<String, Value>) {
        self.push("telemetry", device, Value::Object(data));
    }

    fn send_connect_event(&self, device: &str, metadata: Map<String, Value>) {
        self.push("connect", device, Value::Object(metadata));
    }

    fn send_disconnect_event(&self, device: &str) {
        self.push("disconnect", device, Value::Null);
    }

    fn send_rpc_reply(&self, device: &str, request_id: &Value, payload: Value) {
        self.push(
            "rpc_reply",
            device,
            serde_json::json!({ "id": request_id, "payload": payload }),
        );
    }
}

pub fn config(yaml: &str) -> AppConfig {
    AppConfig::from_yaml_str(yaml).expect("валидная конфигурация")
}

pub const IF_DESCR: &str = "1.3.6.1.2.1.2.2.1.2";
pub const IF_HC_IN: &str = "1.3.6.1.2.1.31.1.1.1.6";
pub const IF_HC_OUT: &str = "1.3.6.1.2.1.31.1.1.1.10";
pub const SYS_DESCR: &str = "1.3.6.1.2.1.1.1.0";
pub const SYS_OBJECT_ID: &str = "1.3.6.1.2.1.1.2.0";
pub const SYS_UPTIME: &str = "1.3.6.1.2.1.1.3.0";
pub const SYS_NAME: &str = "1.3.6.1.2.1.1.5.0";

/// Linux хост с двумя интерфейсами
pub fn linux_host() -> FakeAgent {
    FakeAgent::new()
        .with(SYS_DESCR, SnmpValue::OctetString(b"Linux core 6.1".to_vec()))
        .with(SYS_OBJECT_ID, SnmpValue::ObjectIdentifier("1.3.6.1.4.1.8072.3.2.10".to_string()))
        .with(SYS_UPTIME, SnmpValue::Timeticks(9_378_400))
        .with(SYS_NAME, SnmpValue::OctetString(b"core".to_vec()))
        .with(&format!("{}.1", IF_DESCR), SnmpValue::OctetString(b"eth0".to_vec()))
        .with(&format!("{}.2", IF_DESCR), SnmpValue::OctetString(b"lo".to_vec()))
        .with(&format!("{}.1", IF_HC_IN), SnmpValue::Counter64(1_000))
        .with(&format!("{}.2", IF_HC_IN), SnmpValue::Counter64(50))
        .with(&format!("{}.1", IF_HC_OUT), SnmpValue::Counter64(2_000))
        .with(&format!("{}.2", IF_HC_OUT), SnmpValue::Counter64(50))
}
