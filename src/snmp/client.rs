use std::time::Duration;

use async_trait::async_trait;
use snmp2::{AsyncSession, Oid, Pdu, Value};
use tokio::time::timeout;

use super::oid::parse_oid;
use super::session::{SnmpSession, VarBind};
use super::value::SnmpValue;
use crate::error::ProtocolError;

/// SNMP клиент поверх `snmp2::AsyncSession` (v1, v2c или v3)
pub struct SnmpClient {
    session: AsyncSession,
    target: String,
    timeout: Duration,
    connected: bool,
}

impl SnmpClient {
    pub(crate) fn new(session: AsyncSession, target: &str, timeout: Duration) -> Self {
        Self {
            session,
            target: target.to_string(),
            timeout,
            connected: true,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Помечает сессию мертвой после транспортной ошибки
    fn track<T>(&mut self, result: Result<T, ProtocolError>) -> Result<T, ProtocolError> {
        if let Err(e) = &result {
            if e.is_transport() {
                tracing::warn!(target = %self.target, error = %e, "SNMP сессия потеряна");
                self.connected = false;
            }
        }
        result
    }
}

fn parse_all(oids: &[String]) -> Result<Vec<Oid<'static>>, ProtocolError> {
    oids.iter().map(|oid| parse_oid(oid)).collect()
}

fn transport(e: snmp2::Error) -> ProtocolError {
    ProtocolError::Transport(format!("{:?}", e))
}

/// Переводит PDU ответа во владеющие пары
fn collect_varbinds(pdu: Pdu<'_>) -> Result<Vec<VarBind>, ProtocolError> {
    if pdu.error_status != 0 {
        return Err(ProtocolError::Agent {
            status: pdu.error_status as u32,
            index: pdu.error_index as u32,
        });
    }

    Ok(pdu
        .varbinds
        .map(|(oid, value)| VarBind::new(oid.to_string(), SnmpValue::from(&value)))
        .collect())
}

#[async_trait]
impl SnmpSession for SnmpClient {
    async fn get_many(&mut self, oids: &[String]) -> Result<Vec<VarBind>, ProtocolError> {
        let parsed = parse_all(oids)?;
        let refs: Vec<&Oid<'_>> = parsed.iter().collect();
        let timeout_duration = self.timeout;

        let result = match timeout(timeout_duration, self.session.get_many(&refs)).await {
            Ok(Ok(pdu)) => collect_varbinds(pdu),
            Ok(Err(e)) => Err(transport(e)),
            Err(_) => Err(ProtocolError::Timeout(timeout_duration)),
        };

        self.track(result)
    }

    async fn get_next(&mut self, oid: &str) -> Result<VarBind, ProtocolError> {
        let parsed = parse_oid(oid)?;
        let timeout_duration = self.timeout;

        let result = match timeout(timeout_duration, self.session.getnext(&parsed)).await {
            Ok(Ok(pdu)) => collect_varbinds(pdu)
                .and_then(|vbs| vbs.into_iter().next().ok_or(ProtocolError::EmptyResponse)),
            Ok(Err(e)) => Err(transport(e)),
            Err(_) => Err(ProtocolError::Timeout(timeout_duration)),
        };

        self.track(result)
    }

    async fn get_bulk(
        &mut self,
        oids: &[String],
        non_repeaters: u32,
        max_repetitions: u32,
    ) -> Result<Vec<VarBind>, ProtocolError> {
        let parsed = parse_all(oids)?;
        let refs: Vec<&Oid<'_>> = parsed.iter().collect();
        let timeout_duration = self.timeout;

        let result = match timeout(
            timeout_duration,
            self.session.getbulk(&refs, non_repeaters, max_repetitions),
        )
        .await
        {
            Ok(Ok(pdu)) => collect_varbinds(pdu),
            Ok(Err(e)) => Err(transport(e)),
            Err(_) => Err(ProtocolError::Timeout(timeout_duration)),
        };

        self.track(result)
    }

    async fn set_many(
        &mut self,
        values: &[(String, SnmpValue)],
    ) -> Result<Vec<VarBind>, ProtocolError> {
        let parsed = values
            .iter()
            .map(|(oid, value)| parse_oid(oid).map(|parsed| (parsed, value)))
            .collect::<Result<Vec<_>, _>>()?;
        let pairs = parsed
            .iter()
            .map(|(oid, value)| {
                value
                    .to_snmp2()
                    .map(|v| (oid, v))
                    .map_err(|e| ProtocolError::InvalidValue {
                        oid: oid.to_string(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<(&Oid<'_>, Value<'_>)>, _>>()?;
        let timeout_duration = self.timeout;

        let result = match timeout(timeout_duration, self.session.set(&pairs)).await {
            Ok(Ok(pdu)) => collect_varbinds(pdu),
            Ok(Err(e)) => Err(transport(e)),
            Err(_) => Err(ProtocolError::Timeout(timeout_duration)),
        };

        self.track(result)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn close(&mut self) {
        // UDP сессия не держит соединения, достаточно перестать ей пользоваться
        self.connected = false;
        tracing::debug!(target = %self.target, "SNMP сессия закрыта");
    }
}
