use std::time::Duration;

use snmp2::AsyncSession;
use tokio::time::timeout;

use super::client::SnmpClient;
use crate::error::GatewayError;

/// Начальный request-id для новых сессий
const STARTING_REQ_ID: i32 = 2;

/// Открывает community-сессию SNMPv1
pub async fn open_v1(
    target: &str,
    community: &[u8],
    op_timeout: Duration,
) -> Result<SnmpClient, GatewayError> {
    let session = timeout(op_timeout, AsyncSession::new_v1(target, community, STARTING_REQ_ID))
        .await
        .map_err(|_| connect_error(target, "таймаут создания сессии"))?
        .map_err(|e| connect_error(target, &e.to_string()))?;

    Ok(SnmpClient::new(session, target, op_timeout))
}

/// Открывает community-сессию SNMPv2c
pub async fn open_v2c(
    target: &str,
    community: &[u8],
    op_timeout: Duration,
) -> Result<SnmpClient, GatewayError> {
    let session = timeout(op_timeout, AsyncSession::new_v2c(target, community, STARTING_REQ_ID))
        .await
        .map_err(|_| connect_error(target, "таймаут создания сессии"))?
        .map_err(|e| connect_error(target, &e.to_string()))?;

    Ok(SnmpClient::new(session, target, op_timeout))
}

pub(crate) fn connect_error(target: &str, reason: &str) -> GatewayError {
    GatewayError::Connect {
        address: target.to_string(),
        reason: reason.to_string(),
    }
}
