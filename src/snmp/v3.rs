use std::time::Duration;

use snmp2::v3::{Auth, AuthProtocol, Cipher, Security};
use snmp2::AsyncSession;
use tokio::time::timeout;

use super::client::SnmpClient;
use super::v2c::connect_error;
use crate::config::DeviceConfig;
use crate::error::GatewayError;

const STARTING_REQ_ID: i32 = 2;

/// Протокол аутентификации по имени из инвентаря (SHA по умолчанию)
pub fn parse_auth_protocol(name: Option<&str>) -> Option<AuthProtocol> {
    let protocol = match name.map(|n| n.trim().to_ascii_uppercase()) {
        None => AuthProtocol::Sha1,
        Some(n) => match n.as_str() {
            "MD5" => AuthProtocol::Md5,
            "SHA" | "SHA1" => AuthProtocol::Sha1,
            "SHA224" => AuthProtocol::Sha224,
            "SHA256" => AuthProtocol::Sha256,
            "SHA384" => AuthProtocol::Sha384,
            "SHA512" => AuthProtocol::Sha512,
            _ => return None,
        },
    };
    Some(protocol)
}

/// Алгоритм шифрования по имени из инвентаря (AES128 по умолчанию)
pub fn parse_cipher(name: Option<&str>) -> Option<Cipher> {
    let cipher = match name.map(|n| n.trim().to_ascii_uppercase()) {
        None => Cipher::Aes128,
        Some(n) => match n.as_str() {
            "DES" => Cipher::Des,
            "AES" | "AES128" => Cipher::Aes128,
            "AES192" => Cipher::Aes192,
            "AES256" => Cipher::Aes256,
            _ => return None,
        },
    };
    Some(cipher)
}

/// Собирает параметры USM. Уровень безопасности определяется наличием паролей.
pub fn security_for(device: &DeviceConfig) -> Result<Security, GatewayError> {
    let username = device
        .security_name
        .as_deref()
        .ok_or_else(|| GatewayError::Config("SNMPv3 требует securityName".to_string()))?;

    let Some(auth_password) = device.auth_passphrase.as_deref() else {
        return Ok(Security::new(username.as_bytes(), b"").with_auth(Auth::NoAuthNoPriv));
    };

    let auth_protocol = parse_auth_protocol(device.auth_protocol.as_deref()).ok_or_else(|| {
        GatewayError::Config(format!(
            "Неизвестный протокол аутентификации: {:?}",
            device.auth_protocol
        ))
    })?;

    let auth = match device.priv_passphrase.as_deref() {
        None => Auth::AuthNoPriv,
        Some(privacy_password) => Auth::AuthPriv {
            cipher: parse_cipher(device.priv_protocol.as_deref()).ok_or_else(|| {
                GatewayError::Config(format!(
                    "Неизвестный протокол шифрования: {:?}",
                    device.priv_protocol
                ))
            })?,
            privacy_password: privacy_password.as_bytes().to_vec(),
        },
    };

    Ok(Security::new(username.as_bytes(), auth_password.as_bytes())
        .with_auth_protocol(auth_protocol)
        .with_auth(auth))
}

/// Открывает SNMPv3 сессию и выполняет discovery engine id
pub async fn open_v3(
    target: &str,
    security: Security,
    op_timeout: Duration,
) -> Result<SnmpClient, GatewayError> {
    let mut session = timeout(op_timeout, AsyncSession::new_v3(target, STARTING_REQ_ID, security))
        .await
        .map_err(|_| connect_error(target, "таймаут создания сессии"))?
        .map_err(|e| connect_error(target, &e.to_string()))?;

    timeout(op_timeout, session.init())
        .await
        .map_err(|_| connect_error(target, "таймаут SNMPv3 discovery"))?
        .map_err(|e| connect_error(target, &format!("{:?}", e)))?;

    Ok(SnmpClient::new(session, target, op_timeout))
}
