use std::time::Duration;

use async_trait::async_trait;

pub mod client;
pub mod device_profiles;
pub mod oid;
pub mod session;
pub mod v2c;
pub mod v3;
pub mod value;

pub use client::SnmpClient;
pub use device_profiles::{DeviceDetector, VendorInfo};
pub use oid::parse_oid;
pub use session::{BulkResponse, SessionFactory, SnmpSession, TableRow, VarBind};
pub use value::SnmpValue;

use crate::config::{DeviceConfig, SnmpVersion};
use crate::error::GatewayError;

/// Фабрика сессий на `snmp2`. Версия протокола выбирается по инвентарю.
#[derive(Debug, Clone)]
pub struct Snmp2Connector {
    timeout: Duration,
}

impl Snmp2Connector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl SessionFactory for Snmp2Connector {
    async fn connect(&self, device: &DeviceConfig) -> Result<Box<dyn SnmpSession>, GatewayError> {
        let target = device.address();
        let community = device.community_or_default();

        let client = match device.snmp_version {
            SnmpVersion::V1 => v2c::open_v1(&target, community.as_bytes(), self.timeout).await?,
            SnmpVersion::V2c => v2c::open_v2c(&target, community.as_bytes(), self.timeout).await?,
            SnmpVersion::V3 => {
                let security = v3::security_for(device)?;
                v3::open_v3(&target, security, self.timeout).await?
            }
        };

        tracing::info!(
            device = %device.device_name,
            target = %client.target(),
            version = ?device.snmp_version,
            "SNMP клиент инициализирован"
        );

        Ok(Box::new(client))
    }
}
