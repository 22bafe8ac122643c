/// OID sysObjectID.0
pub const SYS_OBJECT_ID: &str = "1.3.6.1.2.1.1.2.0";

/// Информация о производителе устройства
#[derive(Debug, Clone, PartialEq)]
pub struct VendorInfo {
    pub vendor: String,
    pub description: String,
}

/// Детектор производителя по sysObjectID
pub struct DeviceDetector;

/// Префиксы enterprise OID известных производителей
const VENDOR_PREFIXES: &[(&str, &str, &str)] = &[
    ("1.3.6.1.4.1.8072.", "linux", "Linux Net-SNMP Agent"),
    ("1.3.6.1.4.1.9.", "cisco", "Cisco Device"),
    ("1.3.6.1.4.1.11.", "hp", "HP Device"),
    ("1.3.6.1.4.1.2636.", "juniper", "Juniper Device"),
    ("1.3.6.1.4.1.2011.", "huawei", "Huawei Device"),
];

impl DeviceDetector {
    /// Определяет производителя по sysObjectID
    pub fn detect(sys_object_id: &str) -> VendorInfo {
        let sys_object_id = sys_object_id.trim().trim_start_matches('.');

        VENDOR_PREFIXES
            .iter()
            .find(|(prefix, _, _)| sys_object_id.starts_with(prefix))
            .map(|(_, vendor, description)| VendorInfo {
                vendor: vendor.to_string(),
                description: description.to_string(),
            })
            .unwrap_or_else(|| VendorInfo {
                vendor: "generic".to_string(),
                description: "Unknown Device".to_string(),
            })
    }
}
