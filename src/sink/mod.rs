use std::io::Write;

use serde_json::{Map, Value};

use crate::formatter::{Envelope, EnvelopeKind};

/// Получатель данных шлюза (вышестоящая платформа телеметрии)
pub trait TelemetrySink: Send + Sync {
    fn send_attributes(&self, device: &str, data: Map<String, Value>);

    fn send_telemetry(&self, device: &str, data: Map<String, Value>);

    fn send_connect_event(&self, device: &str, metadata: Map<String, Value>);

    fn send_disconnect_event(&self, device: &str);

    fn send_rpc_reply(&self, device: &str, request_id: &Value, payload: Value);
}

/// Пишет по одному JSON конверту на строку в stdout
#[derive(Debug, Default)]
pub struct JsonLinesSink;

impl JsonLinesSink {
    pub fn new() -> Self {
        Self
    }

    fn emit(&self, envelope: Envelope) {
        match envelope.to_json_compact() {
            Ok(line) => {
                let mut stdout = std::io::stdout().lock();
                if let Err(e) = writeln!(stdout, "{}", line) {
                    tracing::error!(error = %e, "Не удалось записать сообщение в stdout");
                }
            }
            Err(e) => tracing::error!(device = %envelope.device, error = %e, "Ошибка JSON сериализации"),
        }
    }
}

impl TelemetrySink for JsonLinesSink {
    fn send_attributes(&self, device: &str, data: Map<String, Value>) {
        self.emit(Envelope::new(EnvelopeKind::Attributes, device, Value::Object(data)));
    }

    fn send_telemetry(&self, device: &str, data: Map<String, Value>) {
        self.emit(Envelope::new(EnvelopeKind::Telemetry, device, Value::Object(data)));
    }

    fn send_connect_event(&self, device: &str, metadata: Map<String, Value>) {
        self.emit(Envelope::new(EnvelopeKind::Connect, device, Value::Object(metadata)));
    }

    fn send_disconnect_event(&self, device: &str) {
        self.emit(Envelope::new(EnvelopeKind::Disconnect, device, Value::Null));
    }

    fn send_rpc_reply(&self, device: &str, request_id: &Value, payload: Value) {
        self.emit(Envelope::new(EnvelopeKind::RpcReply, device, payload).with_request_id(request_id.clone()));
    }
}
