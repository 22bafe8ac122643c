use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// RPC запрос от платформы: `{device, data: {id, method, params, timeout}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub device: String,
    pub data: RpcData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcData {
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: RpcParams,
    /// Ограничение на выполнение, мс
    pub timeout: Option<u64>,
}

/// Параметры RPC: строка `k=v;k2=v2` или готовый словарь
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcParams {
    Structured(Map<String, Value>),
    Text(String),
    Other(Value),
}

impl Default for RpcParams {
    fn default() -> Self {
        RpcParams::Other(Value::Null)
    }
}

impl RpcParams {
    /// Разбирает параметры в словарь. Пары без `=` или с пустой частью пропускаются.
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        match self {
            RpcParams::Structured(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            RpcParams::Text(text) => text
                .split(';')
                .filter(|pair| !pair.trim().is_empty())
                .filter_map(|pair| {
                    let parsed = pair.split_once('=').and_then(|(key, value)| {
                        let (key, value) = (key.trim(), value.trim());
                        (!key.is_empty() && !value.is_empty() && !value.contains('='))
                            .then(|| (key.to_string(), Value::String(value.to_string())))
                    });
                    if parsed.is_none() {
                        tracing::warn!(param = %pair, "Невалидный формат параметра RPC");
                    }
                    parsed
                })
                .collect(),
            RpcParams::Other(_) => BTreeMap::new(),
        }
    }

    /// Значение для записи: поле `value` или параметры целиком
    pub fn value(&self) -> Value {
        match self {
            RpcParams::Text(text) => Value::String(text.clone()),
            RpcParams::Structured(map) => map
                .get("value")
                .cloned()
                .unwrap_or_else(|| Value::Object(map.clone())),
            RpcParams::Other(value) => value.clone(),
        }
    }
}

/// Обновление атрибутов от платформы: `{device, data: {attr: value, ...}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeUpdate {
    pub device: String,
    pub data: Map<String, Value>,
}

/// Ответ на RPC запрос
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcReply {
    Success { result: String },
    Failure { error: String, success: bool },
}

impl RpcReply {
    pub fn success(result: String) -> Self {
        RpcReply::Success { result }
    }

    pub fn failure(error: impl ToString) -> Self {
        RpcReply::Failure {
            error: error.to_string(),
            success: false,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RpcReply::Success { .. })
    }

    pub fn to_value(&self) -> Value {
        match self {
            RpcReply::Success { result } => serde_json::json!({ "result": result }),
            RpcReply::Failure { error, success } => {
                serde_json::json!({ "error": error, "success": success })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_params_are_split_into_pairs() {
        let params = RpcParams::Text("oid=1.3.6.1.2.1.1.5.0;value=core;broken;k=;=v".to_string());
        let map = params.to_map();

        assert_eq!(map.len(), 2);
        assert_eq!(map["oid"], json!("1.3.6.1.2.1.1.5.0"));
        assert_eq!(map["value"], json!("core"));
    }

    #[test]
    fn request_deserializes_both_param_shapes() {
        let text: RpcRequest = serde_json::from_value(json!({
            "device": "r1",
            "data": {"id": 1, "method": "get", "params": "oid=1.3.6.1.2.1.1.1.0"}
        }))
        .unwrap();
        assert!(matches!(text.data.params, RpcParams::Text(_)));

        let structured: RpcRequest = serde_json::from_value(json!({
            "device": "r1",
            "data": {"id": "a", "method": "set", "params": {"oid": "1.3.6.1.2.1.1.5.0", "value": 5}}
        }))
        .unwrap();
        assert_eq!(structured.data.params.value(), json!(5));

        let bare: RpcRequest =
            serde_json::from_value(json!({"device": "r1", "data": {"id": 2, "method": "reboot"}})).unwrap();
        assert!(bare.data.params.to_map().is_empty());
    }

    #[test]
    fn reply_shapes() {
        assert_eq!(RpcReply::success("{}".into()).to_value(), json!({"result": "{}"}));
        assert_eq!(
            serde_json::to_value(RpcReply::failure("нет устройства")).unwrap(),
            json!({"error": "нет устройства", "success": false})
        );
    }
}
