use std::time::Duration;

use regex::Regex;
use serde_json::Value;
use tokio::time::timeout;

use crate::collector::Scheduler;
use crate::config::{ItemConfig, OidList};
use crate::error::GatewayError;
use crate::models::{AttributeUpdate, RpcReply, RpcRequest};

/// Имена RPC, которые обрабатываются без таблицы serverSideRpcRequests
const RESERVED_RPC: &[&str] = &["get", "set"];

/// Ограничение входящего запроса: из запроса (мс), из элемента (с), иначе по умолчанию
fn request_timeout(request_ms: Option<u64>, item: &ItemConfig, default: Duration) -> Duration {
    request_ms
        .map(Duration::from_millis)
        .or_else(|| item.timeout.map(Duration::from_secs))
        .unwrap_or(default)
}

/// Обрабатывает RPC запрос и возвращает ответ для платформы.
/// Ошибки (нет устройства, нет метода, таймаут, ошибка SNMP) превращаются в ответ с ошибкой.
pub async fn handle_rpc(
    scheduler: &mut Scheduler,
    request: &RpcRequest,
    default_timeout: Duration,
    now_ms: u64,
) -> RpcReply {
    match process_rpc(scheduler, request, default_timeout, now_ms).await {
        Ok(result) => {
            tracing::trace!(device = %request.device, result = %result, "Результат RPC");
            RpcReply::success(result)
        }
        Err(e) => {
            tracing::error!(
                device = %request.device,
                method = %request.data.method,
                error = %e,
                "RPC запрос не выполнен"
            );
            RpcReply::failure(e)
        }
    }
}

async fn process_rpc(
    scheduler: &mut Scheduler,
    request: &RpcRequest,
    default_timeout: Duration,
    now_ms: u64,
) -> Result<String, GatewayError> {
    let device = scheduler
        .device(&request.device)
        .ok_or_else(|| GatewayError::NotFound(format!("устройство \"{}\"", request.device)))?;

    let method = request.data.method.as_str();
    let item = if RESERVED_RPC.contains(&method) {
        tracing::debug!(method = %method, "Зарезервированный RPC метод");
        reserved_item(request)
    } else {
        let configured = device
            .server_side_rpc_requests
            .iter()
            .find(|rpc| filter_matches(rpc.request_filter.as_deref(), method))
            .ok_or_else(|| GatewayError::NotFound(format!("RPC метод \"{}\"", method)))?;

        ItemConfig {
            value: Some(request.data.params.value()),
            ..configured.clone()
        }
    };

    let limit = request_timeout(request.data.timeout, &item, default_timeout);
    let result = timeout(limit, scheduler.execute_for_device(&request.device, &item, now_ms))
        .await
        .map_err(|_| GatewayError::Timeout(limit))??;

    Ok(Value::Object(result).to_string())
}

/// Элемент из параметров `get`/`set`: `oid`, `method`, `key`, `value`, `timeout`
fn reserved_item(request: &RpcRequest) -> ItemConfig {
    let params = request.data.params.to_map();
    let text = |name: &str| match params.get(name) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    };

    let value = if request.data.method == "set" {
        Some(
            params
                .get("value")
                .cloned()
                .unwrap_or_else(|| request.data.params.value()),
        )
    } else {
        None
    };

    ItemConfig {
        key: text("key").unwrap_or_default(),
        method: text("method").unwrap_or_else(|| request.data.method.clone()),
        oid: text("oid").map(OidList::One),
        value,
        timeout: text("timeout").and_then(|t| t.parse().ok()),
        ..Default::default()
    }
}

/// Обновление атрибутов: каждый элемент attributeUpdateRequests, чей фильтр
/// совпал с именем атрибута, выполняется с новым значением.
/// Возвращает число выполненных элементов.
pub async fn handle_attribute_update(
    scheduler: &mut Scheduler,
    update: &AttributeUpdate,
    default_timeout: Duration,
    now_ms: u64,
) -> Result<usize, GatewayError> {
    let requests = scheduler
        .device(&update.device)
        .map(|device| device.attribute_update_requests.clone())
        .ok_or_else(|| GatewayError::NotFound(format!("устройство \"{}\"", update.device)))?;

    let mut executed = 0;
    for request in &requests {
        for (attribute, value) in &update.data {
            if !filter_matches(request.attribute_filter.as_deref(), attribute) {
                continue;
            }

            let item = ItemConfig {
                value: Some(value.clone()),
                ..request.clone()
            };
            let limit = request_timeout(None, &item, default_timeout);

            match timeout(limit, scheduler.execute_for_device(&update.device, &item, now_ms)).await {
                Ok(Ok(result)) => {
                    executed += 1;
                    tracing::debug!(
                        device = %update.device,
                        attribute = %attribute,
                        value = %value,
                        result = ?result,
                        "Обновление атрибута выполнено"
                    );
                }
                Ok(Err(e)) => {
                    tracing::error!(device = %update.device, attribute = %attribute, error = %e, "Обновление атрибута не выполнено");
                }
                Err(_) => {
                    tracing::error!(device = %update.device, attribute = %attribute, timeout = ?limit, "Обновление атрибута: таймаут");
                }
            }
        }
    }

    Ok(executed)
}

fn filter_matches(filter: Option<&str>, name: &str) -> bool {
    filter
        .and_then(|pattern| Regex::new(pattern).ok())
        .is_some_and(|re| re.is_match(name))
}
