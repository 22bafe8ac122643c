use axum::{extract::State, http::StatusCode, Json};

use crate::error::GatewayError;
use crate::gateway::InboundQueue;
use crate::models::{AttributeUpdate, RpcReply, RpcRequest};

/// POST /rpc: ставит запрос в очередь шлюза и ждет ответа.
/// Истекшее ожидание отдается как неуспешный ответ RPC.
pub async fn handle_rpc(
    State(queue): State<InboundQueue>,
    Json(request): Json<RpcRequest>,
) -> Result<Json<RpcReply>, (StatusCode, String)> {
    match queue.rpc(request).await {
        Ok(reply) => Ok(Json(reply)),
        Err(e @ GatewayError::Timeout(_)) => Ok(Json(RpcReply::failure(e))),
        Err(e) => Err((StatusCode::SERVICE_UNAVAILABLE, e.to_string())),
    }
}

/// POST /attributes: обновление выполняется асинхронно
pub async fn handle_attributes(
    State(queue): State<InboundQueue>,
    Json(update): Json<AttributeUpdate>,
) -> Result<StatusCode, (StatusCode, String)> {
    queue
        .attributes(update)
        .await
        .map(|_| StatusCode::ACCEPTED)
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
}
