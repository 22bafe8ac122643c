use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::gateway::InboundQueue;
use crate::handlers::{handle_attributes, handle_rpc, health};

pub fn create_router(queue: InboundQueue) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/rpc", post(handle_rpc))
        .route("/attributes", post(handle_attributes))
        .layer(TraceLayer::new_for_http())
        .with_state(queue)
}
