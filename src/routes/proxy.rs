use axum::{extract::State, response::Json};
use serde::Serialize;

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::services::proxy::ProxyClient;

#[derive(Serialize, utoipa::ToSchema)]
pub struct ProxyHealthResponse {
    /// `ready` when the proxy is connected to its model space, `disconnected` otherwise.
    status: String,
    connected_to_space: bool,
    space_name: String,
    uptime: f64,
}

fn unavailable(e: crate::error::ProcessingError) -> AppError {
    tracing::warn!(error = %e, "AI proxy unavailable");
    AppError::ServiceUnavailable(format!("AI proxy unavailable: {e}"))
}

#[utoipa::path(
    get,
    path = "/ai/health",
    responses(
        (status = 200, description = "Proxy connection summary", body = ProxyHealthResponse),
        (status = 503, description = "Proxy unreachable")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "AI Proxy"
)]
pub async fn health(
    State(proxy): State<ProxyClient>,
    _auth_user: axum::Extension<AuthUser>,
) -> Result<Json<ProxyHealthResponse>, AppError> {
    let health = proxy.health().await.map_err(unavailable)?;
    Ok(Json(ProxyHealthResponse {
        status: if health.connected_to_space { "ready" } else { "disconnected" }.to_string(),
        connected_to_space: health.connected_to_space,
        space_name: health.space_name,
        uptime: health.uptime,
    }))
}

#[utoipa::path(
    post,
    path = "/ai/reconnect",
    responses(
        (status = 200, description = "Proxy reconnect result, passed through"),
        (status = 503, description = "Proxy unreachable")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "AI Proxy"
)]
pub async fn reconnect(
    State(proxy): State<ProxyClient>,
    auth_user: axum::Extension<AuthUser>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!(user = %auth_user.username, "AI proxy reconnect requested");
    Ok(Json(proxy.reconnect().await.map_err(unavailable)?))
}
