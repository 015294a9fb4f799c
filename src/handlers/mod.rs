pub mod auth;
pub mod gift_cards;
pub mod transactions;
pub mod wallets;
pub mod ws;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct DbPoolStats {
    pub active_connections: u32,
    pub idle_connections: u32,
    pub max_connections: u32,
    pub usage_percent: f32,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub db: String,
    pub ledger_backend: &'static str,
    pub db_pool: DbPoolStats,
}

/// 200 when the database answers, 503 otherwise.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let connected = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();

    let pool = &state.db;
    let active_connections = pool.size();
    let max_connections = pool.options().get_max_connections();
    let db_pool = DbPoolStats {
        active_connections,
        idle_connections: pool.num_idle() as u32,
        max_connections,
        usage_percent: if max_connections == 0 {
            0.0
        } else {
            active_connections as f32 / max_connections as f32 * 100.0
        },
    };

    let body = HealthStatus {
        status: if connected { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        db: if connected { "connected" } else { "disconnected" }.to_string(),
        ledger_backend: state.status_service.backend_tag(),
        db_pool,
    };

    let status = if connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(body))
}
