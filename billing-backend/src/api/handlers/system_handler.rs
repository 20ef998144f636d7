// src/api/handlers/system_handler.rs

use crate::api::AppState;
use crate::db::check_connection;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    pub payment_mode: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// ヘルスチェック（DB接続不可なら503）
pub async fn health_check_handler(
    State(app_state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let database_ok = check_connection(&app_state.db).await;
    let stripe = &app_state.config.stripe;

    let payment_mode = if stripe.development_mode {
        "mock"
    } else if stripe.is_test_mode() {
        "test"
    } else {
        "live"
    };

    let status = if database_ok {
        StatusCode::OK
    } else {
        tracing::error!("Health check failed: database unreachable");
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if database_ok { "ok" } else { "degraded" },
            service: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            database: if database_ok { "ok" } else { "unavailable" },
            payment_mode,
            timestamp: Utc::now(),
        }),
    )
}

pub fn system_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check_handler))
        .with_state(app_state)
}
