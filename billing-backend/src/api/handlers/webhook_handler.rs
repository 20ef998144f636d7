// src/api/handlers/webhook_handler.rs

use crate::api::AppState;
use crate::error::AppResult;
use crate::service::webhook_service::WebhookOutcome;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Json, State},
    http::HeaderMap,
    routing::post,
    Router,
};
use serde::Serialize;

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";
const MAX_WEBHOOK_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: WebhookOutcome,
}

/// Stripe Webhookハンドラー（署名検証のため生のボディを受け取る）
pub async fn stripe_webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookAck>> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = app_state.webhook_service.handle(&body, signature).await?;

    Ok(Json(WebhookAck {
        received: true,
        outcome,
    }))
}

pub fn webhook_router(app_state: AppState) -> Router {
    Router::new()
        .route("/webhooks/stripe", post(stripe_webhook_handler))
        .layer(DefaultBodyLimit::max(MAX_WEBHOOK_BODY_BYTES))
        .with_state(app_state)
}
