// src/api/handlers/usage_handler.rs

use crate::api::dto::common::ApiResponse;
use crate::api::dto::usage_dto::*;
use crate::api::AppState;
use crate::error::AppResult;
use crate::middleware::auth::{jwt_auth_middleware, AuthenticatedUser};
use crate::utils::error_helper::validate_request;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    middleware as axum_middleware,
    routing::get,
    Router,
};
use serde_json::json;

/// 使用量を報告（冪等キーが既知なら保存済みの記録を返す）
pub async fn record_usage_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<RecordUsageRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<UsageRecordResponse>>)> {
    validate_request(&payload, "record_usage")?;
    let action = payload.action();

    let recorded = app_state
        .usage_service
        .record_usage(
            user.user_id(),
            payload.quantity,
            action,
            payload.idempotency_key,
        )
        .await?;

    let (status, message) = if recorded.replayed {
        (StatusCode::OK, "Usage already recorded for this idempotency key")
    } else {
        (StatusCode::CREATED, "Usage recorded successfully")
    };

    Ok((
        status,
        Json(ApiResponse::success_with_metadata(
            message,
            UsageRecordResponse::from(recorded.record),
            json!({ "replayed": recorded.replayed }),
        )),
    ))
}

pub async fn get_usage_summary_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<ApiResponse<UsageSummaryResponse>>> {
    let summary = app_state.usage_service.usage_summary(user.user_id()).await?;

    Ok(Json(ApiResponse::success(
        "Usage summary retrieved successfully",
        UsageSummaryResponse::from(summary),
    )))
}

pub fn usage_router(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/api/billing/usage",
            get(get_usage_summary_handler).post(record_usage_handler),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            app_state.auth_config(),
            jwt_auth_middleware,
        ))
        .with_state(app_state)
}
