// src/api/handlers/billing_handler.rs

use crate::api::dto::billing_dto::*;
use crate::api::dto::common::{ApiResponse, PaginatedResponse};
use crate::api::AppState;
use crate::error::AppResult;
use crate::middleware::auth::{jwt_auth_middleware, AuthenticatedUser};
use crate::utils::error_helper::validate_request;
use axum::{
    extract::{Json, Query, State},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tracing::info;

/// 料金プラン一覧（認証不要）
pub async fn get_plans_handler(
    State(app_state): State<AppState>,
    Query(query): Query<PlansQuery>,
) -> AppResult<Json<ApiResponse<PlansResponse>>> {
    let interval = query.interval();
    let catalog = app_state.billing_service.catalog();

    Ok(Json(ApiResponse::success(
        "Plans retrieved successfully",
        PlansResponse {
            interval,
            currency: catalog.currency().to_string(),
            plans: catalog.plans(interval),
            publishable_key: app_state.config.stripe.publishable_key.clone(),
            test_mode: app_state.config.stripe.is_test_mode(),
        },
    )))
}

/// チェックアウトセッション作成
pub async fn create_checkout_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CheckoutRequestDto>,
) -> AppResult<Json<ApiResponse<CheckoutResponse>>> {
    validate_request(&payload, "create_checkout")?;
    let (tier, interval) = payload.plan()?;

    info!(
        user_id = %user.user_id(),
        tier = %tier,
        interval = %interval,
        "Creating checkout session"
    );

    let session = app_state
        .billing_service
        .create_checkout_session(&user.claims, tier, interval)
        .await?;

    Ok(Json(ApiResponse::success(
        "Checkout session created successfully",
        CheckoutResponse {
            checkout_url: session.url,
            session_id: session.id,
        },
    )))
}

/// カスタマーポータルセッション作成
pub async fn create_portal_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<ApiResponse<PortalResponse>>> {
    let portal_url = app_state
        .billing_service
        .create_portal_session(user.user_id())
        .await?;

    info!(user_id = %user.user_id(), "Customer portal session created");

    Ok(Json(ApiResponse::success(
        "Customer portal session created successfully",
        PortalResponse { portal_url },
    )))
}

/// 現在のサブスクリプション概要
pub async fn get_subscription_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<ApiResponse<SubscriptionOverviewResponse>>> {
    let overview = app_state
        .billing_service
        .subscription_overview(user.user_id())
        .await?;

    Ok(Json(ApiResponse::success(
        "Subscription retrieved successfully",
        SubscriptionOverviewResponse::from(overview),
    )))
}

/// 解約（ボディ省略時は期間終了時）
pub async fn cancel_subscription_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    payload: Option<Json<CancelSubscriptionRequest>>,
) -> AppResult<Json<ApiResponse<SubscriptionResponse>>> {
    let Json(payload) = payload.unwrap_or_default();

    let subscription = app_state
        .billing_service
        .cancel_subscription(user.user_id(), payload.at_period_end)
        .await?;

    let message = if payload.at_period_end {
        "Subscription will be canceled at the end of the billing period"
    } else {
        "Subscription canceled"
    };

    Ok(Json(ApiResponse::success(
        message,
        SubscriptionResponse::from(subscription),
    )))
}

/// 期間終了時の解約予約を取り消す
pub async fn resume_subscription_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<ApiResponse<SubscriptionResponse>>> {
    let subscription = app_state
        .billing_service
        .resume_subscription(user.user_id())
        .await?;

    Ok(Json(ApiResponse::success(
        "Subscription resumed",
        SubscriptionResponse::from(subscription),
    )))
}

pub async fn change_plan_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<ChangePlanRequest>,
) -> AppResult<Json<ApiResponse<SubscriptionResponse>>> {
    validate_request(&payload, "change_plan")?;
    let (tier, interval) = payload.plan()?;

    let subscription = app_state
        .billing_service
        .change_plan(user.user_id(), tier, interval)
        .await?;

    Ok(Json(ApiResponse::success(
        "Subscription plan changed",
        SubscriptionResponse::from(subscription),
    )))
}

/// 支払い履歴（ページネーション付き）
pub async fn list_payments_handler(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<PaymentsQuery>,
) -> AppResult<Json<ApiResponse<PaginatedResponse<PaymentResponse>>>> {
    let page = app_state
        .billing_service
        .list_payments(user.user_id(), query.page, query.per_page)
        .await?;

    let items = page.items.into_iter().map(PaymentResponse::from).collect();

    Ok(Json(ApiResponse::success(
        "Payment history retrieved successfully",
        PaginatedResponse::new(items, page.page, page.per_page, page.total_items),
    )))
}

pub fn billing_router(app_state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/billing/checkout", post(create_checkout_handler))
        .route("/api/billing/portal", post(create_portal_handler))
        .route("/api/billing/subscription", get(get_subscription_handler))
        .route(
            "/api/billing/subscription/cancel",
            post(cancel_subscription_handler),
        )
        .route(
            "/api/billing/subscription/resume",
            post(resume_subscription_handler),
        )
        .route("/api/billing/subscription/plan", post(change_plan_handler))
        .route("/api/billing/payments", get(list_payments_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            app_state.auth_config(),
            jwt_auth_middleware,
        ));

    Router::new()
        // 認証不要
        .route("/api/billing/plans", get(get_plans_handler))
        .merge(protected)
        .with_state(app_state)
}
