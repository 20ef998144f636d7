// src/api/handlers/page_handler.rs

//! 画面とフォームPOST（結果は303リダイレクトで返す）

use crate::api::AppState;
use crate::domain::plan::BillingInterval;
use crate::domain::subscription_tier::SubscriptionTier;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::{
    optional_auth_middleware, same_origin_middleware, AuthenticatedUser,
};
use crate::pages::{billing, pricing, Flash};
use axum::{
    extract::{Form, Query, State},
    middleware as axum_middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tracing::warn;

const RECENT_PAYMENTS_ON_PAGE: u64 = 10;

#[derive(Debug, Default, Deserialize)]
pub struct PricingQuery {
    pub interval: Option<String>,
    pub checkout: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BillingQuery {
    pub checkout: Option<String>,
    pub notice: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutForm {
    pub tier: String,
    pub interval: Option<String>,
}

/// 未ログイン時はホストアプリのログイン画面へ
fn login_redirect(app_state: &AppState, next: &str) -> Response {
    let login_url = &app_state.config.login_url;
    let separator = if login_url.contains('?') { '&' } else { '?' };
    Redirect::to(&format!(
        "{}{}next={}",
        login_url,
        separator,
        urlencoding::encode(next)
    ))
    .into_response()
}

fn billing_redirect_with_error(action: &str, error: &AppError) -> Response {
    warn!(action = %action, error = %error, "Billing form action failed");
    Redirect::to(&format!(
        "/billing?error={}",
        urlencoding::encode(&error.public_message())
    ))
    .into_response()
}

/// 料金プラン画面（誰でも閲覧可）
pub async fn pricing_page_handler(
    State(app_state): State<AppState>,
    user: Option<AuthenticatedUser>,
    Query(query): Query<PricingQuery>,
) -> AppResult<Html<String>> {
    let interval = query
        .interval
        .as_deref()
        .and_then(BillingInterval::from_str)
        .unwrap_or_default();

    let current_tier = match &user {
        Some(user) => Some(
            app_state
                .billing_service
                .effective_tier(user.user_id())
                .await?,
        ),
        None => None,
    };

    let plans = app_state.billing_service.plans(interval);
    let html = pricing::render(&pricing::PricingPage {
        plans: &plans,
        interval,
        current_tier,
        user_email: user.as_ref().map(|u| u.email()),
        flash: Flash::from_query(query.checkout.as_deref(), None, query.error.as_deref()),
    });

    Ok(Html(html))
}

/// 請求管理画面
pub async fn billing_page_handler(
    State(app_state): State<AppState>,
    user: Option<AuthenticatedUser>,
    Query(query): Query<BillingQuery>,
) -> AppResult<Response> {
    let Some(user) = user else {
        return Ok(login_redirect(&app_state, "/billing"));
    };
    let user_id = user.user_id();

    let overview = app_state
        .billing_service
        .subscription_overview(user_id)
        .await?;
    let usage = app_state.usage_service.usage_summary(user_id).await?;
    let payments = app_state
        .billing_service
        .recent_payments(user_id, RECENT_PAYMENTS_ON_PAGE)
        .await?;
    let has_billing_account = app_state
        .billing_service
        .find_customer(user_id)
        .await?
        .is_some();

    let html = billing::render(&billing::BillingPage {
        user_email: user.email(),
        overview: &overview,
        usage: &usage,
        payments: &payments,
        has_billing_account,
        flash: Flash::from_query(
            query.checkout.as_deref(),
            query.notice.as_deref(),
            query.error.as_deref(),
        ),
    });

    Ok(Html(html).into_response())
}

pub async fn checkout_form_handler(
    State(app_state): State<AppState>,
    user: Option<AuthenticatedUser>,
    Form(form): Form<CheckoutForm>,
) -> Response {
    let Some(user) = user else {
        return login_redirect(&app_state, "/pricing");
    };

    let tier = SubscriptionTier::from_str(&form.tier);
    let interval = match form.interval.as_deref() {
        Some(value) => BillingInterval::from_str(value),
        None => Some(BillingInterval::Month),
    };
    let (Some(tier), Some(interval)) = (tier, interval) else {
        return billing_redirect_with_error(
            "checkout",
            &AppError::BadRequest("Unknown plan selected".to_string()),
        );
    };

    match app_state
        .billing_service
        .create_checkout_session(&user.claims, tier, interval)
        .await
    {
        Ok(session) => Redirect::to(&session.url).into_response(),
        Err(e) => billing_redirect_with_error("checkout", &e),
    }
}

pub async fn portal_form_handler(
    State(app_state): State<AppState>,
    user: Option<AuthenticatedUser>,
) -> Response {
    let Some(user) = user else {
        return login_redirect(&app_state, "/billing");
    };

    match app_state
        .billing_service
        .create_portal_session(user.user_id())
        .await
    {
        Ok(url) => Redirect::to(&url).into_response(),
        Err(e) => billing_redirect_with_error("portal", &e),
    }
}

pub async fn cancel_form_handler(
    State(app_state): State<AppState>,
    user: Option<AuthenticatedUser>,
) -> Response {
    let Some(user) = user else {
        return login_redirect(&app_state, "/billing");
    };

    match app_state
        .billing_service
        .cancel_subscription(user.user_id(), true)
        .await
    {
        Ok(_) => Redirect::to("/billing?notice=canceled").into_response(),
        Err(e) => billing_redirect_with_error("cancel", &e),
    }
}

pub async fn resume_form_handler(
    State(app_state): State<AppState>,
    user: Option<AuthenticatedUser>,
) -> Response {
    let Some(user) = user else {
        return login_redirect(&app_state, "/billing");
    };

    match app_state
        .billing_service
        .resume_subscription(user.user_id())
        .await
    {
        Ok(_) => Redirect::to("/billing?notice=resumed").into_response(),
        Err(e) => billing_redirect_with_error("resume", &e),
    }
}

pub fn pages_router(app_state: AppState) -> Router {
    let auth_config = app_state.auth_config();

    Router::new()
        .route("/pricing", get(pricing_page_handler))
        .route("/billing", get(billing_page_handler))
        .route("/billing/checkout", post(checkout_form_handler))
        .route("/billing/portal", post(portal_form_handler))
        .route("/billing/cancel", post(cancel_form_handler))
        .route("/billing/resume", post(resume_form_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_config.clone(),
            same_origin_middleware,
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_config,
            optional_auth_middleware,
        ))
        .with_state(app_state)
}
