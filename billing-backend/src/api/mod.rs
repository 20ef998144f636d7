// src/api/mod.rs
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::infrastructure::payment_gateway::PaymentGateway;
use crate::logging::{inject_request_context, logging_middleware};
use crate::middleware::auth::{cors_layer, security_headers_middleware, AuthMiddlewareConfig};
use crate::service::{
    billing_service::BillingService, usage_service::UsageService,
    webhook_service::WebhookService,
};
use crate::utils::jwt::JwtManager;
use axum::{middleware as axum_middleware, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub mod dto;
pub mod handlers;

/// 統一されたアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub billing_service: Arc<BillingService>,
    pub usage_service: Arc<UsageService>,
    pub webhook_service: Arc<WebhookService>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub jwt_manager: Arc<JwtManager>,
    pub db: Arc<DbPool>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// 決済ゲートウェイを差し替えられるよう外から受け取る
    pub fn new(
        db: DbPool,
        gateway: Arc<dyn PaymentGateway>,
        jwt_manager: Arc<JwtManager>,
        app_config: &AppConfig,
    ) -> Self {
        let billing_service = Arc::new(BillingService::new(
            db.clone(),
            gateway.clone(),
            app_config,
        ));
        let usage_service = Arc::new(UsageService::new(db.clone(), gateway.clone()));
        let webhook_service = Arc::new(WebhookService::new(
            db.clone(),
            billing_service.clone(),
            gateway.clone(),
            &app_config.stripe,
        ));

        Self {
            billing_service,
            usage_service,
            webhook_service,
            gateway,
            jwt_manager,
            db: Arc::new(db),
            config: Arc::new(app_config.clone()),
        }
    }

    pub fn auth_config(&self) -> AuthMiddlewareConfig {
        AuthMiddlewareConfig::new(self.jwt_manager.clone(), &self.config.app_base_url)
    }
}

/// 全ルーターを統合し共通ミドルウェアを適用
pub fn build_router(app_state: AppState) -> Router {
    let config = app_state.config.clone();

    Router::new()
        .merge(handlers::billing_handler::billing_router(app_state.clone()))
        .merge(handlers::usage_handler::usage_router(app_state.clone()))
        .merge(handlers::webhook_handler::webhook_router(app_state.clone()))
        .merge(handlers::page_handler::pages_router(app_state.clone()))
        .merge(handlers::system_handler::system_router(app_state))
        // 内側から順に適用される
        .layer(axum_middleware::from_fn(logging_middleware))
        .layer(axum_middleware::from_fn(inject_request_context))
        .layer(axum_middleware::from_fn(security_headers_middleware))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(cors_layer(&config))
        .layer(TraceLayer::new_for_http())
}
